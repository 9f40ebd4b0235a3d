//! Pending request table: correlates replies with waiting callers.
//!
//! Each `send_and_receive` registers a oneshot sender under the request id
//! before publishing. The reply listener completes it when a matching reply
//! arrives. A [`Waiter`] removes its entry when dropped, so timed-out or
//! cancelled calls leave nothing behind.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::envelope::ResponseEnvelope;

type RequestId = String;

#[derive(Default)]
pub(crate) struct PendingReplies {
    waiters: DashMap<RequestId, oneshot::Sender<ResponseEnvelope>>,
}

impl PendingReplies {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register interest in the reply to `request_id`. `None` if a call
    /// with the same id is already waiting.
    pub(crate) fn register(self: &Arc<Self>, request_id: &str) -> Option<Waiter> {
        let (tx, rx) = oneshot::channel();
        match self.waiters.entry(request_id.to_string()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        Some(Waiter {
            request_id: request_id.to_string(),
            pending: Arc::clone(self),
            receiver: Some(rx),
        })
    }

    /// Hand a reply to its waiter. `false` if nobody is waiting any more.
    pub(crate) fn complete(&self, request_id: &str, response: ResponseEnvelope) -> bool {
        match self.waiters.remove(request_id) {
            Some((_, sender)) => sender.send(response).is_ok(),
            None => false,
        }
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub(crate) fn fail_all(&self) -> usize {
        let count = self.waiters.len();
        self.waiters.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}

/// A registered waiter. Removes its table entry on drop.
pub(crate) struct Waiter {
    request_id: String,
    pending: Arc<PendingReplies>,
    receiver: Option<oneshot::Receiver<ResponseEnvelope>>,
}

impl Waiter {
    pub(crate) fn take_receiver(&mut self) -> Option<oneshot::Receiver<ResponseEnvelope>> {
        self.receiver.take()
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.pending.waiters.remove(&self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn complete_delivers_reply() {
        let pending = PendingReplies::new();
        let mut waiter = pending.register("req-1").unwrap();
        let rx = waiter.take_receiver().unwrap();

        assert!(pending.complete("req-1", ResponseEnvelope::success(json!(1))));
        assert_eq!(rx.await.unwrap().data, Some(json!(1)));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn unknown_request_is_ignored() {
        let pending = PendingReplies::new();
        assert!(!pending.complete("nope", ResponseEnvelope::success(json!(1))));
    }

    #[test]
    fn dropped_waiter_cleans_up() {
        let pending = PendingReplies::new();
        {
            let _waiter = pending.register("req-1").unwrap();
            assert_eq!(pending.len(), 1);
        }
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn fail_all_closes_receivers() {
        let pending = PendingReplies::new();
        let mut waiter = pending.register("req-1").unwrap();
        let rx = waiter.take_receiver().unwrap();
        assert_eq!(pending.fail_all(), 1);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn duplicate_id_does_not_steal_the_waiter() {
        let pending = PendingReplies::new();
        let mut first = pending.register("req-1").unwrap();
        let rx = first.take_receiver().unwrap();

        assert!(pending.register("req-1").is_none());
        assert_eq!(pending.len(), 1);

        assert!(pending.complete("req-1", ResponseEnvelope::success(json!(1))));
        assert_eq!(rx.await.unwrap().data, Some(json!(1)));
    }
}
