//! Topic administration against a strict broker.

use std::sync::Arc;

use msbus::{Admin, InMemoryBroker};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn create_if_missing_is_idempotent() {
    let broker = InMemoryBroker::strict();
    let admin = Admin::new(Arc::new(broker.clone()));
    let topics = ["ms.user.create", "ms.user.create.dead-letter", "ms.user.create.reply"];

    assert!(!admin.topics_exist(&topics).await.unwrap());

    let created = admin.create_topics_if_missing(&topics, 2, 1).await.unwrap();
    assert_eq!(created.len(), 3);
    assert!(admin.topics_exist(&topics).await.unwrap());

    let created = admin.create_topics_if_missing(&topics, 2, 1).await.unwrap();
    assert!(created.is_empty());
    assert_eq!(broker.partitions("ms.user.create"), Some(2));
    assert_eq!(admin.list_topics().await.unwrap().len(), 3);
}

#[tokio::test]
async fn concurrent_creation_converges() {
    let broker = InMemoryBroker::strict();
    let first = Admin::new(Arc::new(broker.clone()));
    let second = Admin::new(Arc::new(broker.clone()));

    let (a, b) = tokio::join!(
        first.create_topics_if_missing(&["ms.order.place"], 1, 1),
        second.create_topics_if_missing(&["ms.order.place"], 1, 1),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(
        first.list_topics().await.unwrap(),
        vec!["ms.order.place".to_string()]
    );
}
