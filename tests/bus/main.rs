//! Bus integration tests: producer, consumer and registry over the
//! in-memory broker.

mod support;
mod handlers;
mod admin;
mod convention;
mod envelope;
mod request_reply;
mod retries;
mod scenarios;
mod unknown_topic;

#[cfg(feature = "http")]
mod http;
