//! Single-writer update pump.
//!
//! Every mutation of the store goes through one consumer task, which gives a
//! total order over updates from any number of concurrent producers.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::store::{KeyValueStore, Value};

/// A store mutation waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingUpdate {
    /// Merge every entry into the store.
    Merge(HashMap<String, Value>),
    /// A body that was not a JSON object, stored verbatim under `key`.
    Raw { key: String, payload: Bytes },
}

impl PendingUpdate {
    /// Build an update from a request body.
    ///
    /// A JSON object is merged key by key and `null` is an empty merge.
    /// Anything else is stored verbatim under `key`.
    pub fn from_body(key: &str, body: Bytes) -> Self {
        match serde_json::from_slice::<Option<serde_json::Map<String, serde_json::Value>>>(&body) {
            Ok(object) => PendingUpdate::Merge(
                object
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            Err(_) => PendingUpdate::Raw {
                key: key.to_string(),
                payload: body,
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            PendingUpdate::Merge(_) => "merge",
            PendingUpdate::Raw { .. } => "raw",
        }
    }

    fn into_entries(self) -> HashMap<String, Value> {
        match self {
            PendingUpdate::Merge(entries) => entries,
            PendingUpdate::Raw { key, payload } => HashMap::from([(key, Value::from(payload))]),
        }
    }
}

/// Error returned to producers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PumpError {
    #[error("update pump has stopped")]
    Stopped,
}

struct Envelope {
    update: PendingUpdate,
    applied: oneshot::Sender<()>,
}

/// Producer side of the pump. Cheap to clone.
#[derive(Clone)]
pub struct UpdateSender {
    tx: mpsc::Sender<Envelope>,
}

impl UpdateSender {
    /// Hand an update to the consumer.
    ///
    /// Resolves once the consumer has applied it, so a successful send is
    /// visible to every later read.
    pub async fn send(&self, update: PendingUpdate) -> Result<(), PumpError> {
        let (applied, ack) = oneshot::channel();
        self.tx
            .send(Envelope { update, applied })
            .await
            .map_err(|_| PumpError::Stopped)?;
        ack.await.map_err(|_| PumpError::Stopped)
    }
}

/// Owner of the consumer task.
pub struct UpdatePump {
    tx: mpsc::Sender<Envelope>,
    stop: CancellationToken,
    done: CancellationToken,
}

impl UpdatePump {
    /// Spawn the consumer task for `store`.
    pub fn spawn(store: Arc<KeyValueStore>) -> Self {
        // A single slot keeps producers in lockstep with the consumer.
        let (tx, rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let done = CancellationToken::new();

        tokio::spawn(run(store, rx, stop.clone(), done.clone()));

        Self { tx, stop, done }
    }

    /// A new producer handle.
    pub fn sender(&self) -> UpdateSender {
        UpdateSender {
            tx: self.tx.clone(),
        }
    }

    /// Ask the consumer to exit. Safe to call more than once.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Wait for the consumer to exit.
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.done.is_cancelled()
    }
}

async fn run(
    store: Arc<KeyValueStore>,
    mut rx: mpsc::Receiver<Envelope>,
    stop: CancellationToken,
    done: CancellationToken,
) {
    let _done = done.drop_guard();
    tracing::debug!("Update pump started");

    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => {
                tracing::info!("Stopping update pump");
                break;
            }
            envelope = rx.recv() => {
                let Some(Envelope { update, applied }) = envelope else {
                    tracing::debug!("All update senders dropped");
                    break;
                };
                let kind = update.kind();
                let entries = update.into_entries();
                tracing::debug!(kind, keys = entries.len(), "Applying update");
                store.merge(entries);
                metrics::record_update(kind);
                let _ = applied.send(());
            }
        }
    }

    // Fail pending producers instead of leaving them parked.
    rx.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(key: &str, value: &str) -> PendingUpdate {
        PendingUpdate::Merge(HashMap::from([(key.to_string(), Value::from(value))]))
    }

    #[test]
    fn body_parsing() {
        let update = PendingUpdate::from_body("ignored", Bytes::from_static(br#"{"a":"b","n":1}"#));
        let PendingUpdate::Merge(entries) = update else {
            panic!("expected merge");
        };
        assert_eq!(entries["a"], Value::from("b"));
        assert_eq!(entries["n"], Value::Document(serde_json::json!(1)));

        let raw = PendingUpdate::from_body("latest/user-data", Bytes::from_static(b"#!/bin/sh"));
        assert_eq!(
            raw,
            PendingUpdate::Raw {
                key: "latest/user-data".into(),
                payload: Bytes::from_static(b"#!/bin/sh"),
            }
        );

        // A JSON array is not a mapping.
        let array = PendingUpdate::from_body("list", Bytes::from_static(b"[1,2]"));
        assert!(matches!(array, PendingUpdate::Raw { .. }));
    }

    #[test]
    fn null_body_is_an_empty_merge() {
        let update = PendingUpdate::from_body("key", Bytes::from_static(b"null"));
        assert_eq!(update, PendingUpdate::Merge(HashMap::new()));
        assert!(update.into_entries().is_empty());
    }

    #[tokio::test]
    async fn binary_raw_body_is_stored_unchanged() {
        let store = Arc::new(KeyValueStore::new());
        let pump = UpdatePump::spawn(store.clone());
        let payload = Bytes::from_static(&[0xff, 0xfe, 0x61, 0x00, 0xc3]);

        pump.sender()
            .send(PendingUpdate::from_body("blob", payload.clone()))
            .await
            .unwrap();

        let stored = store.get("blob").unwrap();
        assert_eq!(stored, Value::Bytes(payload.clone()));
        assert_eq!(stored.to_body().unwrap(), payload);

        pump.stop();
        pump.wait().await;
    }

    #[tokio::test]
    async fn applied_before_send_returns() {
        let store = Arc::new(KeyValueStore::new());
        let pump = UpdatePump::spawn(store.clone());

        pump.sender().send(entry("region", "us-west-2")).await.unwrap();
        assert_eq!(store.get("region"), Some(Value::from("us-west-2")));

        pump.sender()
            .send(PendingUpdate::Raw {
                key: "user-data".into(),
                payload: Bytes::from_static(b"hello"),
            })
            .await
            .unwrap();
        assert_eq!(store.get("user-data"), Some(Value::from("hello")));

        pump.stop();
        pump.wait().await;
    }

    #[tokio::test]
    async fn updates_apply_in_acceptance_order() {
        let store = Arc::new(KeyValueStore::new());
        let pump = UpdatePump::spawn(store.clone());
        let sender = pump.sender();

        for i in 0..100 {
            let update = PendingUpdate::Merge(HashMap::from([
                ("seq".to_string(), Value::from(i.to_string())),
                (format!("k{}", i), Value::from(i.to_string())),
            ]));
            sender.send(update).await.unwrap();
            assert_eq!(store.get("seq"), Some(Value::from(i.to_string())));
        }
        assert_eq!(store.len(), 101);

        pump.stop();
        pump.wait().await;
    }

    #[tokio::test]
    async fn concurrent_producers_all_land() {
        let store = Arc::new(KeyValueStore::new());
        let pump = UpdatePump::spawn(store.clone());

        let tasks: Vec<_> = (0..10)
            .map(|p| {
                let sender = pump.sender();
                tokio::spawn(async move {
                    for i in 0..20 {
                        sender
                            .send(entry(&format!("p{}/{}", p, i), "v"))
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.len(), 200);
        pump.stop();
        pump.wait().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let pump = UpdatePump::spawn(Arc::new(KeyValueStore::new()));
        pump.stop();
        pump.stop();
        pump.wait().await;
        pump.wait().await;
        pump.stop();
        assert!(pump.is_stopped());
    }

    #[tokio::test]
    async fn send_after_stop_fails() {
        let pump = UpdatePump::spawn(Arc::new(KeyValueStore::new()));
        let sender = pump.sender();
        pump.stop();
        pump.wait().await;

        let result = tokio::time::timeout(Duration::from_secs(1), sender.send(entry("a", "b")))
            .await
            .expect("send should not hang");
        assert_eq!(result, Err(PumpError::Stopped));
    }
}
