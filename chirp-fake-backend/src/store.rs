use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use chirp_common::{AppendEvent, BackendError, FeedPath, FeedStore, MessageKey, MessageRecord};
use futures::{future::BoxFuture, FutureExt};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Append-only feed store kept in memory. Keys are v7 UUIDs.
#[derive(Debug, Default)]
pub struct FakeFeedStore {
    feeds: Mutex<HashMap<FeedPath, Feed>>,
    offline: AtomicBool,
}

#[derive(Debug, Default)]
struct Feed {
    records: Vec<AppendEvent>,
    subscribers: Vec<mpsc::UnboundedSender<AppendEvent>>,
}

impl FakeFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every append fails and nothing is stored.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Everything stored at `path`, oldest first.
    pub fn records(&self, path: &FeedPath) -> Vec<AppendEvent> {
        self.feeds
            .lock()
            .unwrap()
            .get(path)
            .map(|feed| feed.records.clone())
            .unwrap_or_default()
    }

    fn store(&self, path: &FeedPath, record: MessageRecord) -> MessageKey {
        let key = MessageKey(Uuid::now_v7().to_string().into());
        let event = AppendEvent {
            key: key.clone(),
            record,
        };
        let mut feeds = self.feeds.lock().unwrap();
        let feed = feeds.entry(path.clone()).or_default();
        feed.records.push(event.clone());
        feed.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::trace!(%path, %key, subscribers = feed.subscribers.len(), "record appended");
        key
    }
}

impl FeedStore for FakeFeedStore {
    fn subscribe_appended(&self, path: &FeedPath) -> mpsc::UnboundedReceiver<AppendEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut feeds = self.feeds.lock().unwrap();
        let feed = feeds.entry(path.clone()).or_default();
        let replayed = feed
            .records
            .iter()
            .all(|event| tx.send(event.clone()).is_ok());
        if replayed {
            feed.subscribers.push(tx);
        }
        rx
    }

    fn append(
        &self,
        path: &FeedPath,
        record: MessageRecord,
    ) -> BoxFuture<'static, Result<MessageKey, BackendError>> {
        let result = if self.offline.load(Ordering::Relaxed) {
            Err(BackendError::Unavailable(format!("cannot append to {path}")))
        } else {
            Ok(self.store(path, record))
        };
        futures::future::ready(result).boxed()
    }
}
