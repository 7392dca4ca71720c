use std::{fmt, sync::Arc};

pub mod backend;
pub mod feed;
pub mod session;
pub mod view;
pub mod view_model;

pub use backend::{AuthProvider, BackendError, FeedStore};
pub use feed::MessageFeed;
pub use session::Session;
pub use view::{render, ChatView, MessageLine, SessionAction};
pub use view_model::{BackendEvent, ChatConfig, ChatViewModel};

/// The authenticated user, as reported by the auth provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub display_name: Arc<str>,
}

impl Identity {
    pub fn new(display_name: impl Into<Arc<str>>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}

/// Opaque key assigned by the feed store when a record is appended.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageKey(pub Arc<str>);

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageKey {
    fn from(key: &str) -> Self {
        Self(key.into())
    }
}

/// Path of a feed within the store.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FeedPath(pub Arc<str>);

impl FeedPath {
    pub const MESSAGES: &'static str = "/messages";
}

impl Default for FeedPath {
    fn default() -> Self {
        Self(Self::MESSAGES.into())
    }
}

impl fmt::Display for FeedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedPath {
    fn from(path: &str) -> Self {
        Self(path.into())
    }
}

/// What gets written to the store. `user` is a snapshot of the sender's display name at
/// submission time, or `None` if nobody was signed in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageRecord {
    pub body: Arc<str>,
    /// Milliseconds since the unix epoch, taken on the submitting client.
    pub timestamp: i64,
    pub user: Option<Arc<str>>,
}

/// A record the store reports as appended at a subscribed path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppendEvent {
    pub key: MessageKey,
    pub record: MessageRecord,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChatMessage {
    pub key: MessageKey,
    pub body: Arc<str>,
    pub timestamp: i64,
    pub author_name: Option<Arc<str>>,
}

impl ChatMessage {
    pub fn key(&self) -> MessageKey {
        self.key.clone()
    }
}

impl From<AppendEvent> for ChatMessage {
    fn from(AppendEvent { key, record }: AppendEvent) -> Self {
        Self {
            key,
            body: record.body,
            timestamp: record.timestamp,
            author_name: record.user,
        }
    }
}
