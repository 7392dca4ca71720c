//! Contracts for the two hosted services the chat view-model sits on top of.
//!
//! Both subscriptions are delivered over unbounded channels and are expected to be opened once
//! per view-model. The remaining operations hand back `'static` futures so the caller can spawn
//! them and move on without waiting for the service.

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::{AppendEvent, FeedPath, Identity, MessageKey, MessageRecord};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("sign-in was cancelled")]
    SignInCancelled,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

pub trait AuthProvider: Send + Sync {
    /// Stream of session changes. `None` means signed out. Implementations that restore a
    /// session on startup report it as the first item.
    fn subscribe_auth_state(&self) -> mpsc::UnboundedReceiver<Option<Identity>>;

    fn sign_in_with_provider(&self) -> BoxFuture<'static, Result<(), BackendError>>;

    fn sign_out(&self) -> BoxFuture<'static, Result<(), BackendError>>;
}

pub trait FeedStore: Send + Sync {
    /// Stream of records appended at `path`: every record already stored, followed by every
    /// record appended later, in the store's order.
    fn subscribe_appended(&self, path: &FeedPath) -> mpsc::UnboundedReceiver<AppendEvent>;

    fn append(
        &self,
        path: &FeedPath,
        record: MessageRecord,
    ) -> BoxFuture<'static, Result<MessageKey, BackendError>>;
}
