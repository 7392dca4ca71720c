use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use chirp_common::{AuthProvider, BackendError, Identity};
use futures::{future::BoxFuture, FutureExt};
use tokio::sync::mpsc;

/// Auth provider that signs everybody in as the same user.
#[derive(Debug)]
pub struct FakeAuth {
    display_name: String,
    state: Mutex<AuthState>,
    cancel_sign_in: AtomicBool,
}

#[derive(Debug, Default)]
struct AuthState {
    identity: Option<Identity>,
    subscribers: Vec<mpsc::UnboundedSender<Option<Identity>>>,
}

impl FakeAuth {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            state: Default::default(),
            cancel_sign_in: AtomicBool::new(false),
        }
    }

    /// Starts with a session already in place, as if restored from a previous run.
    pub fn signed_in(display_name: impl Into<String>) -> Self {
        let auth = Self::new(display_name);
        auth.state.lock().unwrap().identity = Some(auth.identity());
        auth
    }

    /// Makes the next sign-in attempts behave as if the user closed the provider's prompt.
    pub fn set_cancel_sign_in(&self, cancel: bool) {
        self.cancel_sign_in.store(cancel, Ordering::Relaxed);
    }

    pub fn current(&self) -> Option<Identity> {
        self.state.lock().unwrap().identity.clone()
    }

    fn identity(&self) -> Identity {
        Identity::new(self.display_name.as_str())
    }

    fn publish(&self, identity: Option<Identity>) {
        let mut state = self.state.lock().unwrap();
        tracing::debug!(?identity, "auth state published");
        state.identity = identity.clone();
        state
            .subscribers
            .retain(|tx| tx.send(identity.clone()).is_ok());
    }
}

impl AuthProvider for FakeAuth {
    fn subscribe_auth_state(&self) -> mpsc::UnboundedReceiver<Option<Identity>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        if tx.send(state.identity.clone()).is_ok() {
            state.subscribers.push(tx);
        }
        rx
    }

    fn sign_in_with_provider(&self) -> BoxFuture<'static, Result<(), BackendError>> {
        if self.cancel_sign_in.load(Ordering::Relaxed) {
            return futures::future::ready(Err(BackendError::SignInCancelled)).boxed();
        }
        self.publish(Some(self.identity()));
        futures::future::ready(Ok(())).boxed()
    }

    fn sign_out(&self) -> BoxFuture<'static, Result<(), BackendError>> {
        self.publish(None);
        futures::future::ready(Ok(())).boxed()
    }
}
