use std::{num::NonZeroUsize, sync::Arc};

use chrono::{Local, Utc};
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::{
    view, AppendEvent, AuthProvider, BackendError, ChatMessage, ChatView, FeedPath, FeedStore,
    Identity, MessageFeed, MessageRecord, Session,
};

#[derive(Clone, Debug, Default)]
pub struct ChatConfig {
    pub feed_path: FeedPath,
    /// Upper bound on retained messages. `None` keeps everything.
    pub history_limit: Option<NonZeroUsize>,
    /// Re-open the feed subscription when a user signs in after [`ChatViewModel::logout`]
    /// cleared the feed, so the stored history is replayed. When unset the feed stays empty
    /// after a logout until new records are appended.
    pub resubscribe_on_login: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackendEvent {
    Auth(Option<Identity>),
    Appended(AppendEvent),
}

/// State behind a single chat window: who is signed in, the message feed and the unsent draft.
///
/// Everything is mutated from one task. Backend subscriptions are read through
/// [`ChatViewModel::next_event`] and fed back in with [`ChatViewModel::apply`]; user commands
/// call the backend without waiting for it.
pub struct ChatViewModel {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn FeedStore>,
    config: ChatConfig,
    session: Session,
    feed: MessageFeed,
    compose: String,
    auth_events: Option<mpsc::UnboundedReceiver<Option<Identity>>>,
    feed_events: Option<mpsc::UnboundedReceiver<AppendEvent>>,
    cleared_by_logout: bool,
}

impl ChatViewModel {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn FeedStore>, config: ChatConfig) -> Self {
        let auth_events = auth.subscribe_auth_state();
        let feed_events = store.subscribe_appended(&config.feed_path);
        tracing::debug!(path = %config.feed_path, "subscribed to auth state and feed");
        Self {
            auth,
            store,
            feed: MessageFeed::with_limit(config.history_limit),
            config,
            session: Session::default(),
            compose: String::new(),
            auth_events: Some(auth_events),
            feed_events: Some(feed_events),
            cleared_by_logout: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    /// Waits for the next event from either subscription. Returns `None` once both have closed.
    pub async fn next_event(&mut self) -> Option<BackendEvent> {
        loop {
            if self.auth_events.is_none() && self.feed_events.is_none() {
                return None;
            }
            tokio::select! {
                event = recv_or_pending(&mut self.auth_events) => match event {
                    Some(identity) => return Some(BackendEvent::Auth(identity)),
                    None => {
                        tracing::info!("auth state stream stopped");
                        self.auth_events = None;
                    }
                },
                event = recv_or_pending(&mut self.feed_events) => match event {
                    Some(event) => return Some(BackendEvent::Appended(event)),
                    None => {
                        tracing::info!(path = %self.config.feed_path, "feed stream stopped");
                        self.feed_events = None;
                    }
                },
            }
        }
    }

    pub fn apply(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Auth(identity) => self.on_auth_state(identity),
            BackendEvent::Appended(event) => self.on_appended(event),
        }
    }

    pub fn on_auth_state(&mut self, identity: Option<Identity>) {
        tracing::debug!(?identity, "auth state changed");
        let signed_in = identity.is_some();
        self.session.replace(identity);
        if !signed_in {
            return;
        }
        let after_logout = std::mem::take(&mut self.cleared_by_logout);
        if after_logout && self.config.resubscribe_on_login {
            self.resubscribe_feed();
        }
    }

    pub fn on_appended(&mut self, event: AppendEvent) {
        tracing::trace!(key = %event.key, "message appended");
        self.feed.prepend(ChatMessage::from(event));
    }

    /// Starts the provider sign-in flow. The session only changes once the provider reports it.
    pub fn login(&mut self) {
        tracing::debug!("login");
        fire_and_forget("sign in", self.auth.sign_in_with_provider());
    }

    pub fn logout(&mut self) {
        tracing::debug!("logout");
        fire_and_forget("sign out", self.auth.sign_out());
        self.feed.clear();
        self.cleared_by_logout = true;
    }

    /// Login when nobody is signed in, logout otherwise.
    pub fn toggle_session(&mut self) {
        if self.session.is_signed_in() {
            self.logout();
        } else {
            self.login();
        }
    }

    pub fn compose_change(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        let mut compose = std::mem::take(&mut self.compose);
        compose.push_str(text);
        self.compose_change(compose);
    }

    pub fn pop_char(&mut self) {
        let mut compose = std::mem::take(&mut self.compose);
        compose.pop();
        self.compose_change(compose);
    }

    /// Appends the draft to the feed store and clears it straight away. The message only shows
    /// up in the feed when the store echoes it back.
    pub fn submit(&mut self) {
        let record = MessageRecord {
            body: std::mem::take(&mut self.compose).into(),
            timestamp: Utc::now().timestamp_millis(),
            user: self.session.display_name().cloned(),
        };
        tracing::debug!(user = ?record.user, "submit");
        fire_and_forget("append", self.store.append(&self.config.feed_path, record));
    }

    /// The display tree in local time.
    pub fn view(&self) -> ChatView {
        view::render(&self.session, &self.feed, &self.compose, &Local)
    }

    fn resubscribe_feed(&mut self) {
        tracing::debug!(path = %self.config.feed_path, "re-subscribing to feed");
        self.feed.clear();
        self.feed_events = Some(self.store.subscribe_appended(&self.config.feed_path));
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn fire_and_forget<T: Send + 'static>(
    operation: &'static str,
    request: BoxFuture<'static, Result<T, BackendError>>,
) {
    tokio::spawn(async move {
        match request.await {
            Ok(_) => tracing::debug!(operation, "completed"),
            Err(BackendError::SignInCancelled) => tracing::debug!(operation, "cancelled"),
            Err(err) => tracing::warn!(operation, "{err}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::FutureExt;

    use super::*;
    use crate::MessageKey;

    #[derive(Clone, Debug, Eq, PartialEq)]
    enum Call {
        SignIn,
        SignOut,
        SubscribeAuth,
        SubscribeFeed(FeedPath),
        Append(FeedPath, MessageRecord),
    }

    /// Records every call and lets the test push events into the open subscriptions.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        history: Mutex<Vec<AppendEvent>>,
        auth_tx: Mutex<Option<mpsc::UnboundedSender<Option<Identity>>>>,
        feed_txs: Mutex<Vec<mpsc::UnboundedSender<AppendEvent>>>,
        fail_appends: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn appends(&self) -> Vec<MessageRecord> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Append(_, record) => Some(record),
                    _ => None,
                })
                .collect()
        }

        fn push_auth(&self, identity: Option<Identity>) {
            let tx = self.auth_tx.lock().unwrap();
            tx.as_ref().unwrap().send(identity).unwrap();
        }

        /// Stores the event and delivers it to every live feed subscription.
        fn push_append(&self, key: &str, body: &str, timestamp: i64, user: Option<&str>) {
            let event = AppendEvent {
                key: key.into(),
                record: MessageRecord {
                    body: body.into(),
                    timestamp,
                    user: user.map(Into::into),
                },
            };
            self.history.lock().unwrap().push(event.clone());
            self.feed_txs
                .lock()
                .unwrap()
                .retain(|tx| tx.send(event.clone()).is_ok());
        }

        fn close_all(&self) {
            self.auth_tx.lock().unwrap().take();
            self.feed_txs.lock().unwrap().clear();
        }
    }

    impl AuthProvider for Recorder {
        fn subscribe_auth_state(&self) -> mpsc::UnboundedReceiver<Option<Identity>> {
            self.calls.lock().unwrap().push(Call::SubscribeAuth);
            let (tx, rx) = mpsc::unbounded_channel();
            *self.auth_tx.lock().unwrap() = Some(tx);
            rx
        }

        fn sign_in_with_provider(&self) -> BoxFuture<'static, Result<(), BackendError>> {
            self.calls.lock().unwrap().push(Call::SignIn);
            futures::future::ready(Ok(())).boxed()
        }

        fn sign_out(&self) -> BoxFuture<'static, Result<(), BackendError>> {
            self.calls.lock().unwrap().push(Call::SignOut);
            futures::future::ready(Ok(())).boxed()
        }
    }

    impl FeedStore for Recorder {
        fn subscribe_appended(&self, path: &FeedPath) -> mpsc::UnboundedReceiver<AppendEvent> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::SubscribeFeed(path.clone()));
            let (tx, rx) = mpsc::unbounded_channel();
            for event in self.history.lock().unwrap().iter() {
                tx.send(event.clone()).unwrap();
            }
            self.feed_txs.lock().unwrap().push(tx);
            rx
        }

        fn append(
            &self,
            path: &FeedPath,
            record: MessageRecord,
        ) -> BoxFuture<'static, Result<MessageKey, BackendError>> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Append(path.clone(), record));
            let result = if self.fail_appends {
                Err(BackendError::Unavailable("offline".into()))
            } else {
                Ok(MessageKey::from("assigned"))
            };
            futures::future::ready(result).boxed()
        }
    }

    fn model_with(recorder: &Arc<Recorder>, config: ChatConfig) -> ChatViewModel {
        ChatViewModel::new(recorder.clone(), recorder.clone(), config)
    }

    fn model(recorder: &Arc<Recorder>) -> ChatViewModel {
        model_with(recorder, ChatConfig::default())
    }

    /// Applies every event that is already waiting in the subscriptions.
    async fn drain(model: &mut ChatViewModel, count: usize) {
        for _ in 0..count {
            let event = model.next_event().await.unwrap();
            model.apply(event);
        }
    }

    fn feed_keys(model: &ChatViewModel) -> Vec<String> {
        model.feed().iter().map(|m| m.key.to_string()).collect()
    }

    #[tokio::test]
    async fn subscribes_once_on_creation() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        recorder.push_auth(Some(Identity::new("Alice")));
        recorder.push_auth(None);
        recorder.push_auth(Some(Identity::new("Alice")));
        drain(&mut model, 3).await;
        assert_eq!(
            recorder.calls(),
            [Call::SubscribeAuth, Call::SubscribeFeed("/messages".into())]
        );
    }

    #[tokio::test]
    async fn signed_in_user_receives_message() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        recorder.push_auth(Some(Identity::new("Alice")));
        drain(&mut model, 1).await;
        recorder.push_append("k1", "hi", 1000, Some("Alice"));
        drain(&mut model, 1).await;

        let feed = model.feed().iter().cloned().collect::<Vec<_>>();
        assert_eq!(
            feed,
            [ChatMessage {
                key: "k1".into(),
                body: "hi".into(),
                timestamp: 1000,
                author_name: Some("Alice".into()),
            }]
        );
    }

    #[tokio::test]
    async fn feed_is_newest_first() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        recorder.push_append("k1", "one", 2000, None);
        recorder.push_append("k2", "two", 1000, None);
        drain(&mut model, 2).await;
        assert_eq!(feed_keys(&model), ["k2", "k1"]);
    }

    #[tokio::test]
    async fn history_is_replayed_on_subscribe() {
        let recorder = Arc::new(Recorder::default());
        recorder.push_append("old", "before start", 0, Some("bob"));
        let mut model = model(&recorder);
        drain(&mut model, 1).await;
        assert_eq!(feed_keys(&model), ["old"]);
    }

    #[tokio::test]
    async fn session_mirrors_latest_auth_event() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        recorder.push_auth(Some(Identity::new("Alice")));
        drain(&mut model, 1).await;
        assert_eq!(model.session().identity(), Some(&Identity::new("Alice")));
        recorder.push_auth(None);
        drain(&mut model, 1).await;
        assert_eq!(model.session().identity(), None);
    }

    #[tokio::test]
    async fn login_waits_for_provider() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        model.login();
        assert!(!model.session().is_signed_in());
        assert!(recorder.calls().contains(&Call::SignIn));
    }

    #[tokio::test]
    async fn submit_snapshots_identity_and_clears_draft() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        model.apply(BackendEvent::Auth(Some(Identity::new("Alice"))));
        model.compose_change("hello");
        model.submit();

        assert_eq!(model.compose(), "");
        let appends = recorder.appends();
        assert_eq!(appends.len(), 1);
        assert_eq!(&*appends[0].body, "hello");
        assert_eq!(appends[0].user.as_deref(), Some("Alice"));
        assert!(appends[0].timestamp > 0);
        // no optimistic insert
        assert!(model.feed().is_empty());
    }

    #[tokio::test]
    async fn submit_empty_draft_still_appends() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        model.submit();
        assert_eq!(model.compose(), "");
        let appends = recorder.appends();
        assert_eq!(appends.len(), 1);
        assert_eq!(&*appends[0].body, "");
    }

    #[tokio::test]
    async fn submit_while_signed_out_has_no_user() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        model.compose_change("who am i");
        model.submit();
        assert_eq!(recorder.appends()[0].user, None);
    }

    #[tokio::test]
    async fn failed_append_still_clears_draft() {
        let recorder = Arc::new(Recorder {
            fail_appends: true,
            ..Default::default()
        });
        let mut model = model(&recorder);
        model.compose_change("lost");
        model.submit();
        tokio::task::yield_now().await;
        assert_eq!(model.compose(), "");
    }

    #[tokio::test]
    async fn compose_editing() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        model.push_str("hey");
        model.push_str("!");
        assert_eq!(model.compose(), "hey!");
        model.pop_char();
        model.pop_char();
        assert_eq!(model.compose(), "he");
        model.compose_change("replaced");
        assert_eq!(model.compose(), "replaced");
    }

    #[tokio::test]
    async fn logout_clears_feed_without_replay() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        recorder.push_auth(Some(Identity::new("Alice")));
        recorder.push_append("k1", "hi", 1000, Some("Alice"));
        drain(&mut model, 2).await;
        assert_eq!(model.feed().len(), 1);

        model.logout();
        assert!(model.feed().is_empty());
        assert!(recorder.calls().contains(&Call::SignOut));

        recorder.push_auth(None);
        recorder.push_auth(Some(Identity::new("Alice")));
        drain(&mut model, 2).await;
        assert!(model.feed().is_empty());

        recorder.push_append("k2", "after", 2000, Some("Alice"));
        drain(&mut model, 1).await;
        assert_eq!(feed_keys(&model), ["k2"]);
        assert_eq!(
            recorder
                .calls()
                .iter()
                .filter(|call| matches!(call, Call::SubscribeFeed(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn resubscribe_on_login_replays_history() {
        let recorder = Arc::new(Recorder::default());
        let config = ChatConfig {
            resubscribe_on_login: true,
            ..Default::default()
        };
        let mut model = model_with(&recorder, config);
        recorder.push_auth(Some(Identity::new("Alice")));
        recorder.push_append("k1", "hi", 1000, Some("Alice"));
        recorder.push_append("k2", "there", 2000, Some("Alice"));
        drain(&mut model, 3).await;

        model.logout();
        model.apply(BackendEvent::Auth(None));
        model.apply(BackendEvent::Auth(Some(Identity::new("Alice"))));
        assert!(model.feed().is_empty());
        drain(&mut model, 2).await;
        assert_eq!(feed_keys(&model), ["k2", "k1"]);
    }

    #[tokio::test]
    async fn history_limit_bounds_feed() {
        let recorder = Arc::new(Recorder::default());
        let config = ChatConfig {
            history_limit: NonZeroUsize::new(2),
            ..Default::default()
        };
        let mut model = model_with(&recorder, config);
        for key in ["k1", "k2", "k3"] {
            recorder.push_append(key, "x", 0, None);
        }
        drain(&mut model, 3).await;
        assert_eq!(feed_keys(&model), ["k3", "k2"]);
    }

    #[tokio::test]
    async fn toggle_session_follows_identity() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        model.toggle_session();
        model.apply(BackendEvent::Auth(Some(Identity::new("Alice"))));
        model.toggle_session();
        let calls = recorder.calls();
        assert_eq!(calls[2..], [Call::SignIn, Call::SignOut]);
    }

    #[tokio::test]
    async fn next_event_ends_when_streams_close() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        recorder.close_all();
        assert_eq!(model.next_event().await, None);
    }

    #[tokio::test]
    async fn view_reflects_state() {
        let recorder = Arc::new(Recorder::default());
        let mut model = model(&recorder);
        assert_eq!(model.view().session_action, crate::SessionAction::Login);
        model.apply(BackendEvent::Auth(Some(Identity::new("Alice"))));
        model.compose_change("draft");
        let view = model.view();
        assert_eq!(view.session_action, crate::SessionAction::Logout);
        assert_eq!(view.compose, "draft");
    }
}
