use std::sync::Arc;

use chirp_common::{FeedPath, FeedStore, MessageRecord};
use chrono::Utc;
use rand::prelude::{Rng, SliceRandom};

const USER_NAMES: &[&str] = &["alice", "bob", "charlie", "dana"];

/// Appends a generated message from a random fake user every `0..max_delay_ms` milliseconds,
/// until an append fails.
pub async fn message_sender(store: Arc<dyn FeedStore>, path: FeedPath, max_delay_ms: u64) {
    loop {
        let (record, millis) = generate_message(max_delay_ms);
        if let Err(err) = store.append(&path, record).await {
            tracing::info!("fake chatter stopped: {err}");
            return;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(millis)).await;
    }
}

/// Appends `count` generated messages right away, so that new subscribers have history to
/// replay.
pub async fn seed_messages(store: &dyn FeedStore, path: &FeedPath, count: usize) {
    for _ in 0..count {
        let (record, _) = generate_message(0);
        if let Err(err) = store.append(path, record).await {
            tracing::warn!("failed to seed message: {err}");
            return;
        }
    }
}

fn generate_message(max_delay_ms: u64) -> (MessageRecord, u64) {
    const MIN_MESSAGE_WORDS: usize = 1;
    const MAX_MESSAGE_WORDS: usize = 15;
    let mut rng = rand::thread_rng();
    let user = USER_NAMES.choose(&mut rng).copied().map(Arc::from);
    let message_len = rng.gen_range(MIN_MESSAGE_WORDS..=MAX_MESSAGE_WORDS);
    let body = lipsum::lipsum_words_with_rng(&mut rng, message_len).into();
    let record = MessageRecord {
        body,
        timestamp: Utc::now().timestamp_millis(),
        user,
    };
    let millis = if max_delay_ms == 0 {
        0
    } else {
        rng.gen_range(0..max_delay_ms)
    };
    (record, millis)
}
