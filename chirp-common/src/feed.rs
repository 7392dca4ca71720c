use std::{collections::VecDeque, num::NonZeroUsize};

use crate::ChatMessage;

/// Messages in arrival order, newest first.
///
/// Arrivals are never sorted by timestamp and never deduplicated: a redelivered record shows up
/// twice. Without a limit the feed only shrinks through [`MessageFeed::clear`].
#[derive(Clone, Debug, Default)]
pub struct MessageFeed {
    messages: VecDeque<ChatMessage>,
    limit: Option<NonZeroUsize>,
}

impl MessageFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// A feed that keeps at most `limit` messages, evicting the oldest arrivals first.
    pub fn with_limit(limit: Option<NonZeroUsize>) -> Self {
        Self {
            messages: VecDeque::new(),
            limit,
        }
    }

    pub fn prepend(&mut self, message: ChatMessage) {
        self.messages.push_front(message);
        if let Some(limit) = self.limit {
            self.messages.truncate(limit.get());
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ChatMessage> + ExactSizeIterator {
        self.messages.iter()
    }
}
