//! Projection of the chat state into something a front-end can draw.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::{ChatMessage, MessageFeed, MessageKey, Session};

const ANONYMOUS: &str = "anonymous";
const UNKNOWN_TIME: &str = "--:--:--";

/// The one session button the view offers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionAction {
    Login,
    Logout,
}

impl SessionAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Logout => "Logout",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageLine {
    pub key: MessageKey,
    pub body: Arc<str>,
    pub time: String,
    pub author: Arc<str>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChatView {
    pub session_action: SessionAction,
    pub signed_in_as: Option<Arc<str>>,
    pub compose: String,
    /// Newest first.
    pub lines: Vec<MessageLine>,
}

pub fn render<Tz: TimeZone>(
    session: &Session,
    feed: &MessageFeed,
    compose: &str,
    tz: &Tz,
) -> ChatView
where
    Tz::Offset: std::fmt::Display,
{
    let session_action = if session.is_signed_in() {
        SessionAction::Logout
    } else {
        SessionAction::Login
    };
    ChatView {
        session_action,
        signed_in_as: session.display_name().cloned(),
        compose: compose.to_owned(),
        lines: feed.iter().map(|msg| message_line(msg, tz)).collect(),
    }
}

fn message_line<Tz: TimeZone>(message: &ChatMessage, tz: &Tz) -> MessageLine
where
    Tz::Offset: std::fmt::Display,
{
    MessageLine {
        key: message.key(),
        body: message.body.clone(),
        time: format_time(message.timestamp, tz),
        author: message
            .author_name
            .clone()
            .unwrap_or_else(|| ANONYMOUS.into()),
    }
}

fn format_time<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::<Utc>::from_timestamp_millis(timestamp) {
        Some(utc) => utc.with_timezone(tz).format("%H:%M:%S").to_string(),
        None => UNKNOWN_TIME.to_owned(),
    }
}
