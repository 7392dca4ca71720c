//! In-process stand-ins for the hosted auth and feed services.

mod auth;
mod chatter;
mod store;

pub use auth::FakeAuth;
pub use chatter::{message_sender, seed_messages};
pub use store::FakeFeedStore;
