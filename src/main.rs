use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use chirp_common::{ChatConfig, ChatViewModel, FeedPath};
use chirp_fake_backend::{FakeAuth, FakeFeedStore};
use chirp_tui::{Action, Keymap};
use clap::Parser;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(about = "A minimal real-time chat in the terminal")]
struct Args {
    /// Name the sign-in provider authenticates you as.
    #[arg(long, default_value = "guest")]
    display_name: String,
    /// Feed path to subscribe and post to.
    #[arg(long, default_value = FeedPath::MESSAGES)]
    feed_path: String,
    /// Keep at most this many messages in memory.
    #[arg(long)]
    history_limit: Option<NonZeroUsize>,
    /// Replay the stored history when signing in again after a logout.
    #[arg(long)]
    resubscribe_on_login: bool,
    /// Longest pause between messages from the fake users; 0 turns them off.
    #[arg(long, default_value_t = 5000)]
    chatter_max_delay_ms: u64,
    /// Messages stored before start-up.
    #[arg(long, default_value_t = 5)]
    seed_messages: usize,
    /// Start with a restored session.
    #[arg(long)]
    signed_in: bool,
    #[arg(long, default_value = "chirp.log")]
    log_file: PathBuf,
    /// Extra key binding, eg `<C-s>=submit`. Actions: login, logout, toggle-session, submit, quit.
    #[arg(long = "bind", value_name = "KEYS=ACTION")]
    bindings: Vec<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let log_file = std::sync::Mutex::new(std::fs::File::create(&args.log_file)?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(log_file))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut keymap = Keymap::<Action>::default();
    for binding in &args.bindings {
        keymap.bind_str(binding)?;
    }

    let feed_path = FeedPath::from(args.feed_path.as_str());
    let auth = Arc::new(if args.signed_in {
        FakeAuth::signed_in(args.display_name)
    } else {
        FakeAuth::new(args.display_name)
    });
    let store = Arc::new(FakeFeedStore::new());
    chirp_fake_backend::seed_messages(store.as_ref(), &feed_path, args.seed_messages).await;
    if args.chatter_max_delay_ms > 0 {
        tokio::spawn(chirp_fake_backend::message_sender(
            store.clone(),
            feed_path.clone(),
            args.chatter_max_delay_ms,
        ));
    }

    let config = ChatConfig {
        feed_path,
        history_limit: args.history_limit,
        resubscribe_on_login: args.resubscribe_on_login,
    };
    tracing::info!(?config, "starting chat");
    let model = ChatViewModel::new(auth, store, config);
    chirp_tui::run(model, keymap).await?;
    Ok(())
}
