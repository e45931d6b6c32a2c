//! Courier command-line client entry point.
//!
//! A line-oriented client for exercising the protocol end to end: connect,
//! authenticate (credentials or persisted token), join one conversation,
//! then read stdin lines as outgoing messages while printing everything the
//! subscription delivers. No layout or styling; this exists to verify the
//! core against a real server.

use std::{io::Write, path::PathBuf, sync::Arc};

use clap::Parser;
use courier_app::{Chat, ConversationSnapshot, Delivery};
use courier_client::{
    Caller, LinkStatus, Session, TokenStore, Transport, TransportConfig, WsConnector,
};
use courier_proto::payloads::message::ContentKind;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use url::Url;

mod store;

use store::FileTokenStore;

/// Courier chat client.
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Command-line client for the Courier chat protocol")]
#[command(version)]
struct Args {
    /// Server WebSocket endpoint.
    #[arg(short, long, default_value = "ws://localhost:3000/")]
    server: Url,

    /// Account name. With --password, logs in (or registers).
    #[arg(long)]
    username: Option<String>,

    /// Account password.
    #[arg(long)]
    password: Option<String>,

    /// Register a new account instead of logging in.
    #[arg(long)]
    register: bool,

    /// Conversation to join.
    #[arg(long, default_value = "general")]
    conversation: String,

    /// Token file path. Defaults to the platform data directory.
    #[arg(long)]
    token_file: Option<PathBuf>,
}

fn token_path(explicit: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let base = dirs::data_dir().ok_or("no platform data directory; pass --token-file")?;
    Ok(base.join("courier").join("token"))
}

/// One-character delivery badge for printed messages.
fn badge(delivery: Delivery) -> char {
    match delivery {
        Delivery::Pending => '~',
        Delivery::Confirmed => '+',
        Delivery::Failed => '!',
    }
}

/// Print every snapshot update as it arrives.
async fn print_updates(mut updates: watch::Receiver<ConversationSnapshot>) {
    let mut printed = 0;
    loop {
        {
            let snapshot = updates.borrow_and_update();
            let mut out = std::io::stdout().lock();
            for rendered in snapshot.messages.iter().skip(printed) {
                let message = &rendered.message;
                let _ = writeln!(
                    out,
                    "[{}] {}: {}",
                    badge(message.delivery),
                    message.sender.username,
                    message.content
                );
            }
            printed = snapshot.messages.len();
        }
        if updates.changed().await.is_err() {
            break;
        }
    }
}

async fn authenticate(
    args: &Args,
    session: &Session,
    store: &Arc<dyn TokenStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (&args.username, &args.password) {
        (Some(username), Some(password)) if args.register => {
            let identity = session.register(username, password).await?;
            tracing::info!(user_id = %identity.user_id, "registered");
        },
        (Some(username), Some(password)) => {
            let identity = session.login(username, password).await?;
            tracing::info!(user_id = %identity.user_id, "logged in");
        },
        _ => match store.load().await? {
            Some(token) => {
                let identity = session.restore(&token).await?;
                tracing::info!(user_id = %identity.user_id, "session restored from token");
            },
            None => {
                tracing::warn!("no credentials and no persisted token; staying anonymous");
            },
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let transport = Transport::spawn(WsConnector, TransportConfig::new(args.server.clone()));
    transport.connect();
    transport.wait_for(LinkStatus::Connected).await?;
    tracing::info!(server = %args.server, "connected");

    let caller = Caller::new(transport.clone());
    let store: Arc<dyn TokenStore> =
        Arc::new(FileTokenStore::new(token_path(args.token_file.clone())?));
    let session = Session::new(caller.clone(), Arc::clone(&store));
    authenticate(&args, &session, &store).await?;

    let chat = Chat::spawn(caller, session.state());
    chat.set_active(Some(&args.conversation)).await;
    if let Err(e) = chat.load_history(&args.conversation).await {
        tracing::warn!(error = %e, "history unavailable");
    }

    let updates = chat.subscribe(&args.conversation).await;
    let printer = tokio::spawn(print_updates(updates));

    // Stdin loop: each line is a message; /quit ends the session.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Err(e) = chat.send(&args.conversation, line, ContentKind::Text).await {
            tracing::warn!(error = %e, "send failed; use the same line again to retry");
        }
    }

    transport.disconnect();
    printer.abort();
    Ok(())
}
