//! Lectern CLI - binary entry point.
//!
//! # Architecture
//!
//! The CLI wires [`lectern_engine::Client`] to a line-oriented terminal view
//! and runs one loop multiplexing three sources:
//!
//! ```text
//! stdin lines ──► commands::parse ──► Client
//! push events ──────────────────────► Client::handle_sync_event
//! ctrl-c ──────────────────────────► shutdown
//! ```
//!
//! Chat sends run on their own tasks so push events keep flowing while a
//! reply is pending.
//!
//! Logs go to `~/.lectern/logs/lectern.log` so they never interleave with the
//! transcript on stdout.

mod commands;
mod terminal;

use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use lectern_config::{LecternConfig, config_dir};
use lectern_engine::{
    Client, FileStore, LocalStore, MemoryStore, NoticeLevel, RejectReason, SendOutcome, SyncEvent,
    View,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::commands::{Command, HELP};
use crate::terminal::TerminalView;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: drop logs rather than mixing them into the transcript.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.lectern/logs/lectern.log
    if let Some(dir) = config_dir() {
        candidates.push(dir.join("logs").join("lectern.log"));
    }

    // Fallback: ./.lectern/logs/lectern.log
    candidates.push(PathBuf::from(".lectern").join("logs").join("lectern.log"));

    candidates
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Options {
    ephemeral: bool,
    no_sync: bool,
    help: bool,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "--ephemeral" => options.ephemeral = true,
                "--no-sync" => options.no_sync = true,
                "-h" | "--help" => options.help = true,
                other => bail!("unknown argument: {other} (try --help)"),
            }
        }
        Ok(options)
    }
}

const USAGE: &str = "\
Usage: lectern [--ephemeral] [--no-sync]

  --ephemeral   keep watched videos, favorites and the chat session in memory only
  --no-sync     do not open the push channel; use REST only

Configuration is read from ~/.lectern/config.toml.";

fn open_store(path: Option<PathBuf>, ephemeral: bool) -> Arc<dyn LocalStore> {
    if ephemeral {
        return Arc::new(MemoryStore::new());
    }
    let Some(path) = path else {
        tracing::warn!("No storage path available; state will not persist");
        return Arc::new(MemoryStore::new());
    };
    let (store, error) = FileStore::open(path);
    if let Some(e) = error {
        tracing::warn!(path = %store.path().display(), "Starting with empty local state: {e}");
    }
    Arc::new(store)
}

async fn next_event(events: Option<&mut mpsc::Receiver<SyncEvent>>) -> Option<SyncEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

const IN_FLIGHT_NOTICE: &str = "Still waiting for the previous reply.";

fn cooldown_notice(remaining: Duration) -> String {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    format!("Sending is paused for {secs}s after a rate limit.")
}

/// Start a chat send on its own task unless input is cooling down.
fn spawn_send<W>(
    client: &Arc<Client>,
    view: &Arc<TerminalView<W>>,
    sends: &mut JoinSet<()>,
    text: String,
) where
    W: Write + Send + 'static,
{
    if let Some(remaining) = view.send_cooldown_remaining() {
        view.notify(NoticeLevel::Warning, &cooldown_notice(remaining));
        return;
    }
    let client = Arc::clone(client);
    let view = Arc::clone(view);
    sends.spawn(async move {
        let outcome = client.send_chat(&text).await;
        tracing::debug!(?outcome, "Chat send finished");
        if outcome == SendOutcome::Rejected(RejectReason::InFlight) {
            view.notify(NoticeLevel::Info, IN_FLIGHT_NOTICE);
        }
    });
}

/// Returns `false` when the loop should stop.
async fn dispatch<W>(
    client: &Arc<Client>,
    view: &Arc<TerminalView<W>>,
    sends: &mut JoinSet<()>,
    line: &str,
) -> bool
where
    W: Write + Send + 'static,
{
    let command = match commands::parse(line) {
        None => return true,
        Some(Ok(command)) => command,
        Some(Err(e)) => {
            view.notify(NoticeLevel::Warning, &e.to_string());
            return true;
        }
    };

    match command {
        Command::Chat(text) => spawn_send(client, view, sends, text),
        Command::Watch(id) => {
            if !client.mark_watched(&id).await {
                view.notify(NoticeLevel::Info, &format!("Video {id} is already watched"));
            }
        }
        Command::Favorite(id) => {
            let text = if client.toggle_favorite(&id) {
                format!("Added video {id} to favorites")
            } else {
                format!("Removed video {id} from favorites")
            };
            view.notify(NoticeLevel::Success, &text);
        }
        Command::Open(target) => client.open_view(target).await,
        Command::History => {
            let _ = client.chat().load_history().await;
        }
        Command::Clear => {
            let _ = client.chat().clear().await;
        }
        Command::Reconnect => client.reconnect(),
        Command::Progress => client.refresh_progress().await,
        Command::Help => view.notify(NoticeLevel::Info, HELP),
        Command::Quit => return false,
    }
    true
}

async fn run<W>(
    client: &Arc<Client>,
    view: &Arc<TerminalView<W>>,
    mut events: Option<mpsc::Receiver<SyncEvent>>,
) -> Result<()>
where
    W: Write + Send + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sends = JoinSet::new();

    let result = loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line.context("failed to read stdin") {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                };
                if !dispatch(client, view, &mut sends, &line).await {
                    break Ok(());
                }
            }
            Some(joined) = sends.join_next(), if !sends.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!("Chat send task failed: {e}");
                }
            }
            event = next_event(events.as_mut()) => match event {
                Some(event) => client.handle_sync_event(event).await,
                None => {
                    tracing::info!("Push channel closed");
                    events = None;
                }
            },
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    // Pending sends are abandoned on exit.
    sends.shutdown().await;
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse(env::args().skip(1))?;
    if options.help {
        println!("{USAGE}");
        return Ok(());
    }

    init_tracing();

    let settings = LecternConfig::load()
        .context("failed to load config")?
        .unwrap_or_default()
        .resolve()
        .context("invalid config")?;
    tracing::info!(?settings, "Resolved settings");

    let store = open_store(settings.storage_path.clone(), options.ephemeral);
    let view = Arc::new(TerminalView::stdout());
    let mut client = Client::new(&settings, store, view.clone())?;

    let events = if options.no_sync {
        None
    } else {
        client.start_sync(&settings)?
    };

    client.bootstrap().await;
    view.notify(NoticeLevel::Info, "Type /help for commands.");

    let client = Arc::new(client);
    let result = run(&client, &view, events).await;
    match Arc::try_unwrap(client) {
        Ok(client) => client.shutdown().await,
        Err(_) => tracing::warn!("Client still shared at exit; push channel not closed"),
    }
    result
}
