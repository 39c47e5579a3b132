//! Application runtime and interactive command loop.

pub mod commands;
pub mod editor;
pub mod events;
pub mod state;

use crate::api::CommentsApi;
use crate::api::client::HttpCommentsApi;
use crate::app::commands::{Command, HELP, Target, parse_command};
use crate::app::events::{WorkerMessage, spawn_fetch, spawn_mutation};
use crate::app::state::{AppState, Work};
use crate::config::ApiConfig;
use crate::domain::Identity;
#[cfg(feature = "harness")]
use crate::fixtures;
use crate::render::thread::render_thread;
use crate::session::ThreadSession;
use crate::sync::{SyncSettings, ThreadSync};
use anyhow::Context;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

/// Runtime configuration provided by CLI flags and the config file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub thread_id: Option<String>,
    pub page: u32,
    pub settings: SyncSettings,
    pub api: ApiConfig,
    #[cfg(feature = "harness")]
    pub demo: bool,
}

/// The API, identity, and thread a run works against.
struct Connection {
    api: Arc<dyn CommentsApi>,
    identity: Option<Identity>,
    thread_id: String,
}

async fn connect(config: &AppConfig) -> anyhow::Result<Connection> {
    #[cfg(feature = "harness")]
    if config.demo {
        return Ok(Connection {
            api: Arc::new(fixtures::demo_api()),
            identity: Some(fixtures::demo_identity()),
            thread_id: config
                .thread_id
                .clone()
                .unwrap_or_else(|| fixtures::DEMO_THREAD_ID.to_owned()),
        });
    }

    let thread_id = config
        .thread_id
        .clone()
        .context("--thread is required outside demo mode")?;
    let client = HttpCommentsApi::new(config.api.client_settings())
        .context("failed to create comments API client")?;

    let identity = if client.has_token() {
        match client.current_user().await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "could not resolve the signed-in user; continuing read-only");
                None
            }
        }
    } else {
        info!(token_env = %config.api.token_env, "no API token set; continuing read-only");
        None
    };

    Ok(Connection {
        api: Arc::new(client),
        identity,
        thread_id,
    })
}

/// Prints one page of a thread and exits.
pub async fn show(config: AppConfig) -> anyhow::Result<()> {
    let connection = connect(&config).await?;
    let mut session = ThreadSession::new(
        connection.api,
        connection.thread_id,
        config.settings,
        connection.identity,
    );

    session
        .load_page(config.page)
        .await
        .context("failed to load comments")?;
    let view = session.view();
    for line in render_thread(&view, session.identity()) {
        println!("{line}");
    }
    Ok(())
}

/// Runs the interactive session until `quit` or end of input.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let connection = connect(&config).await?;
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();

    let mut sync = ThreadSync::new(connection.thread_id, config.settings);
    let initial = sync.fetch_page(config.page);
    let mut state = AppState::new(sync, connection.identity);
    dispatch(&tx, &connection.api, vec![Work::Fetch(initial)]);

    if state.identity.is_none() {
        state.status_message = Some("read-only: no signed-in user".to_owned());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    redraw(&state)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                let work = handle_line(&mut state, &line).await;
                dispatch(&tx, &connection.api, work);
            }
            Some(message) = rx.recv() => {
                let work = state.process_worker_message(message);
                dispatch(&tx, &connection.api, work);
            }
        }

        if state.should_quit {
            break;
        }
        redraw(&state)?;
    }

    Ok(())
}

async fn handle_line(state: &mut AppState, line: &str) -> Vec<Work> {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Vec::new(),
        Err(err) => {
            state.error_message = Some(err.to_string());
            return Vec::new();
        }
    };

    let command = match command {
        Command::Help => {
            state.status_message = Some(HELP.to_owned());
            return Vec::new();
        }
        Command::Compose(target) => match compose(state, target).await {
            Ok(Some(command)) => command,
            Ok(None) => {
                state.status_message = Some("nothing written; discarded".to_owned());
                return Vec::new();
            }
            Err(err) => {
                state.error_message = Some(format!("{err:#}"));
                return Vec::new();
            }
        },
        Command::Edit {
            target,
            content: None,
        } => match edit_in_editor(state, target).await {
            Ok(Some(command)) => command,
            Ok(None) => return Vec::new(),
            Err(err) => {
                state.error_message = Some(format!("{err:#}"));
                return Vec::new();
            }
        },
        command => command,
    };

    state.execute(command)
}

async fn compose(state: &AppState, target: Option<Target>) -> anyhow::Result<Option<Command>> {
    let initial = state
        .failed_draft()
        .map(|draft| draft.content.clone())
        .unwrap_or_default();
    let Some(content) = open_editor(initial).await? else {
        return Ok(None);
    };

    Ok(Some(match target {
        Some(target) => Command::Reply { target, content },
        None => Command::Post(content),
    }))
}

async fn edit_in_editor(state: &AppState, target: Target) -> anyhow::Result<Option<Command>> {
    let resolved = state.resolve(&target).map_err(anyhow::Error::msg)?;
    let view = state.view();
    let current = view
        .comments
        .iter()
        .find_map(|row| {
            if row.comment.id == resolved.id {
                return Some(row.comment.content.clone());
            }
            row.replies
                .entries
                .iter()
                .find(|reply| reply.id == resolved.id)
                .map(|reply| reply.content.clone())
        })
        .unwrap_or_default();

    let Some(content) = open_editor(current.clone()).await? else {
        return Ok(None);
    };
    if content == current {
        return Ok(None);
    }
    Ok(Some(Command::Edit {
        target: Target::Id(resolved.id),
        content: Some(content),
    }))
}

async fn open_editor(initial: String) -> anyhow::Result<Option<String>> {
    tokio::task::spawn_blocking(move || editor::compose_with_system_editor(&initial))
        .await
        .context("editor task failed")?
}

fn dispatch(tx: &UnboundedSender<WorkerMessage>, api: &Arc<dyn CommentsApi>, work: Vec<Work>) {
    for item in work {
        match item {
            Work::Fetch(request) => spawn_fetch(tx.clone(), api.clone(), request),
            Work::Mutate(mutation) => {
                spawn_mutation(tx.clone(), api.clone(), mutation.id, mutation.request)
            }
        }
    }
}

fn redraw(state: &AppState) -> anyhow::Result<()> {
    let view = state.view();
    let mut stdout = std::io::stdout().lock();

    writeln!(stdout)?;
    for line in render_thread(&view, state.identity.as_ref()) {
        writeln!(stdout, "{line}")?;
    }
    if let Some(status) = &state.status_message {
        writeln!(stdout, "{status}")?;
    }
    if let Some(error) = &state.error_message {
        writeln!(stdout, "error: {error}")?;
    }
    write!(stdout, "> ")?;
    stdout.flush().context("failed to flush stdout")?;
    Ok(())
}
