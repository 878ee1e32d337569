use std::{io::Write as _, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    ClientEvent, ConnectionMonitor, ConversationDirectory, HttpBackend, MessageTimeline,
    SettingsStore, TimelineError, PREFERENCES_FILE,
};
use shared::domain::{ConnectionState, ConversationId};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::{info, warn};

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the chat backend bridge.
    #[arg(long)]
    backend_url: Option<String>,
    /// Directory holding the preferences file.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();
    let backend_url = args.backend_url.unwrap_or(settings.backend_url);
    let data_dir = args.data_dir.unwrap_or(settings.data_dir);

    let store = SettingsStore::new(data_dir.join(PREFERENCES_FILE));
    let preferences = store.load();
    info!("active theme: {}", preferences.theme);

    let backend = Arc::new(HttpBackend::new(&backend_url).context("backend url")?);
    let (events, _) = broadcast::channel::<ClientEvent>(256);

    let monitor = ConnectionMonitor::with_poll_interval(
        backend.clone(),
        events.clone(),
        Duration::from_secs(settings.poll_interval_secs),
    );
    monitor.start().await;
    let directory = ConversationDirectory::new(backend.clone(), events.clone());
    let timeline = MessageTimeline::new(backend.clone(), Arc::clone(&monitor), events.clone());

    spawn_connection_logger(events.subscribe());

    if let Err(err) = directory.refresh().await {
        warn!("initial conversation list fetch failed: {err}");
    }

    println!("chat shell connected to {backend_url} (/help for commands)");
    run_shell(&store, &monitor, &directory, &timeline).await?;

    monitor.stop().await;
    Ok(())
}

fn spawn_connection_logger(mut events: broadcast::Receiver<ClientEvent>) {
    tokio::spawn(async move {
        let mut last_state: Option<ConnectionState> = None;
        loop {
            match events.recv().await {
                Ok(ClientEvent::ConnectionUpdated(snapshot)) => {
                    if last_state != Some(snapshot.state) {
                        info!("backend connection: {:?}", snapshot.state);
                        last_state = Some(snapshot.state);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn run_shell(
    store: &SettingsStore,
    monitor: &ConnectionMonitor,
    directory: &ConversationDirectory,
    timeline: &MessageTimeline,
) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" => break,
            "/help" => print_help(),
            "/status" => {
                let snapshot = monitor.snapshot().await;
                println!("connection: {:?}", snapshot.state);
                for model in &snapshot.models {
                    let marker =
                        if Some(model.name.as_str()) == snapshot.selected_model.as_deref() {
                            "*"
                        } else {
                            " "
                        };
                    println!("  {marker} {}", model.name);
                }
            }
            "/list" => {
                let snapshot = directory.snapshot().await;
                if let Some(err) = &snapshot.last_error {
                    println!("last error: {err}");
                }
                for (index, conversation) in snapshot.conversations.iter().enumerate() {
                    println!(
                        "  {index}: {} [{}] ({})",
                        conversation.title, conversation.model, conversation.id
                    );
                }
            }
            _ => handle_command(line, store, monitor, directory, timeline).await,
        }
        prompt()?;
    }
    Ok(())
}

async fn handle_command(
    line: &str,
    store: &SettingsStore,
    monitor: &ConnectionMonitor,
    directory: &ConversationDirectory,
    timeline: &MessageTimeline,
) {
    if let Some(name) = line.strip_prefix("/model ") {
        monitor.select_model(name.trim()).await;
        println!("model: {}", name.trim());
    } else if let Some(name) = line.strip_prefix("/theme ") {
        match store.set_theme(name.trim()) {
            Ok(preferences) => println!("theme: {}", preferences.theme),
            Err(err) => println!("failed to save theme: {err}"),
        }
    } else if let Some(title) = line.strip_prefix("/new ") {
        let model = monitor
            .selected_model()
            .await
            .unwrap_or_else(|| "llama3".to_string());
        match directory.create(title.trim(), &model).await {
            Ok(id) => {
                if let Err(err) = timeline.load(id.clone()).await {
                    println!("failed to open {id}: {err}");
                } else {
                    println!("opened {id}");
                }
            }
            Err(err) => println!("create failed: {err}"),
        }
    } else if let Some(rest) = line.strip_prefix("/open ") {
        match conversation_at(directory, rest.trim()).await {
            Some(id) => match timeline.load(id.clone()).await {
                Ok(()) => println!("opened {id}"),
                Err(err) => println!("load failed: {err}"),
            },
            None => println!("no such conversation"),
        }
    } else if let Some(rest) = line.strip_prefix("/rename ") {
        let mut parts = rest.trim().splitn(2, ' ');
        let index = parts.next().unwrap_or_default();
        let title = parts.next().unwrap_or_default().trim();
        match conversation_at(directory, index).await {
            Some(id) if !title.is_empty() => {
                if let Err(err) = directory.rename(&id, title).await {
                    println!("rename failed: {err}");
                }
            }
            _ => println!("usage: /rename <n> <title>"),
        }
    } else if let Some(rest) = line.strip_prefix("/delete ") {
        match conversation_at(directory, rest.trim()).await {
            Some(id) => {
                let was_active = timeline.snapshot().await.conversation.as_ref() == Some(&id);
                if let Err(err) = directory.delete(&id).await {
                    println!("delete failed (removed locally): {err}");
                }
                if was_active {
                    timeline.unbind().await;
                }
            }
            None => println!("no such conversation"),
        }
    } else if let Some(rest) = line.strip_prefix("/edit ") {
        edit_message(rest, monitor, timeline, EditKind::Resubmit).await;
    } else if let Some(rest) = line.strip_prefix("/amend ") {
        edit_message(rest, monitor, timeline, EditKind::InPlace).await;
    } else if line.starts_with('/') {
        println!("unknown command (try /help)");
    } else {
        send_message(line, monitor, timeline).await;
    }
}

enum EditKind {
    /// Rewrite history from the edited message and regenerate.
    Resubmit,
    /// Content-only point edit.
    InPlace,
}

async fn edit_message(
    rest: &str,
    monitor: &ConnectionMonitor,
    timeline: &MessageTimeline,
    kind: EditKind,
) {
    let mut parts = rest.trim().splitn(2, ' ');
    let index: usize = match parts.next().unwrap_or_default().parse() {
        Ok(index) => index,
        Err(_) => {
            println!("usage: /edit <n> <content>");
            return;
        }
    };
    let content = parts.next().unwrap_or_default().trim();
    let Some(key) = timeline
        .snapshot()
        .await
        .messages
        .get(index)
        .map(|message| message.local_key.clone())
    else {
        println!("no such message");
        return;
    };

    let result = match kind {
        EditKind::Resubmit => {
            let model = monitor.selected_model().await.unwrap_or_default();
            timeline.edit_and_resubmit(&key, content, &model).await
        }
        EditKind::InPlace => timeline.update_message(&key, content).await,
    };
    match result {
        Ok(()) => print_tail(timeline).await,
        Err(TimelineError::Busy) => println!("still waiting for the previous reply"),
        Err(err) => println!("edit failed: {err}"),
    }
}

async fn send_message(content: &str, monitor: &ConnectionMonitor, timeline: &MessageTimeline) {
    if timeline.snapshot().await.conversation.is_none() {
        println!("open a conversation first (/list, /open <n>, /new <title>)");
        return;
    }
    let model = monitor.selected_model().await.unwrap_or_default();
    match timeline.send(content, &model).await {
        Ok(()) => print_tail(timeline).await,
        Err(TimelineError::Busy) => println!("still waiting for the previous reply"),
        Err(err) => println!("send failed: {err}"),
    }
}

async fn print_tail(timeline: &MessageTimeline) {
    let snapshot = timeline.snapshot().await;
    if let Some(err) = &snapshot.last_error {
        println!("error: {err}");
        return;
    }
    if let Some(message) = snapshot.messages.last() {
        println!("{:?}: {}", message.role, message.content);
    }
}

async fn conversation_at(directory: &ConversationDirectory, raw: &str) -> Option<ConversationId> {
    let index: usize = raw.parse().ok()?;
    directory
        .snapshot()
        .await
        .conversations
        .get(index)
        .map(|conversation| conversation.id.clone())
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn print_help() {
    println!("  /status             connection + models (* = selected)");
    println!("  /model <name>       pick the model for new replies");
    println!("  /list               conversations");
    println!("  /new <title>        create and open a conversation");
    println!("  /open <n>           open conversation n from /list");
    println!("  /rename <n> <t>     rename conversation n");
    println!("  /delete <n>         delete conversation n");
    println!("  /edit <n> <text>    edit message n and regenerate from it");
    println!("  /amend <n> <text>   edit message n in place");
    println!("  /theme <name>       switch and persist the theme");
    println!("  /quit");
    println!("  anything else is sent to the open conversation");
}
