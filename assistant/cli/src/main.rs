//! Lounge Assistant - Terminal Surface
//!
//! Asks the lounge backend's assistant a question and prints the answer as it
//! streams in.
//!
//! # Usage
//!
//! ```bash
//! # One question
//! lounge-assistant ask "Which spirits are below par?"
//!
//! # Interactive session (type /clear to start over, /quit to leave)
//! lounge-assistant chat
//!
//! # Check the backend is reachable
//! lounge-assistant health
//!
//! # Another backend, verbose logging
//! LOUNGE_API_URL=http://lounge.local:8000 RUST_LOG=debug lounge-assistant chat
//! ```
//!
//! Ctrl-C cancels the answer being streamed.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use assistant_core::{
    load_config, AssistantConfig, ChatBackend, ChatPanel, HttpChatBackend, PanelUpdate,
    SessionStatus,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Lounge Assistant - streaming answers about bar inventory
#[derive(Parser, Debug)]
#[command(name = "lounge-assistant")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "ASSISTANT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "ASSISTANT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive session reading questions from stdin
    Chat,
    /// Check that the backend answers
    Health,
}

type Updates = mpsc::UnboundedReceiver<PanelUpdate>;

/// Initialize logging on stderr so stdout only carries answers
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lounge_assistant={level},assistant_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn build_panel(config: AssistantConfig) -> Result<(ChatPanel<HttpChatBackend>, Updates)> {
    let backend = HttpChatBackend::new(&config).context("Failed to create HTTP client")?;
    info!(url = %backend.chat_url(), "Using chat endpoint");

    let (tx, rx) = mpsc::unbounded_channel();
    Ok((ChatPanel::new(backend, config).with_updates(tx), rx))
}

/// Print everything the panel has reported so far
fn drain(updates: &mut Updates) -> Result<()> {
    let mut out = std::io::stdout().lock();
    while let Ok(update) = updates.try_recv() {
        match update {
            PanelUpdate::StatusChanged { session_id, status } => {
                debug!(session_id = %session_id, status = status.description(), "Status");
                if status == SessionStatus::Streaming {
                    write!(out, "[{}] assistant: ", Local::now().format("%H:%M"))?;
                }
            }
            PanelUpdate::Fragment { text, .. } => write!(out, "{text}")?,
            PanelUpdate::Finished { status, text, .. } => match status {
                SessionStatus::Done => writeln!(out)?,
                // Partial text is superseded by the notice
                _ => writeln!(out, "\n{text}")?,
            },
        }
    }
    out.flush()?;
    Ok(())
}

/// Drive the live session to the end, cancelling on Ctrl-C
async fn stream_answer(
    panel: &mut ChatPanel<HttpChatBackend>,
    updates: &mut Updates,
) -> Result<SessionStatus> {
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let status = tokio::select! {
            status = panel.pump() => status,
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Ctrl-C received, cancelling response");
                panel.cancel();
                panel.status()
            }
        };
        drain(updates)?;
        if !status.is_live() {
            return Ok(status);
        }
    }
}

async fn ask(config: AssistantConfig, question: &str) -> Result<()> {
    let (mut panel, mut updates) = build_panel(config)?;
    panel.send(question)?;

    let status = stream_answer(&mut panel, &mut updates).await?;
    if status == SessionStatus::Errored {
        anyhow::bail!("The assistant did not answer");
    }
    Ok(())
}

async fn chat(config: AssistantConfig) -> Result<()> {
    let (mut panel, mut updates) = build_panel(config)?;

    for message in panel.conversation().messages() {
        println!("assistant: {}", message.text);
    }
    print_suggestions(&panel);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                panel.clear()?;
                println!("Conversation cleared.");
                print_suggestions(&panel);
                continue;
            }
            question => {
                panel.send(question)?;
                stream_answer(&mut panel, &mut updates).await?;
            }
        }
    }

    info!(
        messages = panel.conversation().messages().len(),
        "Chat ended"
    );
    Ok(())
}

fn print_suggestions(panel: &ChatPanel<HttpChatBackend>) {
    let suggestions = panel.suggestions();
    if suggestions.is_empty() {
        return;
    }
    println!("Try asking:");
    for suggestion in suggestions {
        println!("  - {suggestion}");
    }
}

async fn health(config: AssistantConfig) -> Result<()> {
    let backend = HttpChatBackend::new(&config).context("Failed to create HTTP client")?;
    if backend.health_check().await {
        println!("{} is reachable", config.endpoint);
        Ok(())
    } else {
        anyhow::bail!("{} is not reachable", config.endpoint)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let (config, source) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;
    info!(source = ?source, endpoint = %config.endpoint, "Configuration loaded");

    match args.command {
        Command::Ask { question } => ask(config, &question.join(" ")).await,
        Command::Chat => chat(config).await,
        Command::Health => health(config).await,
    }
}
