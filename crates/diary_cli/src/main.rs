//! Console transport for the study diary assistant.
//!
//! # Responsibility
//! - Load configuration, initialize logging and open the store.
//! - Feed stdin lines to the assistant as inbound events and print replies.

mod commands;

use anyhow::Context;
use clap::Parser;
use commands::{parse_line, Line, HELP};
use diary_core::{
    default_log_level, init_logging, init_stderr_logging, AppConfig, Assistant, ExternalId,
    InboundEvent, Reply,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "diary", version, about = "Study diary assistant console")]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "DIARY_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the database path from configuration.
    #[arg(long)]
    db: Option<PathBuf>,

    /// External id of the participant typing in this console.
    #[arg(long = "as", default_value_t = 1)]
    sender: ExternalId,

    /// Display name sent with every event.
    #[arg(long, default_value = "console")]
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = args.db {
        config.database_path = db;
    }
    init_logs(&config)?;

    let assistant = Assistant::from_config(&config).context("failed to start assistant")?;
    log::info!("event=cli_start module=cli status=ok");

    run_repl(&assistant, args.sender, &args.name).await
}

fn init_logs(config: &AppConfig) -> anyhow::Result<()> {
    let level = config.log_level.as_deref().unwrap_or(default_log_level());
    match &config.log_dir {
        Some(dir) => {
            let dir = dir
                .to_str()
                .context("log directory must be valid UTF-8")?;
            init_logging(level, dir)
        }
        None => init_stderr_logging(level),
    }
    .map_err(anyhow::Error::msg)
    .context("failed to initialize logging")
}

async fn run_repl(assistant: &Assistant, mut sender: ExternalId, name: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("Study diary console. Acting as {sender}. Type /help.\n").as_bytes())
        .await?;

    while let Some(line) = lines.next_line().await? {
        assistant.evict_idle_sessions();
        let output = match parse_line(&line) {
            Line::Empty => continue,
            Line::Quit => break,
            Line::Help => HELP.to_string(),
            Line::Usage(usage) => format!("usage: {usage}"),
            Line::SwitchSender(id) => {
                sender = id;
                format!("Now acting as {sender}.")
            }
            Line::Event(kind) => {
                let event = InboundEvent {
                    username: Some(name.to_string()),
                    ..InboundEvent::private(sender, kind)
                };
                render(&assistant.handle(event).await)
            }
        };
        stdout.write_all(format!("{output}\n\n").as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn render(reply: &Reply) -> String {
    if reply.choices.is_empty() {
        return reply.text.clone();
    }
    let choices = reply
        .choices
        .iter()
        .map(|choice| format!("  [{}] /pick {}", choice.label, choice.payload))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{choices}", reply.text)
}
