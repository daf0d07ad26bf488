//! GastoBot - expense-tracking chat bot for Argentina
//!
//! Terminal shell around the core pipeline:
//! - Gemini function calling turns free text into add/delete/history calls
//! - a Google-Sheets script endpoint mirrors the ledger
//! - optional Telegram bridge feeds external messages into the same pipeline

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use gastobot::bridge::{self, FileCursorStore, TelegramClient};
use gastobot::repl::ansi::*;
use gastobot::{config, repl, state};
use gastobot::{ChatPipeline, Extractor, Ledger, SheetsLedger};

#[derive(Parser)]
#[command(name = "gastobot")]
#[command(about = "Chat-driven expense tracker for Argentina")]
struct Args {
    /// Run the Telegram bridge instead of the interactive shell
    #[arg(long)]
    bridge: bool,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY")]
    gemini_api_key: Option<String>,

    /// Sheet script endpoint URL (Apps Script /exec deployment)
    #[arg(long, env = "SHEET_URL")]
    sheet_url: Option<String>,

    /// Display name shown to the model
    #[arg(long, env = "GASTOBOT_NAME")]
    name: Option<String>,

    /// Telegram bot token (required with --bridge)
    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    telegram_token: Option<String>,

    /// Bridge inter-poll delay in seconds
    #[arg(long)]
    poll_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (from ~/.gastobot/.env or current dir)
    let env_path = dirs::home_dir()
        .map(|h| h.join(".gastobot").join(".env"))
        .filter(|p| p.exists());
    if let Some(path) = env_path {
        let _ = dotenvy::from_path(&path);
    } else {
        let _ = dotenvy::dotenv();
    }

    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Load config file (~/.gastobot/config.toml)
    let config = config::Config::load();

    // Resolve values: CLI args > env vars (handled by clap) > config file > defaults
    let api_key = args.gemini_api_key
        .or(config.gemini_api_key)
        .expect("GEMINI_API_KEY required (set via --gemini-api-key, env var, or ~/.gastobot/config.toml)");

    let sheet_url = args.sheet_url.or(config.sheet_url).filter(|u| !u.is_empty());

    let user_name = args.name
        .or(config.user_name)
        .unwrap_or_else(|| "Usuario".to_string());

    let telegram_token = args.telegram_token.or(config.telegram_token);

    let poll_secs = args.poll_secs.or(config.poll_secs).unwrap_or(3);

    // Pretty startup banner
    println!();
    println!("{}{}  GastoBot {}{}", BOLD, CYAN, env!("CARGO_PKG_VERSION"), RESET);
    println!("{}", "─".repeat(50));
    println!("{}Modelo{}      Gemini 3 Flash", DIM, RESET);
    println!("{}Usuario{}     {}", DIM, RESET, user_name);
    println!("{}Telegram{}    {}", DIM, RESET,
        if telegram_token.is_some() { format!("{}configurado{}", GREEN, RESET) }
        else { format!("{}no configurado{}", YELLOW, RESET) });

    // Initial sync: a configured sheet seeds the store; otherwise (or on
    // failure) the locally persisted file does.
    let expenses_path = state::expenses_path();
    let mut ledger: Option<Box<dyn Ledger>> = None;
    let expenses = match &sheet_url {
        Some(url) => {
            let sheets = SheetsLedger::new(url.clone());
            let seeded = match sheets.list().await {
                Ok(rows) => {
                    println!("{}Planilla{}    {}sincronizada{} ({} gastos)",
                        DIM, RESET, GREEN, RESET, rows.len());
                    Some(rows)
                }
                Err(e) => {
                    println!("{}Planilla{}    {}sin conexión{}", DIM, RESET, YELLOW, RESET);
                    eprintln!("⚠️ {}", e);
                    None
                }
            };
            ledger = Some(Box::new(sheets));
            match seeded {
                Some(rows) => rows,
                None => state::load_expenses(&expenses_path).unwrap_or_default(),
            }
        }
        None => {
            println!("{}Planilla{}    {}modo local (sin respaldo){}", DIM, RESET, YELLOW, RESET);
            state::load_expenses(&expenses_path).unwrap_or_default()
        }
    };
    println!("{}Gastos{}      {} registrados", DIM, RESET, expenses.len());
    println!("{}", "─".repeat(50));
    println!();

    let mut pipeline = ChatPipeline::new(Extractor::new(api_key), user_name)
        .with_state_path(expenses_path)
        .with_expenses(expenses);
    if let Some(l) = ledger {
        pipeline = pipeline.with_ledger(l);
    }

    if args.bridge {
        let token = telegram_token
            .expect("TELEGRAM_BOT_TOKEN required with --bridge (set via --telegram-token, env var, or ~/.gastobot/config.toml)");
        let client = TelegramClient::new(&token)?;
        let mut cursor_store = FileCursorStore::new(state::data_dir().join("telegram_cursor"));

        // Ctrl+C flips the shutdown signal; the current poll cycle finishes
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = tx.send(true);
        });

        bridge::run(
            &mut pipeline,
            &client,
            &mut cursor_store,
            Duration::from_secs(poll_secs),
            rx,
        )
        .await;
        Ok(())
    } else {
        repl::run(&mut pipeline).await
    }
}
