//! Jarvis - Interactive Front-End
//!
//! Reads commands from stdin and runs them through the assistant engine.
//! Every capability is served by a dry-run executor, so actions are
//! described rather than performed.

use jarvis_core::actions::{load_catalog_file, ActionCatalog};
use jarvis_core::command::{Dispatcher, DryRunExecutor};
use jarvis_core::core::error::Result;
use jarvis_core::core::{Capability, EngineConfig, SessionId};
use jarvis_core::llm::{CompletionClient, LlmClient};
use jarvis_core::AssistantEngine;

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Jarvis - natural language commands for your desktop
#[derive(Parser, Debug)]
#[command(name = "jarvis")]
#[command(about = "Resolve natural language commands into assistant actions")]
struct Args {
    /// Engine configuration file (TOML)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Session id to use (random if omitted)
    #[arg(long, short = 's')]
    session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jarvis_core=info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };

    let mut catalog = ActionCatalog::builtin();
    if let Some(path) = &config.catalog_path {
        let added = load_catalog_file(&mut catalog, path)?;
        tracing::info!(added, path = %path.display(), "loaded catalog file");
    }
    let catalog = Arc::new(catalog);

    // Optional - the rule-based matcher works without it
    let client: Option<Arc<dyn CompletionClient>> = if config.llm.is_configured() {
        match LlmClient::from_settings(&config.llm) {
            Ok(client) => {
                tracing::info!(model = client.model(), "language model enabled");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!(error = %e, "language model disabled");
                None
            }
        }
    } else {
        tracing::warn!("LLM_API_KEY not set - using rule-based matching only");
        None
    };

    let mut builder = Dispatcher::builder(catalog.clone(), &config);
    for capability in Capability::ALL {
        builder = builder.register(capability, Arc::new(DryRunExecutor::new(capability)));
    }
    let dispatcher = builder.build()?;

    let engine = AssistantEngine::new(config, catalog, client, dispatcher)?;
    let mut session = args.session.map(SessionId::from).unwrap_or_default();

    println!("\n=== JARVIS ===");
    println!("Session: {}", session);
    println!();
    println!("Commands:");
    println!("  reset           - Forget this conversation");
    println!("  status          - Show engine status");
    println!("  quit / q        - Exit");
    println!("  <any text>      - Natural language command");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "q" {
            break;
        }

        if input == "reset" {
            engine.reset(&session);
            session = SessionId::new();
            println!("Conversation cleared. New session: {}", session);
            continue;
        }

        if input == "status" {
            let status = engine.status();
            println!("  LLM configured:  {}", status.llm_configured);
            println!("  Active sessions: {}", status.active_sessions);
            println!("  Catalog size:    {}", status.catalog_size);
            let caps: Vec<&str> = status.capabilities.iter().map(|c| c.as_str()).collect();
            println!("  Capabilities:    {}", caps.join(", "));
            continue;
        }

        // Ctrl-C abandons the current request, not the whole session
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                guard.cancel();
            }
        });

        let reply = engine.handle_with_cancel(&session, input, cancel).await;
        watcher.abort();

        println!("{}", reply.text);
        if let Some(data) = &reply.data {
            println!("  {}", data);
        }
    }

    println!("\nGoodbye!");
    Ok(())
}
