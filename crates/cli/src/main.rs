//! Stepwise CLI entry point.
//!
//! Reads one query, lets the model reason about it in titled steps, and
//! prints each step as it arrives followed by the final answer and the
//! total thinking time.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use stepwise_agent::{ReasoningConfig, ReasoningLoop};
use stepwise_config::{AppConfig, DEFAULT_VERIFICATION_PROMPT};
use stepwise_providers::OpenAiCompatProvider;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

mod render;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Step-by-step reasoning chains on any OpenAI-compatible endpoint",
    version
)]
struct Cli {
    /// Ask this question instead of reading one line from stdin
    query: Option<String>,

    /// Override the step ceiling (same as the MAX_STEPS environment variable)
    #[arg(long)]
    max_steps: Option<u32>,

    /// Run a verification step before the final answer (same as VERIFY=true)
    #[arg(long)]
    verify: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Panels go to stdout; keep logs quiet unless asked.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(max_steps) = cli.max_steps {
        config.max_steps = max_steps;
    }
    if cli.verify && config.prompts.verification.is_none() {
        config.prompts.verification = Some(DEFAULT_VERIFICATION_PROMPT.to_string());
    }
    config.validate()?;

    if config.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    API_KEY=gsk_...          (generic)");
        eprintln!("    GROQ_API_KEY=gsk_...     (Groq)");
        eprintln!("    OPENAI_API_KEY=sk-...    (OpenAI)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config)?);
    debug!(
        provider = %config.provider,
        base_url = %provider.base_url(),
        model = %config.model,
        "Configuration loaded"
    );
    let reasoning = ReasoningConfig::from_app_config(&config);

    print!(
        "{}",
        render::banner(
            &config.provider,
            &config.model,
            reasoning.max_steps,
            reasoning.verification_prompt.is_some(),
        )
    );

    let query = match cli.query {
        Some(query) => query.trim().to_string(),
        None => prompt_query().await?,
    };
    if query.is_empty() {
        return Err("No query entered.".into());
    }

    println!();
    println!("  Thinking about: {query}");
    println!();

    let agent = Arc::new(ReasoningLoop::new(provider, reasoning));
    let (tx, mut rx) = mpsc::channel(32);
    let task = tokio::spawn({
        let agent = agent.clone();
        let query = query.clone();
        async move { agent.run_with_events(&query, tx).await }
    });

    while let Some(event) = rx.recv().await {
        debug!(event = event.event_type(), "Session event");
        if let Some(text) = render::render_event(&event) {
            print!("{text}");
            std::io::stdout().flush()?;
        }
    }

    let session = task.await??;
    debug!(
        session_id = %session.id,
        steps = session.steps.len(),
        termination = ?session.termination,
        "Session complete"
    );
    if !session.terminated_naturally() && session.step_failure.is_none() {
        print!("{}", render::ceiling_notice(session.steps.len()));
    }

    Ok(())
}

/// Prompt once on stdin for the query.
async fn prompt_query() -> Result<String, Box<dyn std::error::Error>> {
    print!("  Enter your query: ");
    std::io::stdout().flush()?;

    let mut lines = BufReader::new(io::stdin()).lines();
    let line = lines.next_line().await?.unwrap_or_default();
    Ok(line.trim().to_string())
}
