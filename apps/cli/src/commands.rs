//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use healthnav_core::{Navigator, PipelineOutcome, ProgressReporter, Services, Stage};
use healthnav_server::AppState;
use healthnav_shared::{AppConfig, init_config, load_config};

use crate::client::{ChatClient, ChatReply};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// HealthNav: health query navigation backed by a language model.
#[derive(Parser)]
#[command(
    name = "healthnav",
    version,
    about = "Turn free-text health questions into triage info, advisories, weather and nearby hospitals.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API.
    Serve {
        /// Address to bind (overrides `[server] bind`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the navigation pipeline once and print the answer.
    Ask {
        /// Free-text health query, e.g. "fever and headache in Lagos".
        query: String,

        /// Print the full final state and stage timings as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Chat with a running server from the terminal.
    Chat {
        /// Base URL of the HealthNav server.
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,

        /// Conversation identifier sent with every message.
        #[arg(long, default_value = "demo")]
        user_id: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "healthnav=info,tower_http=info",
        1 => "healthnav=debug,tower_http=debug",
        _ => "healthnav=trace,tower_http=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { bind } => cmd_serve(bind).await,
        Command::Ask { query, json } => cmd_ask(&query, json).await,
        Command::Chat { server, user_id } => cmd_chat(&server, &user_id).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(bind: Option<String>) -> Result<()> {
    let mut config: AppConfig = load_config()?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let state = AppState::from_config(&config)?;
    info!(
        bind = %config.server.bind,
        model = %config.llm.model,
        planner = ?config.pipeline.planner,
        "starting server"
    );
    healthnav_server::serve(&config.server.bind, state).await?;
    Ok(())
}

async fn cmd_ask(query: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    let services = Services::from_config(&config)?;
    let navigator = Navigator::new(services, &config);

    let reporter = CliProgress::new();
    let result = navigator.run(query, &reporter).await;
    reporter.finish();
    let outcome = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    println!("{}", outcome.response);
    println!();
    let actions: Vec<&str> = outcome.state.actions().iter().map(|a| a.as_str()).collect();
    println!(
        "  Location: {}   Actions: {}   Time: {:.1}s",
        outcome.state.location(),
        if actions.is_empty() { "none".to_string() } else { actions.join(", ") },
        outcome.elapsed.as_secs_f64()
    );
    println!();

    Ok(())
}

async fn cmd_chat(server: &str, user_id: &str) -> Result<()> {
    let client = ChatClient::new(server)?;
    println!("Chatting with {server} as '{user_id}'. Type 'exit' or press Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().wrap_err("failed to flush stdout")?;

        let Some(line) = lines.next_line().await.wrap_err("failed to read stdin")? else {
            println!();
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        let spinner = spinner("Thinking");
        let reply = client.send(user_id, message).await;
        spinner.finish_and_clear();

        match reply? {
            ChatReply::Response(text) => println!("{text}\n"),
            ChatReply::Error(error) => eprintln!("error: {error}\n"),
        }
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Pipeline progress shown as a single spinner line.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: spinner("Starting"),
        }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(stage.label());
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        tracing::debug!(%stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
    }

    fn done(&self, _outcome: &PipelineOutcome) {
        self.spinner.finish_and_clear();
    }
}
