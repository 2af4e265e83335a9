//! CLI entrypoint and subcommand orchestration.

mod config;
mod prompt;
#[cfg(test)]
mod test_support;
mod tui;

use clap::{Parser, Subcommand};
use proto::{SessionId, TurnStatus};

#[cfg(not(test))]
use std::sync::Arc;

#[cfg(not(test))]
use agent::{
    AgentRuntime, ConfirmationPolicy, ConfirmationRelay, OpenAiProvider, SqliteMemory,
    ToolRegistry,
};
#[cfg(not(test))]
use config::Config;
#[cfg(not(test))]
use proto::{AutoConfirmHandler, ChannelId};
#[cfg(not(test))]
use tools::{EmailSendTool, FileDeleteTool, FileReadTool, Workspace};
#[cfg(not(test))]
use tracing::{info, warn};
#[cfg(not(test))]
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments for the toolgate application.
#[derive(Parser)]
#[command(name = "toolgate")]
#[command(about = "Tool-calling assistant that asks before it acts", version = "0.1.0")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug logging to ~/.toolgate/logs/debug.log
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Resume an existing session by its ID (shortcut for `tui -s <id>`)
    #[arg(short = 's', long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// CLI subcommands available in the application.
#[derive(Subcommand)]
enum Commands {
    /// Start the full-screen TUI (default when no subcommand is given)
    Tui {
        /// Resume an existing session by its ID
        #[arg(short = 's', long)]
        session: Option<String>,
    },

    /// Run a single message and exit
    Run {
        /// Message to send to the agent
        #[arg(short = 'e', long)]
        exec: String,

        /// Approve every confirmation without asking
        #[arg(short = 'y', long, default_value_t = false)]
        yes: bool,
    },
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Tui { .. } => "tui",
            Commands::Run { .. } => "run",
        }
    }
}

#[cfg(not(test))]
#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Tui {
        session: cli.session.clone(),
    });
    let is_tui = matches!(command, Commands::Tui { .. });

    // Console output is suppressed in TUI mode so it cannot corrupt the screen.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Must outlive main() so buffered file writes are flushed on exit.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>;

    let debug_writer = if cli.debug {
        let log_dir = Config::log_dir();
        std::fs::create_dir_all(&log_dir).ok();
        let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        _file_guard = Some(guard);
        Some(writer)
    } else {
        _file_guard = None;
        None
    };

    match (is_tui, debug_writer) {
        (true, Some(writer)) => {
            let console = fmt::layer()
                .with_writer(std::io::sink)
                .with_target(false)
                .with_filter(console_filter);
            let file = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(DEBUG_FILE_FILTER));
            tracing_subscriber::registry()
                .with(console)
                .with(file)
                .init();
        }
        (true, None) => {
            fmt()
                .with_env_filter(console_filter)
                .with_writer(std::io::sink)
                .with_target(false)
                .init();
        }
        (false, Some(writer)) => {
            let console = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter);
            let file = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(DEBUG_FILE_FILTER));
            tracing_subscriber::registry()
                .with(console)
                .with(file)
                .init();
        }
        (false, None) => {
            fmt()
                .with_env_filter(console_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
    }

    if cli.debug {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            command = command.label(),
            log_level = %cli.log_level,
            "========== toolgate session start =========="
        );
    }

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Failed to load config ({e}), using defaults");
        Config::default()
    });

    match command {
        Commands::Tui { session } => cmd_tui(config, session.or(cli.session)).await,
        Commands::Run { exec, yes } => cmd_run(config, exec, yes).await,
    }
}

#[cfg(not(test))]
const DEBUG_FILE_FILTER: &str = "debug,hyper_util=info,reqwest=info,sqlx=info";

#[cfg(not(test))]
/// Starts the full-screen TUI for interactive agent sessions.
async fn cmd_tui(config: Config, session: Option<String>) -> anyhow::Result<()> {
    // The TUI installs its own handler while it is mounted.
    let relay = Arc::new(ConfirmationRelay::new());
    let runtime = build_runtime(&config, relay).await?;
    let channel_id = ChannelId::new("cli", "tui");
    let session_id = session.map(SessionId::from).unwrap_or_default();

    let last_session = tui::run_tui(Arc::clone(&runtime), channel_id, session_id).await?;

    print_goodbye_banner(&last_session, runtime.model());
    Ok(())
}

#[cfg(not(test))]
/// Executes one message against the agent and exits.
async fn cmd_run(config: Config, exec: String, yes: bool) -> anyhow::Result<()> {
    let relay = if yes {
        Arc::new(ConfirmationRelay::with_handler(Arc::new(AutoConfirmHandler)))
    } else {
        Arc::new(ConfirmationRelay::with_handler(Arc::new(
            prompt::StdinConfirmationHandler,
        )))
    };
    let runtime = build_runtime(&config, relay).await?;

    let channel_id = ChannelId::new("cli", "run");
    let session_id = SessionId::new();

    println!("{}", format_run_header(&exec));

    match runtime.process(&channel_id, &session_id, &exec).await {
        Ok(outcome) => {
            println!("{}", outcome.text);
            if let Some(code) = run_exit_code(outcome.status) {
                std::process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(not(test))]
/// Creates a runtime with the built-in tools, memory, LLM provider, and policy.
async fn build_runtime(
    config: &Config,
    relay: Arc<ConfirmationRelay>,
) -> anyhow::Result<Arc<AgentRuntime>> {
    std::fs::create_dir_all(&config.tools.workspace)?;
    std::fs::create_dir_all(&config.tools.outbox)?;

    let workspace = Workspace::new(&config.tools.workspace);
    let mut registry = ToolRegistry::new();
    registry.register(FileReadTool::new(workspace.clone()));
    registry.register(FileDeleteTool::new(workspace));
    registry.register(EmailSendTool::new(
        &config.tools.outbox,
        &config.tools.from_address,
    ));
    let registry = Arc::new(registry);

    let memory = SqliteMemory::open(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("DB error: {e}"))?;
    let memory = Arc::new(memory);

    let mut api_key = config.resolve_api_key();
    if api_key.is_empty() {
        if config.agent.provider.needs_api_key() {
            warn!("No API key configured. Set TOOLGATE_API_KEY or OPENAI_API_KEY.");
        } else {
            api_key = config.agent.provider.name().to_string();
        }
    }
    let llm: Arc<dyn agent::LlmProvider> = match config.agent.effective_base_url() {
        Some(base_url) => Arc::new(OpenAiProvider::with_base_url(api_key, base_url)),
        None => Arc::new(OpenAiProvider::new(api_key)),
    };

    let policy = ConfirmationPolicy::new(config.confirmation.mode)
        .with_extra_sensitive(config.confirmation.extra_sensitive.iter().cloned())
        .with_trusted(config.confirmation.trusted.iter().cloned());

    info!(
        provider = %config.agent.provider.name(),
        model = %config.agent.effective_model(),
        tools = ?registry.tool_names(),
        "Runtime ready"
    );

    Ok(Arc::new(AgentRuntime::new(
        llm,
        registry,
        memory,
        policy,
        relay,
        config.agent.effective_model(),
        config.agent.max_tool_rounds,
    )))
}

/// Prints the farewell banner with session resume instructions.
fn print_goodbye_banner(session_id: &SessionId, model: &str) {
    let session_str = session_id.as_str();

    println!();
    println!("  \x1b[1;33m _              _             _       \x1b[0m");
    println!("  \x1b[1;33m| |_ ___   ___ | | __ _  __ _| |_ ___ \x1b[0m");
    println!("  \x1b[1;33m| __/ _ \\ / _ \\| |/ _` |/ _` | __/ _ \\\x1b[0m");
    println!("  \x1b[1;33m| || (_) | (_) | | (_| | (_| | ||  __/\x1b[0m");
    println!("  \x1b[1;33m \\__\\___/ \\___/|_|\\__, |\\__,_|\\__\\___|\x1b[0m");
    println!("  \x1b[1;33m                  |___/               \x1b[0m");
    println!();
    println!("  \x1b[1;37mSession\x1b[0m   \x1b[33m{session_str}\x1b[0m");
    println!("  \x1b[1;37mModel\x1b[0m     \x1b[33m{model}\x1b[0m");
    println!();
    println!("  \x1b[1;37mContinue\x1b[0m  \x1b[1;33mtoolgate -s {session_str}\x1b[0m");
    println!();
}

/// Formats run mode header text.
fn format_run_header(exec: &str) -> String {
    format!("Running: {exec}")
}

/// Process exit code for a finished `run` turn, if it should not be 0.
fn run_exit_code(status: TurnStatus) -> Option<i32> {
    match status {
        TurnStatus::Completed => None,
        TurnStatus::Cancelled => Some(2),
        TurnStatus::ConfirmationFailed => Some(1),
    }
}
