//! CLI definition and command dispatch for laodong.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (`--config`, `--corpus`, `--verbose`)
//! 2. Environment variables (`LAODONG_CONFIG`, `LAODONG_CORPUS`, `LAODONG_VERBOSE`)
//! 3. Config file (`~/.laodong/config.yaml` or the path from `--config`)
//! 4. Built-in defaults

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use laodong_core::{ConversationEngine, LaodongConfig, LaodongError, TurnError, TurnEvent, TurnOutcome};

use crate::ui::color::terminal_width;
use crate::ui::{format, table, ColorMode, MessageType, Progress, ProgressMode, Style};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Spinner text while a turn waits for its first token.
const THINKING: &str = "Đang tra cứu...";

/// Vietnamese labor-law assistant
#[derive(Parser, Debug)]
#[command(name = "laodong")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "LAODONG_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.laodong/config.yaml)
    #[arg(long, global = true, env = "LAODONG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Chunk corpus (JSONL), overrides corpus.path
    #[arg(long, global = true, env = "LAODONG_CORPUS")]
    pub corpus: Option<PathBuf>,

    /// Color output mode: always, never, or auto (default: auto)
    #[arg(long, global = true, env = "LAODONG_COLOR", default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive conversation
    #[command(after_help = r#"EXAMPLES:
    # New conversation
    laodong chat --corpus data/chunks.jsonl

    # Named session (keeps history while the process runs)
    laodong chat --session hr-desk

REPL COMMANDS:
    /reset     Clear the conversation history
    /history   Show the remembered turns
    /help      Show these commands
    /exit      Quit (Ctrl-D also works)

Ctrl-C while an answer is streaming cancels that answer.
"#)]
    Chat {
        /// Session id (default: a fresh random id)
        #[arg(long)]
        session: Option<String>,
    },

    /// Ask a single question and print the answer with citations
    #[command(after_help = r#"EXAMPLES:
    # Ask a question
    laodong ask "Điều 139 quy định gì về thai sản?"

    # Output as JSON for scripting
    laodong ask "Trợ cấp thôi việc tính thế nào?" --json | jq '.citations'
"#)]
    Ask {
        /// The question
        question: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check that every capability backend is reachable
    #[command(after_help = r#"EXAMPLES:
    # Table of backends
    laodong health

    # JSON report; exit code is non-zero when any backend is down
    laodong health --json
"#)]
    Health {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate or print the configuration
    #[command(after_help = r#"EXAMPLES:
    # Validate the configuration
    laodong config check

    # Show the effective configuration as YAML
    laodong config show
"#)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and report warnings
    Check {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration (file, defaults and overrides merged)
    Show {
        /// Output as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Run function
// ============================================================================

/// Run the CLI application.
///
/// Returns `ExitCode::SUCCESS` on success, or `ExitCode::FAILURE` on error.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let color_mode = cli.color.parse().unwrap_or(ColorMode::Auto);
    let style = Style::new(color_mode);

    let Cli {
        verbose,
        config,
        corpus,
        command,
        ..
    } = cli;

    let result = match command {
        Command::Config { action } => handle_config(&style, config.as_deref(), corpus, action),
        command => run_async(&style, config.as_deref(), corpus, command, verbose),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&style, &e);
            ExitCode::FAILURE
        }
    }
}

/// Default `warn` for the workspace crates, `debug` with `--verbose`.
/// `RUST_LOG` overrides both.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let default_filter = format!(
        "laodong_core={0},laodong_cli={0},laodong_db={0},laodong_model={0}",
        level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(style: &Style, err: &anyhow::Error) {
    let hint = err
        .chain()
        .find_map(|e| e.downcast_ref::<LaodongError>())
        .and_then(LaodongError::hint);

    let causes: Vec<String> = err
        .chain()
        .skip(1)
        .map(|e| match e.downcast_ref::<LaodongError>() {
            // The hint is printed on its own line.
            Some(LaodongError::InvalidConfiguration { message, .. }) => message.clone(),
            _ => e.to_string(),
        })
        .collect();
    let cause = (!causes.is_empty()).then(|| causes.join(": "));

    eprintln!(
        "{}",
        style.error_with_context(&err.to_string(), cause.as_deref(), hint)
    );
}

/// Load the config file and apply `--corpus`.
fn load_config(path: Option<&Path>, corpus: Option<PathBuf>) -> Result<LaodongConfig, LaodongError> {
    let mut config = match path {
        Some(path) => LaodongConfig::from_path(path)?,
        None => LaodongConfig::load_default()?,
    };
    if let Some(corpus) = corpus {
        config.corpus.path = Some(corpus);
    }
    Ok(config)
}

fn config_source(path: Option<&Path>) -> Option<PathBuf> {
    path.map(Path::to_path_buf)
        .or_else(LaodongConfig::default_path)
}

fn run_async(
    style: &Style,
    config_path: Option<&Path>,
    corpus: Option<PathBuf>,
    command: Command,
    verbose: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path, corpus).context("Failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = runtime.block_on(async {
        let engine = ConversationEngine::from_config(config)
            .context("Failed to initialize the assistant")?;

        match command {
            Command::Chat { session } => handle_chat(style, &engine, session, verbose).await,
            Command::Ask { question, json } => handle_ask(style, &engine, &question, json, verbose).await,
            Command::Health { json } => handle_health(style, &engine, json).await,
            Command::Config { .. } => Err(anyhow!("config commands do not need the engine")),
        }
    });

    // The REPL may leave a blocking stdin read behind.
    runtime.shutdown_background();
    result
}

// ============================================================================
// Streaming
// ============================================================================

enum Streamed {
    Finished(TurnOutcome),
    Cancelled,
}

/// Submit a turn and print tokens as they arrive. Ctrl-C drops the stream,
/// which cancels the turn.
async fn stream_answer(engine: &ConversationEngine, session_id: &str, text: &str) -> Streamed {
    let mut stream = engine.submit_turn(session_id, text);
    let progress = Progress::spinner(THINKING, ProgressMode::detect(false));
    let mut outcome = TurnOutcome::default();
    let mut stdout = std::io::stdout();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => {
                progress.finish_clear();
                println!();
                return Streamed::Cancelled;
            }
            event = stream.next() => event,
        };
        let Some(event) = event else {
            break;
        };
        progress.finish_clear();

        match event {
            TurnEvent::Token { text } => {
                print!("{}", text);
                let _ = stdout.flush();
                outcome.answer.push_str(&text);
            }
            TurnEvent::Citations {
                category,
                grounded,
                citations,
            } => {
                outcome.category = Some(category);
                outcome.grounded = grounded;
                outcome.citations = citations;
            }
            TurnEvent::Error { error } => outcome.error = Some(error),
        }
    }

    if !outcome.answer.is_empty() {
        println!();
    }
    Streamed::Finished(outcome)
}

/// Citations table and, with `--verbose`, the routing result.
fn print_footer(style: &Style, outcome: &TurnOutcome, verbose: bool) {
    if !outcome.citations.is_empty() {
        println!();
        println!("{}", style.section("CĂN CỨ PHÁP LÝ"));
        println!(
            "{}",
            table::render_citations_table(&outcome.citations, terminal_width())
        );
    }

    if verbose {
        if let Some(category) = outcome.category {
            println!();
            println!(
                "{}",
                style.message(
                    MessageType::Info,
                    &format!(
                        "{}, grounded: {}, citations: {}",
                        style.category(category),
                        outcome.grounded,
                        outcome.citations.len()
                    )
                )
            );
        }
    }
}

// ============================================================================
// Command handlers
// ============================================================================

async fn handle_ask(
    style: &Style,
    engine: &ConversationEngine,
    question: &str,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let session_id = format!("ask-{}", Uuid::new_v4());

    if json {
        let outcome = engine.submit_turn(&session_id, question).collect_outcome().await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        if let Some(error) = outcome.error {
            return Err(anyhow::Error::new(error).context("The question could not be answered"));
        }
        return Ok(());
    }

    match stream_answer(engine, &session_id, question).await {
        Streamed::Cancelled => bail!("Cancelled"),
        Streamed::Finished(outcome) => {
            if let Some(error) = outcome.error {
                return Err(anyhow::Error::new(error).context("The question could not be answered"));
            }
            print_footer(style, &outcome, verbose);
            Ok(())
        }
    }
}

/// Lines starting with `/` in the chat REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Reset,
    History,
    Help,
    Exit,
    Unknown(String),
}

impl ReplCommand {
    /// `None` for ordinary questions.
    fn parse(input: &str) -> Option<Self> {
        let command = input.strip_prefix('/')?;
        let name = command.split_whitespace().next().unwrap_or_default();
        Some(match name.to_lowercase().as_str() {
            "reset" => Self::Reset,
            "history" => Self::History,
            "help" | "?" => Self::Help,
            "exit" | "quit" => Self::Exit,
            _ => Self::Unknown(name.to_string()),
        })
    }
}

const REPL_HELP: &str = "/reset   xoá lịch sử hội thoại
/history xem các lượt đã ghi nhớ
/help    xem các lệnh
/exit    thoát";

/// Read one line from stdin on the blocking pool. `None` on EOF.
async fn read_line() -> anyhow::Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        let read = std::io::stdin().read_line(&mut buf)?;
        Ok::<_, std::io::Error>((read > 0).then_some(buf))
    })
    .await??;
    Ok(line)
}

async fn handle_chat(
    style: &Style,
    engine: &ConversationEngine,
    session: Option<String>,
    verbose: bool,
) -> anyhow::Result<()> {
    let session_id = session.unwrap_or_else(|| format!("cli-{}", Uuid::new_v4()));
    let _sweeper = engine.spawn_session_sweeper();

    println!(
        "{}",
        style.message(
            MessageType::Info,
            &format!("Phiên {}. Gõ /help để xem lệnh, /exit để thoát.", session_id)
        )
    );

    loop {
        print!("{}", style.prompt());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = read_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match ReplCommand::parse(input) {
            Some(ReplCommand::Exit) => break,
            Some(ReplCommand::Reset) => match engine.reset_session(&session_id) {
                Ok(()) => println!("{}", style.message(MessageType::Ok, "Đã xoá lịch sử hội thoại")),
                Err(e) => println!("{}", style.message(MessageType::Warn, &e.to_string())),
            },
            Some(ReplCommand::History) => {
                let turns = engine.session_history(&session_id).await.unwrap_or_default();
                if turns.is_empty() {
                    println!("{}", style.message(MessageType::Info, "Chưa có lượt hội thoại nào"));
                } else {
                    println!("{}", table::render_history_table(&turns, terminal_width()));
                }
            }
            Some(ReplCommand::Help) => println!("{}", REPL_HELP),
            Some(ReplCommand::Unknown(name)) => println!(
                "{}",
                style.message(
                    MessageType::Warn,
                    &format!("Lệnh không hợp lệ: /{}. Gõ /help để xem lệnh.", name)
                )
            ),
            None => match stream_answer(engine, &session_id, input).await {
                Streamed::Cancelled => {
                    println!("{}", style.message(MessageType::Warn, "Đã huỷ câu trả lời"));
                }
                Streamed::Finished(outcome) => match &outcome.error {
                    Some(error) => eprintln!(
                        "{}",
                        style.error_with_context(&error.to_string(), None, turn_error_hint(error))
                    ),
                    None => print_footer(style, &outcome, verbose),
                },
            },
        }
    }

    Ok(())
}

fn turn_error_hint(error: &TurnError) -> Option<&'static str> {
    match error {
        TurnError::GenerationTimeout { .. } => {
            Some("Increase timeouts.firstTokenMs or check the generation backend")
        }
        TurnError::Generation { .. } => Some("Run `laodong health` to check the backends"),
        TurnError::SessionBusy { .. } => Some("Wait for the current answer to finish"),
        TurnError::Internal { .. } => None,
    }
}

async fn handle_health(style: &Style, engine: &ConversationEngine, json: bool) -> anyhow::Result<()> {
    let report = engine.health_check().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", style.section("HEALTH"));
        println!();
        println!("{}", table::render_health_table(&report, terminal_width()));
        println!();
        println!(
            "  {}",
            style.key_value("Chunks", &format::format_thousands(report.chunks as u64))
        );
        println!();
        if report.is_healthy() {
            println!("{}", style.message(MessageType::Ok, "All capabilities reachable"));
        }
    }

    let down = report.capabilities.iter().filter(|c| !c.healthy).count();
    if down > 0 {
        bail!(
            "{} of {} capabilities unreachable",
            down,
            report.capabilities.len()
        );
    }
    Ok(())
}

fn handle_config(
    style: &Style,
    path: Option<&Path>,
    corpus: Option<PathBuf>,
    action: ConfigAction,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Check { json } => handle_config_check(style, path, corpus, json),
        ConfigAction::Show { json } => handle_config_show(path, corpus, json),
    }
}

/// Validate the configuration and report errors and warnings.
fn handle_config_check(
    style: &Style,
    path: Option<&Path>,
    corpus: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let source = config_source(path);
    let exists = source.as_deref().is_some_and(Path::exists);
    let checked = load_config(path, corpus).and_then(|config| config.validate());

    if json {
        let (warnings, error) = match &checked {
            Ok(warnings) => (warnings.clone(), None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        let report = serde_json::json!({
            "path": source,
            "exists": exists,
            "valid": checked.is_ok(),
            "warnings": warnings,
            "error": error,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let shown = source
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = if exists { "found" } else { "not found, using defaults" };
        println!(
            "{}",
            style.message(MessageType::Info, &format!("Config {} ({})", shown, state))
        );

        if let Ok(warnings) = &checked {
            if !warnings.is_empty() {
                println!(
                    "{}",
                    style.message(
                        MessageType::Warn,
                        &format!("{} warning(s):", warnings.len())
                    )
                );
                for warning in warnings {
                    println!("  • {}", warning);
                }
            }
            let summary = if warnings.is_empty() {
                "Configuration is valid"
            } else {
                "Configuration is valid with warnings"
            };
            println!("{}", style.message(MessageType::Ok, summary));
        }
    }

    checked
        .map(|_| ())
        .map_err(|e| anyhow::Error::new(e).context("Configuration has errors"))
}

/// Print the effective configuration.
fn handle_config_show(path: Option<&Path>, corpus: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = load_config(path, corpus).context("Failed to load configuration")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", config.to_yaml()?);
    }
    Ok(())
}
