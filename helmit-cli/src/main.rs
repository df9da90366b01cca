//! Helmit CLI - terminal dashboard for the message-safety backend

#![deny(warnings)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use helmit_core::classify::render_analysis;
use helmit_core::config::{self, ResolvedConfig, BASE_URL_ENV};
use helmit_core::report::{render_forecast_text, render_json, render_message, render_stats_text};
use helmit_core::session::{Action, Session, SessionError};
use helmit_core::{build_forecast_view, compute_stats_series, RiskClient};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "helmit")]
#[command(about = "Message-safety monitoring from the terminal")]
#[command(version = env!("HELMIT_VERSION"))]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BackendArgs {
    /// Path to config file (default: auto-discover)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file and HELMIT_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds (overrides config file)
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat; every message is screened and classified
    Chat,
    /// Classify a single message
    Classify {
        /// Message text
        text: String,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show aggregate statistics
    Stats {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the risk forecast
    Forecast {
        /// Number of days to forecast (overrides config file)
        #[arg(long)]
        days: Option<u32>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Scan text for sensitive personal information
    Privacy {
        /// Text to scan
        text: String,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without contacting the backend
    Validate,
    /// Show the resolved configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let Cli { backend, command } = Cli::parse();
    let project_root = std::env::current_dir()?;

    match command {
        Commands::Config { action } => {
            handle_config(&action, &project_root, backend.config.as_deref())
        }
        Commands::Chat => run_chat(&connect(&backend, &project_root)?).await,
        Commands::Classify { text, format } => {
            let session = connect(&backend, &project_root)?;
            let summary = with_spinner("Classifying...", session.client().classify(&text))
                .await
                .context("Prediction failed. Please try again.")?;
            match format {
                OutputFormat::Text => {
                    println!("{}", render_analysis(&summary, &session.settings().labels))
                }
                OutputFormat::Json => println!("{}", render_json(&summary)),
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let session = connect(&backend, &project_root)?;
            let stats = with_spinner("Loading statistics...", session.refresh_stats())
                .await
                .context("Failed to load statistics. Please try again.")?;
            let series = compute_stats_series(&stats, &session.settings().thresholds);
            match format {
                OutputFormat::Text => print!("{}", render_stats_text(&series)),
                OutputFormat::Json => println!("{}", render_json(&series)),
            }
            Ok(())
        }
        Commands::Forecast { days, format } => {
            let session = connect(&backend, &project_root)?;
            let days = days.unwrap_or(session.settings().forecast_days);
            let forecast = with_spinner("Loading forecast...", session.client().forecast(days))
                .await
                .context("Failed to load forecast. Please try again.")?;
            let today = chrono::Local::now().date_naive();
            let view = build_forecast_view(&forecast, today, &session.settings().thresholds);
            match format {
                OutputFormat::Text => print!("{}", render_forecast_text(&view)),
                OutputFormat::Json => println!("{}", render_json(&view)),
            }
            Ok(())
        }
        Commands::Privacy { text } => {
            let session = connect(&backend, &project_root)?;
            let finding = session
                .client()
                .check_privacy(&text)
                .await
                .context("privacy check failed")?;
            if finding.flagged {
                println!("Sensitive information detected: {}", finding.kind_or_default());
            } else {
                println!("No sensitive information detected.");
            }
            Ok(())
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `warn` level
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();
}

/// Config file, then environment, then CLI flags
fn resolve_config(backend: &BackendArgs, project_root: &Path) -> anyhow::Result<ResolvedConfig> {
    let mut resolved = config::load_and_resolve(project_root, backend.config.as_deref())
        .context("failed to load configuration")?
        .with_base_url(std::env::var(BASE_URL_ENV).ok())?
        .with_base_url(backend.base_url.clone())?;

    if let Some(secs) = backend.timeout {
        if secs == 0 {
            anyhow::bail!("--timeout must be positive");
        }
        resolved.timeout = Duration::from_secs(secs);
    }

    Ok(resolved)
}

/// Resolve configuration and open a session against the backend
fn connect(backend: &BackendArgs, project_root: &Path) -> anyhow::Result<Session> {
    let resolved = resolve_config(backend, project_root)?;
    if let Some(ref path) = resolved.config_path {
        tracing::info!("using config: {}", path.display());
    }

    let client = RiskClient::new(resolved.client_options()).context("failed to create client")?;
    Ok(Session::new(client, resolved.session_settings()))
}

fn handle_config(
    action: &ConfigAction,
    project_root: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Validate => match config::load_and_resolve(project_root, config_path) {
            Ok(config) => {
                if let Some(ref p) = config.config_path {
                    println!("Config valid: {}", p.display());
                } else {
                    println!("No config file found. Using defaults.");
                }
                Ok(())
            }
            Err(e) => {
                eprintln!("Config validation failed: {:#}", e);
                std::process::exit(1);
            }
        },
        ConfigAction::Show => {
            let resolved = config::load_and_resolve(project_root, config_path)
                .context("failed to load configuration")?;

            println!("Configuration:");
            if let Some(ref p) = resolved.config_path {
                println!("  Source: {}", p.display());
            } else {
                println!("  Source: defaults (no config file found)");
            }
            println!();
            println!("Backend:");
            println!("  base_url: {}", resolved.base_url);
            println!("  layout: {}", resolved.layout.as_str());
            println!("  timeout: {}s", resolved.timeout.as_secs());
            println!();
            println!("Thresholds:");
            println!("  medium: {}", resolved.thresholds.medium);
            println!("  high: {}", resolved.thresholds.high);
            println!();
            println!("Labels:");
            println!("  threshold: {}", resolved.label_threshold);
            println!("  top: {}", resolved.top_labels);
            println!();
            println!("Forecast:");
            println!("  days: {}", resolved.forecast_days);
            Ok(())
        }
    }
}

/// Show a spinner on stderr while `fut` runs
async fn with_spinner<F: Future>(message: &'static str, fut: F) -> F::Output {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let output = fut.await;
    spinner.finish_and_clear();
    output
}

const CHAT_HELP: &str = "Commands: /stats, /forecast, /history, /help, /quit";

/// Read lines from stdin until EOF or /quit
async fn run_chat(session: &Session) -> anyhow::Result<()> {
    println!("Connected to {}. {}", session.client().base_url(), CHAT_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", CHAT_HELP),
            "/history" => {
                for message in session.messages() {
                    print!("{}", render_message(&message));
                }
            }
            "/stats" => match with_spinner("Loading statistics...", session.refresh_stats()).await {
                Ok(_) => {
                    if let Some(series) = session.stats_series() {
                        print!("{}", render_stats_text(&series));
                    }
                }
                Err(e) => report_panel_error("statistics", &e),
            },
            "/forecast" => {
                match with_spinner("Loading forecast...", session.refresh_forecast()).await {
                    Ok(_) => {
                        let today = chrono::Local::now().date_naive();
                        if let Some(view) = session.forecast_view(today) {
                            print!("{}", render_forecast_text(&view));
                        }
                    }
                    Err(e) => report_panel_error("forecast", &e),
                }
            }
            text => {
                if !screen_draft(session, text, &mut lines).await? {
                    continue;
                }
                match with_spinner("Analyzing...", session.send_message(text)).await {
                    Ok(reply) => print!("{}", render_message(&reply)),
                    Err(SessionError::Busy(Action::Send)) => {
                        println!("Still waiting for the previous message.")
                    }
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    Ok(())
}

/// Privacy-screen a draft; returns whether it may be sent
async fn screen_draft<R>(
    session: &Session,
    text: &str,
    lines: &mut tokio::io::Lines<R>,
) -> anyhow::Result<bool>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let finding = match session.check_draft(text).await {
        Ok(finding) => finding,
        Err(e) => {
            tracing::warn!("privacy check unavailable: {}", e);
            return Ok(true);
        }
    };

    let Some(finding) = finding else {
        return Ok(true);
    };

    println!("Sensitive information detected");
    println!("You are about to share {}.", finding.kind_or_default());
    println!("Send anyway? [y/N]");

    let answer = lines.next_line().await?.unwrap_or_default();
    if answer.trim().eq_ignore_ascii_case("y") {
        session.confirm_privacy_alert();
        Ok(true)
    } else {
        session.dismiss_privacy_alert();
        println!("Message not sent.");
        Ok(false)
    }
}

fn report_panel_error(panel: &str, err: &SessionError) {
    tracing::warn!("{} fetch failed: {}", panel, err);
    match err {
        SessionError::Busy(_) => println!("{}", err),
        _ => println!("Failed to load {}. Please try again.", panel),
    }
}
