//! Hush - profanity filter with dictionary and classifier detection.
//!
//! One-shot commands filter text given on the command line or stdin;
//! `serve` runs the HTTP API; `download-model` fetches the ML dependencies.

mod config;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use hush_core::model_downloader::{DownloadProgress, ProgressCallback};
use hush_core::{ClassifierStatus, FusionEngine, ModelDownloader};
use hush_server::{AppState, Server};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, Overrides};

/// Hush - mask profanity in text
#[derive(Parser, Debug)]
#[command(name = "hush", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config dir>/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Classifier threshold, overriding the config file
    #[arg(long, global = true)]
    threshold: Option<f32>,

    /// Disable the classifier (dictionary only)
    #[arg(long, global = true)]
    no_ml: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mask profanity and print the filtered text
    Filter {
        /// Text to filter (read from stdin when omitted)
        text: Option<String>,

        /// Also run the classifier
        #[arg(long)]
        enhanced: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where lexicon terms occur without masking
    Highlight {
        /// Text to scan (read from stdin when omitted)
        text: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },

    /// Download the toxicity model and ONNX Runtime
    DownloadModel,
}

impl Args {
    fn overrides(&self) -> Overrides {
        let (host, port) = match &self.command {
            Command::Serve { host, port } => (host.clone(), *port),
            _ => (None, None),
        };

        Overrides {
            threshold: self.threshold,
            no_ml: self.no_ml,
            host,
            port,
        }
    }

    fn is_server(&self) -> bool {
        matches!(self.command, Command::Serve { .. })
    }
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "hush", "Hush").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging.
///
/// The server logs to a rotating file plus stdout. One-shot commands log to
/// stderr only, keeping stdout for the result.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_level = if args.is_server() && args.log_level == "warn" {
        "info"
    } else {
        args.log_level.as_str()
    };
    let log_level = if args.debug { "debug" } else { default_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hush={},warn", log_level)));

    if !args.is_server() {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("hush")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

/// Returns `text`, or all of stdin when absent.
fn input_text(text: Option<String>) -> anyhow::Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            if buf.ends_with('\n') {
                buf.pop();
                if buf.ends_with('\r') {
                    buf.pop();
                }
            }
            Ok(buf)
        }
    }
}

async fn run_filter(
    engine: &FusionEngine,
    text: String,
    enhanced: bool,
    json: bool,
) -> anyhow::Result<()> {
    let result = if enhanced {
        if engine.classifier().is_none() {
            tracing::warn!("Classifier disabled, --enhanced uses the dictionary only");
        }
        let result = engine.enhanced_filter(&text).await;
        if engine.classifier_status() == Some(ClassifierStatus::Unavailable) {
            tracing::warn!("Classifier unavailable; run `hush download-model` to enable it");
        }
        result
    } else {
        engine.filter(&text)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.filtered_text);
    }
    Ok(())
}

fn run_highlight(engine: &FusionEngine, text: String, json: bool) -> anyhow::Result<()> {
    let result = engine.highlight(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for span in &result.spans {
            println!("{}\t{}\t{}", span.start, span.len, span.term);
        }
    }
    Ok(())
}

async fn run_download() -> anyhow::Result<()> {
    let downloader =
        ModelDownloader::new().context("could not determine the data directory")?;

    let progress: ProgressCallback = Arc::new(|p: DownloadProgress| {
        if p.complete {
            eprintln!("{}", p.step);
        } else if let Some(pct) = p.percentage() {
            eprintln!("{} {}%", p.step, pct);
        } else {
            eprintln!("{}", p.step);
        }
    });

    downloader.ensure_all(Some(progress)).await?;

    let status = downloader.status();
    println!("{}", status.description());
    if !status.is_ready() {
        anyhow::bail!("ML dependencies incomplete: {:?}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    tracing::debug!("Args: {:?}", args);
    if args.config.is_none() {
        tracing::debug!("Default config path: {:?}", config::default_config_path());
    }

    let config = AppConfig::resolve(args.config.as_deref())
        .context("failed to load configuration")?
        .apply(&args.overrides())
        .context("invalid configuration")?;

    match args.command {
        Command::DownloadModel => run_download().await,
        Command::Filter {
            text,
            enhanced,
            json,
        } => {
            let engine = FusionEngine::from_config(&config.filter)?;
            run_filter(&engine, input_text(text)?, enhanced, json).await
        }
        Command::Highlight { text, json } => {
            let engine = FusionEngine::from_config(&config.filter)?;
            run_highlight(&engine, input_text(text)?, json)
        }
        Command::Serve { .. } => {
            let state = AppState::from_config(&config.filter, &config.server)?;
            tracing::info!(
                lexicon = state.engine.matcher().lexicon().len(),
                classifier = ?state.engine.classifier_status(),
                "Filter engine ready"
            );
            Server::with_state(config.server, state)?.run().await?;
            Ok(())
        }
    }
}
