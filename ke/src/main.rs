//! ke - KGSM event listener
//!
//! CLI entry point for listening to and publishing KGSM instance events.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use kgsm_events::cli::{Cli, Command, get_log_path};
use kgsm_events::config::Config;
use kgsm_events::events::{EventEnvelope, EventKind, EventPayload, deserialize_payload, known_tags};
use kgsm_events::service::EventService;
use kgsm_events::transport::EventPublisher;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can be traced
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Listen { socket } => cmd_listen(&config, socket).await,
        Command::Emit {
            event_type,
            data,
            socket,
        } => cmd_emit(&config, &event_type, &data, socket).await,
        Command::Tags => cmd_tags(),
    }
}

async fn cmd_listen(config: &Config, socket: Option<PathBuf>) -> Result<()> {
    let socket_path = socket.unwrap_or_else(|| config.socket_path.clone());
    debug!(?socket_path, "cmd_listen: called");

    if let Some(parent) = socket_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!("Failed to create socket directory {}", parent.display()))?;
    }

    let service = EventService::with_options(&socket_path, config.listener_options());
    for kind in EventKind::ALL.iter().copied() {
        service.register_kind_handler(kind, |payload| async move {
            println!("{}", format_event(&payload));
            Ok(())
        })?;
    }
    service.initialize().context("Failed to start event listener")?;

    println!(
        "{} {} {}",
        "Listening on".green(),
        socket_path.display(),
        "(Ctrl-C to stop)".dimmed()
    );

    wait_for_shutdown().await?;

    info!("Shutting down event listener");
    service.dispose().await;
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => {
                debug!("wait_for_shutdown: SIGINT received");
                warn!("SIGINT received");
            }
            _ = sigterm.recv() => {
                debug!("wait_for_shutdown: SIGTERM received");
                warn!("SIGTERM received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

/// One line per event: `<time> <tag> <instance> <details>`
fn format_event(payload: &EventPayload) -> String {
    let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let details = event_details(payload);
    let line = format!(
        "{} {} {}",
        time.to_string().dimmed(),
        payload.kind().tag().cyan(),
        payload.instance_name().bold()
    );
    if details.is_empty() {
        line
    } else {
        format!("{} {}", line, details)
    }
}

/// Variant-specific fields as `key=value` pairs
fn event_details(payload: &EventPayload) -> String {
    let Ok(serde_json::Value::Object(fields)) = payload.to_value() else {
        return String::new();
    };
    fields
        .iter()
        .filter(|(key, _)| key.as_str() != "instance_name")
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("{}={}", key, s),
            other => format!("{}={}", key, other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn cmd_emit(config: &Config, event_type: &str, data: &str, socket: Option<PathBuf>) -> Result<()> {
    let socket_path = socket.unwrap_or_else(|| config.socket_path.clone());
    debug!(?socket_path, %event_type, "cmd_emit: called");

    let data: serde_json::Value = serde_json::from_str(data).context("DATA_JSON is not valid JSON")?;

    match EventKind::from_tag(event_type) {
        Some(kind) => {
            if let Err(e) = deserialize_payload(kind, data.clone()) {
                warn!(error = %e, "cmd_emit: data does not match the payload schema");
                eprintln!("{} {}", "Warning:".yellow(), e);
            }
        }
        None => {
            warn!(%event_type, "cmd_emit: unknown event type");
            eprintln!("{} unknown event type '{}', sending anyway", "Warning:".yellow(), event_type);
        }
    }

    let envelope = EventEnvelope {
        event_type: event_type.to_string(),
        data,
    };
    EventPublisher::new(&socket_path)
        .with_timeout(config.publish_timeout())
        .publish_envelope(&envelope)
        .await
        .context(format!("Failed to publish to {}", socket_path.display()))?;

    println!("{} {}", "Sent".green(), event_type);
    Ok(())
}

fn cmd_tags() -> Result<()> {
    for tag in known_tags() {
        println!("{}", tag);
    }
    Ok(())
}
