//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ke - KGSM instance event listener
#[derive(Debug, Parser)]
#[command(
    name = "ke",
    about = "Listen for and publish KGSM instance lifecycle events",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bind the event socket and print every event received
    Listen {
        /// Socket path (overrides config)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Publish one event to a listening socket
    Emit {
        /// Event type tag, e.g. instance_started
        #[arg(value_name = "EVENT_TYPE")]
        event_type: String,

        /// Event data as a JSON object
        #[arg(value_name = "DATA_JSON", default_value = "{}")]
        data: String,

        /// Socket path (overrides config)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// List known event type tags
    Tags,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kgsm-events")
        .join("logs")
        .join("ke.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_emit() {
        let cli = Cli::try_parse_from([
            "ke",
            "--log-level",
            "debug",
            "emit",
            "instance_started",
            r#"{"instance_name":"factorio-1"}"#,
            "--socket",
            "/tmp/k.sock",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Emit {
                event_type,
                data,
                socket,
            } => {
                assert_eq!(event_type, "instance_started");
                assert!(data.contains("factorio-1"));
                assert_eq!(socket, Some(PathBuf::from("/tmp/k.sock")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_emit_data_defaults_to_empty_object() {
        let cli = Cli::try_parse_from(["ke", "emit", "instance_removed"]).unwrap();
        assert!(matches!(cli.command, Command::Emit { ref data, .. } if data == "{}"));
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["ke", "listen", "--config", "/etc/ke.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/ke.yml")));
        assert!(matches!(cli.command, Command::Listen { socket: None }));
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("kgsm-events/logs/ke.log"));
    }
}
