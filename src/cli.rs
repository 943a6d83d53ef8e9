use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::config::{AlertMode, Overrides};

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "canary-watch",
    about = "Tail an OpenCanary log and send real-time alerts via ntfy or Signal",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/canary-watch/logs/canary-watch.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to canary-watch.yaml config file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow the log and alert on every event
    Watch {
        #[command(flatten)]
        channels: ChannelArgs,
    },

    /// Send one test alert through the configured channels
    Send {
        /// Message text
        message: Option<String>,

        #[command(flatten)]
        channels: ChannelArgs,
    },

    /// Decode log lines from a file (or stdin) and print the alert messages
    Parse {
        /// Log file to read (reads stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Check log file and channel prerequisites
    Doctor,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Per-run overrides for the log path, alert mode, and channel settings
#[derive(Args, Debug, Clone, Default)]
pub struct ChannelArgs {
    /// OpenCanary JSON log to follow
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Which channels receive alerts
    #[arg(long, value_enum)]
    pub alert: Option<AlertMode>,

    /// ntfy server or full topic URL
    #[arg(long)]
    pub ntfy_url: Option<String>,

    /// ntfy topic appended to the URL
    #[arg(long)]
    pub ntfy_topic: Option<String>,

    /// ntfy basic-auth user
    #[arg(long)]
    pub ntfy_user: Option<String>,

    /// ntfy basic-auth password
    #[arg(long)]
    pub ntfy_pass: Option<String>,

    /// Signal sender account (phone number)
    #[arg(long)]
    pub signal_phone: Option<String>,

    /// Signal recipient (phone number)
    #[arg(long)]
    pub signal_recipient: Option<String>,
}

impl From<ChannelArgs> for Overrides {
    fn from(args: ChannelArgs) -> Self {
        Self {
            log: args.log,
            alert: args.alert,
            ntfy_url: args.ntfy_url,
            ntfy_topic: args.ntfy_topic,
            ntfy_user: args.ntfy_user,
            ntfy_pass: args.ntfy_pass,
            signal_phone: args.signal_phone,
            signal_recipient: args.signal_recipient,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show effective configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (dot notation)
        key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watch_overrides() {
        let cli = Cli::parse_from([
            "canary-watch",
            "watch",
            "--log",
            "/tmp/canary.log",
            "--alert",
            "all",
            "--ntfy-url",
            "https://ntfy.example.com",
        ]);
        let Commands::Watch { channels } = cli.command else {
            panic!("expected watch");
        };
        let overrides = Overrides::from(channels);
        assert_eq!(overrides.log, Some(PathBuf::from("/tmp/canary.log")));
        assert_eq!(overrides.alert, Some(AlertMode::Both));
        assert_eq!(overrides.ntfy_url.as_deref(), Some("https://ntfy.example.com"));
        assert!(overrides.signal_phone.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["canary-watch", "doctor", "--config", "/etc/canary-watch.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/canary-watch.yaml")));
    }
}
