use colored::*;
use eyre::Result;

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

const MASK: &str = "********";

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
        ConfigAction::Get { key } => get(&key, config),
    }
}

/// Copy safe to print
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.ntfy.password.is_some() {
        shown.ntfy.password = Some(MASK.to_string());
    }
    shown
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    let config = redacted(config);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&config)?);
        }
        OutputFormat::Text => {
            let unset = || "(unset)".dimmed().to_string();

            println!("{}", "canary-watch configuration".bold());
            println!();

            println!("{}:", "watch".cyan());
            println!("  log: {}", config.watch.log.display());
            println!("  alert: {}", config.watch.alert);
            println!();

            println!("{}:", "ntfy".cyan());
            println!("  endpoint: {}", config.ntfy.endpoint().unwrap_or_else(unset));
            println!("  username: {}", config.ntfy.username.clone().unwrap_or_else(unset));
            println!("  password: {}", config.ntfy.password.clone().unwrap_or_else(unset));
            println!("  timeout_secs: {}", config.ntfy.timeout_secs);
            println!();

            println!("{}:", "signal".cyan());
            println!("  cli: {}", config.signal.cli);
            println!("  account: {}", config.signal.account.clone().unwrap_or_else(unset));
            println!("  recipient: {}", config.signal.recipient.clone().unwrap_or_else(unset));
            println!("  timeout_secs: {}", config.signal.timeout_secs);
            println!();

            println!("{}:", "follow".cyan());
            println!("  poll_interval_ms: {}", config.follow.poll_interval_ms);
            println!("  missing_retry_ms: {}", config.follow.missing_retry_ms);
            println!("  reopen_from_start: {}", config.follow.reopen_from_start);
        }
    }

    Ok(())
}

fn lookup(key: &str, config: &Config) -> Option<String> {
    match key {
        "log_level" | "log-level" => Some(config.log_level.as_filter().to_string()),
        "watch.log" => Some(config.watch.log.display().to_string()),
        "watch.alert" => Some(config.watch.alert.to_string()),
        "ntfy.url" => config.ntfy.url.clone(),
        "ntfy.topic" => config.ntfy.topic.clone(),
        "ntfy.endpoint" => config.ntfy.endpoint(),
        "ntfy.username" => config.ntfy.username.clone(),
        "ntfy.password" => config.ntfy.password.as_ref().map(|_| MASK.to_string()),
        "ntfy.timeout_secs" => Some(config.ntfy.timeout_secs.to_string()),
        "signal.cli" => Some(config.signal.cli.clone()),
        "signal.account" => config.signal.account.clone(),
        "signal.recipient" => config.signal.recipient.clone(),
        "signal.timeout_secs" => Some(config.signal.timeout_secs.to_string()),
        "follow.poll_interval_ms" => Some(config.follow.poll_interval_ms.to_string()),
        "follow.missing_retry_ms" => Some(config.follow.missing_retry_ms.to_string()),
        "follow.reopen_from_start" => Some(config.follow.reopen_from_start.to_string()),
        _ => None,
    }
}

fn get(key: &str, config: &Config) -> Result<()> {
    match lookup(key, config) {
        Some(v) => println!("{}", v),
        None => eyre::bail!("Unknown or unset config key: {}", key),
    }

    Ok(())
}
