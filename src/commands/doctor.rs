//! Diagnose canary-watch setup issues

use colored::*;
use eyre::Result;
use std::fs::File;

use crate::config::Config;
use crate::notify::NtfyChannel;

pub fn run(config: &Config) -> Result<()> {
    println!("{}", "canary-watch doctor".bold());
    println!("{}", "═".repeat(50));
    println!();

    let issues = check(config);

    // Summary
    println!("{}", "═".repeat(50));
    if issues == 0 {
        println!("{} All checks passed!", "✓".green().bold());
    } else {
        println!("{} {} issue(s) found", "⚠".yellow().bold(), issues);
    }

    Ok(())
}

/// Print each check and return the number of issues found
fn check(config: &Config) -> usize {
    let mut issues = 0;

    // Check the followed log
    println!("{}", "Log file:".bold());
    let log_path = config.log_path();
    match File::open(&log_path) {
        Ok(_) => println!("  {} {}", "✓".green(), log_path.display()),
        Err(e) => {
            println!("  {} {} ({})", "✗".red(), log_path.display(), e);
            println!("    Set {} or pass {}", "OPENCANARY_LOG".cyan(), "--log".cyan());
            issues += 1;
        }
    }
    println!();

    let mode = config.watch.alert;
    println!("{} {}", "Alert mode:".bold(), mode.to_string().cyan());
    println!();

    // Check ntfy
    println!("{}", "ntfy:".bold());
    match NtfyChannel::from_config(&config.ntfy) {
        Ok(Some(channel)) => {
            let auth = if config.ntfy.credentials().is_some() { "with auth" } else { "no auth" };
            println!("  {} {} ({})", "✓".green(), channel.endpoint(), auth);
        }
        Ok(None) if mode.wants_ntfy() => {
            println!("  {} No URL configured", "✗".red());
            println!("    Set {} or {} + {}", "NTFY_URL".cyan(), "NTFY_SERVER".cyan(), "NTFY_TOPIC".cyan());
            issues += 1;
        }
        Ok(None) => println!("  {} not configured", "-".dimmed()),
        Err(e) => {
            println!("  {} {:#}", "✗".red(), e);
            issues += 1;
        }
    }
    println!();

    // Check signal-cli
    println!("{}", "Signal:".bold());
    let identities = config.signal.identities().is_some();
    match which::which(&config.signal.cli) {
        Ok(path) => println!("  {} {}", "✓".green(), path.display()),
        Err(_) if mode.wants_signal() => {
            println!("  {} {} not found on PATH", "✗".red(), config.signal.cli);
            issues += 1;
        }
        Err(_) => println!("  {} {} not found on PATH", "-".dimmed(), config.signal.cli),
    }
    if identities {
        println!("  {} phone/recipient set", "✓".green());
    } else if mode.wants_signal() {
        println!("  {} phone/recipient missing", "✗".red());
        println!("    Set {} and {}", "SIGNAL_PHONE".cyan(), "SIGNAL_RECIPIENT".cyan());
        issues += 1;
    } else {
        println!("  {} not configured", "-".dimmed());
    }
    println!();

    issues
}
