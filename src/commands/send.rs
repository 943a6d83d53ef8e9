//! One-shot test alert

use chrono::Local;
use colored::*;
use eyre::Result;

use crate::config::{AlertMode, Config, Overrides};
use crate::event::AlertMessage;
use crate::notify::Dispatcher;

pub fn run(message: Option<String>, overrides: Overrides, config: &Config) -> Result<()> {
    let mut config = config.clone();
    config.apply_overrides(overrides);

    // Nothing would be sent in print mode, so a test alert goes everywhere configured
    if config.watch.alert == AlertMode::Print {
        config.watch.alert = AlertMode::Both;
    }

    let text = message.unwrap_or_else(|| {
        format!(
            "✅ canary-watch test alert ({})",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )
    });
    let message = AlertMessage::new(text);

    let dispatcher = Dispatcher::from_config(&config);
    if dispatcher.is_empty() {
        println!("{} No channels configured, nothing sent", "⚠".yellow());
        for reason in dispatcher.skipped() {
            println!("  {}", reason.dimmed());
        }
        return Ok(());
    }

    let deliveries = dispatcher.dispatch(&message);
    let failed = deliveries.iter().filter(|d| !d.is_ok()).count();

    for delivery in &deliveries {
        match delivery.outcome {
            Ok(()) => println!("{} {}", "✓".green(), delivery.channel),
            Err(ref e) => println!("{} {}: {:#}", "✗".red(), delivery.channel, e),
        }
    }

    if failed > 0 {
        eyre::bail!("{} of {} deliveries failed", failed, deliveries.len());
    }

    Ok(())
}
