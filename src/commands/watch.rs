//! The main loop: follow, decode, print, dispatch

use colored::*;
use eyre::Result;

use crate::config::{Config, Overrides};
use crate::event::{self, AlertMessage};
use crate::follow::{FollowOptions, Follower};
use crate::notify::Dispatcher;

/// Run the watcher until the process is stopped
pub fn run(overrides: Overrides, config: &Config) -> Result<()> {
    let mut config = config.clone();
    config.apply_overrides(overrides);

    let path = config.log_path();
    let dispatcher = Dispatcher::from_config(&config);

    // The one fatal condition: the log cannot be opened at startup
    let follower = Follower::open(&path, FollowOptions::from(&config.follow))?;

    println!(
        "[*] Tailing {} ... alert mode: {}",
        follower.path().display(),
        config.watch.alert
    );
    for reason in dispatcher.skipped() {
        eprintln!("{} {}", "⚠".yellow(), reason);
    }
    log::info!(
        "Watching {} with channels: [{}]",
        path.display(),
        dispatcher.channel_names().join(", ")
    );

    for line in follower {
        handle_line(&line, &dispatcher);
    }

    Ok(())
}

/// Decode one line; print and dispatch it if it is an event
pub fn handle_line(line: &str, dispatcher: &Dispatcher) -> Option<AlertMessage> {
    let message = event::decode(line)?;
    println!("{}", message);

    for delivery in dispatcher.dispatch(&message) {
        if let Err(ref e) = delivery.outcome {
            eprintln!("{} {} alert failed: {:#}", "✗".red(), delivery.channel, e);
        }
    }

    Some(message)
}
