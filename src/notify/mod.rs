//! Alert dispatch
//!
//! Each configured channel gets exactly one delivery attempt per alert.
//! Channel failures are logged and reported back, never propagated:
//! - ntfy - POSTs the message to an HTTP endpoint
//! - signal - invokes signal-cli

use eyre::Result;
use log::{debug, warn};

pub mod ntfy;
pub mod signal;

pub use ntfy::NtfyChannel;
pub use signal::SignalChannel;

use crate::config::Config;
use crate::event::AlertMessage;

/// A notification transport
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;
    fn send(&self, message: &AlertMessage) -> Result<()>;
}

/// Outcome of one delivery attempt
#[derive(Debug)]
pub struct Delivery {
    pub channel: String,
    pub outcome: Result<()>,
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Fan-out over the enabled channels, in a fixed order
pub struct Dispatcher {
    channels: Vec<Box<dyn Channel>>,
    skipped: Vec<String>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Self {
        Self {
            channels,
            skipped: Vec::new(),
        }
    }

    /// Build the channel set selected by the alert mode. Requested channels
    /// with missing settings are skipped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let mode = config.watch.alert;
        let mut channels: Vec<Box<dyn Channel>> = Vec::new();
        let mut skipped = Vec::new();

        if mode.wants_ntfy() {
            match NtfyChannel::from_config(&config.ntfy) {
                Ok(Some(channel)) => channels.push(Box::new(channel)),
                Ok(None) => skipped.push("ntfy alert requested but no URL configured".to_string()),
                Err(e) => skipped.push(format!("ntfy channel unavailable: {:#}", e)),
            }
        }

        if mode.wants_signal() {
            match SignalChannel::from_config(&config.signal) {
                Some(channel) => channels.push(Box::new(channel)),
                None => skipped.push("Signal alert requested but phone/recipient not provided".to_string()),
            }
        }

        for reason in &skipped {
            warn!("{}", reason);
        }

        let mut dispatcher = Self::new(channels);
        dispatcher.skipped = skipped;
        dispatcher
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Why requested channels were left out
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Attempt delivery on every channel; always returns
    pub fn dispatch(&self, message: &AlertMessage) -> Vec<Delivery> {
        self.channels
            .iter()
            .map(|channel| {
                let outcome = channel.send(message);
                match &outcome {
                    Ok(()) => debug!("Delivered alert via {}", channel.name()),
                    Err(e) => warn!("{} delivery failed: {:#}", channel.name(), e),
                }
                Delivery {
                    channel: channel.name().to_string(),
                    outcome,
                }
            })
            .collect()
    }
}
