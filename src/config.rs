use clap::ValueEnum;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default OpenCanary log location
pub const DEFAULT_LOG_PATH: &str = "/var/log/opencanary.log";

/// Main canary-watch configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub watch: WatchConfig,
    pub ntfy: NtfyConfig,
    pub signal: SignalConfig,
    pub follow: FollowConfig,
}

/// Log verbosity for the agent's own log file
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

/// Which channel set receives alerts
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    /// Print alerts only, deliver nowhere
    #[default]
    Print,
    /// ntfy only
    Ntfy,
    /// Signal only
    Signal,
    /// Every configured channel
    #[serde(alias = "all")]
    #[value(alias = "all")]
    Both,
}

impl AlertMode {
    pub fn wants_ntfy(&self) -> bool {
        matches!(self, AlertMode::Ntfy | AlertMode::Both)
    }

    pub fn wants_signal(&self) -> bool {
        matches!(self, AlertMode::Signal | AlertMode::Both)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "print" => Some(Self::Print),
            "ntfy" => Some(Self::Ntfy),
            "signal" => Some(Self::Signal),
            "both" | "all" => Some(Self::Both),
            _ => None,
        }
    }
}

impl fmt::Display for AlertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertMode::Print => "print",
            AlertMode::Ntfy => "ntfy",
            AlertMode::Signal => "signal",
            AlertMode::Both => "both",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// OpenCanary JSON log to follow
    pub log: PathBuf,
    pub alert: AlertMode,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            log: PathBuf::from(DEFAULT_LOG_PATH),
            alert: AlertMode::default(),
        }
    }
}

/// ntfy-style HTTP channel
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NtfyConfig {
    /// Server base URL, or a full topic URL when `topic` is unset
    pub url: Option<String>,
    pub topic: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            url: None,
            topic: None,
            username: None,
            password: None,
            timeout_secs: 5,
        }
    }
}

impl NtfyConfig {
    /// Full POST target, or None when no URL is configured
    pub fn endpoint(&self) -> Option<String> {
        let base = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let base = base.trim_end_matches('/');
        match self.topic.as_deref().map(|t| t.trim().trim_matches('/')).filter(|t| !t.is_empty()) {
            Some(topic) => Some(format!("{}/{}", base, topic)),
            None => Some(base.to_string()),
        }
    }

    /// Credentials, only when both halves are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// signal-cli process channel
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalConfig {
    pub cli: String,
    /// Sender account (phone number registered with signal-cli)
    pub account: Option<String>,
    pub recipient: Option<String>,
    pub timeout_secs: u64,
}

impl SignalConfig {
    /// Sender and recipient, only when both are set and non-blank
    pub fn identities(&self) -> Option<(&str, &str)> {
        let account = self.account.as_deref().filter(|s| !s.trim().is_empty())?;
        let recipient = self.recipient.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((account, recipient))
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            cli: "signal-cli".to_string(),
            account: None,
            recipient: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FollowConfig {
    pub poll_interval_ms: u64,
    pub missing_retry_ms: u64,
    /// After rotation, read the new file from its start instead of its end
    pub reopen_from_start: bool,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            missing_retry_ms: 1000,
            reopen_from_start: false,
        }
    }
}

/// Command-line overrides shared by `watch` and `send`
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log: Option<PathBuf>,
    pub alert: Option<AlertMode>,
    pub ntfy_url: Option<String>,
    pub ntfy_topic: Option<String>,
    pub ntfy_user: Option<String>,
    pub ntfy_pass: Option<String>,
    pub signal_phone: Option<String>,
    pub signal_recipient: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        if let Ok(env_path) = std::env::var("CANARY_WATCH_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from CANARY_WATCH_CONFIG: {}", e);
                    }
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("canary-watch").join("canary-watch.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        // Try ./canary-watch.yaml (for development)
        let local_config = PathBuf::from("canary-watch.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply environment overrides; empty values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(log) = get("OPENCANARY_LOG") {
            self.watch.log = PathBuf::from(log);
        }
        if let Some(mode) = get("ALERT_MODE") {
            match AlertMode::parse(&mode) {
                Some(alert) => self.watch.alert = alert,
                None => log::warn!("Ignoring unknown ALERT_MODE: {}", mode),
            }
        }
        // NTFY_URL is a complete topic URL and replaces NTFY_SERVER + NTFY_TOPIC
        if let Some(url) = get("NTFY_URL") {
            self.ntfy.url = Some(url);
            self.ntfy.topic = None;
        } else {
            if let Some(server) = get("NTFY_SERVER") {
                self.ntfy.url = Some(server);
            }
            if let Some(topic) = get("NTFY_TOPIC") {
                self.ntfy.topic = Some(topic);
            }
        }
        if let Some(user) = get("NTFY_USER") {
            self.ntfy.username = Some(user);
        }
        if let Some(pass) = get("NTFY_PASS") {
            self.ntfy.password = Some(pass);
        }
        if let Some(phone) = get("SIGNAL_PHONE") {
            self.signal.account = Some(phone);
        }
        if let Some(recipient) = get("SIGNAL_RECIPIENT") {
            self.signal.recipient = Some(recipient);
        }
        if let Some(cli) = get("SIGNAL_CLI") {
            self.signal.cli = cli;
        }
    }

    /// Apply command-line overrides (highest precedence)
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(log) = overrides.log {
            self.watch.log = log;
        }
        if let Some(alert) = overrides.alert {
            self.watch.alert = alert;
        }
        if overrides.ntfy_url.is_some() {
            self.ntfy.url = overrides.ntfy_url;
        }
        if overrides.ntfy_topic.is_some() {
            self.ntfy.topic = overrides.ntfy_topic;
        }
        if overrides.ntfy_user.is_some() {
            self.ntfy.username = overrides.ntfy_user;
        }
        if overrides.ntfy_pass.is_some() {
            self.ntfy.password = overrides.ntfy_pass;
        }
        if overrides.signal_phone.is_some() {
            self.signal.account = overrides.signal_phone;
        }
        if overrides.signal_recipient.is_some() {
            self.signal.recipient = overrides.signal_recipient;
        }
    }

    /// Log path with ~ and env vars expanded
    pub fn log_path(&self) -> PathBuf {
        Self::expand_path(&self.watch.log)
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_observe_only() {
        let config = Config::default();
        assert_eq!(config.watch.alert, AlertMode::Print);
        assert_eq!(config.watch.log, PathBuf::from(DEFAULT_LOG_PATH));
        assert!(config.ntfy.endpoint().is_none());
        assert!(config.signal.account.is_none());
        assert_eq!(config.follow.poll_interval_ms, 500);
        assert_eq!(config.follow.missing_retry_ms, 1000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
watch:
  alert: ntfy
ntfy:
  url: https://ntfy.example.com
  topic: canary
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.watch.alert, AlertMode::Ntfy);
        assert_eq!(config.watch.log, PathBuf::from(DEFAULT_LOG_PATH));
        assert_eq!(config.ntfy.timeout_secs, 5);
        assert_eq!(config.signal.cli, "signal-cli");
    }

    #[test]
    fn test_alert_mode_all_alias() {
        let config: Config = serde_yaml::from_str("watch:\n  alert: all\n").unwrap();
        assert_eq!(config.watch.alert, AlertMode::Both);
        assert_eq!(AlertMode::parse("ALL"), Some(AlertMode::Both));
        assert_eq!(AlertMode::parse("pager"), None);
    }

    #[test]
    fn test_ntfy_endpoint_with_topic() {
        let ntfy = NtfyConfig {
            url: Some("http://localhost/".to_string()),
            topic: Some("ghostmode-alerts".to_string()),
            ..Default::default()
        };
        assert_eq!(ntfy.endpoint().as_deref(), Some("http://localhost/ghostmode-alerts"));
    }

    #[test]
    fn test_ntfy_endpoint_full_url() {
        let ntfy = NtfyConfig {
            url: Some("https://ntfy.example.com/topic".to_string()),
            ..Default::default()
        };
        assert_eq!(ntfy.endpoint().as_deref(), Some("https://ntfy.example.com/topic"));

        let blank = NtfyConfig {
            url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.endpoint().is_none());
    }

    #[test]
    fn test_ntfy_credentials_need_both_halves() {
        let mut ntfy = NtfyConfig {
            username: Some("bob".to_string()),
            ..Default::default()
        };
        assert!(ntfy.credentials().is_none());

        ntfy.password = Some("hunter2".to_string());
        assert_eq!(ntfy.credentials(), Some(("bob", "hunter2")));
    }

    #[test]
    fn test_signal_identities_reject_blanks() {
        let mut signal = SignalConfig {
            account: Some("+19999999999".to_string()),
            ..Default::default()
        };
        assert!(signal.identities().is_none());

        signal.recipient = Some("   ".to_string());
        assert!(signal.identities().is_none());

        signal.recipient = Some("+18888888888".to_string());
        assert_eq!(signal.identities(), Some(("+19999999999", "+18888888888")));
    }

    #[test]
    fn test_apply_env() {
        let mut config = Config::default();
        config.apply_env(env_from(&[
            ("OPENCANARY_LOG", "/logs/opencanary/opencanary.log"),
            ("ALERT_MODE", "signal"),
            ("NTFY_SERVER", "http://localhost"),
            ("NTFY_TOPIC", "ghostmode-alerts"),
            ("SIGNAL_PHONE", "+19999999999"),
            ("SIGNAL_RECIPIENT", "+18888888888"),
            ("NTFY_USER", ""),
        ]));

        assert_eq!(config.watch.log, PathBuf::from("/logs/opencanary/opencanary.log"));
        assert_eq!(config.watch.alert, AlertMode::Signal);
        assert_eq!(config.ntfy.endpoint().as_deref(), Some("http://localhost/ghostmode-alerts"));
        assert_eq!(config.signal.account.as_deref(), Some("+19999999999"));
        assert_eq!(config.signal.recipient.as_deref(), Some("+18888888888"));
        assert!(config.ntfy.username.is_none());
    }

    #[test]
    fn test_apply_env_ntfy_url_wins() {
        let mut config = Config::default();
        config.apply_env(env_from(&[
            ("NTFY_SERVER", "http://localhost"),
            ("NTFY_URL", "https://ntfy.example.com/t"),
        ]));
        assert_eq!(config.ntfy.url.as_deref(), Some("https://ntfy.example.com/t"));
    }

    #[test]
    fn test_apply_env_ntfy_url_ignores_topic() {
        let mut config = Config::default();
        config.ntfy.topic = Some("from-file".to_string());
        config.apply_env(env_from(&[
            ("NTFY_URL", "https://ntfy.example.com/t"),
            ("NTFY_TOPIC", "ghostmode-alerts"),
        ]));
        assert!(config.ntfy.topic.is_none());
        assert_eq!(config.ntfy.endpoint().as_deref(), Some("https://ntfy.example.com/t"));
    }

    #[test]
    fn test_apply_env_bad_alert_mode_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env_from(&[("ALERT_MODE", "carrier-pigeon")]));
        assert_eq!(config.watch.alert, AlertMode::Print);
    }

    #[test]
    fn test_overrides_beat_env() {
        let mut config = Config::default();
        config.apply_env(env_from(&[("ALERT_MODE", "signal"), ("NTFY_URL", "http://a")]));
        config.apply_overrides(Overrides {
            alert: Some(AlertMode::Ntfy),
            ntfy_url: Some("http://b".to_string()),
            ..Default::default()
        });
        assert_eq!(config.watch.alert, AlertMode::Ntfy);
        assert_eq!(config.ntfy.url.as_deref(), Some("http://b"));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/canary-watch.yaml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canary-watch.yaml");
        fs::write(&path, "log_level: debug\nwatch:\n  log: /tmp/x.log\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.watch.log, PathBuf::from("/tmp/x.log"));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/opencanary.log");
        let expanded = Config::expand_path(&path);
        assert!(!expanded.to_string_lossy().contains('~'));
        assert!(expanded.to_string_lossy().ends_with("opencanary.log"));
    }

    #[test]
    fn test_password_not_serialized_when_unset() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(!yaml.contains("password"));
    }
}
