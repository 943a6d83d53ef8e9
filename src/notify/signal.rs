//! signal-cli process channel
//!
//! Runs `<cli> -u <account> send <recipient> -m <message>` once per alert.

use eyre::{Context, Result};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::Channel;
use crate::config::SignalConfig;
use crate::event::AlertMessage;

const WAIT_STEP: Duration = Duration::from_millis(25);

pub struct SignalChannel {
    program: String,
    account: String,
    recipient: String,
    timeout: Duration,
}

impl SignalChannel {
    pub fn new(program: impl Into<String>, account: impl Into<String>, recipient: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            account: account.into(),
            recipient: recipient.into(),
            timeout,
        }
    }

    /// None unless both account and recipient are set
    pub fn from_config(config: &SignalConfig) -> Option<Self> {
        let (account, recipient) = config.identities()?;
        Some(Self::new(
            config.cli.clone(),
            account,
            recipient,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn args<'a>(&'a self, message: &'a AlertMessage) -> [&'a str; 6] {
        ["-u", self.account.as_str(), "send", self.recipient.as_str(), "-m", message.as_str()]
    }
}

impl Channel for SignalChannel {
    fn name(&self) -> &str {
        "signal"
    }

    fn send(&self, message: &AlertMessage) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(self.args(message))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.program))?;

        // Drain stderr while waiting so a verbose failure cannot fill the pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status: ExitStatus = loop {
            if let Some(status) = child.try_wait().context("Failed to wait for signal-cli")? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                eyre::bail!("{} timed out after {}s", self.program, self.timeout.as_secs_f32());
            }
            thread::sleep(WAIT_STEP);
        };

        if status.success() {
            return Ok(());
        }

        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        match status.code() {
            Some(code) => eyre::bail!("{} exited with code {}: {}", self.program, code, stderr.trim()),
            None => eyre::bail!("{} was terminated by a signal: {}", self.program, stderr.trim()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-signal-cli");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_from_config_requires_both_identities() {
        let mut config = SignalConfig {
            account: Some("+19999999999".to_string()),
            ..Default::default()
        };
        assert!(SignalChannel::from_config(&config).is_none());

        config.recipient = Some(" ".to_string());
        assert!(SignalChannel::from_config(&config).is_none());

        config.recipient = Some("+18888888888".to_string());
        assert!(SignalChannel::from_config(&config).is_some());
    }

    #[test]
    fn test_send_passes_identities_and_message() {
        let temp = tempdir().unwrap();
        let out = temp.path().join("args.txt");
        let script = write_script(
            temp.path(),
            &format!("for a in \"$@\"; do echo \"$a\" >> '{}'; done", out.display()),
        );

        let channel = SignalChannel::new(script, "+19999999999", "+18888888888", Duration::from_secs(5));
        channel
            .send(&AlertMessage::new("[OpenCanary] time=t service=ssh"))
            .unwrap();

        let args = fs::read_to_string(&out).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(
            args,
            vec![
                "-u",
                "+19999999999",
                "send",
                "+18888888888",
                "-m",
                "[OpenCanary] time=t service=ssh"
            ]
        );
    }

    #[test]
    fn test_nonzero_exit_is_a_failure_with_stderr() {
        let temp = tempdir().unwrap();
        let script = write_script(temp.path(), "echo 'User is not registered' >&2\nexit 3");

        let channel = SignalChannel::new(script, "+1", "+2", Duration::from_secs(5));
        let err = channel.send(&AlertMessage::new("x")).unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("code 3"));
        assert!(text.contains("User is not registered"));
    }

    #[test]
    fn test_verbose_failure_is_not_reported_as_timeout() {
        let temp = tempdir().unwrap();
        let script = write_script(
            temp.path(),
            "head -c 200000 /dev/zero | tr '\\0' x >&2\nexit 3",
        );

        let channel = SignalChannel::new(script, "+1", "+2", Duration::from_secs(5));
        let started = Instant::now();
        let err = channel.send(&AlertMessage::new("x")).unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("code 3"), "unexpected error: {}", &text[..text.len().min(200)]);
        assert!(!text.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_executable_is_a_failure() {
        let channel = SignalChannel::new("/nonexistent/signal-cli", "+1", "+2", Duration::from_secs(5));
        assert!(channel.send(&AlertMessage::new("x")).is_err());
    }

    #[test]
    fn test_hanging_cli_is_killed_after_timeout() {
        let temp = tempdir().unwrap();
        let script = write_script(temp.path(), "sleep 10");

        let channel = SignalChannel::new(script, "+1", "+2", Duration::from_millis(200));
        let started = Instant::now();
        let err = channel.send(&AlertMessage::new("x")).unwrap_err();
        assert!(format!("{}", err).contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
