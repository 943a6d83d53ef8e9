//! Rotation-safe log follower
//!
//! Works like `tail -F`: starts at end-of-file, yields complete lines as they
//! are appended, and reopens the path when the file behind it is replaced.

use eyre::{Context, Result};
use log::{debug, info, trace, warn};
use std::fs::{self, File, Metadata};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::FollowConfig;

/// Timing and positioning knobs for a follower
#[derive(Debug, Clone, Copy)]
pub struct FollowOptions {
    /// Sleep when there is no new data
    pub poll_interval: Duration,
    /// Sleep while the path does not exist
    pub missing_interval: Duration,
    /// Read a replacement file from offset 0 instead of its end
    pub reopen_from_start: bool,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self::from(&FollowConfig::default())
    }
}

impl From<&FollowConfig> for FollowOptions {
    fn from(config: &FollowConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            missing_interval: Duration::from_millis(config.missing_retry_ms),
            reopen_from_start: config.reopen_from_start,
        }
    }
}

/// On-disk identity of a file, stable across renames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    fn of(meta: &Metadata) -> Self {
        let created = meta
            .created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self { dev: 0, ino: created }
    }
}

/// Where the follower is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    Tailing,
    Reopening,
    WaitingForFile,
}

/// Outcome of one non-blocking follow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// A complete line, terminator stripped
    Line(String),
    /// No complete line yet and the file is unchanged
    Idle,
    /// The path now points at a different file, which has been opened
    Rotated,
    /// The file shrank below the read offset and was rewound
    Truncated,
    /// The path does not exist right now
    Missing,
}

/// Owned cursor over a followed log file
pub struct Follower {
    path: PathBuf,
    reader: BufReader<File>,
    identity: FileIdentity,
    offset: u64,
    pending: Vec<u8>,
    state: FollowState,
    options: FollowOptions,
}

fn open_positioned(path: &Path, from_start: bool) -> io::Result<(BufReader<File>, FileIdentity, u64)> {
    let file = File::open(path)?;
    let identity = FileIdentity::of(&file.metadata()?);
    let mut reader = BufReader::new(file);
    let offset = if from_start { 0 } else { reader.seek(SeekFrom::End(0))? };
    Ok((reader, identity, offset))
}

impl Follower {
    /// Open `path` positioned at its current end. Failing to open is fatal.
    pub fn open<P: AsRef<Path>>(path: P, options: FollowOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (reader, identity, offset) =
            open_positioned(&path, false).with_context(|| format!("Failed to open log file: {}", path.display()))?;

        info!("Following {} from offset {}", path.display(), offset);

        Ok(Self {
            path,
            reader,
            identity,
            offset,
            pending: Vec::new(),
            state: FollowState::Tailing,
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[allow(dead_code)] // inspected by tests
    pub fn state(&self) -> FollowState {
        self.state
    }

    #[allow(dead_code)] // inspected by tests
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Run one step: read a line if one is complete, otherwise check the path.
    /// Never sleeps.
    pub fn poll(&mut self) -> io::Result<Poll> {
        if let Some(line) = self.read_line()? {
            return Ok(Poll::Line(line));
        }
        self.check_path()
    }

    /// Append available bytes to the pending buffer; hand back a line once
    /// its newline has arrived
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.pending)?;
        self.offset += n as u64;

        if self.pending.last() != Some(&b'\n') {
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.pending);
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn check_path(&mut self) -> io::Result<Poll> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.enter_waiting();
                return Ok(Poll::Missing);
            }
            Err(e) => return Err(e),
        };

        if FileIdentity::of(&meta) != self.identity {
            // Lines the writer appended to the old file before it was replaced
            if let Some(line) = self.read_line()? {
                return Ok(Poll::Line(line));
            }
            return self.reopen();
        }

        if meta.len() < self.offset {
            info!(
                "{} truncated ({} < {}), rewinding",
                self.path.display(),
                meta.len(),
                self.offset
            );
            self.reader.seek(SeekFrom::Start(0))?;
            self.offset = 0;
            self.discard_pending();
            return Ok(Poll::Truncated);
        }

        if self.state == FollowState::WaitingForFile {
            info!("{} is back", self.path.display());
            self.state = FollowState::Tailing;
        }
        trace!("No new data in {}", self.path.display());
        Ok(Poll::Idle)
    }

    fn reopen(&mut self) -> io::Result<Poll> {
        self.state = FollowState::Reopening;

        let (reader, identity, offset) = match open_positioned(&self.path, self.options.reopen_from_start) {
            Ok(opened) => opened,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.enter_waiting();
                return Ok(Poll::Missing);
            }
            Err(e) => {
                self.state = FollowState::WaitingForFile;
                return Err(e);
            }
        };

        self.discard_pending();
        self.reader = reader;
        self.identity = identity;
        self.offset = offset;
        self.state = FollowState::Tailing;

        info!("{} rotated, reopened at offset {}", self.path.display(), offset);
        Ok(Poll::Rotated)
    }

    fn enter_waiting(&mut self) {
        if self.state != FollowState::WaitingForFile {
            info!("{} is missing, waiting for it to reappear", self.path.display());
            self.state = FollowState::WaitingForFile;
        }
    }

    fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!("Dropping {} bytes of unterminated line", self.pending.len());
            self.pending.clear();
        }
    }
}

/// Endless line stream; only returns `Some`. Stop by dropping the follower.
impl Iterator for Follower {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            match self.poll() {
                Ok(Poll::Line(line)) => return Some(line),
                Ok(Poll::Rotated) | Ok(Poll::Truncated) => continue,
                Ok(Poll::Idle) => thread::sleep(self.options.poll_interval),
                Ok(Poll::Missing) => thread::sleep(self.options.missing_interval),
                Err(e) => {
                    warn!("Error following {}: {}", self.path.display(), e);
                    thread::sleep(self.options.missing_interval);
                }
            }
        }
    }
}
