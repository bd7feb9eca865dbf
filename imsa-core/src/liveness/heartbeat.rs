//! Heartbeat file
//!
//! One ASCII integer (Unix seconds) rewritten by the writer process. The value is
//! written to a sibling temp file, synced, then renamed over the previous one, so a
//! reader sees either the old complete value or the new one, even when the writer
//! is killed mid-write.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{info, trace, warn};

use super::unix_now;

#[derive(Debug, Clone)]
pub struct HeartbeatFile {
    path: PathBuf,
}

impl HeartbeatFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Rewrites the file with `timestamp`, forcing it to durable storage.
    pub fn write(&self, timestamp: i64) -> io::Result<()> {
        let tmp = self.temp_path();
        {
            let mut f = File::create(&tmp)?;
            f.write_all(timestamp.to_string().as_bytes())?;
            f.flush()?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        self.sync_parent()
    }

    /// Makes the rename itself durable.
    fn sync_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
            _ => File::open(".")?.sync_all(),
        }
    }

    pub fn write_now(&self) -> io::Result<i64> {
        let now = unix_now();
        self.write(now)?;
        Ok(now)
    }

    /// Raw content, `None` when the file does not exist.
    pub fn read_raw(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Loop body of the heartbeat process.
pub struct HeartbeatWriter {
    file: HeartbeatFile,
    interval: Duration,
}

impl HeartbeatWriter {
    pub fn new(file: HeartbeatFile, interval: Duration) -> Self {
        Self { file, interval }
    }

    /// Writes a heartbeat every interval while `keep_running` says so.
    ///
    /// Write failures are logged and retried on the next tick; the loop only ends
    /// when `keep_running` returns false (the served process is gone).
    pub fn run_while(&self, mut keep_running: impl FnMut() -> bool) {
        info!("Heartbeat writer started ({}, every {:?})", self.file.path().display(), self.interval);
        while keep_running() {
            match self.file.write_now() {
                Ok(ts) => trace!("Heartbeat {}", ts),
                Err(e) => warn!("Failed to write heartbeat: {}", e),
            }
            thread::sleep(self.interval);
        }
        info!("Heartbeat writer stopping");
    }
}
