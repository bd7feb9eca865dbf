//! Background processes of the bot
//!
//! The heartbeat writer and the network watchdog run as separate OS processes (this
//! same binary re-executed with a hidden subcommand), so a crash of the serving
//! process cannot take them down with it and the watchdog's SIGKILL cannot deadlock
//! anything. Both exit on their own once the parent pid disappears; on a graceful
//! shutdown the parent also stops them explicitly.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    Heartbeat,
    Watchdog,
}

impl ProcessRole {
    pub fn subcommand(&self) -> &'static str {
        match self {
            ProcessRole::Heartbeat => "heartbeat",
            ProcessRole::Watchdog => "watchdog",
        }
    }
}

pub struct BackgroundProcess {
    name: String,
    child: Option<Child>,
}

impl BackgroundProcess {
    pub fn spawn(name: &str, mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::null());
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {} process", name))?;
        info!("Started {} process (pid {})", name, child.id());
        Ok(Self { name: name.to_string(), child: Some(child) })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.id())
    }

    /// Still running?
    pub fn check_health(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else { return false };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("{} process exited: {}", self.name, status);
                self.child = None;
                false
            }
            Err(e) => {
                error!("Failed to check {} process: {}", self.name, e);
                false
            }
        }
    }

    /// Kills the process and reaps it, waiting at most `STOP_TIMEOUT`.
    pub fn stop(&mut self) {
        let Some(mut child) = self.child.take() else { return };

        if let Err(e) = child.kill() {
            // already exited; still reap it below
            warn!("Failed to kill {} process: {}", self.name, e);
        }

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!("{} process stopped ({})", self.name, status);
                    return;
                }
                Ok(None) if start.elapsed() > STOP_TIMEOUT => {
                    error!("{} process did not stop within {:?}", self.name, STOP_TIMEOUT);
                    return;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    error!("Error waiting for {} process: {}", self.name, e);
                    return;
                }
            }
        }
    }
}

impl Drop for BackgroundProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Command line re-executing `exe` as a background process serving `parent_pid`.
pub fn background_command(exe: &Path, role: ProcessRole, parent_pid: u32) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg(role.subcommand()).arg("--parent-pid").arg(parent_pid.to_string());
    cmd
}

/// Heartbeat writer and network watchdog for the current process.
pub struct Supervisor {
    processes: Vec<BackgroundProcess>,
}

impl Supervisor {
    pub fn start() -> Result<Self> {
        let exe = std::env::current_exe().context("Cannot locate own executable")?;
        let pid = std::process::id();

        let mut processes = Vec::new();
        for role in [ProcessRole::Heartbeat, ProcessRole::Watchdog] {
            processes.push(BackgroundProcess::spawn(role.subcommand(), background_command(&exe, role, pid))?);
        }
        Ok(Self { processes })
    }

    /// Names of the background processes still running.
    pub fn running(&mut self) -> Vec<String> {
        self.processes
            .iter_mut()
            .filter_map(|p| p.check_health().then(|| p.name.clone()))
            .collect()
    }

    pub fn shutdown(&mut self) {
        for p in self.processes.iter_mut() {
            p.stop();
        }
    }
}
