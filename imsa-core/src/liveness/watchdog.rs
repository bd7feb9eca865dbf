use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use super::probe::NetworkProbe;
use super::process_alive;

/// Why the watchdog loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum WatchdogExit {
    /// Network lost, SIGKILL delivered to the watched process.
    Killed,
    /// Network lost but the kill itself failed.
    KillFailed(String),
    /// The watched process exited by itself.
    TargetGone,
}

/// Hard-kill policy: no grace period, restart is left to the external supervisor.
pub struct Watchdog {
    probe: NetworkProbe,
    interval: Duration,
    target_pid: u32,
}

impl Watchdog {
    pub fn new(probe: NetworkProbe, interval: Duration, target_pid: u32) -> Self {
        Self { probe, interval, target_pid }
    }

    pub fn run(&self) -> WatchdogExit {
        info!("Network watchdog started for pid {} (every {:?})", self.target_pid, self.interval);
        loop {
            if !process_alive(self.target_pid) {
                info!("Watched process {} is gone, watchdog stopping", self.target_pid);
                return WatchdogExit::TargetGone;
            }

            if !self.probe.is_available() {
                info!("Network unavailable, terminating main application: {}", self.target_pid);
                return match kill(Pid::from_raw(self.target_pid as i32), Signal::SIGKILL) {
                    Ok(()) => WatchdogExit::Killed,
                    Err(e) => {
                        error!("Failed to kill {}: {}", self.target_pid, e);
                        WatchdogExit::KillFailed(e.to_string())
                    }
                };
            }

            thread::sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{SocketAddr, TcpListener};
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    fn refused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    fn probe(target: SocketAddr) -> NetworkProbe {
        NetworkProbe {
            targets: vec![target],
            connect_timeout: Duration::from_millis(200),
            retries: 2,
            retry_wait: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_kills_target_when_network_lost() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let watchdog = Watchdog::new(probe(refused_addr()), Duration::from_millis(10), child.id());

        assert_eq!(watchdog.run(), WatchdogExit::Killed);
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
    }

    #[test]
    fn test_stops_when_target_exits() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut child = Command::new("sleep").arg("0.2").spawn().unwrap();
        let pid = child.id();
        let reaper = std::thread::spawn(move || child.wait().unwrap());

        let watchdog = Watchdog::new(probe(listener.local_addr().unwrap()), Duration::from_millis(20), pid);
        assert_eq!(watchdog.run(), WatchdogExit::TargetGone);
        assert!(reaper.join().unwrap().success());
    }
}
