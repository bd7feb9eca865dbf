//! Liveness subsystem
//!
//! - `heartbeat`: timestamp file rewritten by a dedicated writer process
//! - `downtime`: startup measurement of how long the previous run has been gone
//! - `probe`: TCP reachability check against public resolvers
//! - `watchdog`: kills the bot process when the probe gives up

pub mod downtime;
pub mod heartbeat;
pub mod probe;
pub mod watchdog;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

pub use downtime::{measure_downtime, Downtime};
pub use heartbeat::{HeartbeatFile, HeartbeatWriter};
pub use probe::NetworkProbe;
pub use watchdog::{Watchdog, WatchdogExit};

/// Whole seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// True while `pid` refers to a live process (signal 0 probe).
pub fn process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // exists but owned by someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
