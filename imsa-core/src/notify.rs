//! Downtime notice fan-out
//!
//! After a long enough outage every registered user gets one message saying how
//! long the bot was away. Delivery is best-effort: a failing recipient is logged
//! and skipped, sends are spaced by a fixed throttle, and nothing is persisted, so
//! a process exit mid fan-out simply abandons the remaining users.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::directory::{Directory, RegisteredUser};
use crate::liveness::Downtime;
use crate::transport::{ChatTransport, DeliveryError};

/// Rendered instead of a duration when the measurement is negative.
pub const UNKNOWN_DURATION: &str = "unknown time";

fn unit(value: i64, singular: &str) -> String {
    if value == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}s", value, singular)
    }
}

/// Human readable duration: days, hours and minutes, zero-valued larger units
/// omitted, minutes shown when nothing else is. Seconds are dropped.
pub fn format_seconds(seconds: i64) -> String {
    if seconds < 0 {
        return UNKNOWN_DURATION.to_string();
    }

    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(unit(days, "day"));
    }
    if hours > 0 {
        parts.push(unit(hours, "hour"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(unit(minutes, "minute"));
    }
    parts.join(", ")
}

#[derive(Debug, Clone, Copy)]
pub struct FanoutPolicy {
    /// Outages up to this many seconds are not announced.
    pub min_downtime_secs: i64,
    /// Pause between two consecutive sends.
    pub throttle: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub unreachable: usize,
    pub failed: usize,
}

/// Sends `text` to every user in order, waiting `throttle` between sends.
pub async fn fan_out<T>(transport: &T, users: &[RegisteredUser], text: &str, throttle: Duration) -> FanoutReport
where
    T: ChatTransport + ?Sized,
{
    let mut report = FanoutReport::default();

    for (i, user) in users.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(throttle).await;
        }

        match transport.send_text(user.telegram_id, text).await {
            Ok(()) => {
                debug!("Downtime notice delivered to {}", user.telegram_id);
                report.delivered += 1;
            }
            Err(DeliveryError::Unreachable(reason)) => {
                info!("User {} blocked or removed the bot: {}", user.telegram_id, reason);
                report.unreachable += 1;
            }
            Err(e) => {
                warn!("Failed to notify user {}: {}", user.telegram_id, e);
                report.failed += 1;
            }
        }
    }

    report
}

/// Fetches the directory and fans the notice out. The text is built by `render`
/// from the formatted duration so the caller owns the wording.
pub async fn notify_downtime<T, F>(
    transport: Arc<T>,
    directory: Directory,
    downtime: Downtime,
    throttle: Duration,
    render: F,
) -> FanoutReport
where
    T: ChatTransport + ?Sized,
    F: Fn(&str) -> String,
{
    let duration = format_seconds(downtime.seconds());
    let text = render(&duration);

    let users = match directory.list_users().await {
        Ok(users) => users,
        Err(e) => {
            error!("Downtime notice skipped, cannot list users: {}", e);
            return FanoutReport::default();
        }
    };

    info!("Notifying {} users about {} of downtime", users.len(), duration);
    let report = fan_out(transport.as_ref(), &users, &text, throttle).await;
    info!(
        "Downtime notice finished: {} delivered, {} unreachable, {} failed",
        report.delivered, report.unreachable, report.failed
    );
    report
}

/// Spawns the fan-out next to the serving loop when `downtime` warrants it.
pub fn schedule_downtime_notice<T, F>(
    transport: Arc<T>,
    directory: Directory,
    downtime: Downtime,
    policy: FanoutPolicy,
    render: F,
) -> Option<JoinHandle<FanoutReport>>
where
    T: ChatTransport + ?Sized + 'static,
    F: Fn(&str) -> String + Send + 'static,
{
    if !downtime.warrants_notice(policy.min_downtime_secs) {
        debug!("Downtime {}s below notice threshold", downtime.seconds());
        return None;
    }

    Some(tokio::spawn(notify_downtime(transport, directory, downtime, policy.throttle, render)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "0 minutes");
        assert_eq!(format_seconds(59), "0 minutes");
        assert_eq!(format_seconds(90), "1 minute");
        assert_eq!(format_seconds(120), "2 minutes");
        assert_eq!(format_seconds(3600), "1 hour");
        assert_eq!(format_seconds(3661), "1 hour, 1 minute");
        assert_eq!(format_seconds(90_000), "1 day, 1 hour");
        assert_eq!(format_seconds(2 * 86_400 + 5 * 60), "2 days, 5 minutes");
        assert_eq!(format_seconds(86_400 * 3 + 3600 * 2 + 60 * 3), "3 days, 2 hours, 3 minutes");
    }

    #[test]
    fn test_format_negative_is_sentinel() {
        assert_eq!(format_seconds(-1), UNKNOWN_DURATION);
        assert_eq!(format_seconds(i64::MIN), UNKNOWN_DURATION);
        assert!(!format_seconds(-3600).contains('-'));
    }
}
