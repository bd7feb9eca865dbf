use imsa_core::liveness::Downtime;
use imsa_core::notify::FanoutReport;
use imsa_core::Directory;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotHealth {
    pub uptime_seconds: u64,
    pub downtime_seconds: i64,
    pub directory_ok: bool,
    pub registered_users: Option<usize>,
    pub notice: NoticeStatus,
}

/// Where the downtime notice of this run stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeStatus {
    NotNeeded,
    InProgress,
    Done(FanoutReport),
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    downtime: Downtime,
    notice: Arc<Mutex<NoticeStatus>>,
}

impl HealthTracker {
    pub fn new(downtime: Downtime) -> Self {
        Self {
            start_time: Instant::now(),
            downtime,
            notice: Arc::new(Mutex::new(NoticeStatus::NotNeeded)),
        }
    }

    pub fn mark_notice_started(&self) {
        *self.notice.lock() = NoticeStatus::InProgress;
    }

    pub fn mark_notice_done(&self, report: FanoutReport) {
        *self.notice.lock() = NoticeStatus::Done(report);
    }

    pub async fn get_health(&self, directory: &Directory) -> BotHealth {
        let directory_ok = directory.ping().await;
        let registered_users = if directory_ok {
            directory.list_users().await.ok().map(|u| u.len())
        } else {
            None
        };

        BotHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            downtime_seconds: self.downtime.seconds(),
            directory_ok,
            registered_users,
            notice: self.notice.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imsa_core::directory::BootstrapAdmin;

    #[tokio::test]
    async fn test_health_snapshot() {
        let dir = Directory::connect_in_memory(BootstrapAdmin { telegram_id: 1, name: "owner".into() })
            .await
            .unwrap();
        let tracker = HealthTracker::new(Downtime(120));

        let h = tracker.get_health(&dir).await;
        assert!(h.directory_ok);
        assert_eq!(h.registered_users, Some(1));
        assert_eq!(h.downtime_seconds, 120);
        assert_eq!(h.notice, NoticeStatus::NotNeeded);

        tracker.mark_notice_started();
        assert_eq!(tracker.get_health(&dir).await.notice, NoticeStatus::InProgress);

        let report = FanoutReport { delivered: 1, unreachable: 0, failed: 0 };
        tracker.mark_notice_done(report.clone());
        assert_eq!(tracker.get_health(&dir).await.notice, NoticeStatus::Done(report));

        dir.close().await;
        let h = tracker.get_health(&dir).await;
        assert!(!h.directory_ok);
        assert_eq!(h.registered_users, None);
    }
}
