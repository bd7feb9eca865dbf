use tracing::{error, info};

use super::heartbeat::HeartbeatFile;

/// Seconds between the last heartbeat of the previous run and this startup.
///
/// Negative means the stored value lies in the future (clock skew or a corrupted
/// file); it is kept signed so callers can tell that apart from an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Downtime(pub i64);

impl Downtime {
    pub fn seconds(&self) -> i64 {
        self.0
    }

    pub fn is_corrupted(&self) -> bool {
        self.0 < 0
    }

    /// Outages longer than `min_secs`, and corrupted measurements, get a notice.
    pub fn warrants_notice(&self, min_secs: i64) -> bool {
        self.0 > min_secs || self.is_corrupted()
    }
}

/// Reads the heartbeat left by the previous run and compares it with `now`.
///
/// Missing file → 0 (first run). Unreadable or non-numeric content → 0, logged.
/// A value so far off that the difference overflows is reported as corrupted.
pub fn measure_downtime(file: &HeartbeatFile, now: i64) -> Downtime {
    let raw = match file.read_raw() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            info!("Saved timestamp not found");
            return Downtime(0);
        }
        Err(e) => {
            error!("Failed to read saved timestamp {}: {}", file.path().display(), e);
            return Downtime(0);
        }
    };

    match raw.trim().parse::<i64>() {
        Ok(saved) => match now.checked_sub(saved) {
            Some(elapsed) => Downtime(elapsed),
            None => {
                error!("Saved timestamp {} is out of range, treating state as corrupted", saved);
                Downtime(-1)
            }
        },
        Err(_) => {
            error!("Failed to parse saved timestamp: {:?}", raw);
            Downtime(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn heartbeat_in(dir: &tempfile::TempDir) -> HeartbeatFile {
        HeartbeatFile::new(dir.path().join("heartbeat"))
    }

    #[test]
    fn test_elapsed_seconds() {
        let tmp = tempfile::tempdir().unwrap();
        let hb = heartbeat_in(&tmp);
        let t0 = 1_700_000_000;
        hb.write(t0).unwrap();

        for d in [1, 59, 3600, 86_400 * 3] {
            assert_eq!(measure_downtime(&hb, t0 + d), Downtime(d));
        }
    }

    #[test]
    fn test_missing_file_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(measure_downtime(&heartbeat_in(&tmp), 1_700_000_000), Downtime(0));
    }

    #[test]
    fn test_garbage_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let hb = heartbeat_in(&tmp);
        fs::write(hb.path(), "not a number").unwrap();
        assert_eq!(measure_downtime(&hb, 1_700_000_000), Downtime(0));

        fs::write(hb.path(), "").unwrap();
        assert_eq!(measure_downtime(&hb, 1_700_000_000), Downtime(0));
    }

    #[test]
    fn test_future_timestamp_is_negative() {
        let tmp = tempfile::tempdir().unwrap();
        let hb = heartbeat_in(&tmp);
        fs::write(hb.path(), "1700000100\n").unwrap();

        let d = measure_downtime(&hb, 1_700_000_000);
        assert_eq!(d, Downtime(-100));
        assert!(d.is_corrupted());
    }

    #[test]
    fn test_out_of_range_timestamp_is_corrupted() {
        let tmp = tempfile::tempdir().unwrap();
        let hb = heartbeat_in(&tmp);

        fs::write(hb.path(), i64::MIN.to_string()).unwrap();
        let d = measure_downtime(&hb, 1_700_000_000);
        assert!(d.is_corrupted());
        assert!(d.warrants_notice(60));

        fs::write(hb.path(), i64::MAX.to_string()).unwrap();
        assert!(measure_downtime(&hb, -10).is_corrupted());
    }

    #[test]
    fn test_notice_threshold() {
        assert!(Downtime(61).warrants_notice(60));
        assert!(!Downtime(60).warrants_notice(60));
        assert!(!Downtime(0).warrants_notice(60));
        assert!(Downtime(-1).warrants_notice(60));
    }
}
