use imsa_core::liveness::{measure_downtime, Downtime};
use imsa_core::notify::{fan_out, notify_downtime, schedule_downtime_notice, FanoutPolicy, FanoutReport};
use imsa_core::{RegisteredUser, Role};
use imsa_devkit::{Failure, TestHarness};
use std::time::Duration;

const THROTTLE: Duration = Duration::from_millis(40);

fn policy() -> FanoutPolicy {
    FanoutPolicy { min_downtime_secs: 60, throttle: THROTTLE }
}

fn render(duration: &str) -> String {
    format!("back after {}", duration)
}

#[tokio::test]
async fn test_sends_are_throttled() {
    let h = TestHarness::new(1).await.unwrap();
    let users: Vec<RegisteredUser> = (10..14)
        .map(|id| RegisteredUser { telegram_id: id, name: format!("u{}", id), role: Role::User })
        .collect();

    let report = fan_out(h.transport.as_ref(), &users, "hello", THROTTLE).await;
    assert_eq!(report.delivered, 4);

    let sent = h.transport.sent();
    assert_eq!(h.transport.recipients(), vec![10, 11, 12, 13]);
    for pair in sent.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= THROTTLE);
    }
}

#[tokio::test]
async fn test_failures_do_not_stop_fanout() {
    let h = TestHarness::new(1).await.unwrap();
    h.seed_users(&[(20, "blocked", Role::User), (21, "flaky", Role::User), (22, "ok", Role::Admin)])
        .await
        .unwrap();
    h.transport.fail_for(20, Failure::Unreachable);
    h.transport.fail_for(21, Failure::Transport);

    let report = notify_downtime(h.transport.clone(), h.directory.clone(), Downtime(3600), THROTTLE, render).await;

    assert_eq!(report, FanoutReport { delivered: 2, unreachable: 1, failed: 1 });
    // owner first, then in registration order
    assert_eq!(h.transport.recipients(), vec![1, 22]);
    let attempts = h.transport.attempts();
    assert_eq!(attempts.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![1, 20, 21, 22]);
    // failed sends are paced like delivered ones
    for pair in attempts.windows(2) {
        assert!(pair[1].1.duration_since(pair[0].1) >= THROTTLE);
    }
    assert_eq!(h.transport.sent()[0].text, "back after 1 hour");
}

#[tokio::test]
async fn test_short_downtime_is_not_announced() {
    let h = TestHarness::new(1).await.unwrap();

    for seconds in [0, 30, 60] {
        let handle =
            schedule_downtime_notice(h.transport.clone(), h.directory.clone(), Downtime(seconds), policy(), render);
        assert!(handle.is_none(), "{}s should not be announced", seconds);
    }
    assert!(h.transport.attempts().is_empty());
}

#[tokio::test]
async fn test_long_or_corrupted_downtime_is_announced() {
    let h = TestHarness::new(1).await.unwrap();

    let handle = schedule_downtime_notice(h.transport.clone(), h.directory.clone(), Downtime(61), policy(), render)
        .expect("61s is above the threshold");
    assert_eq!(handle.await.unwrap().delivered, 1);

    let handle = schedule_downtime_notice(h.transport.clone(), h.directory.clone(), Downtime(-5), policy(), render)
        .expect("negative downtime is announced");
    assert_eq!(handle.await.unwrap().delivered, 1);

    let texts: Vec<String> = h.transport.sent().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["back after 1 minute", "back after unknown time"]);
}

#[tokio::test]
async fn test_heartbeat_to_notice() {
    let h = TestHarness::new(1).await.unwrap();
    let file = h.heartbeat_file();

    // first run, nothing to announce
    assert_eq!(measure_downtime(&file, 1_000), Downtime(0));

    file.write(1_000).unwrap();
    let downtime = measure_downtime(&file, 1_000 + 2 * 86_400 + 300);
    let handle = schedule_downtime_notice(h.transport.clone(), h.directory.clone(), downtime, policy(), render)
        .expect("two days is announced");
    handle.await.unwrap();

    assert_eq!(h.transport.sent()[0].text, "back after 2 days, 5 minutes");
}
