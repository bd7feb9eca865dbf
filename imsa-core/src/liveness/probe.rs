use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Reachability check: short TCP connects to well-known endpoints.
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    pub targets: Vec<SocketAddr>,
    pub connect_timeout: Duration,
    pub retries: u32,
    pub retry_wait: Duration,
}

impl NetworkProbe {
    /// One round: succeeds as soon as any target accepts a connection.
    fn attempt(&self) -> bool {
        self.targets.iter().any(|target| {
            match TcpStream::connect_timeout(target, self.connect_timeout) {
                Ok(_) => true,
                Err(e) => {
                    debug!("Probe {} failed: {}", target, e);
                    false
                }
            }
        })
    }

    /// Blocking check using the whole retry budget.
    pub fn is_available(&self) -> bool {
        let attempts = self.retries.max(1);
        for attempt in 1..=attempts {
            if self.attempt() {
                return true;
            }
            warn!("Network probe attempt {}/{} failed", attempt, attempts);
            if attempt < attempts {
                thread::sleep(self.retry_wait);
            }
        }
        false
    }

    /// Async wrapper for use on the main runtime.
    pub async fn check(&self) -> bool {
        let probe = self.clone();
        tokio::task::spawn_blocking(move || probe.is_available())
            .await
            .unwrap_or(false)
    }

    /// Repeats `check` until the network answers.
    pub async fn wait_until_available(&self) {
        while !self.check().await {
            warn!("Network unavailable, waiting {:?} before next check", self.retry_wait);
            tokio::time::sleep(self.retry_wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    /// Address that refuses connections: bind, read the port, release it.
    fn refused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    fn probe(targets: Vec<SocketAddr>, retries: u32) -> NetworkProbe {
        NetworkProbe {
            targets,
            connect_timeout: Duration::from_millis(200),
            retries,
            retry_wait: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_reachable_target() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let p = probe(vec![refused_addr(), listener.local_addr().unwrap()], 3);
        assert!(p.is_available());
    }

    #[test]
    fn test_unreachable_uses_full_budget() {
        let p = probe(vec![refused_addr(), refused_addr()], 3);
        let started = Instant::now();
        assert!(!p.is_available());
        // two waits between three attempts
        assert!(started.elapsed() >= Duration::from_millis(40));
        // idempotent
        assert!(!p.is_available());
    }

    #[tokio::test]
    async fn test_async_check() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        assert!(probe(vec![listener.local_addr().unwrap()], 1).check().await);
        assert!(!probe(vec![refused_addr()], 1).check().await);
    }
}
