use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use crate::client::AssistantClient;

/// Default probe cadence: every 5 minutes
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(300);

/// Periodic liveness probe, independent of message traffic. The send path
/// never touches this; the UI only reads the flag to decide whether to
/// show the degraded-service banner.
pub struct HealthMonitor {
    healthy: AtomicBool,
    last_check: Mutex<Option<DateTime<Utc>>>,
}

impl HealthMonitor {
    /// Start probing on a background task. The first probe runs
    /// immediately, then every `interval`.
    pub fn spawn(client: Arc<AssistantClient>, interval: Duration) -> Arc<Self> {
        let monitor = Arc::new(Self {
            healthy: AtomicBool::new(false),
            last_check: Mutex::new(None),
        });

        let handle = monitor.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                handle.run_probe(&client).await;
            }
        });

        monitor
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        *self.last_check.lock().unwrap()
    }

    async fn run_probe(&self, client: &AssistantClient) {
        let reachable = client.test_connection().await;
        let healthy = if reachable {
            match client.check_health().await {
                Ok(health) => health.is_healthy(),
                Err(e) => {
                    warn!("Health endpoint unavailable: {}", e);
                    false
                }
            }
        } else {
            false
        };

        let was_healthy = self.healthy.swap(healthy, Ordering::Relaxed);
        *self.last_check.lock().unwrap() = Some(Utc::now());

        if healthy && !was_healthy {
            info!("✓ Assistant service available");
        } else if !healthy && was_healthy {
            warn!("Assistant service degraded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_marks_unreachable_backend_degraded() {
        // Nothing listens on the discard port: connection refused
        let client = AssistantClient::new(
            "http://127.0.0.1:9".to_string(),
            "user_001".to_string(),
            Duration::from_secs(1),
        );

        let monitor = HealthMonitor {
            healthy: AtomicBool::new(true),
            last_check: Mutex::new(None),
        };
        monitor.run_probe(&client).await;

        assert!(!monitor.is_healthy());
        assert!(monitor.last_check().is_some());
    }
}
