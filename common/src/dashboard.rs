// common/src/dashboard.rs
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::backend::{BackendClient, TokenSource};
use crate::error::AppError;
use crate::models::UsageStats;

/// Reply style picked on the dashboard. Kept locally, never sent anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Funny,
    #[default]
    Value,
}

impl FromStr for Tone {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "funny" => Ok(Tone::Funny),
            "value" => Ok(Tone::Value),
            other => Err(AppError::validation(format!("Unknown tone: {}", other))),
        }
    }
}

#[async_trait]
pub trait UsageSource: Send + Sync + 'static {
    async fn fetch_usage(&self) -> Result<UsageStats, AppError>;
}

#[async_trait]
impl<S: TokenSource + 'static> UsageSource for BackendClient<S> {
    async fn fetch_usage(&self) -> Result<UsageStats, AppError> {
        self.usage().await
    }
}

/// Periodic usage refresh behind the dashboard quota cards.
///
/// Fetches immediately, then once per interval. Ticks do not wait for each
/// other, so the last fetch to resolve wins. A failed fetch is logged and
/// keeps the previous snapshot. Dropping the poller stops the loop and
/// cancels fetches still in flight.
pub struct UsagePoller {
    latest: watch::Receiver<Option<UsageStats>>,
    task: JoinHandle<()>,
}

impl UsagePoller {
    pub fn spawn<U: UsageSource>(source: Arc<U>, interval: Duration) -> Self {
        let (tx, latest) = watch::channel(None);
        let tx = Arc::new(tx);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let source = source.clone();
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            match source.fetch_usage().await {
                                Ok(usage) => {
                                    tx.send_replace(Some(usage));
                                }
                                Err(e) => tracing::warn!("Error fetching usage: {}", e),
                            }
                        });
                    }
                    // Reap finished fetches so the set stays small
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                }
            }
        });

        Self { latest, task }
    }

    /// Most recent successful snapshot
    pub fn latest(&self) -> Option<UsageStats> {
        self.latest.borrow().clone()
    }

    /// Wait for the next published snapshot. `None` once the poller stops.
    pub async fn next_snapshot(&mut self) -> Option<UsageStats> {
        loop {
            self.latest.changed().await.ok()?;
            if let Some(usage) = self.latest.borrow_and_update().clone() {
                return Some(usage);
            }
        }
    }

    /// Receiver that observes every published snapshot
    pub fn watch(&self) -> watch::Receiver<Option<UsageStats>> {
        self.latest.clone()
    }
}

impl Drop for UsagePoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Plays back a script of results, then repeats the last one
    struct Scripted {
        calls: AtomicUsize,
        script: Mutex<Vec<Result<UsageStats, AppError>>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<UsageStats, AppError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
            })
        }
    }

    #[async_trait]
    impl UsageSource for Scripted {
        async fn fetch_usage(&self) -> Result<UsageStats, AppError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let script = self.script.lock().unwrap();
            match &script[n.min(script.len() - 1)] {
                Ok(usage) => Ok(usage.clone()),
                Err(_) => Err(AppError::backend(Some(500), "boom")),
            }
        }
    }

    fn usage(daily_used: u64) -> UsageStats {
        UsageStats {
            daily_used,
            daily_goal: 10,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_fetches_immediately_and_on_interval() {
        let source = Scripted::new(vec![Ok(usage(1)), Ok(usage(2))]);
        let poller = UsagePoller::spawn(source.clone(), Duration::from_secs(10));
        let mut rx = poller.watch();

        rx.changed().await.unwrap();
        assert_eq!(poller.latest(), Some(usage(1)));

        rx.changed().await.unwrap();
        assert_eq!(poller.latest(), Some(usage(2)));
        assert!(source.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_snapshot() {
        let source = Scripted::new(vec![
            Ok(usage(3)),
            Err(AppError::Internal("x".into())),
        ]);
        let poller = UsagePoller::spawn(source.clone(), Duration::from_secs(10));
        let mut rx = poller.watch();
        rx.changed().await.unwrap();

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert!(source.calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(poller.latest(), Some(usage(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_snapshot_follows_updates() {
        let source = Scripted::new(vec![Ok(usage(1)), Ok(usage(2))]);
        let mut poller = UsagePoller::spawn(source, Duration::from_secs(10));

        assert_eq!(poller.next_snapshot().await, Some(usage(1)));
        assert_eq!(poller.next_snapshot().await, Some(usage(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let source = Scripted::new(vec![Ok(usage(1))]);
        let poller = UsagePoller::spawn(source.clone(), Duration::from_secs(10));
        let mut rx = poller.watch();
        rx.changed().await.unwrap();

        drop(poller);
        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_tone_defaults_to_value() {
        assert_eq!(Tone::default(), Tone::Value);
        assert_eq!("Funny".parse::<Tone>().unwrap(), Tone::Funny);
        assert!("sarcastic".parse::<Tone>().is_err());
    }
}
