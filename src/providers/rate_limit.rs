use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Serialized minimum spacing between calls to one provider.
///
/// Callers wait for the remainder of the interval instead of being queued
/// or rejected. The lock is held while sleeping, so concurrent callers go
/// through one at a time.
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    min_interval: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, min_interval: Duration) -> Self {
        Self {
            name,
            min_interval,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Must be awaited before every provider request
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(last_time) = *last_call {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let sleep_duration = self.min_interval - elapsed;
                debug!(
                    provider = self.name,
                    "Rate limit: sleeping for {:?}", sleep_duration
                );
                tokio::time::sleep(sleep_duration).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let limiter = RateLimiter::new("test", Duration::from_secs(10));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_waits_out_the_interval() {
        let limiter = RateLimiter::new("test", Duration::from_secs(10));
        limiter.wait().await;

        tokio::time::advance(Duration::from_secs(4)).await;
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_elapsed() {
        let limiter = RateLimiter::new("test", Duration::from_secs(15));
        limiter.wait().await;

        tokio::time::advance(Duration::from_secs(20)).await;
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
