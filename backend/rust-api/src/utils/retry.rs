use std::time::Duration;

#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Tuned for writes that must not give up early (progress persistence).
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 7,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    /// Next backoff step: doubled, capped, with optional random jitter.
    pub fn next_backoff(&self, current: Duration) -> (Duration, Duration) {
        let wait = match self.jitter_max {
            Some(jitter_max) => {
                let jitter_ms = jitter_max.as_millis() as u64;
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::random::<u64>() % (jitter_ms + 1)
                };
                current + Duration::from_millis(extra)
            }
            None => current,
        };
        (wait, std::cmp::min(current * 2, self.max_backoff))
    }
}

pub async fn retry_async_with_config<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts_left = config.max_attempts;
    let mut backoff = config.base_backoff;

    loop {
        let res = f().await;
        match res {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 {
                    return Err(e);
                }

                let (wait, next) = config.next_backoff(backoff);
                tokio::time::sleep(wait).await;
                backoff = next;
            }
        }
    }
}
