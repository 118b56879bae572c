use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window request limiter keyed by client.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// `max_requests == 0` disables limiting.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests as usize,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request from `client` and reports whether it is allowed.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        if self.max_requests == 0 {
            return true;
        }
        let cutoff = now.checked_sub(self.window);
        let mut hits = self
            .hits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Forget clients that have been quiet for a whole window
        hits.retain(|_, times| times.last().is_some_and(|t| Some(*t) > cutoff));

        let times = hits.entry(client.to_string()).or_default();
        times.retain(|t| Some(*t) > cutoff);
        if times.len() >= self.max_requests {
            tracing::warn!(client, requests = times.len(), "rate limit exceeded");
            return false;
        }
        times.push(now);
        true
    }
}
