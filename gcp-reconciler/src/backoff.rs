//! Per-key exponential requeue delays for failed reconciles.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

/// `base * 2^failures`, capped at `max`.
pub fn calculate_backoff(failures: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

/// Counts the consecutive failures of every key.
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Backoff { base, max, failures: Mutex::new(HashMap::new()) }
    }

    /// Record a failure of `key` and return how long to wait before retrying it.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(key.to_string()).or_insert(0);
        let delay = calculate_backoff(*count, self.base, self.max);
        *count = count.saturating_add(1);
        delay
    }

    /// Forget the failures of `key` after it reconciled.
    pub fn reset(&self, key: &str) {
        self.failures.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
    }
}
