//! Per-subject rate limiting for OTP dispatch.
//!
//! The provider rate-limits OTP issuance on its side; this limiter rejects
//! obviously abusive resend loops before they reach the provider at all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_sends: u32,
    pub window_secs: u64,
}

#[derive(Debug)]
struct RateLimitEntry {
    sends: u32,
    window_start: SystemTime,
}

/// Sliding-window counter keyed by subject id.
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records a dispatch attempt for `subject_id` and returns false when the
    /// window budget is exhausted.
    pub async fn check(&self, subject_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = SystemTime::now();
        let window = Duration::from_secs(self.config.window_secs);

        // Drop entries whose window has already passed.
        entries.retain(|_, entry| {
            now.duration_since(entry.window_start)
                .map(|elapsed| elapsed < window)
                .unwrap_or(false)
        });

        match entries.get_mut(subject_id) {
            Some(entry) => {
                if entry.sends >= self.config.max_sends {
                    warn!("OTP send rate limit exceeded for subject {}", subject_id);
                    false
                } else {
                    entry.sends += 1;
                    true
                }
            }
            None => {
                entries.insert(
                    subject_id.to_string(),
                    RateLimitEntry {
                        sends: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }
}
