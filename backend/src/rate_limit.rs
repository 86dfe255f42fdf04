use std::{
    collections::VecDeque,
    env,
    time::{Duration, Instant},
};

use dashmap::DashMap;

const DEFAULT_MAX_PER_HOUR: usize = 5;
const WINDOW: Duration = Duration::from_secs(60 * 60);

/// Submission quota per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Submissions allowed inside one window; 0 disables the limit.
    pub max_per_window: usize,
    /// Sliding window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: DEFAULT_MAX_PER_HOUR,
            window: WINDOW,
        }
    }
}

impl RateLimitConfig {
    /// Reads `COMMENT_RATE_LIMIT_PER_HOUR`; the window is fixed at one hour.
    pub fn from_env() -> Self {
        let max_per_window = env::var("COMMENT_RATE_LIMIT_PER_HOUR")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_PER_HOUR);
        Self {
            max_per_window,
            window: WINDOW,
        }
    }
}

/// Sliding-window limiter keyed by client address.
///
/// `check` only peeks; callers `record` once the submission was stored, so
/// rejected input does not burn quota. Every `record` also sweeps keys whose
/// hits have all left the window, so the map only holds active clients.
pub struct SubmissionRateLimiter {
    config: RateLimitConfig,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl SubmissionRateLimiter {
    /// Empty limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hits: DashMap::new(),
        }
    }

    /// `Err` carries how long until the oldest hit leaves the window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    /// Counts one stored submission against `key`.
    pub fn record(&self, key: &str) {
        self.record_at(key, Instant::now());
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        if self.config.max_per_window == 0 {
            return Ok(());
        }

        let verdict = match self.hits.get_mut(key) {
            Some(mut entry) => {
                prune(&mut entry, now, self.config.window);
                if entry.len() >= self.config.max_per_window {
                    let oldest = entry.front().copied().unwrap_or(now);
                    Err(self
                        .config
                        .window
                        .saturating_sub(now.saturating_duration_since(oldest)))
                } else {
                    Ok(())
                }
            },
            None => return Ok(()),
        };

        self.hits.remove_if(key, |_, hits| hits.is_empty());
        verdict
    }

    fn record_at(&self, key: &str, now: Instant) {
        if self.config.max_per_window == 0 {
            return;
        }
        // No entry guard may be alive while `retain` locks every shard.
        self.hits.retain(|_, hits| {
            prune(hits, now, self.config.window);
            !hits.is_empty()
        });
        self.hits.entry(key.to_string()).or_default().push_back(now);
    }
}

fn prune(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = hits.front() {
        if now.saturating_duration_since(*oldest) >= window {
            hits.pop_front();
        } else {
            break;
        }
    }
}
