//! Per-agent trailing-window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use a2e_core::AgentId;

/// Longest window tracked; records are trimmed to it on every access.
const TRIM_WINDOW: Duration = Duration::from_secs(86_400);

/// Rate-limit thresholds for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    pub api_calls_per_minute: u32,
    pub api_calls_per_hour: u32,
    /// Minimum inter-request gap, when throttling is enabled.
    #[serde(default)]
    pub throttle: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1_000,
            requests_per_day: 10_000,
            api_calls_per_minute: 30,
            api_calls_per_hour: 500,
            throttle: None,
        }
    }
}

/// A refused request: which window refused it and when to come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub window: &'static str,
    pub limit: u32,
    pub retry_after: Duration,
}

/// Per-window limits/usage/remaining, for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub agent_id: AgentId,
    pub limits: WindowCounts,
    pub usage: WindowCounts,
    pub remaining: WindowCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WindowCounts {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    pub api_calls_per_minute: u32,
    pub api_calls_per_hour: u32,
}

#[derive(Debug, Default)]
struct AgentRateRecord {
    requests: VecDeque<Instant>,
    api_calls: VecDeque<Instant>,
}

impl AgentRateRecord {
    fn trim(&mut self, now: Instant) {
        let cutoff = now.checked_sub(TRIM_WINDOW);
        let Some(cutoff) = cutoff else { return };
        while self.requests.front().is_some_and(|t| *t < cutoff) {
            self.requests.pop_front();
        }
        while self.api_calls.front().is_some_and(|t| *t < cutoff) {
            self.api_calls.pop_front();
        }
    }

    fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.api_calls.is_empty()
    }
}

/// Count of timestamps within `window` of `now`.
fn count_within(times: &VecDeque<Instant>, now: Instant, window: Duration) -> u32 {
    times
        .iter()
        .rev()
        .take_while(|t| now.duration_since(**t) < window)
        .count() as u32
}

/// When the oldest in-window timestamp ages out, the count drops below the
/// limit; that is the earliest admissible instant.
fn retry_after(times: &VecDeque<Instant>, now: Instant, window: Duration) -> Duration {
    let oldest_in_window = times
        .iter()
        .find(|t| now.duration_since(**t) < window)
        .copied();
    match oldest_in_window {
        Some(oldest) => window.saturating_sub(now.duration_since(oldest)),
        None => Duration::from_millis(1),
    }
}

/// Trailing-window rate limiter keyed by agent.
///
/// Each agent's record is mutated only under the table lock, keeping the
/// trim-then-append sequence atomic. The clock is injectable so the
/// monotonicity property can be checked over a frozen clock.
pub struct RateLimiter {
    default_config: RateLimitConfig,
    custom: Mutex<HashMap<AgentId, RateLimitConfig>>,
    records: Mutex<HashMap<AgentId, AgentRateRecord>>,
    clock: Box<dyn Fn() -> Instant + Send + Sync>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            default_config: config,
            custom: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
            clock: Box::new(Instant::now),
        }
    }

    /// Replace the clock (tests).
    pub fn with_clock(mut self, clock: impl Fn() -> Instant + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Per-agent overrides replace the default thresholds entirely.
    pub fn set_agent_limits(&self, agent: AgentId, config: RateLimitConfig) {
        info!(agent = %agent, "set custom rate limits");
        self.custom.lock().insert(agent, config);
    }

    /// Drop an agent's history and overrides.
    pub fn reset_agent(&self, agent: &AgentId) {
        self.records.lock().remove(agent);
        self.custom.lock().remove(agent);
        info!(agent = %agent, "reset rate limits");
    }

    fn config_for(&self, agent: &AgentId) -> RateLimitConfig {
        self.custom
            .lock()
            .get(agent)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone())
    }

    /// Admit or refuse one request. A request is admitted iff every
    /// applicable window count is strictly below its limit; admission
    /// records the request. The returned duration, when present, is the
    /// throttle pause the caller should await before proceeding.
    pub fn check(&self, agent: &AgentId, is_api_call: bool) -> Result<Option<Duration>, Refusal> {
        let config = self.config_for(agent);
        let now = (self.clock)();

        let mut records = self.records.lock();
        let record = records.entry(agent.clone()).or_default();
        record.trim(now);

        let request_windows: [(&'static str, Duration, u32); 3] = [
            ("minute", Duration::from_secs(60), config.requests_per_minute),
            ("hour", Duration::from_secs(3_600), config.requests_per_hour),
            ("day", Duration::from_secs(86_400), config.requests_per_day),
        ];
        for (name, window, limit) in request_windows {
            if count_within(&record.requests, now, window) >= limit {
                return Err(Refusal {
                    window: name,
                    limit,
                    retry_after: retry_after(&record.requests, now, window),
                });
            }
        }

        if is_api_call {
            let api_windows: [(&'static str, Duration, u32); 2] = [
                (
                    "api-calls-minute",
                    Duration::from_secs(60),
                    config.api_calls_per_minute,
                ),
                (
                    "api-calls-hour",
                    Duration::from_secs(3_600),
                    config.api_calls_per_hour,
                ),
            ];
            for (name, window, limit) in api_windows {
                if count_within(&record.api_calls, now, window) >= limit {
                    return Err(Refusal {
                        window: name,
                        limit,
                        retry_after: retry_after(&record.api_calls, now, window),
                    });
                }
            }
        }

        let previous = record.requests.back().copied();
        record.requests.push_back(now);
        if is_api_call {
            record.api_calls.push_back(now);
        }

        // Throttle: enforce a minimum gap between consecutive requests.
        // The limiter never sleeps itself; the caller awaits the pause.
        if let (Some(min_gap), Some(previous)) = (config.throttle, previous) {
            let elapsed = now.duration_since(previous);
            if elapsed < min_gap {
                return Ok(Some(min_gap - elapsed));
            }
        }

        Ok(None)
    }

    /// Current limits, usage, and remaining budget per window.
    pub fn status(&self, agent: &AgentId) -> RateLimitStatus {
        let config = self.config_for(agent);
        let now = (self.clock)();

        let mut records = self.records.lock();
        let record = records.entry(agent.clone()).or_default();
        record.trim(now);

        let minute = Duration::from_secs(60);
        let hour = Duration::from_secs(3_600);
        let day = Duration::from_secs(86_400);

        let usage = WindowCounts {
            requests_per_minute: count_within(&record.requests, now, minute),
            requests_per_hour: count_within(&record.requests, now, hour),
            requests_per_day: count_within(&record.requests, now, day),
            api_calls_per_minute: count_within(&record.api_calls, now, minute),
            api_calls_per_hour: count_within(&record.api_calls, now, hour),
        };
        let limits = WindowCounts {
            requests_per_minute: config.requests_per_minute,
            requests_per_hour: config.requests_per_hour,
            requests_per_day: config.requests_per_day,
            api_calls_per_minute: config.api_calls_per_minute,
            api_calls_per_hour: config.api_calls_per_hour,
        };
        let remaining = WindowCounts {
            requests_per_minute: limits.requests_per_minute.saturating_sub(usage.requests_per_minute),
            requests_per_hour: limits.requests_per_hour.saturating_sub(usage.requests_per_hour),
            requests_per_day: limits.requests_per_day.saturating_sub(usage.requests_per_day),
            api_calls_per_minute: limits
                .api_calls_per_minute
                .saturating_sub(usage.api_calls_per_minute),
            api_calls_per_hour: limits.api_calls_per_hour.saturating_sub(usage.api_calls_per_hour),
        };

        RateLimitStatus {
            agent_id: agent.clone(),
            limits,
            usage,
            remaining,
        }
    }

    /// Evict records whose windows are empty.
    pub fn evict_idle(&self) {
        let now = (self.clock)();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| {
            record.trim(now);
            !record.is_empty()
        });
        let evicted = before - records.len();
        if evicted > 0 {
            debug!(evicted, "evicted idle rate-limit records");
        }
    }

    /// Number of tracked agents (after an idle sweep, for tests).
    pub fn tracked_agents(&self) -> usize {
        self.records.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_agents", &self.records.lock().len())
            .finish()
    }
}
