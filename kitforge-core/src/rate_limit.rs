//! Fixed-window rate limiting for mutation endpoints
//!
//! Each limiter keeps its own `identifier → {count, reset_at}` table. A check
//! opens a fresh window when none exists or the stored one has expired, then
//! admits and counts the request only while `count < limit`.
//!
//! This is a fixed window, not a sliding log: a burst straddling a window
//! boundary can admit up to twice the nominal rate.
//!
//! Expired windows are dropped by [`RateLimiter::sweep_expired`], which
//! [`RateLimiter::spawn_sweeper`] runs on an interval.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{KitforgeError, Result};

/// Limiter settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub const fn new(requests_per_window: u32, window_ms: u64) -> Self {
        Self {
            requests_per_window,
            window_ms,
        }
    }

    /// Preset for create/update/delete endpoints: 10 per minute
    pub const fn mutation() -> Self {
        Self::new(10, 60_000)
    }

    /// Preset for generation endpoints: 5 per minute
    pub const fn generation() -> Self {
        Self::new(5, 60_000)
    }

    pub fn validate(&self) -> Result<()> {
        if self.requests_per_window == 0 {
            return Err(KitforgeError::Validation(
                "requests_per_window must be at least 1".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(KitforgeError::Validation(
                "window_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Admission decision for one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Unix time in milliseconds when the current window ends
    pub reset_at: i64,
    pub limit: u32,
}

impl RateLimitDecision {
    /// Convert a rejection into the typed error callers propagate
    pub fn into_result(self, identifier: &str) -> Result<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(KitforgeError::RateLimited {
                identifier: identifier.to_string(),
                remaining: self.remaining,
                reset_at: self.reset_at,
                limit: self.limit,
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: i64,
}

impl Window {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_at
    }
}

/// A fixed-window limiter with its own independent store
#[derive(Debug, Clone)]
pub struct RateLimiter {
    name: String,
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Check and count a request for `identifier` at the current time
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_at(identifier, now_ms())
    }

    /// Check and count a request at an explicit time (milliseconds)
    ///
    /// The check and the increment happen under one lock, so concurrent
    /// callers cannot both take the last slot.
    pub fn check_at(&self, identifier: &str, now_ms: i64) -> RateLimitDecision {
        let limit = self.config.requests_per_window;
        let mut windows = self.lock();

        let window = windows
            .entry(identifier.to_string())
            .or_insert(Window {
                count: 0,
                reset_at: now_ms.saturating_add(self.window_ms()),
            });
        if window.is_expired(now_ms) {
            *window = Window {
                count: 0,
                reset_at: now_ms.saturating_add(self.window_ms()),
            };
        }

        let allowed = window.count < limit;
        if allowed {
            window.count += 1;
        }
        let decision = RateLimitDecision {
            allowed,
            remaining: limit.saturating_sub(window.count),
            reset_at: window.reset_at,
            limit,
        };

        if allowed {
            trace!(
                "[{}] admitted {} ({} remaining)",
                self.name,
                identifier,
                decision.remaining
            );
        } else {
            debug!(
                "[{}] rejected {} until {}",
                self.name, identifier, decision.reset_at
            );
        }
        decision
    }

    /// Drop every expired window; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now_ms())
    }

    pub fn sweep_expired_at(&self, now_ms: i64) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| !w.is_expired(now_ms));
        let removed = before - windows.len();
        if removed > 0 {
            debug!("[{}] swept {} expired windows", self.name, removed);
        }
        removed
    }

    /// Number of identifiers currently tracked
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` on the
    /// current tokio runtime until the returned guard is dropped
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperGuard {
        let limiter = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.sweep_expired();
            }
        });
        SweeperGuard { handle }
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window_ms).unwrap_or(i64::MAX)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        // A panic while holding the lock cannot leave a window half-written
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Aborts the sweeper task when dropped
#[derive(Debug)]
pub struct SweeperGuard {
    handle: JoinHandle<()>,
}

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
