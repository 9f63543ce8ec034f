// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rate-limit cooldown gate.
//!
//! Protects the ads platform from being hammered after it has answered with
//! a rate-limit error. Once tripped, every non-forced request fails fast
//! locally until the cooldown expires.
//!
//! States:
//! - Open: normal operation, requests pass through
//! - CoolingDown: platform throttled us, requests are rejected without a call
//!
//! The gate also throttles the user-facing warning that accompanies a trip,
//! so a burst of rate-limit responses produces a single notice per interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Gate state for metrics/monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Open = 0,
    CoolingDown = 1,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::CoolingDown => write!(f, "cooling_down"),
        }
    }
}

/// Result of tripping the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trip {
    /// Requests are suppressed until this instant
    pub until: Instant,
    /// Whether the caller should surface a warning to the user
    pub notify: bool,
}

#[derive(Debug, Default)]
struct Window {
    until: Option<Instant>,
    last_notice: Option<Instant>,
}

/// A named cooldown gate with call accounting.
pub struct CooldownGate {
    name: String,
    cooldown: Duration,
    notice_interval: Duration,
    window: Mutex<Window>,

    // Metrics
    trips: AtomicU64,
    rejections: AtomicU64,
}

impl CooldownGate {
    pub fn new(name: impl Into<String>, cooldown: Duration, notice_interval: Duration) -> Self {
        Self {
            name: name.into(),
            cooldown,
            notice_interval,
            window: Mutex::new(Window::default()),
            trips: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admit a request, or return the remaining cooldown.
    pub fn check(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let until = self.window.lock().until;
        match until {
            Some(until) if now < until => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                let remaining = until - now;
                debug!(gate = %self.name, remaining_ms = remaining.as_millis() as u64, "Request suppressed by cooldown");
                crate::metrics::record_cooldown_rejection(&self.name);
                Err(remaining)
            }
            _ => Ok(()),
        }
    }

    /// Start (or extend) the cooldown window from now.
    pub fn trip(&self) -> Trip {
        let now = Instant::now();
        let until = now + self.cooldown;
        let mut window = self.window.lock();
        window.until = Some(until);

        let notify = match window.last_notice {
            Some(last) => now.duration_since(last) >= self.notice_interval,
            None => true,
        };
        if notify {
            window.last_notice = Some(now);
        }
        drop(window);

        self.trips.fetch_add(1, Ordering::Relaxed);
        warn!(
            gate = %self.name,
            cooldown_secs = self.cooldown.as_secs(),
            notify,
            "Rate limit hit, suppressing requests"
        );
        crate::metrics::record_rate_limited(&self.name);
        Trip { until, notify }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        match self.cooldown_until() {
            Some(until) if Instant::now() < until => GateState::CoolingDown,
            _ => GateState::Open,
        }
    }

    #[must_use]
    pub fn cooldown_until(&self) -> Option<Instant> {
        self.window.lock().until
    }

    /// Forget the cooldown and the notice throttle.
    pub fn reset(&self) {
        *self.window.lock() = Window::default();
    }

    #[must_use]
    pub fn trips(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }
}
