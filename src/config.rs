// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the campaign sync core.
//!
//! # Example
//!
//! ```
//! use campaign_sync::SyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.preload_campaign_limit, 8);
//! assert_eq!(config.rate_limit_cooldown_secs, 60);
//!
//! // Tuned config
//! let config = SyncConfig {
//!     preload_campaign_limit: 4,
//!     cache_path: Some("./campaign_cache.db".into()),
//!     ..Default::default()
//! };
//! ```

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Deserialize;

/// Configuration for the sync core.
///
/// All fields have defaults matching the platform's observed rate limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Max ACTIVE campaigns visited by the background preload
    #[serde(default = "default_preload_campaign_limit")]
    pub preload_campaign_limit: usize,

    /// Max ad groups per campaign whose line items are preloaded
    #[serde(default = "default_preload_adgroup_limit")]
    pub preload_adgroup_limit: usize,

    /// Pause between sibling fetches during preload (randomized in range)
    #[serde(default = "default_sibling_pause_min_ms")]
    pub sibling_pause_min_ms: u64,
    #[serde(default = "default_sibling_pause_max_ms")]
    pub sibling_pause_max_ms: u64,

    /// Hierarchy fetch timeouts
    #[serde(default = "default_fast_timeout_ms")]
    pub fast_timeout_ms: u64,
    #[serde(default = "default_basic_timeout_ms")]
    pub basic_timeout_ms: u64,

    /// Timeout for lightweight polls (activity, issue report)
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Local suppression window after a rate-limit response
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,

    /// Minimum spacing between user-facing rate-limit warnings
    #[serde(default = "default_rate_limit_notice_interval_secs")]
    pub rate_limit_notice_interval_secs: u64,

    /// How long a non-critical recommendation waits for the second click
    #[serde(default = "default_confirm_window_ms")]
    pub confirm_window_ms: u64,

    /// Recency window and cap for the recent-activity fetch
    #[serde(default = "default_activity_window_days")]
    pub activity_window_days: u32,
    #[serde(default = "default_activity_limit")]
    pub activity_limit: usize,

    /// SQLite file for the persistent warm-start cache (None = in-memory only)
    #[serde(default)]
    pub cache_path: Option<String>,
}

fn default_preload_campaign_limit() -> usize { 8 }
fn default_preload_adgroup_limit() -> usize { 10 }
fn default_sibling_pause_min_ms() -> u64 { 260 }
fn default_sibling_pause_max_ms() -> u64 { 360 }
fn default_fast_timeout_ms() -> u64 { 12_000 }
fn default_basic_timeout_ms() -> u64 { 10_000 }
fn default_poll_timeout_ms() -> u64 { 8_000 }
fn default_rate_limit_cooldown_secs() -> u64 { 60 }
fn default_rate_limit_notice_interval_secs() -> u64 { 120 }
fn default_confirm_window_ms() -> u64 { 3_000 }
fn default_activity_window_days() -> u32 { 3 }
fn default_activity_limit() -> usize { 25 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            preload_campaign_limit: default_preload_campaign_limit(),
            preload_adgroup_limit: default_preload_adgroup_limit(),
            sibling_pause_min_ms: default_sibling_pause_min_ms(),
            sibling_pause_max_ms: default_sibling_pause_max_ms(),
            fast_timeout_ms: default_fast_timeout_ms(),
            basic_timeout_ms: default_basic_timeout_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            rate_limit_notice_interval_secs: default_rate_limit_notice_interval_secs(),
            confirm_window_ms: default_confirm_window_ms(),
            activity_window_days: default_activity_window_days(),
            activity_limit: default_activity_limit(),
            cache_path: None,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn fast_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_timeout_ms)
    }

    #[must_use]
    pub fn basic_timeout(&self) -> Duration {
        Duration::from_millis(self.basic_timeout_ms)
    }

    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    #[must_use]
    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    #[must_use]
    pub fn rate_limit_notice_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_notice_interval_secs)
    }

    #[must_use]
    pub fn confirm_window(&self) -> Duration {
        Duration::from_millis(self.confirm_window_ms)
    }

    /// Sibling pause bounds in millis, tolerating a reversed min/max.
    #[must_use]
    pub fn sibling_pause_range(&self) -> RangeInclusive<u64> {
        let lo = self.sibling_pause_min_ms.min(self.sibling_pause_max_ms);
        let hi = self.sibling_pause_min_ms.max(self.sibling_pause_max_ms);
        lo..=hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.preload_campaign_limit, 8);
        assert_eq!(config.preload_adgroup_limit, 10);
        assert_eq!(config.sibling_pause_range(), 260..=360);
        assert_eq!(config.fast_timeout(), Duration::from_secs(12));
        assert!(config.basic_timeout() < config.fast_timeout());
        assert_eq!(config.poll_timeout(), Duration::from_secs(8));
        assert_eq!(config.confirm_window(), Duration::from_millis(3000));
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"preload_campaign_limit": 3, "cache_path": "/tmp/c.db"}"#)
                .unwrap();
        assert_eq!(config.preload_campaign_limit, 3);
        assert_eq!(config.preload_adgroup_limit, 10);
        assert_eq!(config.cache_path.as_deref(), Some("/tmp/c.db"));
        assert_eq!(config.rate_limit_notice_interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_reversed_pause_bounds() {
        let config = SyncConfig {
            sibling_pause_min_ms: 400,
            sibling_pause_max_ms: 300,
            ..Default::default()
        };
        assert_eq!(config.sibling_pause_range(), 300..=400);
    }
}
