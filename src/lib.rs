//! # Campaign Sync
//!
//! Client-side sync core for an ads campaign manager: a three-level campaign
//! tree loaded lazily from an ads platform, a warm-start cache, derived issue
//! and recommendation views, and optimistic mutations with rollback.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SyncOrchestrator                        │
//! │  • select(account, range) cancels the previous selection   │
//! │  • staged preload, recent activity, issue review           │
//! │  • blended progress via a watch channel                    │
//! └─────────────────────────────────────────────────────────────┘
//!            │                    │                    │
//!            ▼                    ▼                    ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │  FetchScheduler  │ │    CacheLayer    │ │ Recommendation   │
//! │  • fast → basic  │ │  • SQLite / mem  │ │ Engine           │
//! │  • timeouts      │ │  • zstd + sha256 │ │  • rules         │
//! │  • 429 cooldown  │ │  • advisory only │ │  • confirm/apply │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//!            │                                         │
//!            ▼                                         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HierarchyStore                         │
//! │  • campaigns → ad groups → line items                      │
//! │  • per-node fetch state, generation-checked merges         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use campaign_sync::{AdsApi, SyncConfig, SyncOrchestrator};
//! use campaign_sync::cache::CacheLayer;
//! use campaign_sync::model::{AccountKey, Campaign, DateRange};
//!
//! async fn run(api: Arc<dyn AdsApi>, range: DateRange, campaigns: Vec<Campaign>) {
//!     let config = SyncConfig::default();
//!     let cache = CacheLayer::from_config(&config).await;
//!     let sync = SyncOrchestrator::new(config, api, cache);
//!
//!     sync.select(AccountKey::new("act_123"), range, campaigns).await;
//!     if let Some(report) = sync.run_preload().await {
//!         println!("loaded {} nodes, {}%", report.fetched, sync.percentage());
//!     }
//!
//!     for rec in sync.recommendations().pending() {
//!         println!("{:?}: {}", rec.severity, rec.title);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`sync`]: The [`SyncOrchestrator`] tying everything to one selection
//! - [`scheduler`]: Platform reads with fallback, timeouts and cooldown
//! - [`hierarchy`]: The campaign tree, sorting and row selection
//! - [`cache`]: Warm-start persistence (SQLite, memory)
//! - [`issues`]: Policy and delivery issue detection
//! - [`recommendations`]: Optimization rules and their apply lifecycle
//! - [`resilience`]: Rate-limit cooldown gate, retry
//! - [`api`]: The ads platform contract

pub mod api;
pub mod cache;
pub mod config;
pub mod hierarchy;
pub mod issues;
pub mod metrics;
pub mod model;
pub mod recommendations;
pub mod resilience;
pub mod scheduler;
pub mod sync;

pub use api::{ActivityEntry, AdsApi, ApiError, BidUpdate, FetchMode};
pub use config::SyncConfig;
pub use hierarchy::{HierarchyStore, NodeKey};
pub use issues::{Issue, IssueKind, IssueSeverity};
pub use recommendations::{ApplyError, ApplyOutcome, RecommendationEngine, Recommendation};
pub use resilience::{CooldownGate, RetryConfig};
pub use scheduler::{FetchError, FetchOutcome, FetchScheduler, SyncNotice};
pub use sync::{BatchResult, PreloadReport, StageState, SyncOrchestrator, SyncState};
