//! Content synchronization and playback scheduling engine for marquee.
//!
//! This crate owns the business logic and reactive infrastructure of the
//! signage player:
//!
//! - **[`Orchestrator`]** — Central hub between sync strategies, the event
//!   bus, and the region scheduler. Computes a structural fingerprint for
//!   every inbound screen and decides between a full screen re-emission
//!   and incremental per-region updates. All signals flow through one
//!   cooperative lane, processed strictly in arrival order.
//!
//! - **[`ConfigCache`]** — Time-boxed, single-flight cache of the remote
//!   configuration document. Concurrent callers share one in-flight
//!   fetch; a failed refresh degrades to the last good value.
//!
//! - **[`RegionPlayback`]** — Per-region slide rotation with
//!   double-buffered look-ahead. Cursor identity is tracked by execution
//!   id, so it survives list replacement with new ordering.
//!
//! - **[`EventBus`]** — Typed topics (screen-changed, slide-done,
//!   per-region content) on `tokio::sync` channels. Subscription
//!   lifetimes are tied to component lifetime.
//!
//! - **Consumed contracts** — [`ReferenceResolver`] (implemented by
//!   `marquee_api::PullClient`) and [`RegionScheduler`] (the bus-backed
//!   [`BusScheduler`] forwards region content and keeps removed regions
//!   distinct from never-populated ones).

pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod model;
pub mod orchestrator;
pub mod playback;
pub mod preview;
pub mod resolver;
pub mod schedule;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConfigCache, ConfigError, ConfigFetcher, HttpConfigFetcher, PlayerConfig};
pub use error::CoreError;
pub use events::{EventBus, RegionContentStream, SlideDone};
pub use fingerprint::Fingerprint;
pub use model::{Region, RegionData, Screen, Slide, ThemeRef};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use playback::{PlaybackCursor, RegionHandle, RegionPlayback, spawn_region};
pub use preview::{screen_for_playlist_preview, screen_for_slide_preview};
pub use resolver::{
    ClientFactory, HttpClientFactory, ReferenceResolver, attach_references_to_slide,
};
pub use schedule::{BusScheduler, RegionScheduler, RegionSlot};
pub use sync::SyncSettings;
