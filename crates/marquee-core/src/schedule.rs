// ── Region scheduling contract ──
//
// The orchestrator never talks to region machines directly; per-region
// content updates and removals flow through this contract. Cross-region
// timing (shared playlists, synchronized transitions) lives behind it
// and is out of scope here.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::events::EventBus;
use crate::model::RegionData;

/// Receives per-region content updates and removals.
pub trait RegionScheduler: Send + Sync {
    /// Replace a region's playback payload.
    fn update_region(&self, region_id: &str, data: RegionData);

    /// A region has been removed from the screen.
    fn region_removed(&self, region_id: &str);
}

/// Lifecycle state of a region slot.
///
/// "Removed" and "never populated" are distinct: a slot the scheduler has
/// never seen simply has no entry, while a removed one is remembered so a
/// late update is recognized as a repopulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSlot {
    Populated,
    Removed,
}

/// Scheduler that forwards region content onto the event bus.
pub struct BusScheduler {
    bus: Arc<EventBus>,
    slots: DashMap<String, RegionSlot>,
}

impl BusScheduler {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            slots: DashMap::new(),
        }
    }

    /// Current slot state for a region, `None` if never populated.
    pub fn slot(&self, region_id: &str) -> Option<RegionSlot> {
        self.slots.get(region_id).map(|s| *s)
    }
}

impl RegionScheduler for BusScheduler {
    fn update_region(&self, region_id: &str, data: RegionData) {
        if self.slot(region_id) == Some(RegionSlot::Removed) {
            debug!(region = %region_id, "repopulating previously removed region");
        }
        self.slots
            .insert(region_id.to_owned(), RegionSlot::Populated);
        self.bus.publish_region(region_id, data.slides);
    }

    fn region_removed(&self, region_id: &str) {
        self.slots.insert(region_id.to_owned(), RegionSlot::Removed);
        self.bus.remove_region(region_id);
    }
}
