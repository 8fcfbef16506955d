// ── Screen, Region, RegionData ──

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::slide::Slide;

/// A remote screen definition: static region layout plus the mutable
/// per-region playback payloads.
///
/// `region_data` changes on nearly every sync cycle; everything else is
/// structural and only changes when the screen is re-edited. Change
/// detection hashes the structural part only (see
/// [`Fingerprint`](crate::fingerprint::Fingerprint)).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Static layout slots of the screen.
    #[serde(default)]
    pub regions: Vec<Region>,

    /// Playback payloads, keyed by region id.
    #[serde(default)]
    pub region_data: HashMap<String, RegionData>,

    /// All remaining fields the API sends (layout metadata, …).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Screen {
    /// Backfill execution ids on every slide of every region.
    ///
    /// Cursor tracking is keyed on `execution_id`, so a payload without
    /// them would collapse all occurrences of a slide into one.
    pub fn ensure_execution_ids(&mut self) {
        for data in self.region_data.values_mut() {
            for slide in &mut data.slides {
                slide.ensure_execution_id();
            }
        }
    }
}

/// A fixed layout slot that plays a rotating sequence of slides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,

    /// Named grid areas this region spans.
    #[serde(default)]
    pub grid_area: Vec<String>,
}

/// The playback payload of one region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionData {
    #[serde(default)]
    pub slides: Vec<Slide>,
}
