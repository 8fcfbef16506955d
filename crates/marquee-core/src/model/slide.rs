// ── Slide ──

use std::collections::HashMap;

use marquee_api::ResourceRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One renderable content unit inside a region's playlist.
///
/// A slide can appear multiple times in a playlist; each scheduled
/// occurrence is identified by its own `execution_id`. Cursor tracking in
/// the playback machine is keyed exclusively on that id, never on list
/// position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// Identity of the slide document itself.
    #[serde(default)]
    pub id: String,

    /// Identity of the slide within a playlist (stable across schedules).
    #[serde(default)]
    pub instance_id: String,

    /// Unique identity of one scheduled occurrence. Backfilled with a
    /// fresh UUID when the payload omits it.
    #[serde(default)]
    pub execution_id: String,

    /// How long the slide plays, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    /// Reference to the template that renders this slide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ResourceRef>,

    /// Reference to an external feed backing this slide, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<ResourceRef>,

    /// IRIs of the media attached to this slide.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,

    /// Resolved template document (attached during preview assembly; in
    /// normal sync it arrives pre-resolved from the sync strategy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_data: Option<serde_json::Value>,

    /// Resolved feed payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_data: Option<serde_json::Value>,

    /// Resolved media documents, keyed by media IRI.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub media_data: HashMap<String, serde_json::Value>,

    /// Theme of the slide: either an IRI still to be resolved, or the
    /// inline theme document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeRef>,

    /// Template-specific content of the slide.
    #[serde(default)]
    pub content: serde_json::Value,

    /// All remaining fields the API sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Slide {
    /// Assign a fresh execution id if the payload didn't carry one.
    pub fn ensure_execution_id(&mut self) {
        if self.execution_id.is_empty() {
            self.execution_id = Uuid::new_v4().to_string();
        }
    }
}

/// A slide theme, as delivered by the API.
///
/// Sync strategies deliver the theme inline; single-resource documents
/// carry only the IRI, which preview assembly resolves in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeRef {
    /// An IRI pointing at the theme document.
    Path(String),
    /// The resolved theme document.
    Inline(serde_json::Value),
}
