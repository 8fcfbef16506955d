// ── Structural screen fingerprint ──
//
// Change detection must not react to the frequently-refreshed playback
// payloads, so the hash covers the screen with `regionData` stripped.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

use crate::model::Screen;

/// Base64-encoded SHA-256 over the structural part of a screen.
///
/// Two screens with identical structure but different `region_data` hash
/// identically; only structural change triggers a full re-emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash a screen's structure, ignoring `region_data`.
    pub fn of_screen(screen: &Screen) -> Result<Self, serde_json::Error> {
        let mut value = serde_json::to_value(screen)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("regionData");
        }
        let bytes = serde_json::to_vec(&value)?;
        Ok(Self(BASE64.encode(Sha256::digest(&bytes))))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn screen(region_data: serde_json::Value) -> Screen {
        serde_json::from_value(json!({
            "id": "/v2/screens/sc1",
            "title": "Lobby",
            "regions": [{ "id": "r1", "gridArea": ["a"] }],
            "regionData": region_data
        }))
        .unwrap()
    }

    #[test]
    fn region_data_does_not_affect_fingerprint() {
        let a = screen(json!({ "r1": { "slides": [ { "executionId": "e1" } ] } }));
        let b = screen(json!({ "r1": { "slides": [ { "executionId": "e2" }, {} ] } }));

        assert_eq!(
            Fingerprint::of_screen(&a).unwrap(),
            Fingerprint::of_screen(&b).unwrap()
        );
    }

    #[test]
    fn structural_change_changes_fingerprint() {
        let a = screen(json!({}));
        let mut b = screen(json!({}));
        b.regions.push(crate::model::Region {
            id: "r2".into(),
            grid_area: vec!["b".into()],
        });

        assert_ne!(
            Fingerprint::of_screen(&a).unwrap(),
            Fingerprint::of_screen(&b).unwrap()
        );
    }

    #[test]
    fn title_change_changes_fingerprint() {
        let a = screen(json!({}));
        let mut b = screen(json!({}));
        b.title = Some("Entrance".into());

        assert_ne!(
            Fingerprint::of_screen(&a).unwrap(),
            Fingerprint::of_screen(&b).unwrap()
        );
    }
}
