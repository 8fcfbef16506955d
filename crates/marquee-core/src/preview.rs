// ── Preview screen assembly ──
//
// One-off synthesis of a minimal screen for a single playlist or slide,
// bypassing the normal sync strategy. Every referenced sub-resource is
// attached before the screen exists, so consumers never observe a
// partially resolved preview.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::{Region, RegionData, Screen, Slide};
use crate::resolver::{ReferenceResolver, attach_references_to_slide};

/// Region id used by synthesized preview screens.
const PREVIEW_REGION_ID: &str = "preview";

/// Resolve a playlist and all of its slides into a synthetic screen.
pub(crate) async fn assemble_playlist_preview<R: ReferenceResolver>(
    resolver: &R,
    playlist_id: &str,
) -> Result<Screen, CoreError> {
    let playlist = resolver
        .get_path(&format!("/v2/playlists/{playlist_id}"))
        .await?;

    let slides_path = playlist
        .get("slides")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("/v2/playlists/{playlist_id}/slides"));

    let collection = resolver.get_path(&slides_path).await?;
    let members = collection
        .get("hydra:member")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut slides = Vec::with_capacity(members.len());
    for member in members {
        // Collection entries wrap the slide in a join document.
        let doc = member.get("slide").cloned().unwrap_or(member);
        let mut slide: Slide = serde_json::from_value(doc)?;
        attach_references_to_slide(resolver, &mut slide).await?;
        slides.push(slide);
    }

    Ok(screen_for_playlist_preview(playlist_id, slides))
}

/// Resolve a single slide into a synthetic one-slide screen.
pub(crate) async fn assemble_slide_preview<R: ReferenceResolver>(
    resolver: &R,
    slide_id: &str,
) -> Result<Screen, CoreError> {
    let doc = resolver.get_path(&format!("/v2/slides/{slide_id}")).await?;
    let mut slide: Slide = serde_json::from_value(doc)?;
    attach_references_to_slide(resolver, &mut slide).await?;

    Ok(screen_for_slide_preview(slide))
}

/// Wrap resolved playlist slides in a single-region screen.
pub fn screen_for_playlist_preview(playlist_id: &str, mut slides: Vec<Slide>) -> Screen {
    for slide in &mut slides {
        slide.ensure_execution_id();
    }
    preview_screen(format!("playlist-preview-{playlist_id}"), slides)
}

/// Wrap one resolved slide in a minimal screen.
pub fn screen_for_slide_preview(mut slide: Slide) -> Screen {
    slide.ensure_execution_id();
    let id = format!("slide-preview-{}", slide.instance_id);
    preview_screen(id, vec![slide])
}

fn preview_screen(id: String, slides: Vec<Slide>) -> Screen {
    Screen {
        id,
        title: None,
        regions: vec![Region {
            id: PREVIEW_REGION_ID.to_owned(),
            grid_area: vec!["a".to_owned()],
        }],
        region_data: HashMap::from([(PREVIEW_REGION_ID.to_owned(), RegionData { slides })]),
        extra: serde_json::Map::new(),
    }
}
