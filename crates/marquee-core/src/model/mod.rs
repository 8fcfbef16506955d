// ── Domain model ──
//
// Canonical representations of the documents the signage API serves.
// Slides and screens arrive as JSON-LD; unknown fields are kept in
// flattened `extra` maps so round-trips never lose data.

pub mod screen;
pub mod slide;

pub use screen::{Region, RegionData, Screen};
pub use slide::{Slide, ThemeRef};
