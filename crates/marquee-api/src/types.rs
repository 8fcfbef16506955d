// Wire types for the signage API.
//
// The API speaks JSON-LD (API Platform style): collections arrive in a
// `hydra:member` envelope and resource references carry an `@id` IRI.
// Uses `#[serde(flatten)]` to capture all fields beyond the core set,
// so nothing from the server is silently dropped.

use serde::{Deserialize, Serialize};

/// A JSON-LD collection envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    /// The items of the collection.
    #[serde(rename = "hydra:member", default = "Vec::new")]
    pub member: Vec<T>,

    /// Total item count across all pages, if the server reports one.
    #[serde(rename = "hydra:totalItems", default)]
    pub total_items: Option<u64>,

    /// All remaining fields (`hydra:view` pagination links, context, …).
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// A reference to another resource, addressed by its IRI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRef {
    /// IRI of the referenced resource, e.g. `"/v2/templates/abc"`.
    #[serde(rename = "@id")]
    pub path: String,

    /// All remaining fields of the reference object.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// One entry of a playlist's slide collection.
///
/// The collection endpoint wraps each slide in a join document carrying
/// ordering metadata; the embedded `slide` is the document consumers want.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSlide {
    /// The embedded slide document.
    pub slide: serde_json::Value,

    /// Position of the slide within the playlist, if the server orders it.
    #[serde(default)]
    pub weight: Option<i64>,

    /// All remaining fields of the join document.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Error response shape from the signage API.
///
/// API Platform reports errors as `hydra:description`; plain deployments
/// use a bare `message` field. Both are accepted.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(rename = "hydra:description", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
