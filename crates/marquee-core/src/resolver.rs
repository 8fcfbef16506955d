// ── Reference resolution ──
//
// The resolver contract consumed by preview assembly, implemented by the
// pull transport. `attach_references_to_slide` turns a bare slide
// document into a self-contained one: template, feed, media, and theme
// are fetched and attached before any consumer may observe the slide.

use serde_json::Value;
use tracing::debug;
use url::Url;

use marquee_api::{PullClient, TransportConfig};

use crate::error::CoreError;
use crate::model::{Slide, ThemeRef};

/// Fetches arbitrary paths and expands slide sub-resources.
pub trait ReferenceResolver: Send + Sync {
    /// Fetch an arbitrary IRI, returning the raw JSON document.
    fn get_path(&self, path: &str) -> impl Future<Output = Result<Value, CoreError>> + Send;

    /// Fetch the template document referenced by a slide, if any.
    fn get_template_data(
        &self,
        slide: &Slide,
    ) -> impl Future<Output = Result<Option<Value>, CoreError>> + Send;

    /// Fetch the feed payload referenced by a slide, if any.
    fn get_feed_data(
        &self,
        slide: &Slide,
    ) -> impl Future<Output = Result<Option<Value>, CoreError>> + Send;

    /// Fetch one media document by its IRI.
    fn get_media_data(&self, media: &str)
    -> impl Future<Output = Result<Value, CoreError>> + Send;
}

impl ReferenceResolver for PullClient {
    async fn get_path(&self, path: &str) -> Result<Value, CoreError> {
        Ok(PullClient::get_path(self, path).await?)
    }

    async fn get_template_data(&self, slide: &Slide) -> Result<Option<Value>, CoreError> {
        match &slide.template {
            Some(template) => Ok(Some(PullClient::get_path(self, &template.path).await?)),
            None => Ok(None),
        }
    }

    async fn get_feed_data(&self, slide: &Slide) -> Result<Option<Value>, CoreError> {
        match &slide.feed {
            Some(feed) => Ok(Some(PullClient::get_path(self, &feed.path).await?)),
            None => Ok(None),
        }
    }

    async fn get_media_data(&self, media: &str) -> Result<Value, CoreError> {
        Ok(PullClient::get_path(self, media).await?)
    }
}

/// Attach all referenced sub-resources to a slide, in place.
///
/// Steps run in sequence: template, feed, each media id, theme. The media
/// map is rebuilt from scratch so a consumer never observes a partially
/// populated one, and any failure aborts the whole operation.
pub async fn attach_references_to_slide<R: ReferenceResolver>(
    resolver: &R,
    slide: &mut Slide,
) -> Result<(), CoreError> {
    slide.template_data = resolver.get_template_data(slide).await?;
    slide.feed_data = resolver.get_feed_data(slide).await?;

    slide.media_data.clear();
    for media in slide.media.clone() {
        let data = resolver.get_media_data(&media).await?;
        slide.media_data.insert(media, data);
    }

    if let Some(ThemeRef::Path(path)) = &slide.theme {
        debug!(theme = %path, "resolving theme reference");
        let theme = resolver.get_path(path).await?;
        slide.theme = Some(ThemeRef::Inline(theme));
    }

    Ok(())
}

// ── Client construction ──────────────────────────────────────────────

/// Builds resolver clients for a given API endpoint.
///
/// The endpoint comes out of the configuration document at call time, so
/// the orchestrator constructs clients through this factory rather than
/// holding one.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: ReferenceResolver + Clone + Send + Sync + 'static;

    fn client(&self, endpoint: &Url) -> Result<Self::Client, CoreError>;
}

/// Factory producing [`PullClient`]s over a shared transport config.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    transport: TransportConfig,
}

impl HttpClientFactory {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = PullClient;

    fn client(&self, endpoint: &Url) -> Result<Self::Client, CoreError> {
        Ok(PullClient::new(endpoint.as_str(), &self.transport)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    /// Scripted resolver that records the order of every fetch.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedResolver {
        responses: Arc<Mutex<HashMap<String, Value>>>,
        pub(crate) log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedResolver {
        pub(crate) fn with(responses: &[(&str, Value)]) -> Self {
            let map = responses
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect();
            Self {
                responses: Arc::new(Mutex::new(map)),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn resolve(&self, path: &str) -> Result<Value, CoreError> {
            self.log.lock().unwrap().push(path.to_owned());
            self.responses
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| CoreError::Api {
                    message: format!("no fixture for {path}"),
                    status: Some(404),
                })
        }
    }

    impl ReferenceResolver for ScriptedResolver {
        async fn get_path(&self, path: &str) -> Result<Value, CoreError> {
            self.resolve(path)
        }

        async fn get_template_data(&self, slide: &Slide) -> Result<Option<Value>, CoreError> {
            match &slide.template {
                Some(t) => Ok(Some(self.resolve(&t.path)?)),
                None => Ok(None),
            }
        }

        async fn get_feed_data(&self, slide: &Slide) -> Result<Option<Value>, CoreError> {
            match &slide.feed {
                Some(f) => Ok(Some(self.resolve(&f.path)?)),
                None => Ok(None),
            }
        }

        async fn get_media_data(&self, media: &str) -> Result<Value, CoreError> {
            self.resolve(media)
        }
    }

    fn slide_with_refs() -> Slide {
        serde_json::from_value(json!({
            "executionId": "e1",
            "template": { "@id": "/v2/templates/t1" },
            "media": ["/v2/media/m1", "/v2/media/m2"],
            "theme": "/v2/themes/th1"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn attaches_all_references() {
        let resolver = ScriptedResolver::with(&[
            ("/v2/templates/t1", json!({ "id": "t1" })),
            ("/v2/media/m1", json!({ "id": "m1" })),
            ("/v2/media/m2", json!({ "id": "m2" })),
            ("/v2/themes/th1", json!({ "colors": {} })),
        ]);
        let mut slide = slide_with_refs();

        attach_references_to_slide(&resolver, &mut slide)
            .await
            .unwrap();

        assert_eq!(slide.template_data.unwrap()["id"], "t1");
        assert!(slide.feed_data.is_none());
        assert_eq!(slide.media_data.len(), 2);
        assert_eq!(slide.media_data["/v2/media/m1"]["id"], "m1");
        assert_eq!(slide.media_data["/v2/media/m2"]["id"], "m2");
        match slide.theme {
            Some(ThemeRef::Inline(doc)) => assert!(doc["colors"].is_object()),
            other => panic!("theme not resolved: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetches_run_in_document_order() {
        let resolver = ScriptedResolver::with(&[
            ("/v2/templates/t1", json!({})),
            ("/v2/media/m1", json!({})),
            ("/v2/media/m2", json!({})),
            ("/v2/themes/th1", json!({})),
        ]);
        let mut slide = slide_with_refs();

        attach_references_to_slide(&resolver, &mut slide)
            .await
            .unwrap();

        let log = resolver.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "/v2/templates/t1",
                "/v2/media/m1",
                "/v2/media/m2",
                "/v2/themes/th1"
            ]
        );
    }

    #[tokio::test]
    async fn media_failure_aborts_attachment() {
        // m2 has no fixture, so the second media fetch fails.
        let resolver = ScriptedResolver::with(&[
            ("/v2/templates/t1", json!({})),
            ("/v2/media/m1", json!({})),
        ]);
        let mut slide = slide_with_refs();

        let err = attach_references_to_slide(&resolver, &mut slide)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Api { status: Some(404), .. }));
        match slide.theme {
            Some(ThemeRef::Path(_)) => {}
            other => panic!("theme should stay unresolved after abort: {other:?}"),
        }
    }

    #[tokio::test]
    async fn inline_theme_is_left_alone() {
        let resolver = ScriptedResolver::with(&[]);
        let mut slide: Slide = serde_json::from_value(json!({
            "executionId": "e1",
            "theme": { "colors": { "bg": "#fff" } }
        }))
        .unwrap();

        attach_references_to_slide(&resolver, &mut slide)
            .await
            .unwrap();

        assert!(resolver.log.lock().unwrap().is_empty());
        match slide.theme {
            Some(ThemeRef::Inline(doc)) => assert_eq!(doc["colors"]["bg"], "#fff"),
            other => panic!("inline theme mutated: {other:?}"),
        }
    }
}
