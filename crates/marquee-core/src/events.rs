// ── Typed in-process event bus ──
//
// Topics the engine publishes and consumes, with explicit channel types:
// screen-changed and slide-done are broadcast, region-scoped content is a
// per-region `watch` channel so late subscribers receive the current
// slide list immediately.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures_core::Stream;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;

use crate::model::Slide;

const SCREEN_CHANNEL_CAPACITY: usize = 16;
const SLIDE_DONE_CHANNEL_CAPACITY: usize = 256;

/// Slide-lifecycle egress from a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDone {
    pub region_id: String,
    pub instance_id: String,
    pub execution_id: String,
}

/// The engine's event bus.
///
/// Created once and shared by the orchestrator, the region scheduler, and
/// every region playback machine. Subscription lifetimes are tied to the
/// receiving component: dropping a receiver unsubscribes it.
pub struct EventBus {
    screen_tx: broadcast::Sender<Arc<crate::model::Screen>>,
    slide_done_tx: broadcast::Sender<SlideDone>,
    regions: DashMap<String, watch::Sender<Arc<Vec<Arc<Slide>>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (screen_tx, _) = broadcast::channel(SCREEN_CHANNEL_CAPACITY);
        let (slide_done_tx, _) = broadcast::channel(SLIDE_DONE_CHANNEL_CAPACITY);

        Self {
            screen_tx,
            slide_done_tx,
            regions: DashMap::new(),
        }
    }

    // ── Screen topic ─────────────────────────────────────────────────

    /// Emit a screen-changed event carrying the full screen.
    pub fn emit_screen(&self, screen: Arc<crate::model::Screen>) {
        // Ignore send errors -- just means no active subscribers right now
        let _ = self.screen_tx.send(screen);
    }

    pub fn subscribe_screen(&self) -> broadcast::Receiver<Arc<crate::model::Screen>> {
        self.screen_tx.subscribe()
    }

    // ── Slide-done topic ─────────────────────────────────────────────

    pub fn emit_slide_done(&self, done: SlideDone) {
        let _ = self.slide_done_tx.send(done);
    }

    pub fn subscribe_slide_done(&self) -> broadcast::Receiver<SlideDone> {
        self.slide_done_tx.subscribe()
    }

    // ── Region-scoped content ────────────────────────────────────────

    /// Publish a region's slide list, creating the channel on first use.
    pub fn publish_region(&self, region_id: &str, slides: Vec<Slide>) {
        let slides: Arc<Vec<Arc<Slide>>> =
            Arc::new(slides.into_iter().map(Arc::new).collect());
        self.region_sender(region_id).send_replace(slides);
    }

    /// Subscribe to a region's content channel, creating it on first use.
    ///
    /// The receiver starts with whatever was last published (empty for a
    /// region nothing has been published to yet).
    pub fn subscribe_region(&self, region_id: &str) -> watch::Receiver<Arc<Vec<Arc<Slide>>>> {
        self.region_sender(region_id).subscribe()
    }

    /// Tear down a region's content channel.
    ///
    /// Existing subscribers observe the channel closing and idle out.
    pub fn remove_region(&self, region_id: &str) {
        self.regions.remove(region_id);
    }

    fn region_sender(&self, region_id: &str) -> watch::Sender<Arc<Vec<Arc<Slide>>>> {
        self.regions
            .entry(region_id.to_owned())
            .or_insert_with(|| watch::channel(Arc::new(Vec::new())).0)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// `Stream` adapter over a region's content channel.
///
/// Yields a new slide-list snapshot each time the region's content is
/// republished.
pub struct RegionContentStream {
    inner: WatchStream<Arc<Vec<Arc<Slide>>>>,
}

impl RegionContentStream {
    pub fn new(receiver: watch::Receiver<Arc<Vec<Arc<Slide>>>>) -> Self {
        Self {
            inner: WatchStream::new(receiver),
        }
    }
}

impl Stream for RegionContentStream {
    type Item = Arc<Vec<Arc<Slide>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
