// ── Region playback state machine ──
//
// One instance per visual region. Owns the slide rotation cursor:
// `current` is on screen, `next` is the double-buffered look-ahead the
// renderer preloads. Identity is tracked by execution id, never by list
// position, so a cursor survives list replacement with new ordering.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{EventBus, SlideDone};
use crate::model::Slide;
use crate::orchestrator::OrchestratorHandle;

/// What a region is showing: the playing slide and the preloaded one.
///
/// Both are `None` when the region has no slides (idle).
#[derive(Debug, Clone, Default)]
pub struct PlaybackCursor {
    pub current: Option<Arc<Slide>>,
    pub next: Option<Arc<Slide>>,
}

/// Slide rotation state for one region.
///
/// Idle when `slides` is empty; playing otherwise. With two or more
/// slides `current` and `next` are always distinct occurrences; with a
/// single slide the rotation wraps onto itself (`current == next`).
#[derive(Debug)]
pub struct RegionPlayback {
    region_id: String,
    slides: Vec<Arc<Slide>>,
    current: Option<Arc<Slide>>,
    next: Option<Arc<Slide>>,
}

impl RegionPlayback {
    pub fn new(region_id: impl Into<String>) -> Self {
        Self {
            region_id: region_id.into(),
            slides: Vec::new(),
            current: None,
            next: None,
        }
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn is_idle(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn current(&self) -> Option<&Arc<Slide>> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&Arc<Slide>> {
        self.next.as_ref()
    }

    pub fn cursor(&self) -> PlaybackCursor {
        PlaybackCursor {
            current: self.current.clone(),
            next: self.next.clone(),
        }
    }

    /// Replace the slide list, recomputing the cursor.
    ///
    /// A cursor slide still present in the new list (by execution id) is
    /// kept even if its position moved; a vanished `current` falls back
    /// to the first slide, a vanished `next` to the second.
    pub fn replace_slides(&mut self, slides: &[Arc<Slide>]) {
        let prev_current = self.current.take();
        let prev_next = self.next.take();

        self.slides = slides.to_vec();

        if self.slides.is_empty() {
            debug!(region = %self.region_id, "region has no slides; idling");
            return;
        }

        self.current = prev_current
            .and_then(|slide| self.find_by_execution(&slide.execution_id))
            .or_else(|| self.slides.first().cloned());

        self.next = prev_next
            .and_then(|slide| self.find_by_execution(&slide.execution_id))
            .or_else(|| {
                if self.slides.len() > 1 {
                    self.slides.get(1).cloned()
                } else {
                    self.slides.first().cloned()
                }
            });

        // Keep the look-ahead distinct from the playing slide whenever the
        // rotation has room (a surviving `next` may have collided with a
        // reset `current`).
        if self.slides.len() >= 2 {
            if let (Some(current), Some(next)) = (&self.current, &self.next) {
                if current.execution_id == next.execution_id {
                    self.next = self.slide_after(&current.execution_id);
                }
            }
        }
    }

    /// The currently playing slide finished: advance both cursor slots
    /// circularly and report the finished occurrence.
    pub fn slide_completed(&mut self) -> Option<SlideDone> {
        let finished = self.current.clone()?;

        self.current = self.slide_after(&finished.execution_id);
        self.next = self
            .next
            .take()
            .and_then(|slide| self.slide_after(&slide.execution_id));

        Some(SlideDone {
            region_id: self.region_id.clone(),
            instance_id: finished.instance_id.clone(),
            execution_id: finished.execution_id.clone(),
        })
    }

    fn find_by_execution(&self, execution_id: &str) -> Option<Arc<Slide>> {
        self.slides
            .iter()
            .find(|slide| slide.execution_id == execution_id)
            .cloned()
    }

    /// The slide immediately after the given occurrence, wrapping
    /// circularly. Falls back to the head when the id is gone.
    fn slide_after(&self, execution_id: &str) -> Option<Arc<Slide>> {
        if self.slides.is_empty() {
            return None;
        }
        let index = self
            .slides
            .iter()
            .position(|slide| slide.execution_id == execution_id)
            .unwrap_or(self.slides.len() - 1);
        self.slides.get((index + 1) % self.slides.len()).cloned()
    }
}

// ── Driver task ──────────────────────────────────────────────────────

/// Handle to a running region playback task.
///
/// The rendering collaborator observes the cursor channel, plays the
/// current slide, and calls [`slide_complete`](Self::slide_complete) when
/// it finishes.
pub struct RegionHandle {
    region_id: String,
    completed_tx: mpsc::UnboundedSender<()>,
    cursor_rx: watch::Receiver<PlaybackCursor>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RegionHandle {
    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    /// Signal that the currently playing slide finished.
    pub fn slide_complete(&self) {
        let _ = self.completed_tx.send(());
    }

    /// Subscribe to cursor changes.
    pub fn cursor(&self) -> watch::Receiver<PlaybackCursor> {
        self.cursor_rx.clone()
    }

    /// Tear the region down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the driver task to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawn the playback driver for one region.
///
/// Subscribes to the region's content channel, emits the region-ready
/// signal so the orchestrator can push current data to a late subscriber,
/// then runs the rotation until cancelled or the region is removed.
pub fn spawn_region(
    region_id: impl Into<String>,
    bus: Arc<EventBus>,
    orchestrator: OrchestratorHandle,
    cancel: CancellationToken,
) -> RegionHandle {
    let region_id = region_id.into();
    let (completed_tx, completed_rx) = mpsc::unbounded_channel();
    let (cursor_tx, cursor_rx) = watch::channel(PlaybackCursor::default());

    let task = tokio::spawn(region_task(
        region_id.clone(),
        bus,
        orchestrator,
        cursor_tx,
        completed_rx,
        cancel.clone(),
    ));

    RegionHandle {
        region_id,
        completed_tx,
        cursor_rx,
        cancel,
        task,
    }
}

async fn region_task(
    region_id: String,
    bus: Arc<EventBus>,
    orchestrator: OrchestratorHandle,
    cursor_tx: watch::Sender<PlaybackCursor>,
    mut completed_rx: mpsc::UnboundedReceiver<()>,
    cancel: CancellationToken,
) {
    let mut machine = RegionPlayback::new(region_id.clone());
    let mut content_rx = bus.subscribe_region(&region_id);

    // Apply whatever content was published before this region mounted.
    {
        let slides = content_rx.borrow_and_update().clone();
        machine.replace_slides(&slides);
        let _ = cursor_tx.send(machine.cursor());
    }

    // Notify that the region is ready.
    orchestrator.region_ready(&region_id).await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = content_rx.changed() => match changed {
                Ok(()) => {
                    let slides = content_rx.borrow_and_update().clone();
                    machine.replace_slides(&slides);
                    let _ = cursor_tx.send(machine.cursor());
                }
                // Content channel removed -- the region is gone.
                Err(_) => {
                    machine.replace_slides(&[]);
                    let _ = cursor_tx.send(machine.cursor());
                    break;
                }
            },
            recv = completed_rx.recv() => match recv {
                Some(()) => {
                    if let Some(done) = machine.slide_completed() {
                        bus.emit_slide_done(done);
                    }
                    let _ = cursor_tx.send(machine.cursor());
                }
                None => break,
            },
        }
    }

    debug!(region = %region_id, "region playback task exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn slide(execution_id: &str) -> Arc<Slide> {
        Arc::new(
            serde_json::from_value(json!({
                "instanceId": format!("inst-{execution_id}"),
                "executionId": execution_id
            }))
            .unwrap(),
        )
    }

    fn exec(slide: Option<&Arc<Slide>>) -> &str {
        &slide.unwrap().execution_id
    }

    #[test]
    fn empty_region_is_idle() {
        let mut machine = RegionPlayback::new("r1");
        machine.replace_slides(&[]);

        assert!(machine.is_idle());
        assert!(machine.current().is_none());
        assert!(machine.next().is_none());
        assert!(machine.slide_completed().is_none());
    }

    #[test]
    fn initial_cursor_is_first_and_second() {
        let mut machine = RegionPlayback::new("r1");
        machine.replace_slides(&[slide("a"), slide("b"), slide("c")]);

        assert_eq!(exec(machine.current()), "a");
        assert_eq!(exec(machine.next()), "b");
    }

    #[test]
    fn rotation_advances_circularly() {
        let mut machine = RegionPlayback::new("r1");
        machine.replace_slides(&[slide("a"), slide("b"), slide("c")]);

        let done = machine.slide_completed().unwrap();
        assert_eq!(done.execution_id, "a");
        assert_eq!(done.instance_id, "inst-a");
        assert_eq!(done.region_id, "r1");
        assert_eq!(exec(machine.current()), "b");
        assert_eq!(exec(machine.next()), "c");

        machine.slide_completed().unwrap();
        assert_eq!(exec(machine.current()), "c");
        assert_eq!(exec(machine.next()), "a");
    }

    #[test]
    fn single_slide_wraps_onto_itself() {
        let mut machine = RegionPlayback::new("r1");
        machine.replace_slides(&[slide("a")]);

        assert_eq!(exec(machine.current()), "a");
        assert_eq!(exec(machine.next()), "a");

        machine.slide_completed().unwrap();
        assert_eq!(exec(machine.current()), "a");
        assert_eq!(exec(machine.next()), "a");
    }

    #[test]
    fn replacement_without_overlap_resets_cursor() {
        let mut machine = RegionPlayback::new("r1");
        machine.replace_slides(&[slide("a"), slide("b"), slide("c")]);
        machine.slide_completed().unwrap(); // current=b

        machine.replace_slides(&[slide("x"), slide("y")]);

        assert_eq!(exec(machine.current()), "x");
        assert_eq!(exec(machine.next()), "y");
    }

    #[test]
    fn surviving_cursor_slides_are_kept_across_reorder() {
        let mut machine = RegionPlayback::new("r1");
        machine.replace_slides(&[slide("a"), slide("b"), slide("c")]);
        machine.slide_completed().unwrap(); // current=b, next=c

        // Same occurrences, new order and one newcomer.
        machine.replace_slides(&[slide("c"), slide("d"), slide("b")]);

        assert_eq!(exec(machine.current()), "b");
        assert_eq!(exec(machine.next()), "c");
    }

    #[test]
    fn growing_from_one_slide_keeps_cursor_distinct() {
        let mut machine = RegionPlayback::new("r1");
        machine.replace_slides(&[slide("a")]);
        assert_eq!(exec(machine.next()), "a");

        machine.replace_slides(&[slide("a"), slide("b")]);

        assert_eq!(exec(machine.current()), "a");
        assert_eq!(exec(machine.next()), "b");
    }

    #[tokio::test]
    async fn driver_emits_ready_rotates_and_reports_done() {
        let bus = Arc::new(EventBus::new());
        let (orchestrator, mut inbox) = OrchestratorHandle::detached();
        let mut done_rx = bus.subscribe_slide_done();

        bus.publish_region(
            "r1",
            vec![
                serde_json::from_value(json!({ "instanceId": "i-a", "executionId": "a" }))
                    .unwrap(),
                serde_json::from_value(json!({ "instanceId": "i-b", "executionId": "b" }))
                    .unwrap(),
            ],
        );

        let handle = spawn_region("r1", Arc::clone(&bus), orchestrator, CancellationToken::new());

        // Region-ready reaches the orchestrator inbox.
        let signal = inbox.recv().await.unwrap();
        assert!(matches!(
            signal,
            crate::orchestrator::Signal::RegionReady { ref id } if id == "r1"
        ));

        // Initial cursor from pre-published content.
        let mut cursor_rx = handle.cursor();
        assert_eq!(exec(cursor_rx.borrow_and_update().current.as_ref()), "a");

        handle.slide_complete();
        cursor_rx.changed().await.unwrap();
        assert_eq!(exec(cursor_rx.borrow_and_update().current.as_ref()), "b");

        let done = done_rx.recv().await.unwrap();
        assert_eq!(done.execution_id, "a");
        assert_eq!(done.instance_id, "i-a");

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn region_removal_idles_the_machine() {
        let bus = Arc::new(EventBus::new());
        let (orchestrator, mut inbox) = OrchestratorHandle::detached();

        bus.publish_region(
            "r1",
            vec![serde_json::from_value(json!({ "executionId": "a" })).unwrap()],
        );
        let handle = spawn_region("r1", Arc::clone(&bus), orchestrator, CancellationToken::new());

        // Region-ready marks the initial cursor as published.
        inbox.recv().await.unwrap();

        let mut cursor_rx = handle.cursor();
        assert!(cursor_rx.borrow_and_update().current.is_some());

        bus.remove_region("r1");

        cursor_rx.changed().await.unwrap();
        assert!(cursor_rx.borrow_and_update().current.is_none());
        handle.join().await;
    }
}
