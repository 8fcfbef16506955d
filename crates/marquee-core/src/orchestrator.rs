// ── Content orchestrator ──
//
// The hub between sync strategies, the event bus, and the region
// scheduler. Every inbound signal flows through one mpsc lane and is
// processed to completion before the next, so state transitions are
// never preempted mid-execution.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ConfigCache, ConfigFetcher};
use crate::error::CoreError;
use crate::events::EventBus;
use crate::fingerprint::Fingerprint;
use crate::model::Screen;
use crate::preview::{assemble_playlist_preview, assemble_slide_preview};
use crate::resolver::ClientFactory;
use crate::schedule::RegionScheduler;
use crate::sync::{DEFAULT_PULL_INTERVAL, SyncHandle, SyncSettings, pull_task};

const SIGNAL_CHANNEL_SIZE: usize = 64;

// ── Signals ──────────────────────────────────────────────────────────

/// Inbound signals, processed strictly in arrival order.
pub(crate) enum Signal {
    /// A screen payload from a sync strategy (`generation` set) or from
    /// preview assembly (`generation` absent).
    Content {
        screen: Box<Screen>,
        generation: Option<u64>,
    },
    /// Start synchronization, optionally overriding the entry point.
    StartSyncing {
        screen_path: Option<String>,
        respond: oneshot::Sender<Result<(), CoreError>>,
    },
    /// External start-sync request: always stops the running strategy
    /// first and requires a screen path.
    StartSyncRequested { screen_path: Option<String> },
    StopSync,
    RegionReady { id: String },
    RegionRemoved { id: String },
    StartPreview {
        mode: String,
        id: String,
        respond: oneshot::Sender<Result<(), CoreError>>,
    },
}

// ── Handle ───────────────────────────────────────────────────────────

/// Cheaply cloneable ingress handle to a running [`Orchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Signal>,
}

impl OrchestratorHandle {
    /// Start synchronization. Configuration-load failures propagate.
    pub async fn start_syncing(&self, screen_path: Option<String>) -> Result<(), CoreError> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Signal::StartSyncing {
                screen_path,
                respond,
            })
            .await
            .map_err(|_| CoreError::Stopped)?;
        rx.await.map_err(|_| CoreError::Stopped)?
    }

    /// Deliver an external start-sync signal (stops any running strategy
    /// first; a missing screen path is reported and ignored).
    pub async fn request_start_sync(&self, screen_path: Option<String>) {
        let _ = self
            .tx
            .send(Signal::StartSyncRequested { screen_path })
            .await;
    }

    /// Stop synchronization. No-op when nothing is running.
    pub async fn stop_sync(&self) {
        let _ = self.tx.send(Signal::StopSync).await;
    }

    /// Deliver a content payload (used by preview assembly and tests;
    /// sync strategies feed the same signal internally).
    pub async fn content(&self, screen: Screen) {
        let _ = self
            .tx
            .send(Signal::Content {
                screen: Box::new(screen),
                generation: None,
            })
            .await;
    }

    /// A region subscribed and wants its current data.
    pub async fn region_ready(&self, id: &str) {
        let _ = self
            .tx
            .send(Signal::RegionReady { id: id.to_owned() })
            .await;
    }

    /// A region was removed from the screen.
    pub async fn region_removed(&self, id: &str) {
        let _ = self
            .tx
            .send(Signal::RegionRemoved { id: id.to_owned() })
            .await;
    }

    /// Assemble and emit a preview. Resolution failures propagate.
    pub async fn start_preview(&self, mode: &str, id: &str) -> Result<(), CoreError> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Signal::StartPreview {
                mode: mode.to_owned(),
                id: id.to_owned(),
                respond,
            })
            .await
            .map_err(|_| CoreError::Stopped)?;
        rx.await.map_err(|_| CoreError::Stopped)?
    }

    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::Receiver<Signal>) {
        let (tx, rx) = mpsc::channel(SIGNAL_CHANNEL_SIZE);
        (Self { tx }, rx)
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────

/// The content orchestration hub.
///
/// Owns the current screen, its structural fingerprint, and the active
/// sync strategy handle. Run it with [`run()`](Self::run) on a task of
/// its own; interact through the [`OrchestratorHandle`].
pub struct Orchestrator<F: ConfigFetcher, C: ClientFactory> {
    inbox: mpsc::Receiver<Signal>,
    tx: mpsc::Sender<Signal>,
    bus: Arc<EventBus>,
    scheduler: Arc<dyn RegionScheduler>,
    config: ConfigCache<F>,
    clients: C,
    cancel: CancellationToken,
    current_screen: Option<Arc<Screen>>,
    fingerprint: Option<Fingerprint>,
    active: Option<SyncHandle>,
    generations: u64,
}

impl<F: ConfigFetcher, C: ClientFactory> Orchestrator<F, C> {
    pub fn new(
        bus: Arc<EventBus>,
        scheduler: Arc<dyn RegionScheduler>,
        config: ConfigCache<F>,
        clients: C,
    ) -> Self {
        let (tx, inbox) = mpsc::channel(SIGNAL_CHANNEL_SIZE);
        Self {
            inbox,
            tx,
            bus,
            scheduler,
            config,
            clients,
            cancel: CancellationToken::new(),
            current_screen: None,
            fingerprint: None,
            active: None,
            generations: 0,
        }
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Token that stops [`run()`](Self::run) when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The currently synchronized screen, if any.
    pub fn current_screen(&self) -> Option<&Arc<Screen>> {
        self.current_screen.as_ref()
    }

    /// Process signals until the cancel token fires.
    pub async fn run(mut self) {
        info!("content orchestrator started");
        let cancel = self.cancel.clone();

        loop {
            let signal = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                signal = self.inbox.recv() => signal,
            };
            match signal {
                Some(signal) => self.handle_signal(signal).await,
                None => break,
            }
        }

        self.stop_active().await;
        info!("content orchestrator stopped");
    }

    async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Content { screen, generation } => self.on_content(*screen, generation),
            Signal::StartSyncing {
                screen_path,
                respond,
            } => {
                let result = self.start_syncing(screen_path).await;
                let _ = respond.send(result);
            }
            Signal::StartSyncRequested { screen_path } => self.on_start_sync(screen_path).await,
            Signal::StopSync => self.stop_active().await,
            Signal::RegionReady { id } => self.on_region_ready(&id),
            Signal::RegionRemoved { id } => self.on_region_removed(&id),
            Signal::StartPreview { mode, id, respond } => {
                let result = self.start_preview(&mode, &id).await;
                let _ = respond.send(result);
            }
        }
    }

    // ── Sync lifecycle ───────────────────────────────────────────────

    /// Load configuration, merge the optional screen path into the entry
    /// point, and start a fresh pull strategy (replacing any previous one).
    async fn start_syncing(&mut self, screen_path: Option<String>) -> Result<(), CoreError> {
        info!("starting data synchronization");

        let config = self.config.load().await?;
        let strategy = &config.data_strategy.config;

        let entry_point = screen_path
            .or_else(|| strategy.entry_point.clone())
            .ok_or_else(|| CoreError::Sync {
                message: "no screen entry point configured".to_owned(),
            })?;
        let interval = strategy
            .interval
            .map_or(DEFAULT_PULL_INTERVAL, tokio::time::Duration::from_millis);

        // The old strategy must be fully stopped before the new one is
        // constructed; otherwise two could be active at once.
        self.stop_active().await;

        let client = self.clients.client(&config.api_endpoint)?;
        self.generations += 1;
        let generation = self.generations;
        let cancel = self.cancel.child_token();

        let settings = SyncSettings {
            entry_point,
            interval,
        };
        debug!(generation, entry_point = %settings.entry_point, "constructing pull strategy");
        let task = tokio::spawn(pull_task(
            client,
            settings,
            generation,
            self.tx.clone(),
            cancel.clone(),
        ));

        self.active = Some(SyncHandle {
            generation,
            cancel,
            task,
        });
        Ok(())
    }

    /// External start-sync request: stop first, then require a path.
    async fn on_start_sync(&mut self, screen_path: Option<String>) {
        self.stop_active().await;

        let Some(path) = screen_path else {
            error!("start sync requested without a screenPath");
            return;
        };
        info!(screen_path = %path, "event received: start data synchronization");

        if let Err(e) = self.start_syncing(Some(path)).await {
            error!(error = %e, "failed to start data synchronization");
        }
    }

    /// Stop and discard the active strategy. Idempotent.
    async fn stop_active(&mut self) {
        if let Some(handle) = self.active.take() {
            info!(generation = handle.generation, "stopping data synchronization");
            handle.cancel.cancel();
            let _ = handle.task.await;
        }
    }

    // ── Content routing ──────────────────────────────────────────────

    /// The core decision point: full re-emission vs incremental update.
    fn on_content(&mut self, screen: Screen, generation: Option<u64>) {
        if let Some(generation) = generation {
            let active_generation = self.active.as_ref().map(|h| h.generation);
            if active_generation != Some(generation) {
                debug!(
                    generation,
                    "discarding content from a superseded strategy"
                );
                return;
            }
        }

        let screen = Arc::new(screen);
        self.current_screen = Some(Arc::clone(&screen));

        let fingerprint = match Fingerprint::of_screen(&screen) {
            Ok(fp) => fp,
            Err(e) => {
                error!(error = %e, "failed to fingerprint screen");
                return;
            }
        };

        if self.fingerprint.as_ref() == Some(&fingerprint) {
            debug!("screen has not changed; forwarding region data");
            for (region_id, data) in &screen.region_data {
                self.scheduler.update_region(region_id, data.clone());
            }
        } else {
            info!("screen has changed; emitting screen");
            self.fingerprint = Some(fingerprint);
            self.emit_screen(screen);
        }
    }

    /// Emit the screen-changed event.
    fn emit_screen(&self, screen: Arc<Screen>) {
        self.bus.emit_screen(screen);
    }

    // ── Region lifecycle ─────────────────────────────────────────────

    /// Push current data to a region subscribing after the last full
    /// emission.
    fn on_region_ready(&self, region_id: &str) {
        debug!(region = %region_id, "event received: region ready");

        if let Some(screen) = &self.current_screen {
            match screen.region_data.get(region_id) {
                Some(data) => self.scheduler.update_region(region_id, data.clone()),
                None => debug!(region = %region_id, "no content stored for ready region"),
            }
        }
    }

    fn on_region_removed(&self, region_id: &str) {
        debug!(region = %region_id, "event received: region removed");
        self.scheduler.region_removed(region_id);
    }

    // ── Preview ──────────────────────────────────────────────────────

    /// Assemble and emit a one-off preview screen.
    async fn start_preview(&mut self, mode: &str, id: &str) -> Result<(), CoreError> {
        info!(mode, id, "starting preview");

        let config = self.config.load().await?;

        match mode {
            "screen" => self.start_syncing(Some(format!("/v2/screen/{id}"))).await,
            "playlist" => {
                let client = self.clients.client(&config.api_endpoint)?;
                let screen = assemble_playlist_preview(&client, id).await?;
                self.on_content(screen, None);
                Ok(())
            }
            "slide" => {
                let client = self.clients.client(&config.api_endpoint)?;
                let screen = assemble_slide_preview(&client, id).await?;
                self.on_content(screen, None);
                Ok(())
            }
            other => {
                error!(mode = other, "unsupported preview mode");
                Ok(())
            }
        }
    }
}
