// ── Pull synchronization strategy ──
//
// Polls the configured screen entry point on a fixed interval and feeds
// each fetched screen to the orchestrator as a content signal. The
// signal carries the strategy's generation id so content from a stopped
// strategy is recognizable and discarded.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::Screen;
use crate::orchestrator::Signal;
use crate::resolver::ReferenceResolver;

/// Poll interval when the configuration document doesn't set one.
pub(crate) const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(15);

/// Handle identifying one running sync strategy.
///
/// The generation id guards against late-arriving content from a
/// strategy that has already been replaced.
pub(crate) struct SyncHandle {
    pub(crate) generation: u64,
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

/// Settings a strategy instance runs with, assembled from the
/// configuration document plus any per-start overrides.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Screen path to poll.
    pub entry_point: String,
    /// Poll interval.
    pub interval: Duration,
}

/// Polling loop of the pull strategy.
///
/// A failed poll keeps the last delivered content on screen and retries
/// at the next tick.
pub(crate) async fn pull_task<C: ReferenceResolver>(
    client: C,
    settings: SyncSettings,
    generation: u64,
    inbox: mpsc::Sender<Signal>,
    cancel: CancellationToken,
) {
    debug!(
        generation,
        entry_point = %settings.entry_point,
        interval_ms = settings.interval.as_millis() as u64,
        "pull strategy started"
    );

    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match fetch_screen(&client, &settings.entry_point).await {
            Ok(screen) => {
                let signal = Signal::Content {
                    screen: Box::new(screen),
                    generation: Some(generation),
                };
                if inbox.send(signal).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, entry_point = %settings.entry_point, "screen fetch failed; keeping last content");
            }
        }
    }

    debug!(generation, "pull strategy stopped");
}

async fn fetch_screen<C: ReferenceResolver>(
    client: &C,
    entry_point: &str,
) -> Result<Screen, CoreError> {
    let doc = client.get_path(entry_point).await?;
    let mut screen: Screen = serde_json::from_value(doc)?;
    screen.ensure_execution_ids();
    Ok(screen)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resolver::tests::ScriptedResolver;

    #[tokio::test(start_paused = true)]
    async fn polls_and_delivers_content_signals() {
        let resolver = ScriptedResolver::with(&[(
            "/v2/screen/sc1",
            json!({
                "id": "/v2/screens/sc1",
                "regions": [{ "id": "r1", "gridArea": ["a"] }],
                "regionData": { "r1": { "slides": [ {} ] } }
            }),
        )]);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let settings = SyncSettings {
            entry_point: "/v2/screen/sc1".into(),
            interval: Duration::from_secs(15),
        };
        let task = tokio::spawn(pull_task(resolver, settings, 7, tx, cancel.clone()));

        // First poll fires immediately.
        let Some(Signal::Content { screen, generation }) = rx.recv().await else {
            panic!("expected a content signal");
        };
        assert_eq!(generation, Some(7));
        assert_eq!(screen.id, "/v2/screens/sc1");
        // Execution ids are backfilled before delivery.
        assert!(!screen.region_data["r1"].slides[0].execution_id.is_empty());

        // Next tick delivers again.
        let Some(Signal::Content { generation, .. }) = rx.recv().await else {
            panic!("expected a second content signal");
        };
        assert_eq!(generation, Some(7));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_delivers_nothing_and_retries() {
        // No fixture at all: every poll fails.
        let resolver = ScriptedResolver::with(&[]);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let settings = SyncSettings {
            entry_point: "/v2/screen/missing".into(),
            interval: Duration::from_secs(15),
        };
        let task = tokio::spawn(pull_task(
            resolver.clone(),
            settings,
            1,
            tx,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(rx.try_recv().is_err());
        // It kept polling despite the failures.
        assert!(resolver.log.lock().unwrap().len() >= 2);

        cancel.cancel();
        task.await.unwrap();
    }
}
