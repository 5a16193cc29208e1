//! Coalesces bursts of filesystem events into a single rebuild.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::hub::{ClientHub, RELOAD_MESSAGE};

/// Quiet period that must pass after the last event before a rebuild runs.
pub const QUIET_PERIOD: Duration = Duration::from_millis(400);

/// A full site rebuild. Runs on the blocking pool.
pub trait Rebuild: Send + Sync + 'static {
    fn rebuild(&self) -> anyhow::Result<()>;
}

impl<F> Rebuild for F
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn rebuild(&self) -> anyhow::Result<()> {
        self()
    }
}

/// Runs at most one rebuild at a time, with at most one more waiting behind
/// it. Changes that arrive while a rebuild is already waiting are picked up by
/// that waiting rebuild.
pub struct RebuildScheduler {
    quiet: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    running: Arc<tokio::sync::Mutex<()>>,
    queued: Arc<AtomicBool>,
    rebuild: Arc<dyn Rebuild>,
    hub: Arc<ClientHub>,
}

impl RebuildScheduler {
    pub fn new(rebuild: Arc<dyn Rebuild>, hub: Arc<ClientHub>) -> Self {
        Self {
            quiet: QUIET_PERIOD,
            pending: Mutex::new(None),
            running: Arc::new(tokio::sync::Mutex::new(())),
            queued: Arc::new(AtomicBool::new(false)),
            rebuild,
            hub,
        }
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    /// Restart the quiet period. Any rebuild still waiting for its timer is
    /// dropped in favour of this one. Must be called from within a runtime.
    pub fn schedule(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let quiet = self.quiet;
        let rebuild = Arc::clone(&self.rebuild);
        let hub = Arc::clone(&self.hub);
        let running = Arc::clone(&self.running);
        let queued = Arc::clone(&self.queued);
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if queued.swap(true, Ordering::SeqCst) {
                tracing::debug!("Rebuild already queued");
                return;
            }
            // Detached so a later event can only cancel the timer, never a
            // rebuild that already started.
            tokio::spawn(run_rebuild(rebuild, hub, running, queued));
        }));
    }

    /// Drop a rebuild that has not started yet.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }
}

async fn run_rebuild(
    rebuild: Arc<dyn Rebuild>,
    hub: Arc<ClientHub>,
    running: Arc<tokio::sync::Mutex<()>>,
    queued: Arc<AtomicBool>,
) {
    let _guard = running.lock().await;
    // Events from here on need another pass.
    queued.store(false, Ordering::SeqCst);
    tracing::info!("Change detected, rebuilding site");

    match tokio::task::spawn_blocking(move || rebuild.rebuild()).await {
        Ok(Ok(())) => {
            let clients = hub.broadcast(RELOAD_MESSAGE);
            tracing::info!(clients, "Site rebuilt, reload sent");
        }
        Ok(Err(e)) => {
            tracing::error!("Rebuild failed, keeping previous output: {e:#}");
        }
        Err(e) => {
            tracing::error!("Rebuild task did not complete: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const QUIET: Duration = Duration::from_millis(50);

    fn counting(fail: bool) -> (Arc<AtomicUsize>, Arc<dyn Rebuild>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let rebuild = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            if fail {
                anyhow::bail!("broken document");
            }
            Ok(())
        };
        (count, Arc::new(rebuild))
    }

    #[tokio::test]
    async fn test_burst_of_events_rebuilds_once() {
        let hub = Arc::new(ClientHub::new());
        let (_, mut client) = hub.register();
        let (count, rebuild) = counting(false);
        let scheduler = RebuildScheduler::new(rebuild, Arc::clone(&hub)).with_quiet_period(QUIET);

        for _ in 0..5 {
            scheduler.schedule();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(client.try_recv().unwrap(), "reload");
        assert!(client.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_rebuild_sends_no_reload() {
        let hub = Arc::new(ClientHub::new());
        let (_, mut client) = hub.register();
        let (count, rebuild) = counting(true);
        let scheduler = RebuildScheduler::new(rebuild, Arc::clone(&hub)).with_quiet_period(QUIET);

        scheduler.schedule();
        scheduler.schedule();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(client.try_recv().is_err());
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn test_separate_bursts_rebuild_separately() {
        let hub = Arc::new(ClientHub::new());
        let (count, rebuild) = counting(false);
        let scheduler = RebuildScheduler::new(rebuild, hub).with_quiet_period(QUIET);

        scheduler.schedule();
        tokio::time::sleep(Duration::from_millis(250)).await;
        scheduler.schedule();
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_changes_during_slow_rebuild_coalesce() {
        let hub = Arc::new(ClientHub::new());
        let (_, mut client) = hub.register();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let rebuild = move || -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(600));
            Ok(())
        };
        let scheduler = RebuildScheduler::new(Arc::new(rebuild), Arc::clone(&hub)).with_quiet_period(QUIET);

        scheduler.schedule();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Each of these outlives the quiet period while the first rebuild runs.
        for _ in 0..4 {
            scheduler.schedule();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(client.try_recv().unwrap(), "reload");
        assert_eq!(client.try_recv().unwrap(), "reload");
        assert!(client.try_recv().is_err());
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_rebuild() {
        let hub = Arc::new(ClientHub::new());
        let (count, rebuild) = counting(false);
        let scheduler = RebuildScheduler::new(rebuild, hub).with_quiet_period(QUIET);

        scheduler.schedule();
        scheduler.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
