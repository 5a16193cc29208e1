//! Live-reload development server for Klarity sites.
//!
//! The server builds the site once, serves the output directory, watches the
//! sources and pushes a `reload` message to connected browsers after every
//! successful rebuild.

pub mod debounce;
pub mod hub;
pub mod server;
pub mod watcher;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use klarity_core::{BuildOptions, Config, build_site};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

pub use debounce::{QUIET_PERIOD, Rebuild, RebuildScheduler};
pub use hub::{ClientHub, RELOAD_MESSAGE};
pub use server::{LIVERELOAD_PATH, inject_livereload_script, router};

/// How long in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Produces the configuration for each rebuild, so edits to `klarity.toml`
/// are picked up while the server runs.
pub type ConfigLoader = Arc<dyn Fn() -> Result<Config> + Send + Sync>;

/// Configuration for the live development server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Project root holding `klarity.toml`
    pub project_root: PathBuf,
    /// Auto-open browser
    pub open: bool,
    /// Run the search indexer on every build
    pub search: bool,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: klarity_core::config::DEFAULT_DEV_PORT,
            project_root: PathBuf::from("."),
            open: false,
            search: true,
        }
    }
}

/// Rebuilds the whole site with a freshly loaded configuration.
struct SiteRebuild {
    project_root: PathBuf,
    load_config: ConfigLoader,
    options: BuildOptions,
}

impl Rebuild for SiteRebuild {
    fn rebuild(&self) -> Result<()> {
        let config = (self.load_config)()?.for_dev_server();
        let report = build_site(&self.project_root, &config, &self.options)?;
        tracing::debug!(pages = report.pages, "Rebuild finished");
        Ok(())
    }
}

/// A live-reload static file server
pub struct LiveServer {
    config: LiveServerConfig,
    load_config: ConfigLoader,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig, load_config: ConfigLoader) -> Self {
        Self { config, load_config }
    }

    /// Build, serve and watch until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let LiveServerConfig {
            host,
            port,
            project_root,
            open: open_browser,
            search,
        } = self.config;
        let options = BuildOptions { search };
        // Watch events carry absolute paths.
        let project_root = std::path::absolute(&project_root)
            .map(|path| klarity_core::paths::normalize(&path))
            .with_context(|| format!("invalid project root {}", project_root.display()))?;

        let site_config = (self.load_config)()?.for_dev_server();
        let report = build_site(&project_root, &site_config, &options).context("initial build failed")?;
        tracing::info!(pages = report.pages, output = %report.output_dir.display(), "Initial build complete");

        let hub = Arc::new(ClientHub::new());
        let rebuild = SiteRebuild {
            project_root: project_root.clone(),
            load_config: Arc::clone(&self.load_config),
            options,
        };
        let scheduler = Arc::new(RebuildScheduler::new(Arc::new(rebuild), Arc::clone(&hub)));

        let addr = format!("{host}:{port}");
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("could not bind {addr}"))?;
        let app = router(report.output_dir.clone(), Arc::clone(&hub));

        let (stop_server, server_stopped) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = server_stopped.await;
                })
                .await
        });

        let (stop_watcher, watcher_stopped) = watch::channel(false);
        let watch_task = watcher::spawn_watch_loop(
            project_root.clone(),
            site_config.doc_roots(&project_root),
            Arc::clone(&scheduler),
            watcher_stopped,
        )?;

        let url = format!("http://{addr}");
        tracing::info!("Serving {} at {url}", project_root.display());
        if open_browser && let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser: {e}");
        }

        tokio::select! {
            _ = shutdown_signal() => tracing::info!("Shutting down"),
            result = &mut server => {
                // The server only returns on its own when it failed.
                let _ = stop_watcher.send(true);
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e).context("dev server failed"),
                    Err(e) => Err(e).context("dev server task failed"),
                };
            }
        }

        shut_down(
            stop_watcher,
            watch_task,
            &scheduler,
            &hub,
            stop_server,
            &mut server,
            SHUTDOWN_GRACE,
        )
        .await;

        Ok(())
    }
}

/// Stop watching before anything else so no rebuild starts mid-shutdown.
/// Then drop the live reload clients and give the server `grace` to drain.
async fn shut_down(
    stop_watcher: watch::Sender<bool>,
    watch_task: JoinHandle<()>,
    scheduler: &RebuildScheduler,
    hub: &ClientHub,
    stop_server: oneshot::Sender<()>,
    server: &mut JoinHandle<std::io::Result<()>>,
    grace: Duration,
) {
    let _ = stop_watcher.send(true);
    if let Err(e) = watch_task.await {
        tracing::warn!("File watcher task failed: {e}");
    }
    scheduler.cancel();
    hub.clear();

    let _ = stop_server.send(());
    match tokio::time::timeout(grace, &mut *server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!("Dev server error during shutdown: {e}"),
        Ok(Err(e)) => tracing::warn!("Dev server task failed: {e}"),
        Err(_) => {
            tracing::warn!("Connections still open after {grace:?}, exiting anyway");
            server.abort();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scheduler(hub: &Arc<ClientHub>) -> (Arc<AtomicUsize>, RebuildScheduler) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let rebuild = move || -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        let scheduler =
            RebuildScheduler::new(Arc::new(rebuild), Arc::clone(hub)).with_quiet_period(Duration::from_millis(50));
        (count, scheduler)
    }

    #[tokio::test]
    async fn test_shutdown_stops_watcher_before_server() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let hub = Arc::new(ClientHub::new());
        let (_, mut client) = hub.register();
        let (count, scheduler) = scheduler(&hub);
        scheduler.schedule();

        let (stop_watcher, mut watcher_stopped) = watch::channel(false);
        let watch_order = Arc::clone(&order);
        let watch_task = tokio::spawn(async move {
            let _ = watcher_stopped.changed().await;
            watch_order.lock().unwrap().push("watcher");
        });

        let (stop_server, server_stopped) = oneshot::channel::<()>();
        let server_order = Arc::clone(&order);
        let mut server = tokio::spawn(async move {
            let _ = server_stopped.await;
            server_order.lock().unwrap().push("server");
            Ok::<(), std::io::Error>(())
        });

        shut_down(
            stop_watcher,
            watch_task,
            &scheduler,
            &hub,
            stop_server,
            &mut server,
            Duration::from_secs(1),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(*order.lock().unwrap(), vec!["watcher", "server"]);
        assert!(server.is_finished());
        assert!(hub.is_empty());
        assert_eq!(client.recv().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_server_after_grace() {
        let hub = Arc::new(ClientHub::new());
        let (_, scheduler) = scheduler(&hub);
        let (stop_watcher, _) = watch::channel(false);
        let watch_task = tokio::spawn(async {});
        let (stop_server, _server_stopped) = oneshot::channel::<()>();
        let mut server = tokio::spawn(std::future::pending::<std::io::Result<()>>());

        shut_down(
            stop_watcher,
            watch_task,
            &scheduler,
            &hub,
            stop_server,
            &mut server,
            Duration::from_millis(50),
        )
        .await;

        assert!(server.await.unwrap_err().is_cancelled());
    }
}
