//! Routing hot reload from the configuration file.
//!
//! # Data Flow
//! ```text
//! notify event (modify / create)
//!     → load_config       (parse + validate the whole file)
//!     → RoutingFilter     (drop rewrites that leave routing unchanged)
//!     → mpsc channel      → Proxy::reload in the daemon
//! ```
//!
//! Only the routing section is hot: logging, metrics and admin settings are
//! read once at startup. A file that fails to load is reported here and never
//! reaches the proxy.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RoutingConfig;

/// Remembers the last routing section forwarded, so editor save sequences
/// that emit several events for one change produce a single reload.
#[derive(Debug, Default)]
struct RoutingFilter {
    last: Option<RoutingConfig>,
}

impl RoutingFilter {
    fn seeded(initial: Option<RoutingConfig>) -> Self {
        Self { last: initial }
    }

    /// `Some(routing)` when it differs from what was last forwarded.
    fn accept(&mut self, routing: RoutingConfig) -> Option<RoutingConfig> {
        if self.last.as_ref() == Some(&routing) {
            return None;
        }
        self.last = Some(routing.clone());
        Some(routing)
    }
}

/// Watches one configuration file and streams its routing section.
pub struct ConfigWatcher {
    path: PathBuf,
    current: Option<RoutingConfig>,
    routing_tx: mpsc::UnboundedSender<RoutingConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of routing updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RoutingConfig>) {
        let (routing_tx, routing_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current: None,
                routing_tx,
            },
            routing_rx,
        )
    }

    /// Routing the proxy already runs; rewrites matching it are not forwarded.
    pub fn with_current(mut self, routing: RoutingConfig) -> Self {
        self.current = Some(routing);
        self
    }

    /// Start watching. Events arrive on notify's thread; keep the returned
    /// watcher alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            current,
            routing_tx,
        } = self;
        let filter = Mutex::new(RoutingFilter::seeded(current));
        let event_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }

                let routing = match load_config(&event_path) {
                    Ok(config) => config.routing,
                    Err(e) => {
                        tracing::warn!(path = ?event_path, error = %e, "Ignoring unloadable config file");
                        return;
                    }
                };
                let changed = filter
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .accept(routing);
                match changed {
                    Some(routing) => {
                        tracing::info!(path = ?event_path, pools = routing.pools.len(), "Routing change detected");
                        let _ = routing_tx.send(routing);
                    }
                    None => tracing::debug!(path = ?event_path, "Config rewritten without routing changes"),
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
