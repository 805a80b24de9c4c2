//! Cache proxy daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                   CACHE PROXY                     │
//!                    │                                                   │
//!   Client request   │  ┌──────────────┐   ┌─────────┐   ┌───────────┐  │
//!   ─────────────────┼─▶│ TypedContext │──▶│ routing │──▶│ transport │──┼──▶ Cache
//!                    │  │  (context)   │   │  tree   │   │           │  │    servers
//!                    │  └──────┬───────┘   └────┬────┘   └───────────┘  │
//!                    │         │ reply once     │ pinned snapshot        │
//!   Client reply     │         ▼                ▼                        │
//!   ◀────────────────┼── ReplySink        RoutingSnapshot ◀── reload     │
//!                    │                                                   │
//!                    │  ┌─────────────────────────────────────────────┐ │
//!                    │  │ config · stats · logging · admin · lifecycle│ │
//!                    │  └─────────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use cache_proxy::admin::{setup_admin_router, AdminState};
use cache_proxy::config::{load_config, ConfigWatcher, ProxyConfig};
use cache_proxy::lifecycle::{signals, startup, Shutdown, Signal};
use cache_proxy::observability::logging::init_tracing;
use cache_proxy::proxy::Proxy;
use cache_proxy::transport::MemoryTransport;

#[derive(Parser)]
#[command(name = "cache-proxy")]
#[command(about = "Protocol-routing cache proxy", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    init_tracing(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        pools = config.routing.pools.len(),
        "cache-proxy starting"
    );

    tracing::warn!("No wire transport linked in, using in-process loopback backends");
    let proxy = startup::start(&config, Arc::new(MemoryTransport::new()))?;
    let shutdown = Shutdown::new();

    // Held for the life of the process; dropping it stops file watching.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.with_current(config.routing.clone()).run()?;
            let proxy = Arc::clone(&proxy);
            tokio::spawn(async move {
                while let Some(routing) = updates.recv().await {
                    let _ = proxy.reload(&routing);
                }
            });
            Some(handle)
        }
        None => None,
    };

    {
        let proxy = Arc::clone(&proxy);
        let shutdown = shutdown.clone();
        let path = args.config.clone();
        tokio::spawn(async move {
            loop {
                match signals::next_signal().await {
                    Signal::Shutdown => {
                        shutdown.trigger();
                        break;
                    }
                    Signal::Reload => reload_from(&proxy, path.as_deref()),
                }
            }
        });
    }

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(AdminState::new(Arc::clone(&proxy), &config.admin.api_key));
        let shutdown = shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
    } else {
        shutdown.wait().await;
    }

    tracing::info!(
        contexts_alive = proxy.stats().contexts_alive(),
        "Shutdown complete"
    );
    Ok(())
}

fn reload_from(proxy: &Proxy, path: Option<&Path>) {
    let Some(path) = path else {
        tracing::info!("Reload requested but no config file was given");
        return;
    };
    match load_config(path) {
        Ok(config) => {
            let _ = proxy.reload(&config.routing);
        }
        Err(e) => tracing::error!(error = %e, "Failed to reload config, keeping current configuration"),
    }
}
