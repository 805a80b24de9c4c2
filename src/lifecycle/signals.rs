//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP asks for a config reload, not shutdown
//! - Non-unix platforms only see Ctrl-C

/// What a received signal asks the process to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Reload,
}

/// Wait for the next signal of interest.
#[cfg(unix)]
pub async fn next_signal() -> Signal {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut hup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
        (Ok(term), Ok(hup)) => (term, hup),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to install signal handlers, only Ctrl-C is handled");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        signal = ctrl_c() => signal,
        _ = term.recv() => {
            tracing::info!("SIGTERM received");
            Signal::Shutdown
        }
        _ = hup.recv() => {
            tracing::info!("SIGHUP received");
            Signal::Reload
        }
    }
}

#[cfg(not(unix))]
pub async fn next_signal() -> Signal {
    ctrl_c().await
}

async fn ctrl_c() -> Signal {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
    }
    Signal::Shutdown
}
