use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
#[cfg(windows)]
use tokio::signal::windows::{ctrl_break, ctrl_c};

/// Wait for a termination signal.
/// If no handler can be installed this never returns.
#[cfg(unix)]
pub async fn wait_for_signal() {
    // SIGTERM is what service managers and containers send
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to create signal handlers: {}", e);
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT signal, initiating graceful shutdown");
        }
    }
}

/// Wait for a termination signal.
/// If no handler can be installed this never returns.
#[cfg(windows)]
pub async fn wait_for_signal() {
    let (mut ctrlc, mut ctrlbreak) = match (ctrl_c(), ctrl_break()) {
        (Ok(ctrlc), Ok(ctrlbreak)) => (ctrlc, ctrlbreak),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to create signal handlers: {}", e);
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = ctrlc.recv() => {
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        }
        _ = ctrlbreak.recv() => {
            info!("Received Ctrl+Break signal, initiating graceful shutdown");
        }
    }
}
