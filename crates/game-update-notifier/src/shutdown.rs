//! Signal handling.
//!
//! SIGINT, SIGTERM and SIGHUP cancel a [`CancellationToken`]; the engine
//! notices it once the current cycle is finished. A second signal exits
//! immediately with status 130.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let count = Arc::new(AtomicU32::new(0));

    let handler_token = token.clone();
    tokio::spawn(async move {
        loop {
            if let Err(e) = next_signal().await {
                tracing::error!(error = %e, "cannot listen for shutdown signals");
                return;
            }

            if count.fetch_add(1, Ordering::SeqCst) == 0 {
                tracing::info!("shutdown requested, stopping after the current cycle");
                tracing::info!("send the signal again to exit immediately");
                handler_token.cancel();
            } else {
                tracing::warn!("forced exit");
                std::process::exit(130);
            }
        }
    });

    token
}

#[cfg(unix)]
async fn next_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
        _ = sighup.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_returns_live_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
    }
}
