use std::{
    fmt,
    sync::{Arc, OnceLock},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSignal::Interrupt => f.write_str("SIGINT"),
            StopSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Turns the first SIGINT or SIGTERM into a cancellation of the running
/// pipeline. The coordinator checks the token between chunks, so the chunk
/// in flight is still loaded.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    cancel: CancellationToken,
    received: Arc<OnceLock<StopSignal>>,
}

impl ShutdownCoordinator {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            received: Arc::new(OnceLock::new()),
        }
    }

    pub fn register_handlers(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            info!(%signal, "Stop requested, finishing the current chunk");
            this.request(signal);
        });
    }

    /// Record `signal` and cancel. Later calls keep the first signal.
    pub fn request(&self, signal: StopSignal) {
        let _ = self.received.set(signal);
        self.cancel.cancel();
    }

    pub fn received(&self) -> Option<StopSignal> {
        self.received.get().copied()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.received().is_some()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

async fn wait_for_signal() -> StopSignal {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => StopSignal::Interrupt,
        _ = terminate => StopSignal::Terminate,
    }
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ShutdownRequested = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
