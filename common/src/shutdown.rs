use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cooperative stop signal shared between the process that owns the ingestion
/// worker and the worker itself.
///
/// The owner keeps the controller and hands [`ShutdownController::signal`] to the
/// worker. Requesting a stop is idempotent and stays valid after the worker has
/// exited.
#[derive(Clone, Debug, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

/// Read side of a [`ShutdownController`], polled from inside the worker loop.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        if self.token.is_cancelled() {
            return;
        }
        info!("stop requested for ingestion worker");
        self.token.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            token: self.token.clone(),
        }
    }
}

impl ShutdownSignal {
    pub fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }
}
