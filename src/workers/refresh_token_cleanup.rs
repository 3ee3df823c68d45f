use crate::error::AppError;
use crate::storage::RefreshTokenStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Reaps expired refresh records on a fixed interval, independent of request
/// traffic. Safe to run concurrently with any request-driven operation: it
/// only removes records that signature/expiry checks already refuse.
pub struct RefreshTokenCleanupWorker {
    store: Arc<dyn RefreshTokenStore>,
    cleanup_interval_secs: u64,
}

impl std::fmt::Debug for RefreshTokenCleanupWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenCleanupWorker")
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenCleanupWorker {
    #[must_use]
    pub fn new(store: Arc<dyn RefreshTokenStore>, cleanup_interval_secs: u64) -> Self {
        Self { store, cleanup_interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.cleanup_interval_secs == 0 {
            tracing::info!("Refresh token cleanup is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.cleanup_interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_cleanup()
                        .instrument(tracing::info_span!("run_refresh_token_cleanup"))
                        .await
                    {
                        tracing::error!(error = ?e, "Refresh token cleanup iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Refresh token cleanup loop shutting down...");
    }

    /// Deletes every refresh record past its expiry. Idempotent; never
    /// surfaces an error to any user-facing path.
    ///
    /// # Errors
    /// Returns an error only if the store itself fails.
    #[tracing::instrument(skip(self), err, fields(expired_deleted = tracing::field::Empty))]
    pub async fn perform_cleanup(&self) -> Result<(), AppError> {
        tracing::debug!("Running refresh token cleanup...");

        match self.store.delete_expired().await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(count = %count, "Deleted expired refresh tokens");
                    tracing::Span::current().record("expired_deleted", count);
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = ?e, "Cleanup error (refresh tokens)");
                Err(e)
            }
        }
    }
}
