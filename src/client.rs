//! File-transfer client layered over the pool.
//!
//! [`Client`] is the piece callers actually touch: each upload or download
//! borrows a channel, runs one transfer on it, and lets the guard return the
//! channel — on success and on failure alike. The transfer operations
//! themselves live behind the [`Transfer`] trait, next to the factory on the
//! transport side of the boundary.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::PoolConfig;
use crate::factory::ChannelFactory;
use crate::pool::{Pool, PoolError};

/// A channel that can move files between the local and remote side.
pub trait Transfer {
    /// Error surfaced by a failed transfer.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Copy a local file to the remote path.
    fn upload(
        &mut self,
        local: &Path,
        remote: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Copy a remote file to the local path.
    fn download(
        &mut self,
        remote: &str,
        local: &Path,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Error returned by [`Client`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError<FE, TE> {
    /// No channel could be borrowed for the transfer.
    #[error("no channel available for transfer")]
    Pool(#[source] PoolError<FE>),

    /// The channel was borrowed but the upload itself failed.
    #[error("failed to upload file from {} to {remote}", local.display())]
    Upload {
        /// Source path on the local side.
        local: PathBuf,
        /// Destination path on the remote side.
        remote: String,
        /// The underlying transfer error.
        #[source]
        source: TE,
    },

    /// The channel was borrowed but the download itself failed.
    #[error("failed to download file from {remote} to {}", local.display())]
    Download {
        /// Source path on the remote side.
        remote: String,
        /// Destination path on the local side.
        local: PathBuf,
        /// The underlying transfer error.
        #[source]
        source: TE,
    },
}

/// Error alias pairing a factory with its channel's transfer error.
pub type TransferError<F> =
    ClientError<<F as ChannelFactory>::Error, <<F as ChannelFactory>::Channel as Transfer>::Error>;

/// A pooled file-transfer client.
///
/// Cloning shares the underlying pool.
pub struct Client<F: ChannelFactory> {
    pool: Pool<F>,
}

impl<F: ChannelFactory> std::fmt::Debug for Client<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("pool", &self.pool).finish()
    }
}

impl<F: ChannelFactory> Clone for Client<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<F> Client<F>
where
    F: ChannelFactory,
    F::Channel: Transfer,
{
    /// Create a client backed by a freshly constructed pool.
    pub async fn new(config: PoolConfig, factory: F) -> Self {
        Self {
            pool: Pool::new(config, factory).await,
        }
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool<F>) -> Self {
        Self { pool }
    }

    /// The pool backing this client, for stats and shutdown.
    pub fn pool(&self) -> &Pool<F> {
        &self.pool
    }

    /// Upload a local file to the remote path on a borrowed channel.
    pub async fn upload(
        &self,
        local: impl AsRef<Path>,
        remote: &str,
    ) -> Result<(), TransferError<F>> {
        let local = local.as_ref();
        let mut channel = self.pool.borrow().await.map_err(ClientError::Pool)?;
        // The guard returns the channel whether or not the transfer fails.
        channel
            .upload(local, remote)
            .await
            .map_err(|source| ClientError::Upload {
                local: local.to_owned(),
                remote: remote.to_owned(),
                source,
            })?;
        debug!(local = %local.display(), remote, "upload complete");
        Ok(())
    }

    /// Download a remote file to the local path on a borrowed channel.
    pub async fn download(
        &self,
        remote: &str,
        local: impl AsRef<Path>,
    ) -> Result<(), TransferError<F>> {
        let local = local.as_ref();
        let mut channel = self.pool.borrow().await.map_err(ClientError::Pool)?;
        channel
            .download(remote, local)
            .await
            .map_err(|source| ClientError::Download {
                remote: remote.to_owned(),
                local: local.to_owned(),
                source,
            })?;
        debug!(remote, local = %local.display(), "download complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::factory::mock::MockFactory;

    use super::*;

    fn config() -> PoolConfig {
        PoolConfig::builder()
            .core_pool_size(1)
            .max_pool_size(2)
            .acquire_timeout(Duration::from_millis(50))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn upload_returns_channel_to_pool() {
        let _ = tracing_subscriber::fmt::try_init();

        let factory = MockFactory::new();
        let client = Client::new(config(), factory.clone()).await;

        client.upload("report.csv", "/inbound/report.csv").await.unwrap();

        let stats = client.pool().stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.borrowed, 0);
        assert_eq!(factory.created(), 1, "transfer should reuse the pre-warmed channel");

        client.pool().shutdown().await;
    }

    #[tokio::test]
    async fn failed_upload_still_returns_channel() {
        let _ = tracing_subscriber::fmt::try_init();

        let factory = MockFactory::new();
        let client = Client::new(config(), factory.clone()).await;

        let error = client
            .upload("report.csv", "/inbound/report.csv.refused")
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Upload { .. }));
        assert!(error.to_string().contains("report.csv"));

        let stats = client.pool().stats();
        assert_eq!(stats.idle, 1, "channel must come back even when the transfer fails");
        assert_eq!(stats.borrowed, 0);

        client.pool().shutdown().await;
    }

    #[tokio::test]
    async fn download_round_trips_through_the_pool() {
        let _ = tracing_subscriber::fmt::try_init();

        let factory = MockFactory::new();
        let client = Client::new(config(), factory.clone()).await;

        client.download("/outbound/export.bin", "export.bin").await.unwrap();
        let error = client
            .download("/outbound/export.bin.refused", "export.bin")
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Download { .. }));

        assert_eq!(client.pool().stats().borrowed, 0);
        client.pool().shutdown().await;
    }

    #[tokio::test]
    async fn pool_failures_surface_as_pool_errors() {
        let _ = tracing_subscriber::fmt::try_init();

        let factory = MockFactory::new();
        let client = Client::new(config(), factory.clone()).await;
        client.pool().shutdown().await;

        let error = client.upload("report.csv", "/inbound/report.csv").await.unwrap_err();
        assert!(matches!(error, ClientError::Pool(PoolError::Closed)));
    }
}
