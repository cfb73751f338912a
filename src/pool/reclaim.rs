//! Periodic trimming of surplus idle channels.
//!
//! The reclaimer is a single background task owned by the pool's lifecycle:
//! started at construction, stopped and joined on shutdown. Each pass trims
//! at most one channel above `core_pool_size`, so an inflated idle store
//! decays gradually, one channel per `keep_alive_interval`, rather than
//! snapping back to target in a single pass.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::config::PoolConfig;
use crate::factory::ChannelFactory;

use super::PoolInner;

/// Handle to the reclaimer task.
#[derive(Debug)]
pub(super) struct Reclaimer {
    shutdown: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl Reclaimer {
    /// Spawn the reclaimer loop.
    ///
    /// The task holds the pool state weakly: if the pool is dropped without
    /// an explicit shutdown, the next pass observes the dangling reference
    /// and exits on its own.
    pub(super) fn spawn<F>(
        inner: Weak<Mutex<PoolInner<F::Channel>>>,
        factory: Arc<F>,
        config: Arc<PoolConfig>,
    ) -> Self
    where
        F: ChannelFactory,
    {
        let (shutdown, mut signal) = watch::channel(());
        let handle = tokio::spawn(async move {
            loop {
                // Fixed-delay: the timer restarts only after the previous
                // pass, including its destroy call, has finished.
                tokio::select! {
                    _ = signal.changed() => break,
                    _ = tokio::time::sleep(config.keep_alive_interval()) => {}
                }

                let Some(inner) = inner.upgrade() else { break };
                let surplus = inner.lock().trim_one(config.core_pool_size());
                drop(inner);

                if let Some(channel) = surplus {
                    trace!("trimming one surplus idle channel");
                    if let Err(error) = factory.destroy(channel).await {
                        warn!(%error, "failed to tear down reclaimed channel");
                    }
                }
            }
            trace!("idle reclaimer stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the loop to exit and wait for it to finish.
    pub(super) async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}
