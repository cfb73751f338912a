//! The boundary between the pool and the transport layer.
//!
//! The pool depends on exactly one capability: something that can open one
//! physical SFTP channel and tear one down. Session establishment,
//! authentication, and host-key policy all live behind [`ChannelFactory`];
//! the pool treats the resulting channel as an opaque, exclusively-owned
//! handle.

use std::future::Future;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// Opens and closes physical channels on behalf of a pool.
///
/// Implementations are shared across the pool's borrowers and its background
/// reclaimer, so they must be `Send + Sync`. The pool bounds every `create`
/// call with the configured connect timeout; implementations do not need
/// their own deadline.
pub trait ChannelFactory: Send + Sync + 'static {
    /// The channel handle this factory produces.
    ///
    /// A channel is owned by exactly one actor at a time: the pool's idle
    /// store, a single borrower, or the `destroy` call consuming it.
    type Channel: Send + 'static;

    /// Error produced when a channel cannot be opened or closed.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open one new channel.
    fn create(&self) -> impl Future<Output = Result<Self::Channel, Self::Error>> + Send;

    /// Tear down a channel, consuming it.
    ///
    /// Destruction is terminal and best-effort: the pool logs failures and
    /// never surfaces them to the caller who returned the channel.
    fn destroy(
        &self,
        channel: Self::Channel,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
