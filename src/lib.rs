//! # Cellar: bounded connection pooling for SFTP channels
//!
//! Cellar keeps a bounded stock of reusable, stateful remote-file-transfer
//! channels and shares them safely across concurrent callers. Opening an SFTP
//! channel is expensive, so the pool pre-warms a core set at construction,
//! lends channels out one borrower at a time, grows on demand up to a hard
//! ceiling, and trims surplus idle channels in the background.
//!
//! ## Architecture Overview
//!
//! The crate separates three concerns:
//!
//! - **Factory**: the [`ChannelFactory`] trait is the pool's only view of the
//!   transport layer. It opens one physical channel and tears one down; the
//!   pool never inspects a channel beyond handing it back for disposal.
//! - **Pool**: the [`Pool`] owns the idle store, the borrow/return protocol,
//!   the sizing policy, and the idle reclaimer task. Borrowed channels travel
//!   inside a [`Pooled`] guard which returns them on drop.
//! - **Client**: the [`Client`] layers upload/download operations over the
//!   pool for channel types that implement [`client::Transfer`].
//!
//! ## Sizing policy
//!
//! [`PoolConfig`] carries two sizes. `core_pool_size` is the steady-state
//! idle target: that many channels are opened eagerly at construction, and
//! returns beyond that level are destroyed rather than stored.
//! `max_pool_size` is the hard ceiling on channels in existence at once,
//! idle and borrowed together. Between the two, the pool grows on demand and
//! shrinks one channel per `keep_alive_interval` once demand passes.
//!
//! When the pool is exhausted, a borrower waits up to `acquire_timeout` for
//! a returned channel and then fails with a typed
//! [`PoolError::Exhausted`](pool::PoolError::Exhausted) error rather than an
//! absent handle.
//!
//! ## Feature Flags
//!
//! - `mock`: exposes the in-memory `factory::mock` channel factory so that
//!   downstream crates can exercise pool behavior without a remote host.

pub mod client;
pub mod config;
pub mod factory;
pub mod pool;

pub use self::client::Client;
pub use self::config::PoolConfig;
pub use self::factory::ChannelFactory;
pub use self::pool::{Pool, PoolError, PoolStats, Pooled};
