//! In-memory channel factory for tests.
//!
//! [`MockFactory`] hands out numbered [`MockChannel`]s without touching a
//! network. Clones share one set of counters, so a test can keep a handle on
//! the factory it gave to the pool and assert on how many channels were
//! actually opened and torn down. Creation failures and latency can be
//! injected at any point.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::Transfer;

use super::ChannelFactory;

/// Error produced by a [`MockFactory`] set to fail.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("mock channel refused")]
pub struct MockChannelError;

/// Error produced by a [`MockChannel`] asked to transfer a refused path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("mock transfer refused")]
pub struct MockTransferError;

/// An opaque channel handle with a test-visible identity.
#[derive(Debug, PartialEq, Eq)]
pub struct MockChannel {
    id: usize,
}

impl MockChannel {
    /// The channel's creation-order id, starting at 1.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Transfer for MockChannel {
    type Error = MockTransferError;

    async fn upload(&mut self, _local: &Path, remote: &str) -> Result<(), Self::Error> {
        if remote.ends_with(".refused") {
            Err(MockTransferError)
        } else {
            Ok(())
        }
    }

    async fn download(&mut self, remote: &str, _local: &Path) -> Result<(), Self::Error> {
        if remote.ends_with(".refused") {
            Err(MockTransferError)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct State {
    ids: AtomicUsize,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    fail_creates: AtomicBool,
    fail_destroys: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

/// A cloneable factory producing [`MockChannel`]s.
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    state: Arc<State>,
}

impl MockFactory {
    /// Create a factory that succeeds instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels successfully opened so far.
    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    /// Number of channels torn down so far, counting failed teardowns.
    pub fn destroyed(&self) -> usize {
        self.state.destroyed.load(Ordering::SeqCst)
    }

    /// Make every subsequent `create` call fail (or succeed again).
    pub fn fail_creates(&self, fail: bool) {
        self.state.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `destroy` call report failure.
    pub fn fail_destroys(&self, fail: bool) {
        self.state.fail_destroys.store(fail, Ordering::SeqCst);
    }

    /// Impose (or clear) a delay on every subsequent `create` call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.state.latency.lock() = latency;
    }
}

impl ChannelFactory for MockFactory {
    type Channel = MockChannel;
    type Error = MockChannelError;

    async fn create(&self) -> Result<Self::Channel, Self::Error> {
        let latency = *self.state.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.state.fail_creates.load(Ordering::SeqCst) {
            return Err(MockChannelError);
        }
        let id = self.state.ids.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockChannel { id })
    }

    async fn destroy(&self, channel: Self::Channel) -> Result<(), Self::Error> {
        drop(channel);
        self.state.destroyed.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_destroys.load(Ordering::SeqCst) {
            Err(MockChannelError)
        } else {
            Ok(())
        }
    }
}
