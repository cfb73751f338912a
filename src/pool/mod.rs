//! Bounded pooling of reusable SFTP channels.
//!
//! The [`Pool`] owns a bounded store of idle channels and coordinates
//! concurrent borrowers around it. A borrow prefers an idle channel, then
//! opens a new one if the pool is under its ceiling, and otherwise waits —
//! up to the acquire timeout — for another borrower to finish. Channels come
//! back through the [`Pooled`] guard, which hands them to a waiting
//! borrower, restocks the idle store up to `core_pool_size`, or sends them
//! back to the factory for teardown.
//!
//! Two limits govern the pool. The hard limit, `max_pool_size`, bounds
//! channels in existence (idle + borrowed + creations in flight) and is
//! enforced by reserving a slot under the pool lock before any factory call.
//! The soft limit, `core_pool_size`, bounds the idle store; return races may
//! leave it transiently above target, and the background reclaimer trims the
//! surplus one channel per pass.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

mod idle;
mod reclaim;

use crate::config::PoolConfig;
use crate::factory::ChannelFactory;

use self::idle::IdleChannels;
use self::reclaim::Reclaimer;

/// Error returned by [`Pool::borrow`].
///
/// The pool never retries on the caller's behalf; whether a failed borrow is
/// worth retrying (with backoff, for [`Exhausted`](PoolError::Exhausted)) is
/// a caller decision.
#[derive(Debug, thiserror::Error)]
pub enum PoolError<E> {
    /// The factory could not open a new channel. The reserved pool slot was
    /// released, so a later borrow may try again.
    #[error("failed to create a new channel")]
    CreateFailed(#[source] E),

    /// The factory did not produce a channel within the connect timeout.
    #[error("channel creation timed out after {0:?}")]
    CreateTimedOut(Duration),

    /// Every channel was borrowed and none came back within the acquire
    /// timeout.
    #[error("pool exhausted, no channel returned within {0:?}")]
    Exhausted(Duration),

    /// The pool has been shut down.
    #[error("pool is shut down")]
    Closed,
}

/// Point-in-time pool counters, taken under the pool lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Channels resting in the idle store.
    pub idle: usize,
    /// Channels currently lent out.
    pub borrowed: usize,
    /// Channels opened by the factory over the pool's lifetime.
    pub created: u64,
    /// Channels handed back to the factory for teardown.
    pub destroyed: u64,
}

/// A bounded pool of reusable channels.
///
/// Cloning the pool is cheap and clones share all state. Construction
/// pre-warms `core_pool_size` channels and starts the idle reclaimer; call
/// [`Pool::shutdown`] to stop the reclaimer and tear down idle channels
/// deterministically.
pub struct Pool<F: ChannelFactory> {
    inner: Arc<Mutex<PoolInner<F::Channel>>>,
    factory: Arc<F>,
    config: Arc<PoolConfig>,
    reclaimer: Arc<Mutex<Option<Reclaimer>>>,
}

impl<F: ChannelFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            factory: self.factory.clone(),
            config: self.config.clone(),
            reclaimer: self.reclaimer.clone(),
        }
    }
}

impl<F: ChannelFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct PoolInner<C> {
    idle: IdleChannels<C>,
    waiting: VecDeque<oneshot::Sender<C>>,

    /// Channels currently lent out.
    borrowed: usize,

    /// Channels in existence: idle + borrowed + creations in flight. Gates
    /// factory calls so the ceiling holds even while a create is pending.
    live: usize,

    created: u64,
    destroyed: u64,
    closed: bool,
}

impl<C> PoolInner<C> {
    fn new() -> Self {
        Self {
            idle: IdleChannels::default(),
            waiting: VecDeque::new(),
            borrowed: 0,
            live: 0,
            created: 0,
            destroyed: 0,
            closed: false,
        }
    }

    /// Account for a channel leaving circulation.
    fn note_destroyed(&mut self) {
        self.live -= 1;
        self.destroyed += 1;
    }

    /// Remove one channel above the idle target, if any.
    fn trim_one(&mut self, core: usize) -> Option<C> {
        if self.idle.len() > core {
            let channel = self.idle.pop_oldest();
            if channel.is_some() {
                self.note_destroyed();
            }
            channel
        } else {
            None
        }
    }
}

impl<F: ChannelFactory> Pool<F> {
    /// Create a pool and pre-warm `core_pool_size` channels.
    ///
    /// Pre-warming is lenient: a slot whose creation fails or times out is
    /// left unfilled and logged, and the pool starts under-provisioned
    /// rather than failing construction.
    pub async fn new(config: PoolConfig, factory: F) -> Self {
        let config = Arc::new(config);
        let factory = Arc::new(factory);
        let inner = Arc::new(Mutex::new(PoolInner::new()));

        for slot in 0..config.core_pool_size() {
            match Self::open_channel(&factory, &config).await {
                Ok(channel) => {
                    let mut inner = inner.lock();
                    inner.idle.push(channel);
                    inner.live += 1;
                    inner.created += 1;
                }
                Err(error) => {
                    warn!(slot, %error, "pre-warm slot left unfilled");
                }
            }
        }

        let reclaimer = Reclaimer::spawn::<F>(
            Arc::downgrade(&inner),
            factory.clone(),
            config.clone(),
        );
        debug!(
            idle = inner.lock().idle.len(),
            core = config.core_pool_size(),
            max = config.max_pool_size(),
            "pool started"
        );

        Self {
            inner,
            factory,
            config,
            reclaimer: Arc::new(Mutex::new(Some(reclaimer))),
        }
    }

    /// Borrow a channel for exclusive use.
    ///
    /// The returned [`Pooled`] guard dereferences to the channel and returns
    /// it to the pool when dropped. Dropping the borrow future while it
    /// waits for capacity abandons the wait cleanly; the pool skips the
    /// stale waiter on the next return.
    pub async fn borrow(&self) -> Result<Pooled<F>, PoolError<F::Error>> {
        self.borrow_timeout(self.config.acquire_timeout()).await
    }

    /// Borrow with a caller-chosen acquire timeout instead of the
    /// configured one.
    pub async fn borrow_timeout(
        &self,
        acquire_timeout: Duration,
    ) -> Result<Pooled<F>, PoolError<F::Error>> {
        let waiter = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(PoolError::Closed);
            }

            if let Some(channel) = inner.idle.pop() {
                trace!("channel found in idle store");
                inner.borrowed += 1;
                return Ok(self.lend(channel));
            }

            if inner.live < self.config.max_pool_size() {
                // Reserve the slot before the factory call so concurrent
                // borrowers cannot overshoot the ceiling together.
                inner.live += 1;
                None
            } else {
                trace!("pool at ceiling, waiting for a returned channel");
                let (tx, rx) = oneshot::channel();
                inner.waiting.push_back(tx);
                Some(rx)
            }
        };

        match waiter {
            None => {
                // The reservation must outlive any await: if the borrow
                // future is dropped mid-create, its drop releases the slot.
                let reservation = SlotReservation::new(self.inner.clone());
                self.grow(reservation).await
            }
            Some(rx) => self.wait(rx, acquire_timeout).await,
        }
    }

    /// Current pool counters.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        PoolStats {
            idle: inner.idle.len(),
            borrowed: inner.borrowed,
            created: inner.created,
            destroyed: inner.destroyed,
        }
    }

    /// Stop the reclaimer and tear down every idle channel.
    ///
    /// Borrowers still waiting fail with [`PoolError::Closed`]; channels
    /// currently lent out are not recalled and are destroyed when their
    /// guards drop. Calling shutdown more than once is a no-op.
    pub async fn shutdown(&self) {
        let reclaimer = self.reclaimer.lock().take();
        if let Some(reclaimer) = reclaimer {
            reclaimer.stop().await;
        }

        let (channels, waiters) = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            let channels = inner.idle.drain();
            let waiters = std::mem::take(&mut inner.waiting);
            inner.live -= channels.len();
            inner.destroyed += channels.len() as u64;
            (channels, waiters)
        };

        // Dropping the senders fails pending borrows with `Closed`.
        drop(waiters);

        for channel in channels {
            if let Err(error) = self.factory.destroy(channel).await {
                warn!(%error, "failed to tear down idle channel during shutdown");
            }
        }
        debug!("pool shut down");
    }

    async fn open_channel(
        factory: &F,
        config: &PoolConfig,
    ) -> Result<F::Channel, PoolError<F::Error>> {
        match tokio::time::timeout(config.connect_timeout(), factory.create()).await {
            Ok(Ok(channel)) => Ok(channel),
            Ok(Err(error)) => Err(PoolError::CreateFailed(error)),
            Err(_) => Err(PoolError::CreateTimedOut(config.connect_timeout())),
        }
    }

    /// Open a new channel against a slot already reserved in `live`.
    async fn grow(
        &self,
        mut reservation: SlotReservation<F::Channel>,
    ) -> Result<Pooled<F>, PoolError<F::Error>> {
        match Self::open_channel(&self.factory, &self.config).await {
            Ok(channel) => {
                {
                    let mut inner = self.inner.lock();
                    reservation.disarm();
                    inner.created += 1;
                    if inner.closed {
                        // Shut down while we were connecting.
                        inner.note_destroyed();
                        drop(inner);
                        spawn_destroy(self.factory.clone(), channel);
                        return Err(PoolError::Closed);
                    }
                    inner.borrowed += 1;
                    debug!(live = inner.live, "opened channel on demand");
                }
                Ok(self.lend(channel))
            }
            // The reservation's drop releases the slot.
            Err(error) => Err(error),
        }
    }

    /// Wait for a returned channel to be handed over.
    async fn wait(
        &self,
        mut rx: oneshot::Receiver<F::Channel>,
        acquire: Duration,
    ) -> Result<Pooled<F>, PoolError<F::Error>> {
        match tokio::time::timeout(acquire, &mut rx).await {
            Ok(Ok(channel)) => {
                trace!("returned channel handed over");
                Ok(self.lend(channel))
            }
            // The sender is dropped only by shutdown.
            Ok(Err(_)) => Err(PoolError::Closed),
            Err(_) => {
                // A handover may land between the timeout firing and this
                // waiter going away. Close the slot first, then rescue
                // anything already sent, so the channel cannot be lost.
                rx.close();
                match rx.try_recv() {
                    Ok(channel) => Ok(self.lend(channel)),
                    Err(_) => Err(PoolError::Exhausted(acquire)),
                }
            }
        }
    }

    fn lend(&self, channel: F::Channel) -> Pooled<F> {
        Pooled {
            channel: Some(channel),
            inner: Arc::downgrade(&self.inner),
            factory: self.factory.clone(),
            config: self.config.clone(),
        }
    }
}

/// A channel on loan from a [`Pool`].
///
/// Dereferences to the channel; exactly one guard exists per borrowed
/// channel, so access needs no further locking. Dropping the guard returns
/// the channel to the pool — there is no way to return a channel twice.
pub struct Pooled<F: ChannelFactory> {
    channel: Option<F::Channel>,
    inner: Weak<Mutex<PoolInner<F::Channel>>>,
    factory: Arc<F>,
    config: Arc<PoolConfig>,
}

impl<F: ChannelFactory> fmt::Debug for Pooled<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").finish_non_exhaustive()
    }
}

impl<F: ChannelFactory> Deref for Pooled<F> {
    type Target = F::Channel;

    fn deref(&self) -> &Self::Target {
        self.channel.as_ref().expect("channel only taken on Drop")
    }
}

impl<F: ChannelFactory> DerefMut for Pooled<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.channel.as_mut().expect("channel only taken on Drop")
    }
}

impl<F: ChannelFactory> Drop for Pooled<F> {
    fn drop(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        let Some(inner) = self.inner.upgrade() else {
            // The pool itself is gone; all that is left is teardown.
            spawn_destroy(self.factory.clone(), channel);
            return;
        };
        release(&inner, &self.factory, &self.config, channel);
    }
}

/// A `live` slot reserved for a creation in flight.
///
/// Borrow futures can be dropped at any await point, including while the
/// factory is still connecting. Tying the reservation to a guard ensures a
/// cancelled create gives its slot back instead of shrinking the pool's
/// effective capacity for good.
struct SlotReservation<C> {
    inner: Arc<Mutex<PoolInner<C>>>,
    armed: bool,
}

impl<C> SlotReservation<C> {
    fn new(inner: Arc<Mutex<PoolInner<C>>>) -> Self {
        Self { inner, armed: true }
    }

    /// Keep the slot: the channel now exists and is accounted elsewhere.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C> Drop for SlotReservation<C> {
    fn drop(&mut self) {
        if self.armed {
            trace!("releasing reserved slot for unfinished create");
            self.inner.lock().live -= 1;
        }
    }
}

/// Return a channel to the pool. Never fails from the returner's side.
fn release<F: ChannelFactory>(
    inner: &Mutex<PoolInner<F::Channel>>,
    factory: &Arc<F>,
    config: &PoolConfig,
    mut channel: F::Channel,
) {
    let mut guard = inner.lock();
    guard.borrowed -= 1;

    if !guard.closed {
        while let Some(waiter) = guard.waiting.pop_front() {
            if waiter.is_closed() {
                trace!("skipping abandoned waiter");
                continue;
            }
            match waiter.send(channel) {
                Ok(()) => {
                    trace!("channel handed to waiter");
                    guard.borrowed += 1;
                    return;
                }
                Err(rejected) => {
                    trace!("waiter closed, continuing");
                    channel = rejected;
                }
            }
        }

        if guard.idle.len() < config.core_pool_size() {
            trace!("channel returned to idle store");
            guard.idle.push(channel);
            return;
        }
    }

    // Idle store already at target, or the pool is shut down: surplus
    // channels go straight back to the factory.
    guard.note_destroyed();
    drop(guard);
    spawn_destroy(factory.clone(), channel);
}

fn spawn_destroy<F: ChannelFactory>(factory: Arc<F>, channel: F::Channel) {
    // Returns happen in `Drop` and must never fail, even when the guard
    // outlives the runtime.
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(error) = factory.destroy(channel).await {
                    warn!(%error, "failed to tear down channel");
                }
            });
        }
        Err(_) => {
            warn!("no runtime available, dropping channel without factory teardown");
            drop(channel);
        }
    }
}
