//! Pool sizing and timing configuration.
//!
//! A [`PoolConfig`] is immutable once built and shared by reference for the
//! lifetime of the pool. Validation happens once, in [`Builder::build`], so
//! the pool itself never has to re-check its own limits.

use std::time::Duration;

const DEFAULT_CORE_POOL_SIZE: usize = 8;
const DEFAULT_MAX_POOL_SIZE: usize = 64;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Error returned when a [`PoolConfig`] fails validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidConfig {
    /// The pool must be allowed to hold at least one channel.
    #[error("max_pool_size must be at least 1")]
    ZeroMaxPoolSize,

    /// The ceiling cannot sit below the steady-state target.
    #[error("max_pool_size ({max}) must not be below core_pool_size ({core})")]
    MaxBelowCore {
        /// The configured steady-state idle target.
        core: usize,
        /// The configured ceiling.
        max: usize,
    },

    /// Timeouts and intervals must be non-zero.
    #[error("{field} must be non-zero")]
    ZeroDuration {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Sizing and timing policy for a [`Pool`](crate::pool::Pool).
///
/// Built via [`PoolConfig::builder`]; every field is fixed after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    core_pool_size: usize,
    max_pool_size: usize,
    connect_timeout: Duration,
    keep_alive_interval: Duration,
    acquire_timeout: Duration,
}

impl PoolConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Steady-state idle target: pre-warmed at construction, and the level
    /// the idle store is trimmed back down to.
    pub fn core_pool_size(&self) -> usize {
        self.core_pool_size
    }

    /// Hard ceiling on channels in existence at once, idle and borrowed
    /// together.
    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Upper bound on a single factory `create` call.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Delay between idle-reclamation passes, measured from the end of one
    /// pass to the start of the next.
    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// Longest a borrower will wait for a returned channel when the pool is
    /// exhausted.
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_pool_size: DEFAULT_CORE_POOL_SIZE,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct Builder {
    config: PoolConfig,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }
}

impl Builder {
    /// Set the steady-state idle target. May be zero for a purely on-demand
    /// pool.
    pub fn core_pool_size(mut self, core_pool_size: usize) -> Self {
        self.config.core_pool_size = core_pool_size;
        self
    }

    /// Set the hard ceiling on total channels.
    pub fn max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.config.max_pool_size = max_pool_size;
        self
    }

    /// Set the upper bound on a single factory `create` call.
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    /// Set the delay between idle-reclamation passes.
    pub fn keep_alive_interval(mut self, keep_alive_interval: Duration) -> Self {
        self.config.keep_alive_interval = keep_alive_interval;
        self
    }

    /// Set how long an exhausted borrow waits before failing.
    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.config.acquire_timeout = acquire_timeout;
        self
    }

    /// Validate the configuration and produce a [`PoolConfig`].
    pub fn build(self) -> Result<PoolConfig, InvalidConfig> {
        let config = self.config;
        if config.max_pool_size == 0 {
            return Err(InvalidConfig::ZeroMaxPoolSize);
        }
        if config.max_pool_size < config.core_pool_size {
            return Err(InvalidConfig::MaxBelowCore {
                core: config.core_pool_size,
                max: config.max_pool_size,
            });
        }
        for (field, duration) in [
            ("connect_timeout", config.connect_timeout),
            ("keep_alive_interval", config.keep_alive_interval),
            ("acquire_timeout", config.acquire_timeout),
        ] {
            if duration.is_zero() {
                return Err(InvalidConfig::ZeroDuration { field });
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensible_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.core_pool_size(), 8);
        assert_eq!(config.max_pool_size(), 64);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.keep_alive_interval(), Duration::from_secs(60));
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = PoolConfig::builder()
            .core_pool_size(2)
            .max_pool_size(4)
            .connect_timeout(Duration::from_secs(1))
            .keep_alive_interval(Duration::from_millis(500))
            .acquire_timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        assert_eq!(config.core_pool_size(), 2);
        assert_eq!(config.max_pool_size(), 4);
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.keep_alive_interval(), Duration::from_millis(500));
        assert_eq!(config.acquire_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn zero_core_is_allowed() {
        let config = PoolConfig::builder()
            .core_pool_size(0)
            .max_pool_size(1)
            .build()
            .unwrap();
        assert_eq!(config.core_pool_size(), 0);
    }

    #[test]
    fn rejects_zero_max() {
        let error = PoolConfig::builder()
            .core_pool_size(0)
            .max_pool_size(0)
            .build()
            .unwrap_err();
        assert_eq!(error, InvalidConfig::ZeroMaxPoolSize);
    }

    #[test]
    fn rejects_max_below_core() {
        let error = PoolConfig::builder()
            .core_pool_size(8)
            .max_pool_size(4)
            .build()
            .unwrap_err();
        assert_eq!(error, InvalidConfig::MaxBelowCore { core: 8, max: 4 });
    }

    #[test]
    fn rejects_zero_durations() {
        let error = PoolConfig::builder()
            .acquire_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(
            error,
            InvalidConfig::ZeroDuration {
                field: "acquire_timeout"
            }
        );
    }
}
