//! System configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::scheduler::SchedulerPolicy;

/// Default max messages dispatched per resumption.
pub const DEFAULT_THROUGHPUT: usize = 300;

/// Default per-actor mailbox cap (0 = unbounded).
pub const DEFAULT_MAILBOX_CAP: usize = 0;

/// Default timer heap cleanup period (zero = never).
pub const DEFAULT_CLOCK_CLEANUP_INTERVAL: Duration = Duration::ZERO;

/// Default max wait for actors to drain on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The recognized option set read at startup.
///
/// # Examples
///
/// ```rust
/// use skein_rt::system::SystemConfig;
/// use std::time::Duration;
///
/// let config = SystemConfig::builder()
///     .with_workers(2)
///     .with_throughput(64)
///     .with_shutdown_grace(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Number of scheduler worker threads (`scheduler.workers`).
    pub workers: usize,

    /// Max messages dispatched per resumption (`scheduler.throughput`).
    pub throughput: usize,

    /// Work distribution policy (`scheduler.policy`).
    pub policy: SchedulerPolicy,

    /// Per-actor mailbox cap; 0 = unbounded (`mailbox.cap`).
    pub mailbox_cap: usize,

    /// Timer heap cleanup period; zero = never (`clock.cleanup-interval`).
    pub clock_cleanup_interval: Duration,

    /// Max wait for actors to drain on shutdown (`shutdown.grace`).
    pub shutdown_grace: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            throughput: DEFAULT_THROUGHPUT,
            policy: SchedulerPolicy::default(),
            mailbox_cap: DEFAULT_MAILBOX_CAP,
            clock_cleanup_interval: DEFAULT_CLOCK_CLEANUP_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl SystemConfig {
    /// Create a configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err(String::from("scheduler.workers must be > 0"));
        }
        if self.throughput == 0 {
            return Err(String::from("scheduler.throughput must be > 0"));
        }
        if self.shutdown_grace.is_zero() {
            return Err(String::from("shutdown.grace must be > 0"));
        }
        Ok(())
    }
}

/// Fluent builder for [`SystemConfig`].
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Set the number of scheduler worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the per-resumption message bound.
    pub fn with_throughput(mut self, throughput: usize) -> Self {
        self.config.throughput = throughput;
        self
    }

    /// Set the scheduling policy.
    pub fn with_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set the per-actor mailbox cap (0 = unbounded).
    pub fn with_mailbox_cap(mut self, cap: usize) -> Self {
        self.config.mailbox_cap = cap;
        self
    }

    /// Set the timer heap cleanup period (zero = never).
    pub fn with_clock_cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.clock_cleanup_interval = interval;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Build and validate.
    pub fn build(self) -> Result<SystemConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
