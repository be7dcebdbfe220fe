//! Pool configuration options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cleanup::{Cleanup, Closeable};
use crate::errors::{BoxError, PoolError, PoolResult};

/// Shortest accepted interval between two background shrink cycles
pub const MIN_SHRINK_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Configuration for bounded pool behavior
///
/// # Examples
///
/// ```
/// use esox_boundedpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<i32>::new()
///     .with_baseline_size(5)
///     .with_max_pool_size(10)
///     .with_growth_increment(2)
///     .with_shrink_interval(Duration::from_secs(3600));
///
/// assert_eq!(config.baseline_size, 5);
/// assert_eq!(config.max_pool_size, 10);
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfiguration<T> {
    /// Name used in log events and metric labels
    pub name: String,

    /// Number of objects created eagerly and restored by every shrink cycle
    pub baseline_size: usize,

    /// Hard ceiling on objects in existence (checked out plus available)
    pub max_pool_size: usize,

    /// Number of objects attempted per on-demand growth burst
    pub growth_increment: usize,

    /// Period of the background shrink cycle, `None` disables it
    pub shrink_interval: Option<Duration>,

    pub(crate) cleanup: Cleanup<T>,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            baseline_size: 1,
            max_pool_size: 10,
            growth_increment: 1,
            shrink_interval: None,
            cleanup: Cleanup::Drop,
        }
    }
}

impl<T> Clone for PoolConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            baseline_size: self.baseline_size,
            max_pool_size: self.max_pool_size,
            growth_increment: self.growth_increment,
            shrink_interval: self.shrink_interval,
            cleanup: self.cleanup.clone(),
        }
    }
}

impl<T> fmt::Debug for PoolConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("name", &self.name)
            .field("baseline_size", &self.baseline_size)
            .field("max_pool_size", &self.max_pool_size)
            .field("growth_increment", &self.growth_increment)
            .field("shrink_interval", &self.shrink_interval)
            .field("cleanup", &self.cleanup)
            .finish()
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the baseline size
    pub fn with_baseline_size(mut self, size: usize) -> Self {
        self.baseline_size = size;
        self
    }

    /// Set the maximum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_boundedpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<i32>::new()
    ///     .with_max_pool_size(50);
    ///
    /// assert_eq!(config.max_pool_size, 50);
    /// ```
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set the growth increment
    pub fn with_growth_increment(mut self, increment: usize) -> Self {
        self.growth_increment = increment;
        self
    }

    /// Enable the background shrink cycle
    pub fn with_shrink_interval(mut self, interval: Duration) -> Self {
        self.shrink_interval = Some(interval);
        self
    }

    /// Run `cleanup` on every object the pool evicts or disposes
    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.cleanup = Cleanup::Custom(Arc::new(cleanup));
        self
    }

    /// Check the configuration, reporting the first invalid setting.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pool_size == 0 {
            return Err(PoolError::configuration("max_pool_size must be greater than 0"));
        }
        if self.baseline_size > self.max_pool_size {
            return Err(PoolError::configuration(format!(
                "baseline_size ({}) must not exceed max_pool_size ({})",
                self.baseline_size, self.max_pool_size
            )));
        }
        if self.growth_increment == 0 {
            return Err(PoolError::configuration("growth_increment must be greater than 0"));
        }
        let headroom = (self.max_pool_size - self.baseline_size).max(1);
        if self.growth_increment > headroom {
            return Err(PoolError::configuration(format!(
                "growth_increment ({}) must not exceed max_pool_size - baseline_size ({})",
                self.growth_increment, headroom
            )));
        }
        if let Some(interval) = self.shrink_interval
            && interval < MIN_SHRINK_INTERVAL
        {
            return Err(PoolError::configuration(format!(
                "shrink_interval ({interval:?}) must be at least {MIN_SHRINK_INTERVAL:?}"
            )));
        }
        Ok(())
    }
}

impl<T: Closeable + 'static> PoolConfiguration<T> {
    /// Close objects through their [`Closeable`] implementation instead of
    /// dropping them
    pub fn with_closeable_cleanup(mut self) -> Self {
        self.cleanup = Cleanup::Custom(Arc::new(|item: T| item.close()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        let config = PoolConfiguration::<u8>::default();
        assert_eq!(config.baseline_size, 1);
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.growth_increment, 1);
        assert!(config.shrink_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_invalid_sizes() {
        let zero_max = PoolConfiguration::<u8>::new()
            .with_baseline_size(0)
            .with_max_pool_size(0);
        assert!(matches!(zero_max.validate(), Err(PoolError::Configuration(_))));

        let inverted = PoolConfiguration::<u8>::new()
            .with_baseline_size(11)
            .with_max_pool_size(10);
        assert!(inverted.validate().is_err());

        let zero_increment = PoolConfiguration::<u8>::new().with_growth_increment(0);
        assert!(zero_increment.validate().is_err());
    }

    #[test]
    fn growth_increment_is_bounded_by_headroom() {
        let config = PoolConfiguration::<u8>::new()
            .with_baseline_size(5)
            .with_max_pool_size(10);

        assert!(config.clone().with_growth_increment(5).validate().is_ok());
        assert!(config.with_growth_increment(6).validate().is_err());

        // A fixed-size pool still accepts the default increment of one.
        let fixed = PoolConfiguration::<u8>::new()
            .with_baseline_size(3)
            .with_max_pool_size(3);
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn shrink_interval_has_a_floor() {
        let short = PoolConfiguration::<u8>::new().with_shrink_interval(Duration::from_secs(60));
        assert!(short.validate().is_err());

        let ok = PoolConfiguration::<u8>::new().with_shrink_interval(MIN_SHRINK_INTERVAL);
        assert!(ok.validate().is_ok());
    }
}
