//! Construction-time configuration.

use crate::error::Error;

/// Maximum node height used by [`Config::default`].
pub const DEFAULT_MAX_HEIGHT: usize = 16;

/// Configuration of a [`SkipListSet`](crate::SkipListSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Ceiling on randomized node heights. Heights range over `0..=max_height`, so the sentinels
    /// carry `max_height + 1` links. Must be at least 1.
    pub max_height: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

impl Config {
    /// Creates a configuration with the given maximum height.
    pub fn new(max_height: usize) -> Self {
        Self { max_height }
    }

    /// Checks that the configuration can build a set.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_height < 1 {
            warn_log!(max_height = self.max_height, "rejecting skip list configuration");
            return Err(Error::InvalidMaxHeight(self.max_height));
        }
        Ok(())
    }
}
