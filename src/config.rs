use std::num::NonZero;

use crate::error::{Error, Result};

/// Largest supported secondary-attribute domain.
pub const MAX_SCALE: u32 = 200;

/// The size `S` of the secondary-attribute domain `[1, S]`.
///
/// Every histogram in an index has exactly `S` slots; the domain is fixed when
/// the index is built.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Scale(NonZero<u32>);

impl Scale {
    /// Validates `scale` against `1..=MAX_SCALE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when `scale` is zero or above [`MAX_SCALE`].
    pub fn new(scale: u32) -> Result<Self> {
        match NonZero::new(scale) {
            Some(s) if scale <= MAX_SCALE => Ok(Self(s)),
            _ => Err(Error::InvalidInput("scale must be in 1..=200")),
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Number of histogram slots.
    #[must_use]
    pub const fn slots(self) -> usize {
        self.0.get() as usize
    }

    /// Returns `true` if `attribute` lies in `[1, S]`.
    #[must_use]
    pub const fn contains(self, attribute: u32) -> bool {
        attribute >= 1 && attribute <= self.0.get()
    }
}

/// Construction parameters for a [`RankIndex`](crate::RankIndex).
///
/// # Examples
///
/// ```
/// use ranked_partitions::Config;
///
/// let config = Config::default().with_partitions(4).with_scale(10);
/// assert!(config.validate().is_ok());
/// assert!(Config::new(1, 0).validate().is_err());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Size of the secondary-attribute domain.
    pub scale: u32,
    /// Number of partitions created up front, with ids `1..=partitions`.
    pub partitions: u32,
}

impl Config {
    #[must_use]
    pub const fn new(partitions: u32, scale: u32) -> Self {
        Self { scale, partitions }
    }

    #[must_use]
    pub const fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub const fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Checks the configuration and returns the validated [`Scale`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the scale is out of range.
    pub fn validate(&self) -> Result<Scale> {
        Scale::new(self.scale)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(0, MAX_SCALE)
    }
}
