//! Configuration of the selection codec and iterators.

use hyperslab_common::{Result, error::Error};

use crate::codec::FormatVersion;

/// Default upper bound of the runs produced by one [`SelectionIter::runs`] batch.
///
/// [`SelectionIter::runs`]: crate::iter::SelectionIter::runs
const DEFAULT_MAX_RUNS: usize = 1024;

/// Default upper bound of the elements covered by one batch.
const DEFAULT_MAX_ELEMENTS: u64 = 1024 * 1024;

/// Bounds on the binary format versions the encoder may produce.
///
/// The encoder always picks the lowest version able to represent a selection;
/// the bounds raise that choice (`low_bound`) or reject selections that would
/// need a newer version than readers are known to support (`high_bound`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    pub low_bound: FormatVersion,
    pub high_bound: FormatVersion,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            low_bound: FormatVersion::V1,
            high_bound: FormatVersion::V3,
        }
    }
}

impl CodecConfig {
    /// Creates a configuration with explicit bounds.
    pub fn with_bounds(low_bound: FormatVersion, high_bound: FormatVersion) -> Result<Self> {
        let config = CodecConfig {
            low_bound,
            high_bound,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.low_bound > self.high_bound {
            return Err(Error::invalid_arg(
                "low_bound",
                format!(
                    "low bound {} is above high bound {}",
                    self.low_bound as u8, self.high_bound as u8
                ),
            ));
        }
        Ok(())
    }
}

/// Batch sizes and behavior of selection iterators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterConfig {
    /// Maximum number of runs returned per batch by the draining helpers.
    pub max_runs: usize,
    /// Maximum number of elements covered per batch by the draining helpers.
    pub max_elements: u64,
    /// Merge fully selected trailing dimensions of regular selections.
    pub flatten: bool,
}

impl Default for IterConfig {
    fn default() -> Self {
        IterConfig {
            max_runs: DEFAULT_MAX_RUNS,
            max_elements: DEFAULT_MAX_ELEMENTS,
            flatten: true,
        }
    }
}

impl IterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_runs == 0 || self.max_elements == 0 {
            return Err(Error::invalid_arg(
                "max_runs",
                "iterator batch sizes must be greater than zero",
            ));
        }
        Ok(())
    }
}
