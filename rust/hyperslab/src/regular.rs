//! Regular hyperslab descriptions.
//!
//! A regular hyperslab selects, in every dimension, `count` blocks of `block`
//! consecutive indices whose first indices are `stride` apart, starting at
//! `start`. The selection is the Cartesian product of the per-dimension patterns.
//!
//! Two views of the same pattern are kept side by side:
//!
//! - the *application* view holds the parameters exactly as requested by the
//!   caller and is what queries and the encoder echo back;
//! - the *optimized* view is normalized for computation: a dimension whose blocks
//!   touch (`stride == block`) becomes one large block, and a single-block
//!   dimension has a unit stride.

use hyperslab_common::{Result, error::Error};

/// Sentinel for an unbounded `count` or `block`.
pub const UNLIMITED: u64 = u64::MAX;

/// Regular pattern of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HyperslabDim {
    pub start: u64,
    pub stride: u64,
    pub count: u64,
    pub block: u64,
}

impl HyperslabDim {
    #[inline]
    pub const fn new(start: u64, stride: u64, count: u64, block: u64) -> HyperslabDim {
        HyperslabDim {
            start,
            stride,
            count,
            block,
        }
    }

    /// A single block `[start, start + len)`.
    #[inline]
    pub const fn single(start: u64, len: u64) -> HyperslabDim {
        HyperslabDim::new(start, 1, 1, len)
    }

    /// A single block covering the inclusive range `[low, high]`.
    #[inline]
    pub const fn inclusive(low: u64, high: u64) -> HyperslabDim {
        HyperslabDim::new(low, 1, 1, high - low + 1)
    }

    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.count == UNLIMITED || self.block == UNLIMITED
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.block == 0
    }

    /// Number of indices selected in this dimension, or [`UNLIMITED`].
    pub fn num_elements(&self) -> u64 {
        if self.is_unlimited() {
            UNLIMITED
        } else {
            self.count * self.block
        }
    }

    /// Last selected index (inclusive), or [`UNLIMITED`].
    ///
    /// Must not be called on an empty dimension.
    pub fn high(&self) -> u64 {
        debug_assert!(!self.is_empty());
        if self.is_unlimited() {
            UNLIMITED
        } else {
            self.start + self.stride * (self.count - 1) + self.block - 1
        }
    }

    /// Inclusive index range of the `i`-th block.
    #[inline]
    pub fn block_range(&self, i: u64) -> (u64, u64) {
        let low = self.start + i * self.stride;
        (low, low + self.block - 1)
    }

    /// Index of the block whose stride slot holds the offset `rel` from `start`.
    ///
    /// A single-block pattern has one slot of unbounded width, whatever its stride.
    #[inline]
    pub(crate) fn slot_of(&self, rel: u64) -> u64 {
        if self.count == 1 { 0 } else { rel / self.stride }
    }

    /// Whether `index` is selected by this dimension's pattern.
    pub fn contains(&self, index: u64) -> bool {
        if self.is_empty() || index < self.start {
            return false;
        }
        let rel = index - self.start;
        if self.block == UNLIMITED {
            return true;
        }
        let i = self.slot_of(rel);
        (self.count == UNLIMITED || i < self.count) && rel - i * self.stride < self.block
    }

    /// Whether any selected index lies in the inclusive range `[low, high]`.
    pub fn intersects(&self, low: u64, high: u64) -> bool {
        if self.is_empty() || high < self.start {
            return false;
        }
        if self.block == UNLIMITED {
            return true;
        }
        let first = if low <= self.start {
            0
        } else {
            let rel = low - self.start;
            let i = self.slot_of(rel);
            if rel - i * self.stride < self.block { i } else { i + 1 }
        };
        if self.count != UNLIMITED && first >= self.count {
            return false;
        }
        first
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(self.start))
            .is_some_and(|first_low| first_low <= high)
    }

    /// Normalized (optimized) form of this dimension.
    pub fn optimized(&self) -> HyperslabDim {
        if self.stride == self.block && self.count != UNLIMITED {
            HyperslabDim::new(self.start, 1, 1, self.count * self.block)
        } else if self.count == 1 {
            HyperslabDim::new(self.start, 1, 1, self.block)
        } else {
            *self
        }
    }

    /// Checks the parameters of one dimension of a new hyperslab.
    pub(crate) fn validate(&self, dim: usize) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::invalid_arg(
                "stride",
                format!("hyperslab stride cannot be zero (dimension {dim})"),
            ));
        }
        if self.count == UNLIMITED && self.block == UNLIMITED {
            return Err(Error::invalid_arg(
                "count",
                format!("count and block cannot both be unlimited (dimension {dim})"),
            ));
        }
        if self.is_empty() {
            return Ok(());
        }
        if self.count > 1 && self.stride < self.block {
            return Err(Error::invalid_arg(
                "block",
                format!("hyperslab blocks overlap (dimension {dim})"),
            ));
        }
        if !self.is_unlimited() {
            let end = self
                .stride
                .checked_mul(self.count - 1)
                .and_then(|v| v.checked_add(self.start))
                .and_then(|v| v.checked_add(self.block - 1));
            match end {
                Some(end) if end < UNLIMITED => {}
                _ => {
                    return Err(Error::invalid_arg(
                        "count",
                        format!("hyperslab exceeds the coordinate range (dimension {dim})"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Clips an unlimited dimension to the extent `clip_size`.
    ///
    /// Returns a finite pattern; the result is empty (zero count or block) when the
    /// pattern starts at or beyond `clip_size`. The last block of a clipped
    /// unlimited-count pattern may extend beyond `clip_size`.
    pub fn clipped(&self, clip_size: u64) -> HyperslabDim {
        let mut dim = *self;
        if dim.start >= clip_size {
            if dim.block == UNLIMITED {
                dim.block = 0;
            } else {
                dim.count = 0;
            }
        } else if dim.block == UNLIMITED || dim.block == dim.stride {
            dim.block = clip_size - dim.start;
            dim.count = 1;
            dim.stride = 1;
        } else {
            debug_assert_eq!(dim.count, UNLIMITED);
            dim.count = (clip_size - dim.start).div_ceil(dim.stride);
        }
        dim
    }
}

/// Checks a full hyperslab description and returns its unlimited dimension, if any.
pub(crate) fn validate_dims(dims: &[HyperslabDim]) -> Result<Option<usize>> {
    let mut unlimited_dim = None;
    for (i, dim) in dims.iter().enumerate() {
        dim.validate(i)?;
        if dim.is_unlimited() {
            if unlimited_dim.is_some() {
                return Err(Error::invalid_arg(
                    "count",
                    "cannot have more than one unlimited dimension in a selection",
                ));
            }
            unlimited_dim = Some(i);
        }
    }
    Ok(unlimited_dim)
}

/// Application and optimized views of a regular hyperslab, with cached bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularDescriptor {
    app: Vec<HyperslabDim>,
    opt: Vec<HyperslabDim>,
    low_bounds: Vec<u64>,
    high_bounds: Vec<u64>,
}

impl RegularDescriptor {
    /// Builds a descriptor from the caller's literal parameters.
    ///
    /// The dimensions must be valid and non-empty.
    pub fn new(app: Vec<HyperslabDim>) -> RegularDescriptor {
        let opt = app.iter().map(HyperslabDim::optimized).collect();
        RegularDescriptor::from_parts(app, opt)
    }

    /// Builds a descriptor whose application view equals the optimized view.
    pub fn normalized(dims: Vec<HyperslabDim>) -> RegularDescriptor {
        RegularDescriptor::from_parts(dims.clone(), dims)
    }

    pub(crate) fn from_parts(app: Vec<HyperslabDim>, opt: Vec<HyperslabDim>) -> RegularDescriptor {
        debug_assert_eq!(app.len(), opt.len());
        let low_bounds = opt.iter().map(|d| d.start).collect();
        let high_bounds = opt.iter().map(HyperslabDim::high).collect();
        RegularDescriptor {
            app,
            opt,
            low_bounds,
            high_bounds,
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.opt.len()
    }

    /// The parameters as originally requested.
    #[inline]
    pub fn app(&self) -> &[HyperslabDim] {
        &self.app
    }

    /// The normalized parameters.
    #[inline]
    pub fn opt(&self) -> &[HyperslabDim] {
        &self.opt
    }

    #[inline]
    pub fn low_bounds(&self) -> &[u64] {
        &self.low_bounds
    }

    #[inline]
    pub fn high_bounds(&self) -> &[u64] {
        &self.high_bounds
    }

    pub fn unlimited_dim(&self) -> Option<usize> {
        self.opt.iter().position(HyperslabDim::is_unlimited)
    }

    /// Number of selected elements, or [`UNLIMITED`].
    pub fn num_elements(&self) -> u64 {
        if self.unlimited_dim().is_some() {
            return UNLIMITED;
        }
        self.opt
            .iter()
            .fold(1u64, |acc, d| acc.saturating_mul(d.num_elements()))
    }

    /// Number of elements in the dimensions other than `dim`.
    pub fn num_elements_except(&self, dim: usize) -> u64 {
        self.opt
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != dim)
            .fold(1u64, |acc, (_, d)| acc.saturating_mul(d.num_elements()))
    }

    /// Number of blocks as seen by the caller: the product of the requested counts.
    pub fn num_blocks(&self) -> u64 {
        if self.unlimited_dim().is_some() {
            return UNLIMITED;
        }
        self.app
            .iter()
            .fold(1u64, |acc, d| acc.saturating_mul(d.count))
    }

    /// Whether the coordinates are selected.
    pub fn contains(&self, coords: &[u64]) -> bool {
        coords.len() == self.rank() && self.opt.iter().zip(coords).all(|(d, &c)| d.contains(c))
    }

    /// Shifts every start by a per-dimension signed offset (already checked).
    pub(crate) fn shifted(&self, offset: &[i64]) -> RegularDescriptor {
        let shift = |dims: &[HyperslabDim]| -> Vec<HyperslabDim> {
            dims.iter()
                .zip(offset)
                .map(|(d, &off)| HyperslabDim {
                    start: d.start.wrapping_add_signed(off),
                    ..*d
                })
                .collect()
        };
        RegularDescriptor::from_parts(shift(&self.app), shift(&self.opt))
    }
}

/// State of the regular description of a hyperslab selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegularState {
    /// The descriptor is trustworthy.
    Valid(RegularDescriptor),
    /// The selection may be regular; no rebuild has been attempted yet.
    Unknown,
    /// A rebuild was attempted and the selection is not regular.
    Impossible,
}

impl RegularState {
    #[inline]
    pub fn descriptor(&self) -> Option<&RegularDescriptor> {
        match self {
            RegularState::Valid(desc) => Some(desc),
            _ => None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, RegularState::Valid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimized_views() {
        assert_eq!(
            HyperslabDim::new(3, 4, 5, 4).optimized(),
            HyperslabDim::new(3, 1, 1, 20)
        );
        assert_eq!(
            HyperslabDim::new(3, 7, 1, 2).optimized(),
            HyperslabDim::new(3, 1, 1, 2)
        );
        assert_eq!(
            HyperslabDim::new(3, 7, 2, 2).optimized(),
            HyperslabDim::new(3, 7, 2, 2)
        );
        // Unlimited counts keep their stride even when blocks touch.
        assert_eq!(
            HyperslabDim::new(0, 2, UNLIMITED, 2).optimized(),
            HyperslabDim::new(0, 2, UNLIMITED, 2)
        );
    }

    #[test]
    fn test_single_block_membership() {
        let dim = HyperslabDim::single(0, 5);
        assert!((0..5).all(|i| dim.contains(i)));
        assert!(!dim.contains(5));
        assert!(dim.intersects(3, 3));
        assert!(!dim.intersects(5, 9));

        let merged = HyperslabDim::new(3, 4, 5, 4).optimized();
        assert!(merged.contains(22));
        assert!(!merged.contains(23));
        assert!(merged.intersects(10, 12));

        let square = RegularDescriptor::new(vec![HyperslabDim::single(3, 5); 2]);
        assert!(square.contains(&[4, 7]));
        assert!(!square.contains(&[8, 4]));
    }

    #[test]
    fn test_bounds_and_counts() {
        let desc = RegularDescriptor::new(vec![
            HyperslabDim::new(2, 3, 2, 2),
            HyperslabDim::new(2, 3, 2, 2),
        ]);
        assert_eq!(desc.low_bounds(), &[2, 2]);
        assert_eq!(desc.high_bounds(), &[6, 6]);
        assert_eq!(desc.num_elements(), 16);
        assert_eq!(desc.num_blocks(), 4);
        assert!(desc.contains(&[3, 5]));
        assert!(!desc.contains(&[4, 5]));
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(HyperslabDim::new(0, 0, 1, 1).validate(0).is_err());
        assert!(HyperslabDim::new(0, 2, 3, 3).validate(0).is_err());
        assert!(HyperslabDim::new(0, 2, UNLIMITED, UNLIMITED).validate(0).is_err());
        assert!(HyperslabDim::new(0, 3, 1, 5).validate(0).is_ok());
        assert!(HyperslabDim::new(u64::MAX - 2, 1, 1, 10).validate(0).is_err());
        assert!(
            validate_dims(&[
                HyperslabDim::new(0, 1, UNLIMITED, 1),
                HyperslabDim::new(0, 1, 1, UNLIMITED),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_intersects_window() {
        let dim = HyperslabDim::new(2, 4, 3, 2);
        assert!(dim.intersects(0, 2));
        assert!(!dim.intersects(4, 5));
        assert!(dim.intersects(4, 6));
        assert!(!dim.intersects(12, 40));
        let unlimited = HyperslabDim::new(2, 4, UNLIMITED, 2);
        assert!(unlimited.intersects(1000, 1002));
        assert!(!unlimited.intersects(1000, 1001));
    }

    #[test]
    fn test_clipped() {
        let dim = HyperslabDim::new(5, 3, UNLIMITED, 2);
        assert_eq!(dim.clipped(14), HyperslabDim::new(5, 3, 3, 2));
        assert_eq!(dim.clipped(12), HyperslabDim::new(5, 3, 3, 2));
        assert_eq!(dim.clipped(5).count, 0);
        let dim = HyperslabDim::new(4, 1, 1, UNLIMITED);
        assert_eq!(dim.clipped(10), HyperslabDim::new(4, 1, 1, 6));
        assert_eq!(dim.clipped(3).block, 0);
    }
}
