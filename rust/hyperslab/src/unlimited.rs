//! Clipping of selections with an unlimited dimension.
//!
//! A selection with an unlimited dimension `d` is always held as a regular
//! description. Clipping turns it into a finite selection for a concrete extent
//! of `d`; the inverse helpers compute the extent of `d` at which the selection
//! covers a requested number of slices (indices selected along `d`).

use hyperslab_common::{Result, error::Error};
use log::debug;

use crate::{
    regular::{HyperslabDim, RegularDescriptor, UNLIMITED},
    selection::{SelectOp, Selection, SelectionKind},
};

fn unlimited_parts(selection: &Selection) -> Result<(usize, &RegularDescriptor)> {
    selection
        .hyperslab_ref()
        .and_then(|h| Some((h.unlimited_dim?, h.descriptor()?)))
        .ok_or_else(|| Error::invalid_operation("selection has no unlimited dimension"))
}

/// Extent of the unlimited dimension at which `dim` yields `num_slices` slices.
fn extent_for_slices(dim: &HyperslabDim, num_slices: u64, include_trailing: bool) -> u64 {
    if num_slices == 0 {
        return if include_trailing { dim.start } else { 0 };
    }
    if dim.block == UNLIMITED || dim.block == dim.stride {
        return dim.start + num_slices;
    }
    let count = num_slices / dim.block;
    let rem = num_slices - count * dim.block;
    if rem > 0 {
        dim.start + count * dim.stride + rem
    } else if include_trailing {
        dim.start + count * dim.stride
    } else {
        dim.start + (count - 1) * dim.stride + dim.block
    }
}

/// Number of slices `dim` yields when its dimension has extent `clip_size`.
fn slices_at(dim: &HyperslabDim, clip_size: u64) -> u64 {
    if dim.is_empty() || dim.start >= clip_size {
        return 0;
    }
    if dim.block == UNLIMITED || dim.block == dim.stride {
        return clip_size - dim.start;
    }
    let count = (clip_size - dim.start).div_ceil(dim.stride);
    let count = if dim.count == UNLIMITED {
        count
    } else {
        count.min(dim.count)
    };
    let last_start = dim.start + (count - 1) * dim.stride;
    (count - 1) * dim.block + dim.block.min(clip_size - last_start)
}

impl Selection {
    /// Clips the unlimited dimension to the extent `clip_size`.
    ///
    /// A pattern starting at or beyond `clip_size` leaves an empty selection. A
    /// last block running past `clip_size` is truncated, which leaves the
    /// selection in span-tree form. The selection is finite afterwards.
    pub fn clip_unlimited(&mut self, clip_size: u64) -> Result<()> {
        let (d, desc) = unlimited_parts(self)?;
        let mut app = desc.app().to_vec();
        app[d] = app[d].clipped(clip_size);
        debug!("clipped unlimited dimension {d} to {clip_size}: {:?}", app[d]);

        if app[d].is_empty() {
            self.select_none();
            return Ok(());
        }

        let desc = RegularDescriptor::new(app);
        let overrun = desc.high_bounds()[d] >= clip_size;
        let bounding = overrun.then(|| {
            (0..desc.rank())
                .map(|i| {
                    if i == d {
                        HyperslabDim::inclusive(desc.low_bounds()[i], clip_size - 1)
                    } else {
                        HyperslabDim::inclusive(desc.low_bounds()[i], desc.high_bounds()[i])
                    }
                })
                .collect::<Vec<_>>()
        });

        *self = Selection::from_kind(self.extent().to_vec(), SelectionKind::from_descriptor(desc));
        if let Some(bounding) = bounding {
            self.select_hyperslab_dims(SelectOp::And, &bounding)?;
        }
        Ok(())
    }

    /// Extent of the unlimited dimension at which the selection yields
    /// `num_slices` slices.
    ///
    /// With `include_trailing`, the extent reaches up to the start of the next
    /// block instead of ending at the last selected index.
    pub fn clip_extent(&self, num_slices: u64, include_trailing: bool) -> Result<u64> {
        let (d, desc) = unlimited_parts(self)?;
        Ok(extent_for_slices(&desc.opt()[d], num_slices, include_trailing))
    }

    /// Extent of the unlimited dimension at which the selection holds as many
    /// elements as the finite selection `other`.
    ///
    /// The element count of `other` must be a multiple of the elements selected
    /// per slice.
    pub fn clip_extent_for(&self, other: &Selection, include_trailing: bool) -> Result<u64> {
        let (d, desc) = unlimited_parts(self)?;
        if other.unlimited_dim().is_some() {
            return Err(Error::invalid_operation(
                "matching against a selection with an unlimited dimension",
            ));
        }
        let per_slice = desc.num_elements_except(d);
        let total = other.num_elements();
        if total % per_slice != 0 {
            return Err(Error::invalid_arg(
                "other",
                format!("{total} elements are not a multiple of the slice size {per_slice}"),
            ));
        }
        self.clip_extent(total / per_slice, include_trailing)
    }

    /// Extent of the unlimited dimension at which the selection yields as many
    /// slices as `matching` clipped to `match_clip_size`.
    ///
    /// Both selections must select the same number of elements per slice.
    pub fn clip_extent_match(
        &self,
        matching: &Selection,
        match_clip_size: u64,
        include_trailing: bool,
    ) -> Result<u64> {
        let (d, desc) = unlimited_parts(self)?;
        let (md, match_desc) = unlimited_parts(matching)?;
        if desc.num_elements_except(d) != match_desc.num_elements_except(md) {
            return Err(Error::invalid_arg(
                "matching",
                "selections differ in the number of elements per slice",
            ));
        }
        let num_slices = slices_at(&match_desc.opt()[md], match_clip_size);
        self.clip_extent(num_slices, include_trailing)
    }

    /// Selection of the `index`-th block along the unlimited dimension.
    pub fn unlimited_block(&self, index: u64) -> Result<Selection> {
        let (d, desc) = unlimited_parts(self)?;
        let dim = desc.opt()[d];
        if dim.block == UNLIMITED {
            return Err(Error::invalid_operation(
                "block of a selection with an unlimited block size",
            ));
        }
        let start = index
            .checked_mul(dim.stride)
            .and_then(|v| v.checked_add(dim.start))
            .ok_or_else(|| Error::invalid_arg("index", format!("block {index} is out of range")))?;
        let mut dims = desc.opt().to_vec();
        dims[d] = HyperslabDim::single(start, dim.block);
        let mut selection = Selection::none(self.extent().to_vec());
        selection.select_hyperslab_dims(SelectOp::Set, &dims)?;
        Ok(selection)
    }

    /// Number of complete blocks along the unlimited dimension for an extent of
    /// `clip_size`, and whether a partial block follows them.
    pub fn first_incomplete_block(&self, clip_size: u64) -> Result<(u64, bool)> {
        let (d, desc) = unlimited_parts(self)?;
        let dim = desc.opt()[d];
        if dim.block == UNLIMITED {
            return Err(Error::invalid_operation(
                "blocks of a selection with an unlimited block size",
            ));
        }
        if clip_size <= dim.start {
            return Ok((0, false));
        }
        let avail = clip_size - dim.start;
        let complete = avail.saturating_add(dim.stride - dim.block) / dim.stride;
        Ok((complete, complete.saturating_mul(dim.stride) < avail))
    }
}
