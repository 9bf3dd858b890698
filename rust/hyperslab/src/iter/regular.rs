//! Run cursor over a regular hyperslab.

use std::ops::RangeInclusive;

use crate::regular::HyperslabDim;

/// Odometer over `(block index, offset in block)` per dimension.
///
/// Dimensions `u > 0` selected in full (one block starting at zero and covering
/// the extent) are merged into their slower neighbour before iteration, which
/// lowers the iteration rank and lengthens the runs. `groups` remembers which
/// original dimensions every iterated dimension stands for.
pub(crate) struct RegularCursor {
    dims: Vec<HyperslabDim>,
    strides: Vec<u64>,
    groups: Vec<RangeInclusive<usize>>,
    extent: Vec<u64>,
    block_idx: Vec<u64>,
    in_block: Vec<u64>,
    done: bool,
}

impl RegularCursor {
    /// `dims` is the optimized view of a finite, non-empty regular hyperslab.
    pub(crate) fn new(dims: &[HyperslabDim], extent: &[u64], flatten: bool) -> RegularCursor {
        let rank = dims.len();
        let mut flat_dims = Vec::with_capacity(rank);
        let mut flat_extent = Vec::with_capacity(rank);
        let mut groups = Vec::with_capacity(rank);

        let mut scale = 1u64;
        let mut group_end = rank.saturating_sub(1);
        for u in (0..rank).rev() {
            let dim = dims[u];
            let full = dim.start == 0 && dim.count == 1 && dim.block == extent[u];
            if flatten && u > 0 && full {
                scale = scale.saturating_mul(extent[u]);
                continue;
            }
            flat_dims.push(HyperslabDim::new(
                dim.start * scale,
                dim.stride * scale,
                dim.count,
                dim.block * scale,
            ));
            flat_extent.push(extent[u].saturating_mul(scale));
            groups.push(u..=group_end);
            scale = 1;
            group_end = u.saturating_sub(1);
        }
        flat_dims.reverse();
        flat_extent.reverse();
        groups.reverse();

        let mut strides = vec![1u64; flat_dims.len()];
        for k in (0..flat_dims.len().saturating_sub(1)).rev() {
            strides[k] = strides[k + 1].saturating_mul(flat_extent[k + 1]);
        }

        RegularCursor {
            block_idx: vec![0; flat_dims.len()],
            in_block: vec![0; flat_dims.len()],
            dims: flat_dims,
            strides,
            groups,
            extent: extent.to_vec(),
            done: rank == 0,
        }
    }

    /// Number of dimensions left after flattening.
    #[cfg(test)]
    pub(crate) fn flat_rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    fn position(&self, k: usize) -> u64 {
        let dim = &self.dims[k];
        dim.start + self.block_idx[k] * dim.stride + self.in_block[k]
    }

    pub(crate) fn peek_offset(&self) -> Option<u64> {
        if self.done {
            return None;
        }
        Some(
            (0..self.dims.len())
                .map(|k| self.position(k) * self.strides[k])
                .sum(),
        )
    }

    pub(crate) fn next_run(&mut self, max_len: u64) -> Option<(u64, u64)> {
        let offset = self.peek_offset()?;
        let f = self.dims.len() - 1;
        let fastest = self.dims[f];
        let len = (fastest.block - self.in_block[f]).min(max_len);

        self.in_block[f] += len;
        if self.in_block[f] == fastest.block {
            self.in_block[f] = 0;
            if fastest.count == 1 {
                // One block per row: go straight to the next row.
                self.carry(f);
            } else {
                self.block_idx[f] += 1;
                if self.block_idx[f] == fastest.count {
                    self.block_idx[f] = 0;
                    self.carry(f);
                }
            }
        }
        Some((offset, len))
    }

    /// Advances the dimensions slower than `k` by one index.
    fn carry(&mut self, k: usize) {
        for u in (0..k).rev() {
            let dim = self.dims[u];
            self.in_block[u] += 1;
            if self.in_block[u] < dim.block {
                return;
            }
            self.in_block[u] = 0;
            self.block_idx[u] += 1;
            if self.block_idx[u] < dim.count {
                return;
            }
            self.block_idx[u] = 0;
        }
        self.done = true;
    }

    /// Coordinates of the next element in the original rank.
    pub(crate) fn coords(&self) -> Option<Vec<u64>> {
        if self.done {
            return None;
        }
        let mut coords = vec![0u64; self.extent.len()];
        for (k, group) in self.groups.iter().enumerate() {
            let mut value = self.position(k);
            for u in (*group.start() + 1..=*group.end()).rev() {
                coords[u] = value % self.extent[u];
                value /= self.extent[u];
            }
            coords[*group.start()] = value;
        }
        Some(coords)
    }
}
