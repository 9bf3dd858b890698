//! Dense reference model of a selection: one flag per element of the extent.

/// Set operation applied by [`DenseMask::apply`]; `A` is the mask being
/// modified, `B` the operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskOp {
    Set,
    Or,
    And,
    Xor,
    NotB,
    NotA,
}

impl MaskOp {
    pub const ALL: [MaskOp; 6] = [
        MaskOp::Set,
        MaskOp::Or,
        MaskOp::And,
        MaskOp::Xor,
        MaskOp::NotB,
        MaskOp::NotA,
    ];

    #[inline]
    pub fn eval(self, a: bool, b: bool) -> bool {
        match self {
            MaskOp::Set => b,
            MaskOp::Or => a || b,
            MaskOp::And => a && b,
            MaskOp::Xor => a != b,
            MaskOp::NotB => a && !b,
            MaskOp::NotA => b && !a,
        }
    }
}

/// Row-major flags over a small extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseMask {
    extent: Vec<u64>,
    bits: Vec<bool>,
}

impl DenseMask {
    /// An empty mask.
    pub fn new(extent: &[u64]) -> DenseMask {
        let len = extent.iter().product::<u64>() as usize;
        DenseMask {
            extent: extent.to_vec(),
            bits: vec![false; len],
        }
    }

    /// A mask with every element set.
    pub fn full(extent: &[u64]) -> DenseMask {
        let mut mask = DenseMask::new(extent);
        mask.bits.fill(true);
        mask
    }

    /// A mask with the elements for which `selected` returns true.
    pub fn from_fn(extent: &[u64], mut selected: impl FnMut(&[u64]) -> bool) -> DenseMask {
        let mut mask = DenseMask::new(extent);
        for index in 0..mask.bits.len() {
            let coords = mask.coords_of(index);
            mask.bits[index] = selected(&coords);
        }
        mask
    }

    /// The elements of a finite regular hyperslab; coordinates outside the
    /// extent are ignored.
    pub fn hyperslab(
        extent: &[u64],
        start: &[u64],
        stride: &[u64],
        count: &[u64],
        block: &[u64],
    ) -> DenseMask {
        let mut mask = DenseMask::new(extent);
        mask.fill_hyperslab(start, stride, count, block);
        mask
    }

    /// Sets the elements of a finite regular hyperslab.
    pub fn fill_hyperslab(&mut self, start: &[u64], stride: &[u64], count: &[u64], block: &[u64]) {
        for index in 0..self.bits.len() {
            let coords = self.coords_of(index);
            let selected = (0..coords.len()).all(|k| {
                if coords[k] < start[k] || count[k] == 0 || block[k] == 0 {
                    return false;
                }
                let rel = coords[k] - start[k];
                let i = rel / stride[k];
                i < count[k] && rel - i * stride[k] < block[k]
            });
            if selected {
                self.bits[index] = true;
            }
        }
    }

    /// A mask of the union of inclusive boxes.
    pub fn from_blocks(extent: &[u64], blocks: &[(Vec<u64>, Vec<u64>)]) -> DenseMask {
        let mut mask = DenseMask::new(extent);
        for (start, end) in blocks {
            let count = vec![1; start.len()];
            let size = start.iter().zip(end).map(|(s, e)| e - s + 1).collect::<Vec<_>>();
            mask.fill_hyperslab(start, &size, &count, &size);
        }
        mask
    }

    /// Replaces the mask with `self op other`.
    pub fn apply(&mut self, op: MaskOp, other: &DenseMask) {
        assert_eq!(self.extent, other.extent);
        for (a, &b) in self.bits.iter_mut().zip(&other.bits) {
            *a = op.eval(*a, b);
        }
    }

    pub fn extent(&self) -> &[u64] {
        &self.extent
    }

    /// Number of set elements.
    pub fn count(&self) -> u64 {
        self.bits.iter().filter(|&&b| b).count() as u64
    }

    pub fn contains(&self, coords: &[u64]) -> bool {
        coords.len() == self.extent.len()
            && coords.iter().zip(&self.extent).all(|(c, e)| c < e)
            && self.bits[self.index_of(coords)]
    }

    /// Coordinates of every set element, in row-major order.
    pub fn coords(&self) -> Vec<Vec<u64>> {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(|(index, _)| self.coords_of(index))
            .collect()
    }

    /// Coalesced `(offset, len)` byte runs of the set elements.
    pub fn expected_runs(&self, elem_size: u64) -> Vec<(u64, u64)> {
        let mut runs: Vec<(u64, u64)> = Vec::new();
        for (index, _) in self.bits.iter().enumerate().filter(|(_, b)| **b) {
            let offset = index as u64 * elem_size;
            match runs.last_mut() {
                Some(last) if last.0 + last.1 == offset => last.1 += elem_size,
                _ => runs.push((offset, elem_size)),
            }
        }
        runs
    }

    /// Inclusive bounding box of the set elements.
    pub fn bounds(&self) -> Option<(Vec<u64>, Vec<u64>)> {
        let mut coords = self.coords().into_iter();
        let first = coords.next()?;
        let (mut low, mut high) = (first.clone(), first);
        for c in coords {
            for k in 0..c.len() {
                low[k] = low[k].min(c[k]);
                high[k] = high[k].max(c[k]);
            }
        }
        Some((low, high))
    }

    fn index_of(&self, coords: &[u64]) -> usize {
        coords
            .iter()
            .zip(&self.extent)
            .fold(0u64, |acc, (c, e)| acc * e + c) as usize
    }

    fn coords_of(&self, mut index: usize) -> Vec<u64> {
        let mut coords = vec![0u64; self.extent.len()];
        for k in (0..self.extent.len()).rev() {
            let size = self.extent[k] as usize;
            coords[k] = (index % size) as u64;
            index /= size;
        }
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyperslab_fill() {
        let mask = DenseMask::hyperslab(&[10, 10], &[2, 2], &[3, 3], &[2, 2], &[2, 2]);
        assert_eq!(mask.count(), 16);
        assert!(mask.contains(&[5, 6]));
        assert!(!mask.contains(&[4, 4]));
        assert_eq!(mask.bounds(), Some((vec![2, 2], vec![6, 6])));
    }

    #[test]
    fn test_set_algebra() {
        let a = DenseMask::from_blocks(&[8, 8], &[(vec![0, 0], vec![4, 4])]);
        let b = DenseMask::from_blocks(&[8, 8], &[(vec![3, 3], vec![7, 7])]);
        let mut and = a.clone();
        and.apply(MaskOp::And, &b);
        assert_eq!(and.coords(), vec![vec![3, 3], vec![3, 4], vec![4, 3], vec![4, 4]]);
        let mut xor = a.clone();
        xor.apply(MaskOp::Xor, &b);
        assert_eq!(xor.count(), 25 + 25 - 8);
        let mut not_a = a;
        not_a.apply(MaskOp::NotA, &b);
        assert_eq!(not_a.count(), 21);
    }

    #[test]
    fn test_expected_runs() {
        let mask = DenseMask::hyperslab(&[3, 4], &[0, 2], &[1, 1], &[3, 1], &[1, 2]);
        assert_eq!(mask.expected_runs(2), vec![(4, 4), (12, 4), (20, 4)]);
        assert_eq!(DenseMask::full(&[2, 2]).expected_runs(1), vec![(0, 4)]);
    }
}
