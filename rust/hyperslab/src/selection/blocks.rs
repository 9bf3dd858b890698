use crate::{block::Block, regular::HyperslabDim};

/// Iterator over the blocks of a finite regular hyperslab in row-major order.
pub struct RegularBlocks<'a> {
    dims: &'a [HyperslabDim],
    index: Vec<u64>,
    done: bool,
}

impl<'a> RegularBlocks<'a> {
    pub fn new(dims: &'a [HyperslabDim]) -> RegularBlocks<'a> {
        RegularBlocks {
            dims,
            index: vec![0; dims.len()],
            done: dims.is_empty() || dims.iter().any(|d| d.count == 0),
        }
    }

    /// Starts the iteration at the `first`-th block.
    pub fn starting_at(dims: &'a [HyperslabDim], first: u64) -> RegularBlocks<'a> {
        let mut blocks = RegularBlocks::new(dims);
        if blocks.done {
            return blocks;
        }
        let mut rest = first;
        for (i, dim) in dims.iter().enumerate().rev() {
            blocks.index[i] = rest % dim.count;
            rest /= dim.count;
        }
        if rest > 0 {
            blocks.done = true;
        }
        blocks
    }
}

impl Iterator for RegularBlocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.done {
            return None;
        }
        let (start, end) = self
            .dims
            .iter()
            .zip(&self.index)
            .map(|(dim, &i)| dim.block_range(i))
            .unzip();

        self.done = true;
        for (i, dim) in self.dims.iter().enumerate().rev() {
            self.index[i] += 1;
            if self.index[i] < dim.count {
                self.done = false;
                break;
            }
            self.index[i] = 0;
        }
        Some(Block::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_blocks_row_major() {
        let dims = [HyperslabDim::new(0, 4, 2, 1), HyperslabDim::new(1, 3, 3, 2)];
        let blocks = RegularBlocks::new(&dims).collect::<Vec<_>>();
        assert_eq!(blocks.len(), 6);
        assert_eq!(blocks[0], Block::new(vec![0, 1], vec![0, 2]));
        assert_eq!(blocks[2], Block::new(vec![0, 7], vec![0, 8]));
        assert_eq!(blocks[3], Block::new(vec![4, 1], vec![4, 2]));
    }

    #[test]
    fn test_regular_blocks_window() {
        let dims = [HyperslabDim::new(0, 4, 2, 1), HyperslabDim::new(1, 3, 3, 2)];
        let tail = RegularBlocks::starting_at(&dims, 4).collect::<Vec<_>>();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0], Block::new(vec![4, 4], vec![4, 5]));
        assert_eq!(RegularBlocks::starting_at(&dims, 6).count(), 0);
    }
}
