//! Axis-aligned boxes of selected coordinates.

/// An N-dimensional box, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block {
    pub start: Vec<u64>,
    pub end: Vec<u64>,
}

impl Block {
    pub fn new(start: Vec<u64>, end: Vec<u64>) -> Block {
        debug_assert_eq!(start.len(), end.len());
        debug_assert!(start.iter().zip(&end).all(|(s, e)| s <= e));
        Block { start, end }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.start.len()
    }

    /// Number of coordinates in the box.
    pub fn num_elements(&self) -> u64 {
        self.start
            .iter()
            .zip(&self.end)
            .fold(1u64, |acc, (s, e)| acc.saturating_mul(e - s + 1))
    }

    pub fn contains(&self, coords: &[u64]) -> bool {
        coords.len() == self.rank()
            && coords
                .iter()
                .zip(self.start.iter().zip(&self.end))
                .all(|(c, (s, e))| s <= c && c <= e)
    }

    /// Whether the box shares at least one coordinate with `[start, end]`.
    pub fn intersects(&self, start: &[u64], end: &[u64]) -> bool {
        self.start
            .iter()
            .zip(&self.end)
            .zip(start.iter().zip(end))
            .all(|((s, e), (os, oe))| s <= oe && os <= e)
    }
}
