//! Seeded generators of random selection parameters.
//!
//! Every generator owns a [`fastrand::Rng`] created from a fixed seed, so test
//! failures reproduce across runs and threads.

/// Parameters of one finite regular hyperslab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperslabParams {
    pub start: Vec<u64>,
    pub stride: Vec<u64>,
    pub count: Vec<u64>,
    pub block: Vec<u64>,
}

impl HyperslabParams {
    pub fn rank(&self) -> usize {
        self.start.len()
    }

    /// Last selected index per dimension (inclusive).
    pub fn high(&self) -> Vec<u64> {
        (0..self.rank())
            .map(|k| self.start[k] + self.stride[k] * (self.count[k] - 1) + self.block[k] - 1)
            .collect()
    }

    pub fn num_elements(&self) -> u64 {
        self.count
            .iter()
            .zip(&self.block)
            .map(|(c, b)| c * b)
            .product()
    }
}

/// Random hyperslabs that fit inside a given extent.
pub struct SelectionGen {
    rng: fastrand::Rng,
}

impl SelectionGen {
    pub fn with_seed(seed: u64) -> SelectionGen {
        SelectionGen {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// A random extent of `rank` dimensions, each in `1..=max_size`.
    pub fn extent(&mut self, rank: usize, max_size: u64) -> Vec<u64> {
        (0..rank).map(|_| self.rng.u64(1..=max_size)).collect()
    }

    /// A random valid hyperslab whose every block lies inside `extent`.
    ///
    /// Counts and blocks are at least one; strides are never smaller than blocks.
    pub fn hyperslab(&mut self, extent: &[u64]) -> HyperslabParams {
        let mut params = HyperslabParams {
            start: Vec::with_capacity(extent.len()),
            stride: Vec::with_capacity(extent.len()),
            count: Vec::with_capacity(extent.len()),
            block: Vec::with_capacity(extent.len()),
        };
        for &size in extent {
            let start = self.rng.u64(0..size);
            let room = size - start;
            let block = self.rng.u64(1..=room.min(4));
            let stride = block + self.rng.u64(0..=3);
            let max_count = if room <= block {
                1
            } else {
                1 + (room - block) / stride
            };
            let count = self.rng.u64(1..=max_count.min(5));
            params.start.push(start);
            params.stride.push(stride);
            params.count.push(count);
            params.block.push(block);
        }
        params
    }

    /// A random hyperslab consisting of a single block.
    pub fn block(&mut self, extent: &[u64]) -> HyperslabParams {
        let mut params = self.hyperslab(extent);
        params.count.fill(1);
        params.stride.clone_from(&params.block);
        params
    }

    /// A random index into a set operation table of `len` entries.
    pub fn pick(&mut self, len: usize) -> usize {
        self.rng.usize(0..len)
    }

    pub fn bool(&mut self) -> bool {
        self.rng.bool()
    }
}
