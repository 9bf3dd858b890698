//! Test utilities for the hyperslab crates.
//!
//! - [`mask`]: a brute-force dense reference model of selections, used to check
//!   the span-tree algebra, iterators and codec against plain bit arithmetic.
//! - [`data_gen`]: seeded generators of random extents and hyperslab parameters.

pub mod data_gen;
pub mod mask;

pub use data_gen::{HyperslabParams, SelectionGen};
pub use mask::{DenseMask, MaskOp};
