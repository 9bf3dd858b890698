//! Region selection over N-dimensional array extents.
//!
//! A [`Selection`] describes which elements of an N-dimensional dataset an I/O
//! operation touches. Hyperslab selections are kept in two representations:
//!
//! - a compact regular description (`start`, `stride`, `count`, `block` per
//!   dimension, see [`RegularDescriptor`]), and
//! - a general span tree ([`span::SpanList`]) able to describe any union of
//!   boxes.
//!
//! Selections are combined through the set operations of [`SelectOp`], walked
//! as runs of contiguous bytes by [`SelectionIter`], persisted with
//! [`Selection::encode`] / [`Selection::decode`], clipped against a concrete
//! extent when one dimension is unlimited, and projected onto other selections
//! with [`project_intersection`].

pub mod block;
pub mod codec;
pub mod config;
pub mod epoch;
pub mod iter;
pub mod project;
pub mod rebuild;
pub mod regular;
pub mod selection;
pub mod span;
pub mod unlimited;

#[cfg(test)]
mod tests;

pub use block::Block;
pub use codec::FormatVersion;
pub use config::{CodecConfig, IterConfig};
pub use epoch::Epoch;
pub use iter::{SelectionIter, Sequence};
pub use project::project_intersection;
pub use regular::{HyperslabDim, RegularDescriptor, RegularState, UNLIMITED};
pub use selection::{SelectOp, Selection, SelectionType};

/// Maximum number of dimensions of a selection extent.
pub const MAX_RANK: usize = 32;
