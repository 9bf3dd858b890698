//! The selection container.
//!
//! A [`Selection`] pairs the extent of a dataspace (its current dimension sizes)
//! with a description of the selected elements: nothing, everything, or a
//! hyperslab. Hyperslabs carry a regular description, a span tree, or both; the
//! one produced by the most recent mutation is authoritative and the other is
//! derived from it on demand.

use std::{borrow::Cow, cell::OnceCell, rc::Rc};

use hyperslab_common::Result;
use log::debug;

use crate::{
    epoch::Epoch,
    rebuild::rebuild_regular,
    regular::{HyperslabDim, RegularDescriptor, RegularState},
    span::SpanList,
};

mod blocks;
mod combine;
mod query;

pub use blocks::RegularBlocks;

/// Set operation applied when a hyperslab or another selection is combined into
/// a selection. `A` is the current selection and `B` the new operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectOp {
    /// Replace `A` with `B`.
    Set,
    /// `A ∪ B`.
    Or,
    /// `A ∩ B`.
    And,
    /// `(A ∖ B) ∪ (B ∖ A)`.
    Xor,
    /// `A ∖ B`.
    NotB,
    /// `B ∖ A`.
    NotA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionType {
    None,
    All,
    Hyperslab,
}

/// A set of elements of an N-dimensional extent.
///
/// Cloning is cheap: span trees are shared through reference counts and every
/// mutation builds new lists instead of editing shared ones.
#[derive(Debug, Clone)]
pub struct Selection {
    extent: Vec<u64>,
    kind: SelectionKind,
}

#[derive(Debug, Clone)]
pub(crate) enum SelectionKind {
    None,
    All,
    Hyperslab(Hyperslab),
}

impl SelectionKind {
    pub(crate) fn from_tree(tree: Option<Rc<SpanList>>) -> SelectionKind {
        match tree {
            Some(tree) => SelectionKind::Hyperslab(Hyperslab::from_tree(tree)),
            None => SelectionKind::None,
        }
    }

    pub(crate) fn from_descriptor(desc: RegularDescriptor) -> SelectionKind {
        SelectionKind::Hyperslab(Hyperslab::from_descriptor(desc))
    }
}

static UNKNOWN: RegularState = RegularState::Unknown;

/// A non-empty hyperslab selection.
#[derive(Debug, Clone)]
pub(crate) struct Hyperslab {
    /// Regular description; unset while a span-tree hyperslab was never rebuilt.
    pub(crate) regular: OnceCell<RegularState>,
    pub(crate) spans: Option<Rc<SpanList>>,
    pub(crate) unlimited_dim: Option<usize>,
    pub(crate) num_elements: u64,
}

impl Hyperslab {
    pub(crate) fn from_descriptor(desc: RegularDescriptor) -> Hyperslab {
        Hyperslab {
            unlimited_dim: desc.unlimited_dim(),
            num_elements: desc.num_elements(),
            regular: OnceCell::from(RegularState::Valid(desc)),
            spans: None,
        }
    }

    pub(crate) fn from_tree(tree: Rc<SpanList>) -> Hyperslab {
        Hyperslab {
            num_elements: tree.num_elements(Epoch::next()),
            regular: OnceCell::new(),
            spans: Some(tree),
            unlimited_dim: None,
        }
    }

    #[inline]
    pub(crate) fn descriptor(&self) -> Option<&RegularDescriptor> {
        self.regular.get().and_then(RegularState::descriptor)
    }

    #[inline]
    pub(crate) fn state(&self) -> &RegularState {
        self.regular.get().unwrap_or(&UNKNOWN)
    }

    /// The span tree, built from the regular description when it is not stored.
    pub(crate) fn tree(&self) -> Option<Rc<SpanList>> {
        if let Some(spans) = &self.spans {
            return Some(spans.clone());
        }
        match self.descriptor() {
            Some(desc) if self.unlimited_dim.is_none() => SpanList::from_regular(desc.opt()),
            _ => None,
        }
    }

    /// The regular description, rebuilt from the span tree on first use.
    pub(crate) fn regular_view(&self) -> Option<Cow<'_, RegularDescriptor>> {
        self.resolve().descriptor().map(Cow::Borrowed)
    }

    /// Settles the regular state; the rebuild outcome is recorded and never retried.
    fn resolve(&self) -> &RegularState {
        match &self.spans {
            Some(tree) => self.regular.get_or_init(|| match rebuild_regular(tree) {
                Some(dims) => {
                    debug!("rebuilt regular hyperslab from span tree: {dims:?}");
                    RegularState::Valid(RegularDescriptor::normalized(dims))
                }
                None => {
                    debug!("span tree of rank {} is not regular", tree.rank());
                    RegularState::Impossible
                }
            }),
            None => self.state(),
        }
    }

    pub(crate) fn low_bounds(&self) -> Vec<u64> {
        match (self.descriptor(), &self.spans) {
            (Some(desc), _) => desc.low_bounds().to_vec(),
            (None, Some(tree)) => tree.low_bounds().to_vec(),
            (None, None) => Vec::new(),
        }
    }

    pub(crate) fn high_bounds(&self) -> Vec<u64> {
        match (self.descriptor(), &self.spans) {
            (Some(desc), _) => desc.high_bounds().to_vec(),
            (None, Some(tree)) => tree.high_bounds().to_vec(),
            (None, None) => Vec::new(),
        }
    }

    pub(crate) fn contains(&self, coords: &[u64]) -> bool {
        match (self.descriptor(), &self.spans) {
            (Some(desc), _) => desc.contains(coords),
            (None, Some(tree)) => tree.contains(coords),
            (None, None) => false,
        }
    }

    /// Attempts to restore the regular description.
    pub(crate) fn rebuild(&self) -> bool {
        self.resolve().is_valid()
    }
}

/// Regular description of a selection of everything in `extent`, or `None` when
/// the extent holds no element.
pub(crate) fn extent_descriptor(extent: &[u64]) -> Option<RegularDescriptor> {
    if extent.is_empty() || extent.contains(&0) {
        return None;
    }
    Some(RegularDescriptor::new(
        extent.iter().map(|&size| HyperslabDim::single(0, size)).collect(),
    ))
}

impl Selection {
    /// An empty selection of `extent`.
    pub fn none(extent: impl Into<Vec<u64>>) -> Selection {
        Selection {
            extent: extent.into(),
            kind: SelectionKind::None,
        }
    }

    /// A selection of every element of `extent`.
    pub fn all(extent: impl Into<Vec<u64>>) -> Selection {
        Selection {
            extent: extent.into(),
            kind: SelectionKind::All,
        }
    }

    /// A selection of one regular hyperslab of `extent`.
    ///
    /// `stride` and `block` default to ones. See [`Selection::select_hyperslab`].
    pub fn hyperslab(
        extent: impl Into<Vec<u64>>,
        start: &[u64],
        stride: Option<&[u64]>,
        count: &[u64],
        block: Option<&[u64]>,
    ) -> Result<Selection> {
        let mut selection = Selection::none(extent);
        selection.select_hyperslab(SelectOp::Set, start, stride, count, block)?;
        Ok(selection)
    }

    pub(crate) fn from_kind(extent: Vec<u64>, kind: SelectionKind) -> Selection {
        Selection { extent, kind }
    }

    #[inline]
    pub(crate) fn kind(&self) -> &SelectionKind {
        &self.kind
    }

    #[inline]
    pub(crate) fn hyperslab_ref(&self) -> Option<&Hyperslab> {
        match &self.kind {
            SelectionKind::Hyperslab(h) => Some(h),
            _ => None,
        }
    }

    /// Current dimension sizes of the dataspace.
    #[inline]
    pub fn extent(&self) -> &[u64] {
        &self.extent
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.extent.len()
    }

    pub fn select_type(&self) -> SelectionType {
        match self.kind {
            SelectionKind::None => SelectionType::None,
            SelectionKind::All => SelectionType::All,
            SelectionKind::Hyperslab(_) => SelectionType::Hyperslab,
        }
    }

    /// Number of selected elements; [`UNLIMITED`](crate::UNLIMITED) when the
    /// selection has an unlimited dimension.
    pub fn num_elements(&self) -> u64 {
        match &self.kind {
            SelectionKind::None => 0,
            SelectionKind::All => self
                .extent
                .iter()
                .fold(1u64, |acc, &size| acc.saturating_mul(size)),
            SelectionKind::Hyperslab(h) => h.num_elements,
        }
    }

    /// Index of the dimension with an unlimited count or block.
    pub fn unlimited_dim(&self) -> Option<usize> {
        self.hyperslab_ref().and_then(|h| h.unlimited_dim)
    }

    /// Regular description state of a hyperslab selection.
    pub fn regular_state(&self) -> Option<&RegularState> {
        self.hyperslab_ref().map(Hyperslab::state)
    }

    /// The stored span tree of a hyperslab selection, if any.
    pub fn span_tree(&self) -> Option<&Rc<SpanList>> {
        self.hyperslab_ref().and_then(|h| h.spans.as_ref())
    }

    pub fn select_none(&mut self) {
        self.kind = SelectionKind::None;
    }

    pub fn select_all(&mut self) {
        self.kind = SelectionKind::All;
    }

    /// Whether the selection can be described by one regular hyperslab.
    ///
    /// Attempts a rebuild from the span tree when none was tried yet. `None` and
    /// `All` selections are regular.
    pub fn is_regular(&self) -> bool {
        match &self.kind {
            SelectionKind::Hyperslab(h) => h.rebuild(),
            _ => true,
        }
    }

    /// Restores the regular description of a span-tree hyperslab if possible.
    ///
    /// Returns whether the regular description is valid afterwards.
    pub fn rebuild(&self) -> bool {
        self.is_regular()
    }

    /// The regular hyperslab parameters as requested by the caller.
    ///
    /// Only available while the regular description is valid; call
    /// [`Selection::is_regular`] first to rebuild it after span-tree operations.
    pub fn regular_hyperslab(&self) -> Option<&[HyperslabDim]> {
        self.hyperslab_ref()
            .and_then(Hyperslab::descriptor)
            .map(RegularDescriptor::app)
    }

    /// Whether the element at `coords` is selected.
    pub fn contains(&self, coords: &[u64]) -> bool {
        if coords.len() != self.rank() {
            return false;
        }
        match &self.kind {
            SelectionKind::None => false,
            SelectionKind::All => coords.iter().zip(&self.extent).all(|(c, size)| c < size),
            SelectionKind::Hyperslab(h) => h.contains(coords),
        }
    }
}
