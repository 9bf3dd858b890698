//! Set operations on selections.
//!
//! Every operation computes the complete new state first and installs it only
//! on success, so an error leaves the selection untouched.

use std::rc::Rc;

use hyperslab_common::{Result, error::Error, verify_arg, verify_rank};
use log::trace;

use super::{Hyperslab, SelectOp, Selection, SelectionKind, extent_descriptor};
use crate::{
    MAX_RANK,
    regular::{HyperslabDim, RegularDescriptor, validate_dims},
    span::{ClipWanted, SpanList, clip_spans, merge_optional},
};

/// The right-hand side of a set operation.
enum Operand {
    Regular(RegularDescriptor),
    Spans(Rc<SpanList>),
}

impl Operand {
    fn into_kind(self) -> SelectionKind {
        match self {
            Operand::Regular(desc) => SelectionKind::from_descriptor(desc),
            Operand::Spans(tree) => SelectionKind::Hyperslab(Hyperslab::from_tree(tree)),
        }
    }

    fn unlimited_dim(&self) -> Option<usize> {
        match self {
            Operand::Regular(desc) => desc.unlimited_dim(),
            Operand::Spans(_) => None,
        }
    }

    fn high_bounds(&self) -> &[u64] {
        match self {
            Operand::Regular(desc) => desc.high_bounds(),
            Operand::Spans(tree) => tree.high_bounds(),
        }
    }

    fn tree(&self) -> Option<Rc<SpanList>> {
        match self {
            Operand::Regular(desc) => SpanList::from_regular(desc.opt()),
            Operand::Spans(tree) => Some(tree.clone()),
        }
    }
}

/// Clips the unlimited dimension `dim` of a regular description to `clip_size`.
///
/// Returns `None` when nothing remains. The last block may still extend past
/// `clip_size`.
fn clip_descriptor(desc: &RegularDescriptor, dim: usize, clip_size: u64) -> Option<RegularDescriptor> {
    let mut app = desc.app().to_vec();
    app[dim] = app[dim].clipped(clip_size);
    if app[dim].is_empty() {
        None
    } else {
        Some(RegularDescriptor::new(app))
    }
}

impl Selection {
    /// Combines one regular hyperslab into the selection.
    ///
    /// `stride` and `block` default to ones. A zero `count` or `block` in any
    /// dimension empties the selection for `Set`, `And` and `NotA` and leaves it
    /// unchanged for `Or`, `Xor` and `NotB`. At most one dimension may be
    /// unlimited ([`UNLIMITED`](crate::UNLIMITED) count or block).
    pub fn select_hyperslab(
        &mut self,
        op: SelectOp,
        start: &[u64],
        stride: Option<&[u64]>,
        count: &[u64],
        block: Option<&[u64]>,
    ) -> Result<()> {
        let rank = start.len();
        verify_rank!("count", count.len(), rank);
        if let Some(stride) = stride {
            verify_rank!("stride", stride.len(), rank);
        }
        if let Some(block) = block {
            verify_rank!("block", block.len(), rank);
        }
        let dims = (0..rank)
            .map(|i| {
                HyperslabDim::new(
                    start[i],
                    stride.map_or(1, |s| s[i]),
                    count[i],
                    block.map_or(1, |b| b[i]),
                )
            })
            .collect::<Vec<_>>();
        self.select_hyperslab_dims(op, &dims)
    }

    /// Combines one regular hyperslab, given per dimension, into the selection.
    pub fn select_hyperslab_dims(&mut self, op: SelectOp, dims: &[HyperslabDim]) -> Result<()> {
        verify_rank!("start", dims.len(), self.rank());
        verify_arg!(rank, (1..=MAX_RANK).contains(&dims.len()));
        validate_dims(dims)?;

        if dims.iter().any(HyperslabDim::is_empty) {
            if matches!(op, SelectOp::Set | SelectOp::And | SelectOp::NotA) {
                self.kind = SelectionKind::None;
            }
            return Ok(());
        }

        let operand = Operand::Regular(RegularDescriptor::new(dims.to_vec()));
        self.kind = self.combined(op, operand)?;
        Ok(())
    }

    /// Returns a copy of the selection with one regular hyperslab combined in.
    pub fn combine_hyperslab(
        &self,
        op: SelectOp,
        start: &[u64],
        stride: Option<&[u64]>,
        count: &[u64],
        block: Option<&[u64]>,
    ) -> Result<Selection> {
        let mut selection = self.clone();
        selection.select_hyperslab(op, start, stride, count, block)?;
        Ok(selection)
    }

    /// Returns `self op other` as a new selection in `self`'s extent.
    pub fn combine(&self, op: SelectOp, other: &Selection) -> Result<Selection> {
        let mut selection = self.clone();
        selection.modify(op, other)?;
        Ok(selection)
    }

    /// Replaces the selection with `self op other`.
    pub fn modify(&mut self, op: SelectOp, other: &Selection) -> Result<()> {
        verify_rank!("other", other.rank(), self.rank());
        let operand = match &other.kind {
            SelectionKind::None => None,
            SelectionKind::All => extent_descriptor(&other.extent).map(Operand::Regular),
            SelectionKind::Hyperslab(h) => match (h.descriptor(), &h.spans) {
                (Some(desc), _) => Some(Operand::Regular(desc.clone())),
                (None, Some(tree)) => Some(Operand::Spans(tree.clone())),
                (None, None) => None,
            },
        };
        match operand {
            Some(operand) => {
                self.kind = self.combined(op, operand)?;
            }
            None => {
                if matches!(op, SelectOp::Set | SelectOp::And | SelectOp::NotA) {
                    self.kind = SelectionKind::None;
                }
            }
        }
        Ok(())
    }

    /// Resolves the `None` / `All` cases and hands hyperslab pairs on.
    fn combined(&self, op: SelectOp, operand: Operand) -> Result<SelectionKind> {
        if op == SelectOp::Set {
            return Ok(operand.into_kind());
        }
        let current = match &self.kind {
            SelectionKind::None => {
                return Ok(match op {
                    SelectOp::Or | SelectOp::Xor | SelectOp::NotA => operand.into_kind(),
                    _ => SelectionKind::None,
                });
            }
            SelectionKind::All => match op {
                SelectOp::Or => return Ok(SelectionKind::All),
                SelectOp::And => return Ok(operand.into_kind()),
                SelectOp::NotA => return Ok(SelectionKind::None),
                _ => match extent_descriptor(&self.extent) {
                    Some(desc) => Hyperslab::from_descriptor(desc),
                    None => {
                        return Ok(match op {
                            SelectOp::Xor => operand.into_kind(),
                            _ => SelectionKind::None,
                        });
                    }
                },
            },
            SelectionKind::Hyperslab(h) => h.clone(),
        };
        combine_hyperslabs(current, op, operand)
    }
}

fn combine_hyperslabs(a: Hyperslab, op: SelectOp, b: Operand) -> Result<SelectionKind> {
    let (a, b) = match (a.unlimited_dim, b.unlimited_dim()) {
        (Some(_), Some(_)) => {
            return Err(Error::invalid_operation(
                "cannot combine two selections with unlimited dimensions",
            ));
        }
        (None, Some(dim)) => {
            if !matches!(op, SelectOp::And | SelectOp::NotB) {
                return Err(Error::invalid_operation(format!(
                    "{op:?} of an unlimited hyperslab into a finite selection"
                )));
            }
            let clip_size = a.high_bounds()[dim] + 1;
            let clipped = match &b {
                Operand::Regular(desc) => clip_descriptor(desc, dim, clip_size),
                Operand::Spans(_) => None,
            };
            match clipped {
                Some(desc) => (a, Operand::Regular(desc)),
                None => {
                    return Ok(match op {
                        SelectOp::And => SelectionKind::None,
                        _ => SelectionKind::Hyperslab(a),
                    });
                }
            }
        }
        (Some(dim), None) => {
            if !matches!(op, SelectOp::And | SelectOp::NotA) {
                return Err(Error::invalid_operation(format!(
                    "{op:?} of a finite operand into an unlimited selection"
                )));
            }
            let clip_size = b.high_bounds()[dim] + 1;
            match a
                .descriptor()
                .and_then(|desc| clip_descriptor(desc, dim, clip_size))
            {
                Some(desc) => (Hyperslab::from_descriptor(desc), b),
                None => {
                    return Ok(match op {
                        SelectOp::And => SelectionKind::None,
                        _ => b.into_kind(),
                    });
                }
            }
        }
        (None, None) => (a, b),
    };

    if let (Some(da), Operand::Regular(db)) = (a.descriptor(), &b) {
        let fast = match op {
            SelectOp::And => and_single_block(da, db),
            SelectOp::Or | SelectOp::Xor => update_diminfo(da, db, op),
            _ => None,
        };
        if let Some(kind) = fast {
            trace!("{op:?} resolved on regular descriptors");
            return Ok(kind);
        }
    }

    trace!("{op:?} resolved on span trees");
    Ok(SelectionKind::from_tree(combine_trees(op, a.tree(), b.tree())))
}

/// Applies `op` to two span trees; `None` stands for an empty tree.
pub(crate) fn combine_trees(
    op: SelectOp,
    a: Option<Rc<SpanList>>,
    b: Option<Rc<SpanList>>,
) -> Option<Rc<SpanList>> {
    match (op, a, b) {
        (SelectOp::Set, _, b) => b,
        (SelectOp::Or, a, b) => merge_optional(a, b),
        (SelectOp::And, Some(a), Some(b)) => clip_spans(&a, &b, ClipWanted::A_AND_B).a_and_b,
        (SelectOp::And, _, _) => None,
        (SelectOp::Xor, Some(a), Some(b)) => {
            let res = clip_spans(&a, &b, ClipWanted::DIFFERENCES);
            merge_optional(res.a_not_b, res.b_not_a)
        }
        (SelectOp::Xor, a, b) => merge_optional(a, b),
        (SelectOp::NotB, Some(a), Some(b)) => clip_spans(&a, &b, ClipWanted::A_NOT_B).a_not_b,
        (SelectOp::NotB, a, None) => a,
        (SelectOp::NotB, None, _) => None,
        (SelectOp::NotA, Some(a), Some(b)) => clip_spans(&a, &b, ClipWanted::B_NOT_A).b_not_a,
        (SelectOp::NotA, None, b) => b,
        (SelectOp::NotA, _, None) => None,
    }
}

/// Result of intersecting one regular dimension with an index window.
enum Window {
    Empty,
    Dim(HyperslabDim),
    Irregular,
}

/// Intersects the finite pattern `dim` with the inclusive window `[low, high]`.
fn window_dim(dim: &HyperslabDim, low: u64, high: u64) -> Window {
    let dim_high = dim.high();
    if high < dim.start || dim_high < low {
        return Window::Empty;
    }
    let first = if low <= dim.start {
        0
    } else {
        let rel = low - dim.start;
        let i = dim.slot_of(rel);
        if rel - i * dim.stride < dim.block {
            i
        } else {
            i + 1
        }
    };
    let last = dim.slot_of(high - dim.start).min(dim.count - 1);
    if first > last {
        return Window::Empty;
    }
    let (first_low, _) = dim.block_range(first);
    let (_, last_high) = dim.block_range(last);
    let lo = first_low.max(low);
    let hi = last_high.min(high);
    if first == last {
        Window::Dim(HyperslabDim::inclusive(lo, hi))
    } else if lo == first_low && hi == last_high {
        Window::Dim(HyperslabDim::new(first_low, dim.stride, last - first + 1, dim.block))
    } else {
        Window::Irregular
    }
}

/// AND of a regular selection with a single-block hyperslab.
fn and_single_block(a: &RegularDescriptor, b: &RegularDescriptor) -> Option<SelectionKind> {
    if b.opt().iter().any(|d| d.count != 1) {
        return None;
    }
    let (low, high) = (b.low_bounds(), b.high_bounds());
    let inside = (0..a.rank()).all(|i| low[i] <= a.low_bounds()[i] && a.high_bounds()[i] <= high[i]);
    if inside {
        return Some(SelectionKind::from_descriptor(a.clone()));
    }

    let mut dims = Vec::with_capacity(a.rank());
    let mut irregular = false;
    for (i, dim) in a.opt().iter().enumerate() {
        match window_dim(dim, low[i], high[i]) {
            Window::Empty => return Some(SelectionKind::None),
            Window::Dim(d) => dims.push(d),
            Window::Irregular => irregular = true,
        }
    }
    if irregular {
        None
    } else {
        Some(SelectionKind::from_descriptor(RegularDescriptor::new(dims)))
    }
}

/// OR / XOR of two regular descriptions that differ in at most one dimension.
fn update_diminfo(
    a: &RegularDescriptor,
    b: &RegularDescriptor,
    op: SelectOp,
) -> Option<SelectionKind> {
    if a.opt() == b.opt() {
        return Some(match op {
            SelectOp::Or => SelectionKind::from_descriptor(a.clone()),
            _ => SelectionKind::None,
        });
    }
    let mut differing = a
        .opt()
        .iter()
        .zip(b.opt())
        .enumerate()
        .filter(|(_, (x, y))| x != y);
    let (dim, (x, y)) = differing.next()?;
    if differing.next().is_some() {
        return None;
    }
    let merged = merge_dims(x, y, op)?;
    let mut app = a.app().to_vec();
    let mut opt = a.opt().to_vec();
    app[dim] = merged;
    opt[dim] = merged.optimized();
    Some(SelectionKind::from_descriptor(RegularDescriptor::from_parts(
        app, opt,
    )))
}

/// Collapses the union (`Or`) or symmetric difference (`Xor`) of two finite
/// one-dimensional patterns into one pattern when possible.
fn merge_dims(x: &HyperslabDim, y: &HyperslabDim, op: SelectOp) -> Option<HyperslabDim> {
    let (first, second) = if (x.start, x.high()) <= (y.start, y.high()) {
        (x, y)
    } else {
        (y, x)
    };
    let first_high = first.high();

    if first.count == 1 && second.count == 1 && second.start <= first_high + 1 {
        let second_high = second.high();
        return match op {
            SelectOp::Or => Some(HyperslabDim::inclusive(
                first.start,
                first_high.max(second_high),
            )),
            // Bordering blocks do not overlap, so XOR equals OR.
            SelectOp::Xor if second.start == first_high + 1 => {
                Some(HyperslabDim::inclusive(first.start, second_high))
            }
            _ => None,
        };
    }

    // Disjoint patterns: the second must continue the first.
    if first.block != second.block {
        return None;
    }
    let stride = if first.count > 1 {
        first.stride
    } else if second.count > 1 {
        second.stride
    } else {
        second.start - first.start
    };
    if (first.count > 1 && first.stride != stride) || (second.count > 1 && second.stride != stride)
    {
        return None;
    }
    let next_start = stride.checked_mul(first.count)?.checked_add(first.start)?;
    if stride < first.block || second.start != next_start {
        return None;
    }
    Some(HyperslabDim::new(
        first.start,
        stride,
        first.count + second.count,
        first.block,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_dim() {
        let dim = HyperslabDim::new(2, 4, 5, 2);
        // Blocks: 2-3, 6-7, 10-11, 14-15, 18-19.
        assert!(matches!(window_dim(&dim, 4, 5), Window::Empty));
        assert!(matches!(window_dim(&dim, 20, 30), Window::Empty));
        match window_dim(&dim, 5, 12) {
            Window::Dim(d) => assert_eq!(d, HyperslabDim::new(6, 4, 2, 2)),
            _ => panic!("expected a regular window"),
        }
        match window_dim(&dim, 7, 9) {
            Window::Dim(d) => assert_eq!(d, HyperslabDim::new(7, 1, 1, 1)),
            _ => panic!("expected a single block"),
        }
        assert!(matches!(window_dim(&dim, 3, 10), Window::Irregular));
    }

    #[test]
    fn test_merge_dims() {
        let merged = merge_dims(
            &HyperslabDim::single(0, 4),
            &HyperslabDim::single(2, 5),
            SelectOp::Or,
        );
        assert_eq!(merged, Some(HyperslabDim::single(0, 7)));
        assert_eq!(
            merge_dims(
                &HyperslabDim::single(0, 4),
                &HyperslabDim::single(2, 5),
                SelectOp::Xor
            ),
            None
        );
        assert_eq!(
            merge_dims(
                &HyperslabDim::single(4, 2),
                &HyperslabDim::single(0, 2),
                SelectOp::Xor
            ),
            Some(HyperslabDim::new(0, 4, 2, 2))
        );
        assert_eq!(
            merge_dims(
                &HyperslabDim::new(0, 5, 3, 2),
                &HyperslabDim::single(15, 2),
                SelectOp::Or
            ),
            Some(HyperslabDim::new(0, 5, 4, 2))
        );
        assert_eq!(
            merge_dims(
                &HyperslabDim::new(0, 5, 3, 2),
                &HyperslabDim::single(16, 2),
                SelectOp::Or
            ),
            None
        );
    }
}
