//! Read-only queries and shape-preserving transformations of selections.

use std::{borrow::Cow, cell::OnceCell, collections::HashSet, rc::Rc};

use hyperslab_common::{Result, error::Error, verify_arg, verify_rank};

use super::{Hyperslab, RegularBlocks, Selection, SelectionKind, extent_descriptor};
use crate::{
    block::Block,
    epoch::Epoch,
    regular::{RegularDescriptor, RegularState, UNLIMITED},
    span::SpanList,
};

/// Normalized view of a selection used for shape comparison.
enum Shape<'a> {
    Empty,
    Regular(Cow<'a, RegularDescriptor>),
    Tree(Rc<SpanList>),
}

impl Shape<'_> {
    fn into_tree(self) -> Option<Rc<SpanList>> {
        match self {
            Shape::Empty => None,
            Shape::Regular(desc) if desc.unlimited_dim().is_none() => {
                SpanList::from_regular(desc.opt())
            }
            Shape::Regular(_) => None,
            Shape::Tree(tree) => Some(tree),
        }
    }
}

impl Selection {
    /// Number of blocks: the product of the requested counts for regular
    /// selections, the number of depth-first boxes of the span tree otherwise.
    pub fn num_blocks(&self) -> u64 {
        match &self.kind {
            SelectionKind::None => 0,
            SelectionKind::All => u64::from(self.num_elements() > 0),
            SelectionKind::Hyperslab(h) => match (h.descriptor(), &h.spans) {
                (Some(desc), _) => desc.num_blocks(),
                (None, Some(tree)) => tree.num_blocks(Epoch::next()),
                (None, None) => 0,
            },
        }
    }

    /// Bounding box of the selected elements. The high bound of an unlimited
    /// dimension is [`UNLIMITED`].
    pub fn bounds(&self) -> Option<Block> {
        match &self.kind {
            SelectionKind::None => None,
            SelectionKind::All => extent_descriptor(&self.extent)
                .map(|desc| Block::new(desc.low_bounds().to_vec(), desc.high_bounds().to_vec())),
            SelectionKind::Hyperslab(h) => Some(Block::new(h.low_bounds(), h.high_bounds())),
        }
    }

    /// Coordinates of the first selected element in row-major order.
    pub fn first_coords(&self) -> Option<Vec<u64>> {
        match &self.kind {
            SelectionKind::None => None,
            SelectionKind::All => extent_descriptor(&self.extent).map(|_| vec![0; self.rank()]),
            SelectionKind::Hyperslab(h) => match (h.descriptor(), &h.spans) {
                (Some(desc), _) => Some(desc.opt().iter().map(|d| d.start).collect()),
                (None, Some(tree)) => Some(tree.first_coords()),
                (None, None) => None,
            },
        }
    }

    /// Linear (row-major) offset of the first selected element in the extent.
    pub fn offset(&self) -> Option<u64> {
        let coords = self.first_coords()?;
        let mut offset = 0u64;
        let mut stride = 1u64;
        for (c, size) in coords.iter().zip(&self.extent).rev() {
            offset = offset.saturating_add(c.saturating_mul(stride));
            stride = stride.saturating_mul(*size);
        }
        Some(offset)
    }

    /// Whether the selected elements form one contiguous range of the extent.
    ///
    /// Two shapes are recognized: one block spanning the full extent of every
    /// dimension but the slowest, or one block that is a single index in every
    /// dimension but the fastest.
    pub fn is_contiguous(&self) -> bool {
        let Some(runs) = self.single_block() else {
            return matches!(self.kind, SelectionKind::All);
        };
        let rank = runs.len();
        let large = runs
            .iter()
            .enumerate()
            .skip(1)
            .all(|(u, &(_, len))| len == self.extent[u]);
        let small = runs
            .iter()
            .take(rank.saturating_sub(1))
            .all(|&(_, len)| len == 1);
        large || small
    }

    /// Whether the selection is exactly one block.
    pub fn is_single(&self) -> bool {
        match &self.kind {
            SelectionKind::None => false,
            SelectionKind::All => true,
            SelectionKind::Hyperslab(_) => self.single_block().is_some(),
        }
    }

    /// `(start, length)` per dimension when a hyperslab is exactly one block.
    fn single_block(&self) -> Option<Vec<(u64, u64)>> {
        let h = self.hyperslab_ref()?;
        if h.unlimited_dim.is_some() {
            return None;
        }
        if let Some(desc) = h.descriptor() {
            return desc
                .opt()
                .iter()
                .map(|d| (d.count == 1).then_some((d.start, d.block)))
                .collect();
        }
        let mut runs = Vec::new();
        let mut level: &SpanList = h.spans.as_ref()?;
        loop {
            let [span] = level.spans() else {
                return None;
            };
            runs.push((span.low(), span.len()));
            match span.down() {
                Some(down) => level = down,
                None => return Some(runs),
            }
        }
    }

    fn shape(&self) -> Shape<'_> {
        match &self.kind {
            SelectionKind::None => Shape::Empty,
            SelectionKind::All => match extent_descriptor(&self.extent) {
                Some(desc) => Shape::Regular(Cow::Owned(desc)),
                None => Shape::Empty,
            },
            SelectionKind::Hyperslab(h) => match (h.regular_view(), &h.spans) {
                (Some(desc), _) => Shape::Regular(desc),
                (None, Some(tree)) => Shape::Tree(tree.clone()),
                (None, None) => Shape::Empty,
            },
        }
    }

    /// Whether two selections select the same pattern up to a translation.
    ///
    /// The selections may differ in rank: the extra slowest dimensions of the
    /// higher-rank selection must then select a single index.
    pub fn shape_same(&self, other: &Selection) -> bool {
        if self.num_elements() != other.num_elements() {
            return false;
        }
        match (self.shape(), other.shape()) {
            (Shape::Empty, Shape::Empty) => true,
            (Shape::Empty, _) | (_, Shape::Empty) => false,
            (Shape::Regular(a), Shape::Regular(b)) => regular_shape_same(&a, &b),
            (a, b) => match (a.into_tree(), b.into_tree()) {
                (Some(a), Some(b)) => tree_shape_same(&a, &b),
                _ => false,
            },
        }
    }

    /// The block list: the caller's regular blocks, or the depth-first boxes of
    /// the span tree. Starts at block `start_block` and returns at most
    /// `num_blocks` blocks.
    pub fn blocks(&self, start_block: u64, num_blocks: u64) -> Result<Vec<Block>> {
        let take = usize::try_from(num_blocks).unwrap_or(usize::MAX);
        let skip = usize::try_from(start_block).unwrap_or(usize::MAX);
        match &self.kind {
            SelectionKind::None => Ok(Vec::new()),
            SelectionKind::All => Ok(self.bounds().into_iter().skip(skip).take(take).collect()),
            SelectionKind::Hyperslab(h) => {
                if h.unlimited_dim.is_some() {
                    return Err(Error::invalid_operation(
                        "block list of a selection with an unlimited dimension",
                    ));
                }
                match (h.descriptor(), &h.spans) {
                    (Some(desc), _) => Ok(RegularBlocks::starting_at(desc.app(), start_block)
                        .take(take)
                        .collect()),
                    (None, Some(tree)) => Ok(tree.blocks().skip(skip).take(take).collect()),
                    (None, None) => Ok(Vec::new()),
                }
            }
        }
    }

    /// Every block of the selection. See [`Selection::blocks`].
    pub fn block_list(&self) -> Result<Vec<Block>> {
        self.blocks(0, u64::MAX)
    }

    /// Whether any selected element lies in the box `[start, end]`.
    pub fn intersects_block(&self, start: &[u64], end: &[u64]) -> Result<bool> {
        verify_rank!("start", start.len(), self.rank());
        verify_rank!("end", end.len(), self.rank());
        verify_arg!(end, start.iter().zip(end).all(|(s, e)| s <= e));
        Ok(match &self.kind {
            SelectionKind::None => false,
            SelectionKind::All => self.bounds().is_some_and(|b| b.intersects(start, end)),
            SelectionKind::Hyperslab(h) => match (h.descriptor(), &h.spans) {
                (Some(desc), _) => desc
                    .opt()
                    .iter()
                    .zip(start.iter().zip(end))
                    .all(|(dim, (&s, &e))| dim.intersects(s, e)),
                (None, Some(tree)) => tree.intersects_block(start, end),
                (None, None) => false,
            },
        })
    }

    /// Whether every selected element lies within the current extent.
    pub fn is_within_extent(&self) -> bool {
        match &self.kind {
            SelectionKind::None | SelectionKind::All => true,
            SelectionKind::Hyperslab(h) => {
                h.unlimited_dim.is_none()
                    && h.high_bounds()
                        .iter()
                        .zip(&self.extent)
                        .all(|(high, size)| high < size)
            }
        }
    }

    /// Shifts every selected element by `offset` (added per dimension).
    ///
    /// Fails without changing the selection when an element would leave the
    /// coordinate range. `None` and `All` selections are unaffected.
    pub fn adjust(&mut self, offset: &[i64]) -> Result<()> {
        verify_rank!("offset", offset.len(), self.rank());
        let SelectionKind::Hyperslab(h) = &self.kind else {
            return Ok(());
        };
        let (low, high) = (h.low_bounds(), h.high_bounds());
        for (i, &off) in offset.iter().enumerate() {
            let new_low = i128::from(low[i]) + i128::from(off);
            let new_high = i128::from(high[i]) + i128::from(off);
            let unlimited = h.unlimited_dim == Some(i);
            if new_low < 0 || (!unlimited && new_high >= i128::from(UNLIMITED)) {
                return Err(Error::invalid_arg(
                    "offset",
                    format!("offset {off} moves the selection out of range in dimension {i}"),
                ));
            }
        }

        let epoch = Epoch::next();
        let adjusted = Hyperslab {
            regular: match h.regular.get() {
                Some(RegularState::Valid(desc)) => {
                    OnceCell::from(RegularState::Valid(desc.shifted(offset)))
                }
                _ => h.regular.clone(),
            },
            spans: h.spans.as_ref().map(|tree| tree.adjusted(offset, epoch)),
            unlimited_dim: h.unlimited_dim,
            num_elements: h.num_elements,
        };
        self.kind = SelectionKind::Hyperslab(adjusted);
        Ok(())
    }

    /// Copy of the selection that shares no span list with `self`.
    pub fn deep_copy(&self) -> Selection {
        let kind = match &self.kind {
            SelectionKind::Hyperslab(h) => SelectionKind::Hyperslab(Hyperslab {
                spans: h.spans.as_ref().map(|tree| tree.deep_copy(Epoch::next())),
                ..h.clone()
            }),
            kind => kind.clone(),
        };
        Selection::from_kind(self.extent.clone(), kind)
    }

    /// Changes the extent while keeping the selected elements.
    pub fn set_extent(&mut self, extent: Vec<u64>) -> Result<()> {
        verify_rank!("extent", extent.len(), self.rank());
        self.extent = extent;
        Ok(())
    }
}

fn regular_shape_same(a: &RegularDescriptor, b: &RegularDescriptor) -> bool {
    let (long, short) = if a.rank() >= b.rank() { (a, b) } else { (b, a) };
    let lead = long.rank() - short.rank();
    if long.opt()[..lead]
        .iter()
        .any(|d| d.count != 1 || d.block != 1)
    {
        return false;
    }
    long.opt()[lead..]
        .iter()
        .zip(short.opt())
        .all(|(x, y)| x.count == y.count && x.block == y.block && (x.count == 1 || x.stride == y.stride))
}

fn tree_shape_same(a: &Rc<SpanList>, b: &Rc<SpanList>) -> bool {
    let (mut long, short) = if a.rank() >= b.rank() { (a, b) } else { (b, a) };
    for _ in 0..long.rank() - short.rank() {
        match long.spans() {
            [span] if span.len() == 1 => match span.down() {
                Some(down) => long = down,
                None => return false,
            },
            _ => return false,
        }
    }
    let offsets = long
        .low_bounds()
        .iter()
        .zip(short.low_bounds())
        .map(|(&l, &s)| i128::from(s) - i128::from(l))
        .collect::<Vec<_>>();
    let mut equal_pairs = HashSet::new();
    translated_equal(long, short, &offsets, &mut equal_pairs)
}

/// Whether `b` equals `a` shifted by `offsets`.
fn translated_equal(
    a: &Rc<SpanList>,
    b: &Rc<SpanList>,
    offsets: &[i128],
    equal_pairs: &mut HashSet<(*const SpanList, *const SpanList)>,
) -> bool {
    let key = (Rc::as_ptr(a), Rc::as_ptr(b));
    if equal_pairs.contains(&key) {
        return true;
    }
    if a.spans().len() != b.spans().len() {
        return false;
    }
    let off = offsets[0];
    let equal = a.spans().iter().zip(b.spans()).all(|(sa, sb)| {
        i128::from(sa.low()) + off == i128::from(sb.low())
            && sa.len() == sb.len()
            && match (sa.down(), sb.down()) {
                (Some(da), Some(db)) => translated_equal(da, db, &offsets[1..], equal_pairs),
                (None, None) => true,
                _ => false,
            }
    });
    if equal {
        equal_pairs.insert(key);
    }
    equal
}

#[cfg(test)]
mod tests {
    use crate::{SelectOp, Selection};

    #[test]
    fn test_shape_same_with_translation() {
        let a = Selection::hyperslab(vec![20, 20], &[0, 0], Some(&[4, 4]), &[2, 3], Some(&[2, 2]))
            .unwrap();
        let b = Selection::hyperslab(vec![30, 30], &[5, 7], Some(&[4, 4]), &[2, 3], Some(&[2, 2]))
            .unwrap();
        assert!(a.shape_same(&b));
        let c = Selection::hyperslab(vec![20, 20], &[0, 0], Some(&[5, 4]), &[2, 3], Some(&[2, 2]))
            .unwrap();
        assert!(!a.shape_same(&c));
    }

    #[test]
    fn test_shape_same_across_ranks() {
        let a = Selection::hyperslab(vec![8, 10], &[3, 2], None, &[1, 4], None).unwrap();
        let b = Selection::hyperslab(vec![10], &[5], None, &[4], None).unwrap();
        assert!(a.shape_same(&b));
        let c = Selection::hyperslab(vec![8, 10], &[3, 2], None, &[2, 2], None).unwrap();
        assert!(!c.shape_same(&b));
    }

    #[test]
    fn test_shape_same_span_trees() {
        let mut a = Selection::hyperslab(vec![10, 10], &[0, 0], Some(&[3, 3]), &[2, 2], Some(&[2, 2]))
            .unwrap();
        a.select_hyperslab(SelectOp::Or, &[2, 2], None, &[1, 1], Some(&[3, 3]))
            .unwrap();
        let mut b = a.clone();
        b.adjust(&[4, 1]).unwrap();
        assert!(a.shape_same(&b));
        assert!(!a.is_regular());
    }

    #[test]
    fn test_contiguity_rules() {
        let rows = Selection::hyperslab(vec![6, 4], &[2, 0], None, &[1, 1], Some(&[3, 4])).unwrap();
        assert!(rows.is_contiguous());
        let run = Selection::hyperslab(vec![6, 4], &[2, 1], None, &[1, 1], Some(&[1, 3])).unwrap();
        assert!(run.is_contiguous());
        let hybrid =
            Selection::hyperslab(vec![6, 4], &[2, 1], None, &[1, 1], Some(&[2, 3])).unwrap();
        assert!(!hybrid.is_contiguous());
        assert!(hybrid.is_single());
        assert!(Selection::all(vec![6, 4]).is_contiguous());
        assert!(!Selection::none(vec![6, 4]).is_contiguous());
    }

    #[test]
    fn test_offset_and_bounds() {
        let sel = Selection::hyperslab(vec![10, 10], &[2, 3], Some(&[3, 3]), &[2, 2], Some(&[2, 2]))
            .unwrap();
        assert_eq!(sel.offset(), Some(23));
        let bounds = sel.bounds().unwrap();
        assert_eq!(bounds.start, vec![2, 3]);
        assert_eq!(bounds.end, vec![6, 7]);
        assert_eq!(Selection::none(vec![3]).offset(), None);
    }

    #[test]
    fn test_adjust_rejects_negative_coordinates() {
        let mut sel = Selection::hyperslab(vec![10], &[2], None, &[3], None).unwrap();
        assert!(sel.adjust(&[-3]).is_err());
        assert_eq!(sel.bounds().unwrap().start, vec![2]);
        sel.adjust(&[-2]).unwrap();
        assert_eq!(sel.bounds().unwrap().start, vec![0]);
    }
}
