//! Span trees: the general representation of hyperslab selections.
//!
//! A [`SpanList`] holds the selected intervals ([`Span`]s) of one dimension in
//! ascending order. Every span of a non-fastest dimension points to the list of
//! the next faster dimension that is selected *for every index of the span*.
//! Lists are immutable once built and shared through `Rc`, so a regular pattern
//! with thousands of rows stores its row list once. Editing a selection always
//! builds new lists and only clones references to the untouched ones.
//!
//! Invariants of a list:
//! - spans are sorted and disjoint;
//! - two spans touch (`prev.high + 1 == next.low`) only when their down trees
//!   differ, otherwise they are coalesced by [`SpanListBuilder::append`];
//! - `low_bounds` / `high_bounds` hold the exact minimum / maximum index of the
//!   subtree in this dimension and every faster one;
//! - every `down` list has a rank one lower than its parent, and the fastest
//!   dimension has no `down` lists.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::{block::Block, epoch::Epoch, regular::HyperslabDim};

pub mod clip;

pub use clip::{ClipResult, ClipWanted, clip_spans, merge_optional, merge_spans};

/// One inclusive interval of selected indices in one dimension.
#[derive(Debug, Clone)]
pub struct Span {
    low: u64,
    high: u64,
    down: Option<Rc<SpanList>>,
}

impl Span {
    #[inline]
    pub fn low(&self) -> u64 {
        self.low
    }

    #[inline]
    pub fn high(&self) -> u64 {
        self.high
    }

    /// Selection of the faster dimensions for every index of this span.
    #[inline]
    pub fn down(&self) -> Option<&Rc<SpanList>> {
        self.down.as_ref()
    }

    /// Number of indices covered by the span.
    #[inline]
    pub fn len(&self) -> u64 {
        self.high - self.low + 1
    }
}

/// Per-list cache of the last memoized walk.
#[derive(Debug, Default)]
struct Memo {
    epoch: Cell<u64>,
    value: Cell<u64>,
    mapped: RefCell<Weak<SpanList>>,
}

impl Memo {
    #[inline]
    fn value(&self, epoch: Epoch) -> Option<u64> {
        (self.epoch.get() == epoch.value()).then(|| self.value.get())
    }

    #[inline]
    fn set_value(&self, epoch: Epoch, value: u64) {
        self.epoch.set(epoch.value());
        self.value.set(value);
    }

    fn mapped(&self, epoch: Epoch) -> Option<Rc<SpanList>> {
        if self.epoch.get() == epoch.value() {
            self.mapped.borrow().upgrade()
        } else {
            None
        }
    }

    fn set_mapped(&self, epoch: Epoch, list: &Rc<SpanList>) {
        self.epoch.set(epoch.value());
        *self.mapped.borrow_mut() = Rc::downgrade(list);
    }
}

/// The ascending, coalesced list of spans of one dimension.
#[derive(Debug)]
pub struct SpanList {
    spans: Vec<Span>,
    low_bounds: Vec<u64>,
    high_bounds: Vec<u64>,
    memo: Memo,
}

impl SpanList {
    fn from_spans(spans: Vec<Span>) -> SpanList {
        debug_assert!(!spans.is_empty());
        let rank = 1 + spans[0].down.as_ref().map_or(0, |d| d.rank());
        let mut low_bounds = vec![u64::MAX; rank];
        let mut high_bounds = vec![0u64; rank];
        low_bounds[0] = spans[0].low;
        high_bounds[0] = spans[spans.len() - 1].high;

        let mut prev: Option<&Rc<SpanList>> = None;
        for down in spans.iter().filter_map(|s| s.down.as_ref()) {
            if prev.is_some_and(|p| Rc::ptr_eq(p, down)) {
                continue;
            }
            for (i, (&lo, &hi)) in down.low_bounds.iter().zip(&down.high_bounds).enumerate() {
                low_bounds[i + 1] = low_bounds[i + 1].min(lo);
                high_bounds[i + 1] = high_bounds[i + 1].max(hi);
            }
            prev = Some(down);
        }

        SpanList {
            spans,
            low_bounds,
            high_bounds,
            memo: Memo::default(),
        }
    }

    /// Builds the span tree of a regular pattern (optimized view, finite and
    /// non-empty in every dimension).
    pub fn from_regular(dims: &[HyperslabDim]) -> Option<Rc<SpanList>> {
        let mut down: Option<Rc<SpanList>> = None;
        for dim in dims.iter().rev() {
            debug_assert!(!dim.is_unlimited() && !dim.is_empty());
            let mut builder = SpanListBuilder::with_capacity(dim.count as usize);
            for i in 0..dim.count {
                let (low, high) = dim.block_range(i);
                builder.append(low, high, down.clone());
            }
            down = Some(builder.finish()?);
        }
        down
    }

    /// Builds the span tree of a single box.
    pub fn from_block(start: &[u64], end: &[u64]) -> Option<Rc<SpanList>> {
        let dims = start
            .iter()
            .zip(end)
            .map(|(&s, &e)| HyperslabDim::inclusive(s, e))
            .collect::<Vec<_>>();
        SpanList::from_regular(&dims)
    }

    /// Number of dimensions described by this list and its descendants.
    #[inline]
    pub fn rank(&self) -> usize {
        self.low_bounds.len()
    }

    #[inline]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Minimum selected index per dimension, this one first.
    #[inline]
    pub fn low_bounds(&self) -> &[u64] {
        &self.low_bounds
    }

    /// Maximum selected index per dimension, this one first.
    #[inline]
    pub fn high_bounds(&self) -> &[u64] {
        &self.high_bounds
    }

    /// Number of selected elements, visiting each shared list once per `epoch`.
    pub fn num_elements(&self, epoch: Epoch) -> u64 {
        if let Some(count) = self.memo.value(epoch) {
            return count;
        }
        let count = self.spans.iter().fold(0u64, |acc, span| {
            let per_index = span.down.as_ref().map_or(1, |d| d.num_elements(epoch));
            acc.saturating_add(span.len().saturating_mul(per_index))
        });
        self.memo.set_value(epoch, count);
        count
    }

    /// Number of boxes in the depth-first block list, visiting each shared list
    /// once per `epoch`.
    pub fn num_blocks(&self, epoch: Epoch) -> u64 {
        if let Some(count) = self.memo.value(epoch) {
            return count;
        }
        let count = self.spans.iter().fold(0u64, |acc, span| {
            acc.saturating_add(span.down.as_ref().map_or(1, |d| d.num_blocks(epoch)))
        });
        self.memo.set_value(epoch, count);
        count
    }

    /// Copy of the tree with every index shifted by `offset[dim]`.
    ///
    /// Shared lists stay shared in the copy: each list is mapped once per `epoch`.
    /// The caller guarantees that no shifted index leaves the `u64` range.
    pub fn adjusted(self: &Rc<Self>, offset: &[i64], epoch: Epoch) -> Rc<SpanList> {
        if let Some(mapped) = self.memo.mapped(epoch) {
            return mapped;
        }
        let delta = offset[0];
        let spans = self
            .spans
            .iter()
            .map(|span| Span {
                low: span.low.wrapping_add_signed(delta),
                high: span.high.wrapping_add_signed(delta),
                down: span.down.as_ref().map(|d| d.adjusted(&offset[1..], epoch)),
            })
            .collect();
        let list = Rc::new(SpanList::from_spans(spans));
        self.memo.set_mapped(epoch, &list);
        list
    }

    /// Deep copy of the tree, preserving the sharing of down lists.
    pub fn deep_copy(self: &Rc<Self>, epoch: Epoch) -> Rc<SpanList> {
        let zero = vec![0i64; self.rank()];
        self.adjusted(&zero, epoch)
    }

    /// Coordinates of the first selected element in row-major order.
    pub fn first_coords(&self) -> Vec<u64> {
        let mut coords = Vec::with_capacity(self.rank());
        let mut list = self;
        loop {
            let span = &list.spans[0];
            coords.push(span.low);
            match &span.down {
                Some(down) => list = down,
                None => return coords,
            }
        }
    }

    /// Whether the coordinates are selected.
    pub fn contains(&self, coords: &[u64]) -> bool {
        let Some((&c, rest)) = coords.split_first() else {
            return false;
        };
        let idx = self.spans.partition_point(|s| s.high < c);
        match self.spans.get(idx) {
            Some(span) if span.low <= c => match &span.down {
                Some(down) => down.contains(rest),
                None => rest.is_empty(),
            },
            _ => false,
        }
    }

    /// Whether any selected element lies in the box `[start, end]`.
    pub fn intersects_block(&self, start: &[u64], end: &[u64]) -> bool {
        if self
            .low_bounds
            .iter()
            .zip(&self.high_bounds)
            .zip(start.iter().zip(end))
            .any(|((lo, hi), (s, e))| hi < s || e < lo)
        {
            return false;
        }
        let first = self.spans.partition_point(|s| s.high < start[0]);
        self.spans[first..]
            .iter()
            .take_while(|s| s.low <= end[0])
            .any(|span| match &span.down {
                Some(down) => down.intersects_block(&start[1..], &end[1..]),
                None => true,
            })
    }

    /// Depth-first list of the boxes making up the tree.
    pub fn blocks(&self) -> SpanBlocks<'_> {
        SpanBlocks::new(self)
    }
}

/// Structural equality of two span trees.
pub fn spans_equal(a: &SpanList, b: &SpanList) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    if a.spans.len() != b.spans.len()
        || a.low_bounds != b.low_bounds
        || a.high_bounds != b.high_bounds
    {
        return false;
    }
    a.spans.iter().zip(&b.spans).all(|(sa, sb)| {
        sa.low == sb.low && sa.high == sb.high && downs_equal(sa.down.as_ref(), sb.down.as_ref())
    })
}

/// Structural equality of two optional down trees.
#[inline]
pub fn downs_equal(a: Option<&Rc<SpanList>>, b: Option<&Rc<SpanList>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b) || spans_equal(a, b),
        _ => false,
    }
}

/// Whether the bounding boxes of two trees of equal rank overlap.
pub fn bounds_overlap(a: &SpanList, b: &SpanList) -> bool {
    a.low_bounds
        .iter()
        .zip(&a.high_bounds)
        .zip(b.low_bounds.iter().zip(&b.high_bounds))
        .all(|((alo, ahi), (blo, bhi))| alo <= bhi && blo <= ahi)
}

/// Accumulates spans in ascending order and produces an immutable [`SpanList`].
#[derive(Debug, Default)]
pub struct SpanListBuilder {
    spans: Vec<Span>,
}

impl SpanListBuilder {
    pub fn new() -> SpanListBuilder {
        SpanListBuilder { spans: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> SpanListBuilder {
        SpanListBuilder {
            spans: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Appends `[low, high]` after the current tail.
    ///
    /// The new interval is merged into the tail when it touches it and selects an
    /// identical down tree. Otherwise a new span is pushed; when its down tree is
    /// identical to the tail's, the tail's list is shared instead of `down`.
    pub fn append(&mut self, low: u64, high: u64, down: Option<Rc<SpanList>>) {
        debug_assert!(low <= high);
        if let Some(tail) = self.spans.last_mut() {
            debug_assert!(tail.high < low, "spans must be appended in ascending order");
            let same_down = downs_equal(tail.down.as_ref(), down.as_ref());
            if same_down && tail.high + 1 == low {
                tail.high = high;
                return;
            }
            let down = if same_down { tail.down.clone() } else { down };
            self.spans.push(Span { low, high, down });
        } else {
            self.spans.push(Span { low, high, down });
        }
    }

    /// Appends a copy of an existing span (sharing its down tree).
    #[inline]
    pub fn append_span(&mut self, span: &Span) {
        self.append(span.low, span.high, span.down.clone());
    }

    /// Appends every span of `spans`.
    pub fn extend_from(&mut self, spans: &[Span]) {
        for span in spans {
            self.append_span(span);
        }
    }

    /// Finishes the list; `None` when nothing was appended.
    pub fn finish(self) -> Option<Rc<SpanList>> {
        if self.spans.is_empty() {
            None
        } else {
            Some(Rc::new(SpanList::from_spans(self.spans)))
        }
    }
}

/// Iterator over the boxes of a span tree in depth-first order.
///
/// Each box pairs one span per dimension along a root-to-leaf path.
pub struct SpanBlocks<'a> {
    stack: Vec<(&'a SpanList, usize)>,
    start: Vec<u64>,
    end: Vec<u64>,
}

impl<'a> SpanBlocks<'a> {
    fn new(root: &'a SpanList) -> SpanBlocks<'a> {
        let rank = root.rank();
        let mut stack = Vec::with_capacity(rank);
        stack.push((root, 0));
        SpanBlocks {
            stack,
            start: vec![0; rank],
            end: vec![0; rank],
        }
    }
}

impl Iterator for SpanBlocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        loop {
            let &(list, idx) = self.stack.last()?;
            if idx >= list.spans.len() {
                self.stack.pop();
                continue;
            }
            let level = self.stack.len() - 1;
            if let Some(top) = self.stack.last_mut() {
                top.1 += 1;
            }
            let span = &list.spans[idx];
            self.start[level] = span.low;
            self.end[level] = span.high;
            match &span.down {
                Some(down) => self.stack.push((down, 0)),
                None => return Some(Block::new(self.start.clone(), self.end.clone())),
            }
        }
    }
}
