//! Conversion of selections into runs of contiguous bytes.
//!
//! A [`SelectionIter`] walks a selection in row-major order and reports the
//! selected elements as [`Sequence`]s: `(offset, len)` pairs in bytes relative to
//! the start of the dataspace, given the size of one element. Runs are ordered,
//! never overlap, and touching runs are coalesced. Regular selections are walked
//! with closed-form arithmetic; span trees with one cursor per dimension.

use hyperslab_common::{Result, error::Error, verify_arg};
use itertools::Itertools;

use crate::{
    config::IterConfig,
    selection::{Selection, SelectionKind, extent_descriptor},
};

mod regular;
mod spans;

use regular::RegularCursor;
use spans::SpanCursor;

/// A run of contiguous bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sequence {
    pub offset: u64,
    pub len: u64,
}

impl Sequence {
    #[inline]
    pub fn new(offset: u64, len: u64) -> Sequence {
        Sequence { offset, len }
    }

    /// Offset one past the last byte of the run.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

enum Cursor {
    Empty,
    Regular(RegularCursor),
    Spans(SpanCursor),
}

impl Cursor {
    fn peek_offset(&self) -> Option<u64> {
        match self {
            Cursor::Empty => None,
            Cursor::Regular(c) => c.peek_offset(),
            Cursor::Spans(c) => c.peek_offset(),
        }
    }

    fn next_run(&mut self, max_len: u64) -> Option<(u64, u64)> {
        match self {
            Cursor::Empty => None,
            Cursor::Regular(c) => c.next_run(max_len),
            Cursor::Spans(c) => c.next_run(max_len),
        }
    }

    fn coords(&self) -> Option<Vec<u64>> {
        match self {
            Cursor::Empty => None,
            Cursor::Regular(c) => c.coords(),
            Cursor::Spans(c) => c.coords(),
        }
    }
}

/// Resumable iterator over the byte runs of a selection.
///
/// The iterator copies what it needs from the selection (span trees are shared,
/// not copied), so the selection may be modified or dropped while iterating.
pub struct SelectionIter {
    cursor: Cursor,
    elem_size: u64,
    remaining: u64,
    config: IterConfig,
}

impl SelectionIter {
    /// Creates an iterator with the default [`IterConfig`].
    pub fn new(selection: &Selection, elem_size: u64) -> Result<SelectionIter> {
        SelectionIter::with_config(selection, elem_size, IterConfig::default())
    }

    pub fn with_config(
        selection: &Selection,
        elem_size: u64,
        config: IterConfig,
    ) -> Result<SelectionIter> {
        verify_arg!(elem_size, elem_size > 0);
        config.validate()?;
        if selection.unlimited_dim().is_some() {
            return Err(Error::invalid_operation(
                "iteration over a selection with an unlimited dimension",
            ));
        }

        let extent = selection.extent();
        let cursor = match selection.kind() {
            SelectionKind::None => Cursor::Empty,
            SelectionKind::All => match extent_descriptor(extent) {
                Some(desc) => Cursor::Regular(RegularCursor::new(desc.opt(), extent, config.flatten)),
                None => Cursor::Empty,
            },
            SelectionKind::Hyperslab(h) => match (h.regular_view(), &h.spans) {
                (Some(desc), _) => {
                    Cursor::Regular(RegularCursor::new(desc.opt(), extent, config.flatten))
                }
                (None, Some(tree)) => Cursor::Spans(SpanCursor::new(tree.clone(), extent)),
                (None, None) => Cursor::Empty,
            },
        };

        Ok(SelectionIter {
            cursor,
            elem_size,
            remaining: selection.num_elements(),
            config,
        })
    }

    /// Number of elements not yet returned.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    #[inline]
    pub fn elem_size(&self) -> u64 {
        self.elem_size
    }

    /// Coordinates, in the selection's rank, of the next element to be returned.
    pub fn coords(&self) -> Option<Vec<u64>> {
        if self.remaining == 0 {
            return None;
        }
        self.cursor.coords()
    }

    /// Returns up to `max_runs` runs covering up to `max_elements` elements.
    ///
    /// An empty result means the iterator is exhausted.
    pub fn get_next_runs(&mut self, max_runs: usize, max_elements: u64) -> Vec<Sequence> {
        let mut runs = Vec::new();
        self.get_next_runs_into(max_runs, max_elements, &mut runs);
        runs
    }

    /// Appends up to `max_runs` runs covering up to `max_elements` elements to
    /// `runs` and returns the number of elements covered.
    ///
    /// Runs appended by one call are coalesced with each other. The call stops
    /// before a run that would exceed `max_runs` unless it extends the last run.
    pub fn get_next_runs_into(
        &mut self,
        max_runs: usize,
        max_elements: u64,
        runs: &mut Vec<Sequence>,
    ) -> u64 {
        let base = runs.len();
        let mut taken = 0u64;
        while taken < max_elements && self.remaining > 0 {
            let Some(next) = self.cursor.peek_offset() else {
                break;
            };
            let offset = next * self.elem_size;
            let extends_last = runs.len() > base && runs.last().is_some_and(|r| r.end() == offset);
            if !extends_last && runs.len() - base >= max_runs {
                break;
            }
            let Some((_, len)) = self.cursor.next_run(max_elements - taken) else {
                break;
            };
            let bytes = len * self.elem_size;
            match runs.last_mut() {
                Some(last) if extends_last => last.len += bytes,
                _ => runs.push(Sequence::new(offset, bytes)),
            }
            taken += len;
            self.remaining = self.remaining.saturating_sub(len);
        }
        taken
    }

    /// Skips up to `n` elements and returns the number skipped.
    pub fn skip(&mut self, n: u64) -> u64 {
        let mut skipped = 0;
        while skipped < n && self.remaining > 0 {
            let Some((_, len)) = self.cursor.next_run(n - skipped) else {
                break;
            };
            skipped += len;
            self.remaining = self.remaining.saturating_sub(len);
        }
        skipped
    }

    /// Drains the iterator in batches of the configured size and returns every
    /// remaining run, coalesced across batch boundaries.
    pub fn runs(&mut self) -> Vec<Sequence> {
        let mut runs = Vec::new();
        while self.get_next_runs_into(self.config.max_runs, self.config.max_elements, &mut runs)
            > 0
        {}
        runs.into_iter()
            .coalesce(|a, b| {
                if a.end() == b.offset {
                    Ok(Sequence::new(a.offset, a.len + b.len))
                } else {
                    Err((a, b))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SelectOp;

    #[test]
    fn test_regular_selection_runs() {
        let sel = Selection::hyperslab(
            vec![10, 10],
            &[2, 2],
            Some(&[3, 3]),
            &[2, 2],
            Some(&[2, 2]),
        )
        .unwrap();
        let mut iter = SelectionIter::new(&sel, 4).unwrap();
        let runs = iter.get_next_runs(100, u64::MAX);
        assert_eq!(runs.len(), 8);
        assert_eq!(runs[0], Sequence::new(88, 8));
        assert_eq!(runs[1], Sequence::new(100, 8));
        assert_eq!(runs.iter().map(|r| r.len).sum::<u64>(), 16 * 4);
        assert_eq!(iter.remaining(), 0);
        assert!(iter.get_next_runs(100, u64::MAX).is_empty());
    }

    #[test]
    fn test_limits_and_resumption() {
        let sel = Selection::hyperslab(vec![4, 6], &[0, 1], None, &[4, 1], Some(&[1, 3])).unwrap();
        let mut iter = SelectionIter::new(&sel, 1).unwrap();
        assert_eq!(iter.get_next_runs(2, 100), vec![Sequence::new(1, 3), Sequence::new(7, 3)]);
        assert_eq!(iter.get_next_runs(10, 4), vec![Sequence::new(13, 3), Sequence::new(19, 1)]);
        assert_eq!(iter.coords(), Some(vec![3, 2]));
        assert_eq!(iter.get_next_runs(10, 100), vec![Sequence::new(20, 2)]);
    }

    #[test]
    fn test_runs_coalesce_across_rows() {
        let sel = Selection::all(vec![3, 5]);
        let mut iter = SelectionIter::new(&sel, 2).unwrap();
        assert_eq!(iter.runs(), vec![Sequence::new(0, 30)]);

        let mut sel = Selection::hyperslab(vec![3, 5], &[0, 3], None, &[2, 1], Some(&[1, 2])).unwrap();
        sel.select_hyperslab(SelectOp::Or, &[1, 0], None, &[1, 1], Some(&[1, 2]))
            .unwrap();
        let mut iter = SelectionIter::new(&sel, 1).unwrap();
        assert_eq!(iter.get_next_runs(10, 100), vec![Sequence::new(3, 4), Sequence::new(8, 2)]);
    }

    #[test]
    fn test_skip_and_coords() {
        let sel = Selection::hyperslab(vec![8, 8], &[1, 1], Some(&[4, 4]), &[2, 2], Some(&[2, 2]))
            .unwrap();
        let mut iter = SelectionIter::new(&sel, 1).unwrap();
        assert_eq!(iter.coords(), Some(vec![1, 1]));
        assert_eq!(iter.skip(5), 5);
        assert_eq!(iter.coords(), Some(vec![2, 2]));
        assert_eq!(iter.remaining(), 11);
        assert_eq!(iter.skip(100), 11);
        assert_eq!(iter.coords(), None);
    }

    #[test]
    fn test_unlimited_selection_is_rejected() {
        let sel = Selection::hyperslab(
            vec![10],
            &[0],
            Some(&[2]),
            &[crate::UNLIMITED],
            Some(&[1]),
        )
        .unwrap();
        assert!(SelectionIter::new(&sel, 1).is_err());
        assert!(SelectionIter::new(&Selection::all(vec![2]), 0).is_err());
    }
}
