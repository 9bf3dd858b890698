//! Projection of an intersection from one selection onto another.
//!
//! Two selections with equal element counts pair their elements up in
//! row-major order. [`project_intersection`] finds the elements of `src` that
//! also lie in `src_intersect` and returns the paired elements of `dst`.
//!
//! The three selections are streamed in lockstep: the source and intersection
//! runs give skip/take ranges of source ordinals, the ranges are replayed over
//! the destination runs, and the resulting rows feed one span list builder per
//! dimension. Nothing proportional to the number of runs is held in memory
//! besides the projected tree itself.

use std::{mem, rc::Rc};

use hyperslab_common::{Result, error::Error, verify_rank};

use crate::{
    config::IterConfig,
    iter::{SelectionIter, Sequence},
    selection::{SelectOp, Selection, SelectionKind},
    span::{SpanList, SpanListBuilder},
};

/// Ordinal range `[start, start + len)` in the element order of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Take {
    start: u64,
    len: u64,
}

/// Projects `src ∩ src_intersect` through the element pairing of `src` and
/// `dst` and returns the result as a selection in `dst`'s extent.
///
/// `src` and `dst` must select the same number of elements and
/// `src_intersect` must have `src`'s rank. Unlimited selections are rejected.
pub fn project_intersection(
    src: &Selection,
    dst: &Selection,
    src_intersect: &Selection,
) -> Result<Selection> {
    verify_rank!("src_intersect", src_intersect.rank(), src.rank());
    if src.unlimited_dim().is_some()
        || dst.unlimited_dim().is_some()
        || src_intersect.unlimited_dim().is_some()
    {
        return Err(Error::invalid_operation(
            "projection of a selection with an unlimited dimension",
        ));
    }
    if src.num_elements() != dst.num_elements() {
        return Err(Error::invalid_arg(
            "dst",
            format!(
                "source selects {} elements, destination {}",
                src.num_elements(),
                dst.num_elements()
            ),
        ));
    }

    let intersect = src.combine(SelectOp::And, src_intersect)?;
    let selected = intersect.num_elements();
    if selected == 0 {
        return Ok(Selection::none(dst.extent().to_vec()));
    }
    if selected == src.num_elements() {
        return Ok(dst.clone());
    }

    let config = IterConfig::default();
    let takes = TakeWalker {
        src: RunReader::new(src, config)?,
        intersect: RunReader::new(&intersect, config)?,
        src_run: None,
        ordinal: 0,
    };
    let mut dst_runs = RunReader::new(dst, config)?;
    let mut dst_run = dst_runs.next();
    let mut run_ordinal = 0;
    let mut builder = TreeBuilder::new(dst.extent());
    for take in takes {
        let (mut start, end) = (take.start, take.start + take.len);
        while start < end {
            let Some(run) = dst_run else {
                break;
            };
            let run_end = run_ordinal + run.len;
            if start >= run_end {
                run_ordinal = run_end;
                dst_run = dst_runs.next();
                continue;
            }
            let high = end.min(run_end);
            builder.push(run.offset + (start - run_ordinal), high - start);
            start = high;
        }
    }
    Ok(Selection::from_kind(
        dst.extent().to_vec(),
        SelectionKind::from_tree(builder.finish()),
    ))
}

/// Element runs of a selection, fetched in batches and coalesced across batch
/// boundaries.
struct RunReader {
    iter: SelectionIter,
    config: IterConfig,
    batch: Vec<Sequence>,
    pos: usize,
}

impl RunReader {
    fn new(selection: &Selection, config: IterConfig) -> Result<RunReader> {
        Ok(RunReader {
            iter: SelectionIter::with_config(selection, 1, config)?,
            config,
            batch: Vec::new(),
            pos: 0,
        })
    }

    fn peek(&mut self) -> Option<Sequence> {
        if self.pos == self.batch.len() {
            self.batch.clear();
            self.pos = 0;
            self.iter.get_next_runs_into(
                self.config.max_runs,
                self.config.max_elements,
                &mut self.batch,
            );
        }
        self.batch.get(self.pos).copied()
    }
}

impl Iterator for RunReader {
    type Item = Sequence;

    fn next(&mut self) -> Option<Sequence> {
        let mut run = self.peek()?;
        self.pos += 1;
        while let Some(next) = self.peek().filter(|next| next.offset == run.end()) {
            run.len += next.len;
            self.pos += 1;
        }
        Some(run)
    }
}

/// Walks the source and intersection runs in lockstep and yields the ordinal
/// ranges of the intersection within the source element order.
///
/// Both readers coalesce fully, so every intersection run lies inside one
/// source run.
struct TakeWalker {
    src: RunReader,
    intersect: RunReader,
    src_run: Option<Sequence>,
    ordinal: u64,
}

impl Iterator for TakeWalker {
    type Item = Take;

    fn next(&mut self) -> Option<Take> {
        let run = self.intersect.next()?;
        loop {
            match self.src_run {
                Some(src) if run.offset < src.end() => {
                    return Some(Take {
                        start: self.ordinal + (run.offset - src.offset),
                        len: run.len,
                    });
                }
                Some(src) => {
                    self.ordinal += src.len;
                    self.src_run = self.src.next();
                }
                None => {
                    self.src_run = Some(self.src.next()?);
                }
            }
        }
    }
}

/// Builds a span tree from ascending linear element ranges of an extent.
///
/// `levels[d]` collects the spans of dimension `d` below the open path
/// `path[..d]`; a level is closed into its parent when the path moves on.
struct TreeBuilder {
    extent: Vec<u64>,
    levels: Vec<SpanListBuilder>,
    path: Vec<u64>,
    coords: Vec<u64>,
    open: bool,
}

impl TreeBuilder {
    fn new(extent: &[u64]) -> TreeBuilder {
        let rank = extent.len();
        TreeBuilder {
            extent: extent.to_vec(),
            levels: (0..rank).map(|_| SpanListBuilder::new()).collect(),
            path: vec![0; rank - 1],
            coords: vec![0; rank - 1],
            open: false,
        }
    }

    /// Adds the elements `[offset, offset + len)`, which must follow every
    /// element added so far.
    fn push(&mut self, mut offset: u64, mut len: u64) {
        let rank = self.extent.len();
        let row_len = self.extent[rank - 1];
        while len > 0 {
            let col = offset % row_len;
            let take = len.min(row_len - col);
            let mut row = offset / row_len;
            for k in (0..rank - 1).rev() {
                self.coords[k] = row % self.extent[k];
                row /= self.extent[k];
            }
            self.add_row(col, col + take - 1);
            offset += take;
            len -= take;
        }
    }

    fn add_row(&mut self, low: u64, high: u64) {
        let last = self.extent.len() - 1;
        if self.open {
            if let Some(depth) = (0..last).find(|&k| self.coords[k] != self.path[k]) {
                self.close_to(depth);
                self.path[depth..].copy_from_slice(&self.coords[depth..]);
            }
        } else {
            self.path.copy_from_slice(&self.coords);
            self.open = true;
        }
        self.levels[last].append(low, high, None);
    }

    /// Closes the levels below `depth`, appending each finished list to its
    /// parent under the open path.
    fn close_to(&mut self, depth: usize) {
        for d in (depth..self.extent.len() - 1).rev() {
            let down = mem::take(&mut self.levels[d + 1]).finish();
            let coord = self.path[d];
            self.levels[d].append(coord, coord, down);
        }
    }

    fn finish(mut self) -> Option<Rc<SpanList>> {
        if !self.open {
            return None;
        }
        self.close_to(0);
        mem::take(&mut self.levels[0]).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SelectionType;

    #[test]
    fn test_projects_onto_reshaped_destination() {
        // Row 1 of a 4x4 source pairs with elements 4..8 of a 16-element line.
        let src = Selection::all(vec![4, 4]);
        let dst = Selection::all(vec![16]);
        let isect = Selection::hyperslab(vec![4, 4], &[1, 0], None, &[1, 4], None).unwrap();
        let projected = project_intersection(&src, &dst, &isect).unwrap();
        assert_eq!(projected.num_elements(), 4);
        assert!((4..8).all(|i| projected.contains(&[i])));
        assert!(!projected.contains(&[8]));
    }

    #[test]
    fn test_projects_through_strided_selections() {
        // Source elements at columns 1, 3, 5, 7; intersect keeps 3 and 5.
        let src = Selection::hyperslab(vec![10], &[1], Some(&[2]), &[4], None).unwrap();
        let isect = Selection::hyperslab(vec![10], &[3], None, &[3], None).unwrap();
        let dst = Selection::hyperslab(vec![2, 3], &[0, 1], None, &[2, 2], None).unwrap();
        let projected = project_intersection(&src, &dst, &isect).unwrap();
        assert_eq!(projected.num_elements(), 2);
        assert!(projected.contains(&[0, 2]));
        assert!(projected.contains(&[1, 1]));
    }

    #[test]
    fn test_trivial_projections() {
        let src = Selection::all(vec![6]);
        let dst = Selection::hyperslab(vec![3, 3], &[0, 0], None, &[2, 3], None).unwrap();
        let none = project_intersection(&src, &dst, &Selection::none(vec![6])).unwrap();
        assert_eq!(none.select_type(), SelectionType::None);
        assert_eq!(none.extent(), &[3, 3]);
        let all = project_intersection(&src, &dst, &Selection::all(vec![6])).unwrap();
        assert_eq!(all.num_elements(), 6);
    }

    #[test]
    fn test_tree_builder_shares_repeated_rows() {
        let mut builder = TreeBuilder::new(&[3, 4, 5]);
        // rows (0,1) and (0,2) select columns 1..=2; (2,0) selects column 4
        builder.push(6, 2);
        builder.push(11, 2);
        builder.push(44, 1);
        let tree = builder.finish().unwrap();
        assert_eq!(tree.spans().len(), 2);
        let rows = tree.spans()[0].down().unwrap();
        assert_eq!(rows.spans().len(), 1);
        assert_eq!((rows.spans()[0].low(), rows.spans()[0].high()), (1, 2));
        assert_eq!(tree.spans()[1].low(), 2);
    }

    #[test]
    fn test_take_walker_spans_batches() {
        let src = Selection::hyperslab(vec![40], &[0], Some(&[2]), &[20], None).unwrap();
        let isect = Selection::hyperslab(vec![40], &[10], None, &[1], Some(&[20])).unwrap();
        let intersect = src.combine(SelectOp::And, &isect).unwrap();
        let config = IterConfig {
            max_runs: 3,
            ..IterConfig::default()
        };
        let takes = TakeWalker {
            src: RunReader::new(&src, config).unwrap(),
            intersect: RunReader::new(&intersect, config).unwrap(),
            src_run: None,
            ordinal: 0,
        }
        .collect::<Vec<_>>();
        assert_eq!(takes.len(), 10);
        assert_eq!(takes[0], Take { start: 5, len: 1 });
        assert_eq!(takes[9], Take { start: 14, len: 1 });
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let src = Selection::all(vec![6]);
        let dst = Selection::all(vec![5]);
        assert!(project_intersection(&src, &dst, &Selection::all(vec![6])).is_err());
        let dst = Selection::all(vec![6]);
        assert!(project_intersection(&src, &dst, &Selection::all(vec![2, 3])).is_err());
    }
}
