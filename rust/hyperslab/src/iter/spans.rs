//! Run cursor over a span tree.

use std::rc::Rc;

use crate::span::SpanList;

struct Level {
    list: Rc<SpanList>,
    idx: usize,
    pos: u64,
}

/// One span cursor per dimension; the fastest level may stop inside a span.
pub(crate) struct SpanCursor {
    levels: Vec<Level>,
    strides: Vec<u64>,
    done: bool,
}

impl SpanCursor {
    pub(crate) fn new(tree: Rc<SpanList>, extent: &[u64]) -> SpanCursor {
        let rank = tree.rank();
        let mut strides = vec![1u64; rank];
        for k in (0..rank.saturating_sub(1)).rev() {
            strides[k] = strides[k + 1].saturating_mul(extent[k + 1]);
        }
        let mut cursor = SpanCursor {
            levels: Vec::with_capacity(rank),
            strides,
            done: false,
        };
        cursor.levels.push(Level {
            pos: tree.spans()[0].low(),
            list: tree,
            idx: 0,
        });
        cursor.descend_from(0);
        cursor
    }

    /// Rebuilds the levels below `k` from the current span of level `k`.
    fn descend_from(&mut self, k: usize) {
        self.levels.truncate(k + 1);
        loop {
            let level = &self.levels[self.levels.len() - 1];
            let Some(down) = level.list.spans()[level.idx].down().cloned() else {
                return;
            };
            self.levels.push(Level {
                pos: down.spans()[0].low(),
                list: down,
                idx: 0,
            });
        }
    }

    pub(crate) fn peek_offset(&self) -> Option<u64> {
        if self.done {
            return None;
        }
        Some(
            self.levels
                .iter()
                .zip(&self.strides)
                .map(|(level, stride)| level.pos * stride)
                .sum(),
        )
    }

    pub(crate) fn next_run(&mut self, max_len: u64) -> Option<(u64, u64)> {
        let offset = self.peek_offset()?;
        let f = self.levels.len() - 1;
        let level = &mut self.levels[f];
        let high = level.list.spans()[level.idx].high();
        let len = (high - level.pos + 1).min(max_len);

        if level.pos + len <= high {
            level.pos += len;
        } else if level.idx + 1 < level.list.spans().len() {
            level.idx += 1;
            level.pos = level.list.spans()[level.idx].low();
        } else {
            self.carry(f);
        }
        Some((offset, len))
    }

    /// Advances the levels slower than `k` by one index.
    fn carry(&mut self, k: usize) {
        for u in (0..k).rev() {
            let level = &mut self.levels[u];
            let span_high = level.list.spans()[level.idx].high();
            if level.pos < span_high {
                level.pos += 1;
            } else if level.idx + 1 < level.list.spans().len() {
                level.idx += 1;
                level.pos = level.list.spans()[level.idx].low();
            } else {
                continue;
            }
            self.descend_from(u);
            return;
        }
        self.done = true;
    }

    pub(crate) fn coords(&self) -> Option<Vec<u64>> {
        if self.done {
            return None;
        }
        Some(self.levels.iter().map(|level| level.pos).collect())
    }
}
