//! Three-way clipping and two-way merging of span trees.
//!
//! Both walks consume the two span lists of a level in lockstep. Whenever the
//! current spans overlap, the leading non-overlapping part is emitted into the
//! matching difference tree and the overlapping part is handed down to the next
//! faster dimension. Results for a pair of down lists are cached for the duration
//! of one top-level call, so regular trees whose rows share one list are clipped
//! once per distinct pair of rows.

use std::{collections::HashMap, rc::Rc};

use super::{SpanList, SpanListBuilder, bounds_overlap, downs_equal, spans_equal};

/// Selects which of the three clip outputs are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipWanted {
    pub a_not_b: bool,
    pub a_and_b: bool,
    pub b_not_a: bool,
}

impl ClipWanted {
    pub const A_NOT_B: ClipWanted = ClipWanted {
        a_not_b: true,
        a_and_b: false,
        b_not_a: false,
    };
    pub const A_AND_B: ClipWanted = ClipWanted {
        a_not_b: false,
        a_and_b: true,
        b_not_a: false,
    };
    pub const B_NOT_A: ClipWanted = ClipWanted {
        a_not_b: false,
        a_and_b: false,
        b_not_a: true,
    };
    pub const DIFFERENCES: ClipWanted = ClipWanted {
        a_not_b: true,
        a_and_b: false,
        b_not_a: true,
    };
    pub const ALL: ClipWanted = ClipWanted {
        a_not_b: true,
        a_and_b: true,
        b_not_a: true,
    };
}

/// The trees produced by [`clip_spans`]. An output is `None` when it is empty
/// or was not requested.
#[derive(Debug, Clone, Default)]
pub struct ClipResult {
    pub a_not_b: Option<Rc<SpanList>>,
    pub a_and_b: Option<Rc<SpanList>>,
    pub b_not_a: Option<Rc<SpanList>>,
}

type PairKey = (*const SpanList, *const SpanList);

/// Partitions two span trees of equal rank into `A∖B`, `A∩B` and `B∖A`.
pub fn clip_spans(a: &Rc<SpanList>, b: &Rc<SpanList>, wanted: ClipWanted) -> ClipResult {
    debug_assert_eq!(a.rank(), b.rank());
    let mut clipper = Clipper {
        wanted,
        cache: HashMap::new(),
    };
    clipper.clip_pair(a, b)
}

/// Builds `A∪B` for two span trees of equal rank.
pub fn merge_spans(a: &Rc<SpanList>, b: &Rc<SpanList>) -> Rc<SpanList> {
    debug_assert_eq!(a.rank(), b.rank());
    let mut merger = Merger {
        cache: HashMap::new(),
    };
    merger.merge_pair(a, b)
}

/// Union of two optional trees.
pub fn merge_optional(
    a: Option<Rc<SpanList>>,
    b: Option<Rc<SpanList>>,
) -> Option<Rc<SpanList>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(merge_spans(&a, &b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Interval of a span currently being consumed, possibly trimmed at its low end.
struct Cursor<'a> {
    spans: &'a [super::Span],
    idx: usize,
    low: u64,
}

impl<'a> Cursor<'a> {
    fn new(list: &'a SpanList) -> Cursor<'a> {
        let spans = list.spans();
        Cursor {
            spans,
            idx: 0,
            low: spans[0].low,
        }
    }

    #[inline]
    fn current(&self) -> Option<(u64, u64, Option<&'a Rc<SpanList>>)> {
        self.spans
            .get(self.idx)
            .map(|s| (self.low, s.high, s.down.as_ref()))
    }

    /// Consumes the current span up to and including `high`.
    #[inline]
    fn consume_to(&mut self, high: u64) {
        let span = &self.spans[self.idx];
        if high >= span.high {
            self.idx += 1;
            if let Some(next) = self.spans.get(self.idx) {
                self.low = next.low;
            }
        } else {
            self.low = high + 1;
        }
    }

    /// Appends everything not consumed yet to `out`.
    fn drain_into(&mut self, out: &mut SpanListBuilder) {
        if let Some((low, high, down)) = self.current() {
            out.append(low, high, down.cloned());
            out.extend_from(&self.spans[self.idx + 1..]);
            self.idx = self.spans.len();
        }
    }
}

struct Clipper {
    wanted: ClipWanted,
    cache: HashMap<PairKey, ClipResult>,
}

impl Clipper {
    fn clip_pair(&mut self, a: &Rc<SpanList>, b: &Rc<SpanList>) -> ClipResult {
        if Rc::ptr_eq(a, b) || spans_equal(a, b) {
            return ClipResult {
                a_and_b: self.wanted.a_and_b.then(|| a.clone()),
                ..Default::default()
            };
        }
        if !bounds_overlap(a, b) {
            return ClipResult {
                a_not_b: self.wanted.a_not_b.then(|| a.clone()),
                a_and_b: None,
                b_not_a: self.wanted.b_not_a.then(|| b.clone()),
            };
        }
        let key = (Rc::as_ptr(a), Rc::as_ptr(b));
        if let Some(result) = self.cache.get(&key) {
            return result.clone();
        }
        let result = self.clip_level(a, b);
        self.cache.insert(key, result.clone());
        result
    }

    fn clip_level(&mut self, a: &SpanList, b: &SpanList) -> ClipResult {
        let wanted = self.wanted;
        let mut a_not_b = SpanListBuilder::new();
        let mut a_and_b = SpanListBuilder::new();
        let mut b_not_a = SpanListBuilder::new();

        let mut ca = Cursor::new(a);
        let mut cb = Cursor::new(b);

        while let (Some((al, ah, ad)), Some((bl, bh, bd))) = (ca.current(), cb.current()) {
            if ah < bl {
                // A strictly before B.
                if wanted.a_not_b {
                    a_not_b.append(al, ah, ad.cloned());
                }
                ca.consume_to(ah);
            } else if bh < al {
                // B strictly before A.
                if wanted.b_not_a {
                    b_not_a.append(bl, bh, bd.cloned());
                }
                cb.consume_to(bh);
            } else if al < bl {
                // A overlaps the low edge of B, or A contains B.
                if wanted.a_not_b {
                    a_not_b.append(al, bl - 1, ad.cloned());
                }
                ca.consume_to(bl - 1);
            } else if bl < al {
                // B overlaps the low edge of A, or B contains A.
                if wanted.b_not_a {
                    b_not_a.append(bl, al - 1, bd.cloned());
                }
                cb.consume_to(al - 1);
            } else {
                // Both start at the same index: the common part goes down a level.
                let high = ah.min(bh);
                match (ad, bd) {
                    (Some(ad), Some(bd)) => {
                        let sub = self.clip_pair(ad, bd);
                        if let Some(d) = sub.a_not_b {
                            a_not_b.append(al, high, Some(d));
                        }
                        if let Some(d) = sub.a_and_b {
                            a_and_b.append(al, high, Some(d));
                        }
                        if let Some(d) = sub.b_not_a {
                            b_not_a.append(al, high, Some(d));
                        }
                    }
                    _ => {
                        if wanted.a_and_b {
                            a_and_b.append(al, high, None);
                        }
                    }
                }
                ca.consume_to(high);
                cb.consume_to(high);
            }
        }

        if wanted.a_not_b {
            ca.drain_into(&mut a_not_b);
        }
        if wanted.b_not_a {
            cb.drain_into(&mut b_not_a);
        }

        ClipResult {
            a_not_b: a_not_b.finish(),
            a_and_b: a_and_b.finish(),
            b_not_a: b_not_a.finish(),
        }
    }
}

struct Merger {
    cache: HashMap<PairKey, Rc<SpanList>>,
}

impl Merger {
    fn merge_pair(&mut self, a: &Rc<SpanList>, b: &Rc<SpanList>) -> Rc<SpanList> {
        if Rc::ptr_eq(a, b) || spans_equal(a, b) {
            return a.clone();
        }
        let key = (Rc::as_ptr(a), Rc::as_ptr(b));
        if let Some(merged) = self.cache.get(&key) {
            return merged.clone();
        }
        let merged = self.merge_level(a, b);
        self.cache.insert(key, merged.clone());
        merged
    }

    fn merge_down(
        &mut self,
        a: Option<&Rc<SpanList>>,
        b: Option<&Rc<SpanList>>,
    ) -> Option<Rc<SpanList>> {
        match (a, b) {
            (Some(a), Some(b)) => Some(self.merge_pair(a, b)),
            _ => None,
        }
    }

    fn merge_level(&mut self, a: &SpanList, b: &SpanList) -> Rc<SpanList> {
        let mut out = SpanListBuilder::with_capacity(a.spans().len() + b.spans().len());
        let mut ca = Cursor::new(a);
        let mut cb = Cursor::new(b);

        while let (Some((al, ah, ad)), Some((bl, bh, bd))) = (ca.current(), cb.current()) {
            if ah < bl {
                out.append(al, ah, ad.cloned());
                ca.consume_to(ah);
            } else if bh < al {
                out.append(bl, bh, bd.cloned());
                cb.consume_to(bh);
            } else if al < bl {
                out.append(al, bl - 1, ad.cloned());
                ca.consume_to(bl - 1);
            } else if bl < al {
                out.append(bl, al - 1, bd.cloned());
                cb.consume_to(al - 1);
            } else {
                let high = ah.min(bh);
                let down = if downs_equal(ad, bd) {
                    ad.cloned()
                } else {
                    self.merge_down(ad, bd)
                };
                out.append(al, high, down);
                ca.consume_to(high);
                cb.consume_to(high);
            }
        }
        ca.drain_into(&mut out);
        cb.drain_into(&mut out);

        // Both inputs are non-empty, so the union is too.
        match out.finish() {
            Some(list) => list,
            None => unreachable!("union of two non-empty span lists is empty"),
        }
    }
}
