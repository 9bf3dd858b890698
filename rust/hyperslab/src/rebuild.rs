//! Recovery of a regular description from a span tree.

use std::rc::Rc;

use crate::{
    regular::HyperslabDim,
    span::{SpanList, downs_equal},
};

/// Tries to express a span tree as one regular hyperslab.
///
/// At every level the first span gives `start` and `block`, the first two spans
/// give `stride`, and every span must repeat the same block size at the same
/// stride with an identical down tree. Returns the per-dimension parameters
/// (single-block dimensions get a unit stride), or `None` when the tree is not
/// regular.
pub fn rebuild_regular(tree: &Rc<SpanList>) -> Option<Vec<HyperslabDim>> {
    let mut dims = Vec::with_capacity(tree.rank());
    let mut level: &SpanList = tree;
    loop {
        let spans = level.spans();
        let first = &spans[0];
        let block = first.len();
        let stride = match spans.get(1) {
            Some(second) => second.low() - first.low(),
            None => 1,
        };
        for pair in spans.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.len() != block
                || next.low() - prev.low() != stride
                || !downs_equal(first.down(), next.down())
            {
                return None;
            }
        }
        dims.push(HyperslabDim::new(
            first.low(),
            stride,
            spans.len() as u64,
            block,
        ));
        match first.down() {
            Some(down) => level = down,
            None => return Some(dims),
        }
    }
}
