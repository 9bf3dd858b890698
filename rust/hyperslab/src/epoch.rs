//! Operation generations used to memoize walks over shared span trees.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tag of one top-level tree operation.
///
/// Span lists are shared between many parents, so a naive recursive walk over a
/// tree may visit the same list many times. Each top-level walk takes a fresh
/// epoch and passes it down; a list caches the result it computed together with
/// the epoch that computed it and answers from the cache when asked again within
/// the same walk.
///
/// Epochs are issued from a process-wide 64-bit counter that starts at 1 and is
/// never reset. [`Epoch::NEVER`] (zero) marks a cache that holds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    pub const NEVER: Epoch = Epoch(0);

    /// Issues the next unused epoch.
    pub fn next() -> Epoch {
        static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);
        Epoch(NEXT_EPOCH.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}
