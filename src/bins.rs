//! The segregated bin index: `NUM_BINS` size-ordered free lists, each
//! headed by a sentinel chunk.
//!
//! Bin bounds widen as sizes grow so that small, common request sizes get
//! fine-grained bins while large requests share coarser ones. See
//! [`BinTable::bounds`] for the exact progression.

use crate::chunk::{Chunk, MIN_CHUNK};
use crate::llist::LlistNode;

pub const NUM_BINS: usize = 46;

/// A sentinel chunk header: just enough of a [`Chunk`] layout to carry a
/// `curr_size = 0` tag and an [`LlistNode`] at the conventional free-view
/// offset, so the same `Chunk`/`LlistNode` machinery used for real chunks
/// also drives sentinel bookkeeping.
#[repr(C, align(8))]
#[allow(dead_code)]
struct Sentinel {
    prev_tag: u64,
    curr_size: u64,
    node: LlistNode,
}

/// The process-wide bin table: one sentinel and upper-bound size per bin.
pub(crate) struct BinTable {
    sentinels: [Sentinel; NUM_BINS],
    bounds: [u64; NUM_BINS],
}

impl core::fmt::Debug for BinTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BinTable").field("bounds", &self.bounds).finish()
    }
}

/// Build the bin-bound table per the widening-step progression: 40..=128
/// by 8, 144..=256 by 16, 288..=512 by 32, 576..=1024 by 64, then powers
/// of two 2048.. below 1_000_000, and a final catch-all bin of `u64::MAX`.
/// Each range's endpoints are inclusive, matching `initialize_bin_indices`.
const fn build_bounds() -> [u64; NUM_BINS] {
    let mut bounds = [0u64; NUM_BINS];
    let mut i = 0;

    let mut s = MIN_CHUNK;
    while s <= 128 {
        bounds[i] = s;
        i += 1;
        s += 8;
    }
    let mut s = 144u64;
    while s <= 256 {
        bounds[i] = s;
        i += 1;
        s += 16;
    }
    let mut s = 288u64;
    while s <= 512 {
        bounds[i] = s;
        i += 1;
        s += 32;
    }
    let mut s = 576u64;
    while s <= 1024 {
        bounds[i] = s;
        i += 1;
        s += 64;
    }

    let mut p = 2048u64;
    while p < 1_000_000 {
        bounds[i] = p;
        i += 1;
        p *= 2;
    }

    bounds[i] = u64::MAX;
    i += 1;

    debug_assert!(i == NUM_BINS);
    bounds
}

const BOUNDS: [u64; NUM_BINS] = build_bounds();

impl BinTable {
    /// Construct the table in place at `ptr`, which must point to storage
    /// sized and aligned for `BinTable` and live for the remainder of the
    /// process (see `os::bootstrap`).
    /// ### Safety
    /// `ptr` must be valid for writes of `size_of::<BinTable>()` bytes.
    pub unsafe fn init_in_place(ptr: *mut BinTable) {
        let table = &mut *ptr;
        table.bounds = BOUNDS;
        for sentinel in table.sentinels.iter_mut() {
            sentinel.curr_size = 0;
            LlistNode::new_standalone(&mut sentinel.node as *mut LlistNode);
        }
    }

    #[inline]
    pub fn bounds(&self) -> &[u64; NUM_BINS] {
        &self.bounds
    }

    #[inline]
    fn sentinel_node(&mut self, bin: usize) -> *mut LlistNode {
        &mut self.sentinels[bin].node as *mut LlistNode
    }

    /// The smallest bin index whose bound is `>= r`. Linear scan, no
    /// binary search required.
    ///
    /// The scan starts at index 1, not 0: bin 0 is never a direct
    /// allocate-time target; it is only reached via `find_larger` fallback
    /// or by coalesced remainders landing there. This mirrors the source's
    /// asymmetric starting index between allocate's search and insert.
    #[inline]
    pub fn find_bin(&self, r: u64) -> usize {
        for (i, &bound) in self.bounds.iter().enumerate().skip(1) {
            if bound >= r {
                return i;
            }
        }
        NUM_BINS - 1
    }

    /// The bin a chunk of `size` belongs in, per its `curr_size`. Used for
    /// insertion, which (unlike allocate's search) starts scanning at 0.
    #[inline]
    fn bin_of_size(&self, size: u64) -> usize {
        for (i, &bound) in self.bounds.iter().enumerate() {
            if bound >= size {
                return i;
            }
        }
        NUM_BINS - 1
    }

    /// Insert `c` into its bin, keeping the list in ascending `curr_size` order.
    /// ### Safety
    /// `c` must be a valid, available chunk not currently linked into any bin.
    pub unsafe fn insert(&mut self, c: Chunk) {
        let size = c.curr_size();
        let bin = self.bin_of_size(size);
        let sentinel = self.sentinel_node(bin);

        let mut cursor = (*sentinel).next;
        while cursor != sentinel {
            if Chunk::from_llist_node(cursor).curr_size() > size {
                break;
            }
            cursor = (*cursor).next;
        }

        LlistNode::insert_after((*cursor).prev, c.as_llist_node());
    }

    /// Walk bin `i` from the sentinel; unlink and return the first chunk
    /// with `curr_size >= r`, or `None`.
    /// ### Safety
    /// Bin `i` must be a valid, well-formed list.
    pub unsafe fn search(&mut self, i: usize, r: u64) -> Option<Chunk> {
        let sentinel = self.sentinel_node(i);
        let mut cursor = (*sentinel).next;
        while cursor != sentinel {
            let c = Chunk::from_llist_node(cursor);
            if c.curr_size() >= r {
                LlistNode::remove(cursor);
                return Some(c);
            }
            cursor = (*cursor).next;
        }
        None
    }

    /// Scan bins `i+1 ..`; unlink and return the first chunk found (the
    /// smallest chunk in the first non-empty bin), or `None`.
    /// ### Safety
    /// Bins `i+1..NUM_BINS` must be valid, well-formed lists.
    pub unsafe fn find_larger(&mut self, i: usize) -> Option<Chunk> {
        for bin in (i + 1)..NUM_BINS {
            let sentinel = self.sentinel_node(bin);
            let first = (*sentinel).next;
            if first != sentinel {
                LlistNode::remove(first);
                return Some(Chunk::from_llist_node(first));
            }
        }
        None
    }

    /// Unlink `c` from whichever bin it currently sits in.
    /// ### Safety
    /// `c` must currently be linked into some bin's list.
    pub unsafe fn unlink(&mut self, c: Chunk) {
        LlistNode::remove(c.as_llist_node());
    }

    /// Debug-only invariant scan: every bin is sorted ascending and every
    /// member's size falls within its bin's bounds. Panics on violation.
    #[cfg(debug_assertions)]
    pub unsafe fn scan_for_errors(&self) {
        for bin in 0..NUM_BINS {
            let sentinel = &self.sentinels[bin].node as *const LlistNode as *mut LlistNode;
            let lower = if bin == 0 { 0 } else { self.bounds[bin - 1] };
            let upper = self.bounds[bin];

            let mut prev_size = 0u64;
            for node in LlistNode::iter(sentinel) {
                let size = Chunk::from_llist_node(node).curr_size();
                assert!(size > lower && size <= upper, "chunk of size {size} misfiled in bin {bin}");
                assert!(size >= prev_size, "bin {bin} not sorted ascending");
                prev_size = size;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_has_exactly_46_entries_ending_in_catchall() {
        assert_eq!(BOUNDS.len(), NUM_BINS);
        assert_eq!(BOUNDS[NUM_BINS - 1], u64::MAX);
        assert_eq!(BOUNDS[0], MIN_CHUNK);
    }

    #[test]
    fn bounds_are_strictly_ascending() {
        for w in BOUNDS.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn find_bin_skips_index_zero() {
        let table_bounds = BOUNDS;
        let find = |r: u64| {
            for (i, &b) in table_bounds.iter().enumerate().skip(1) {
                if b >= r {
                    return i;
                }
            }
            NUM_BINS - 1
        };
        assert_ne!(find(MIN_CHUNK), 0);
    }
}
