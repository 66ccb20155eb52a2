//! The allocate/release protocol: the public surface bolted on top of the
//! chunk, bin, and OS layers.
//!
//! `SegFit` owns the bin table and the OS region provider. It is, per the
//! data model, a single process-wide component: lazily bootstrapped on
//! first use, never torn down, single-threaded and non-reentrant (see
//! `locking` for a mutex-guarded facade suitable for concurrent callers).

use crate::bins::BinTable;
use crate::chunk::{Chunk, CHUNK_OVERHEAD, MIN_CHUNK};
use crate::error::AllocError;
use crate::os::RegionProvider;
use crate::tag::SizeTag;

enum Bins {
    Uninit,
    Init(*mut BinTable),
}

/// The segregated-fit allocator core.
pub struct SegFit<P: RegionProvider> {
    provider: P,
    bins: Bins,
}

// SAFETY: `SegFit` is Send in the sense that it may be moved between
// threads, but using it from more than one thread concurrently without
// external synchronization is a violation of the single-threaded,
// non-reentrant contract that this type does not itself enforce.
unsafe impl<P: RegionProvider> Send for SegFit<P> {}

impl<P: RegionProvider> core::fmt::Debug for SegFit<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SegFit")
            .field("bootstrapped", &matches!(self.bins, Bins::Init(_)))
            .finish()
    }
}

impl<P: RegionProvider> SegFit<P> {
    pub const fn new(provider: P) -> Self {
        Self { provider, bins: Bins::Uninit }
    }

    /// Initialize the bin table on first use, extending the program break
    /// for its storage.
    unsafe fn bins_mut(&mut self) -> Result<&mut BinTable, AllocError> {
        match self.bins {
            Bins::Init(ptr) => Ok(&mut *ptr),
            Bins::Uninit => {
                let raw = self.provider.bootstrap(core::mem::size_of::<BinTable>())?;
                let ptr: *mut BinTable = raw.cast();
                BinTable::init_in_place(ptr);
                self.bins = Bins::Init(ptr);
                Ok(&mut *ptr)
            }
        }
    }

    /// Search the bins for a chunk of at least `n` usable bytes, falling
    /// back to a fresh OS region when none is found.
    pub fn try_allocate(&mut self, n: u64) -> Result<*mut u8, AllocError> {
        let need = core::cmp::max(n.saturating_add(CHUNK_OVERHEAD), MIN_CHUNK);
        let need = (need + 7) & !7;

        unsafe {
            let i = self.bins_mut()?.find_bin(need);

            let found = self.bins_mut()?.search(i, need);
            let found = match found {
                Some(c) => Some(c),
                None => self.bins_mut()?.find_larger(i),
            };

            let c = match found {
                Some(c) => c,
                None => {
                    let region = self.provider.obtain_region(need)?;
                    let c = Chunk::new(region.base_ptr());
                    c.set_curr_size(region.size() as u64);
                    c.set_prev_tag(SizeTag::NONE);
                    c.set_next_tag(SizeTag::NONE);
                    c
                }
            };

            let c = split(self.bins_mut()?, c, need);
            c.set_neighbour_flags(false);

            #[cfg(debug_assertions)]
            self.bins_mut()?.scan_for_errors();

            Ok(c.payload())
        }
    }

    /// Pointer-in, pointer-out surface: returns a null pointer on failure,
    /// mirroring the C ABI and the teacher's `GlobalAlloc::alloc`.
    pub fn allocate(&mut self, n: u64) -> *mut u8 {
        self.try_allocate(n).unwrap_or(core::ptr::null_mut())
    }

    /// Return a previously allocated chunk to its bin, coalescing with
    /// either neighbour that is available.
    ///
    /// ### Safety
    /// `addr` must have been returned by a prior `allocate`/`try_allocate`
    /// call on this same allocator and not yet released.
    pub unsafe fn release(&mut self, addr: *mut u8) {
        let mut c = Chunk::from_payload(addr);
        c.set_neighbour_flags(true);

        let bins = match self.bins {
            Bins::Init(ptr) => &mut *ptr,
            Bins::Uninit => unreachable!("release before any allocate bootstrapped the bin table"),
        };

        if c.is_prev_available() {
            let prev = c.neighbour_prev();
            bins.unlink(prev);
            c = join(prev, c);
        }
        if c.is_next_available() {
            let next = c.neighbour_next();
            bins.unlink(next);
            c = join(c, next);
        }

        bins.insert(c);

        #[cfg(debug_assertions)]
        bins.scan_for_errors();
    }
}

/// Carve `c` down to `need` bytes if the remainder would still be a
/// usable chunk, inserting the carved-off remainder into its bin.
/// Returns the (possibly shrunk) chunk `c`.
///
/// `c`'s new trailing slot holds the size of the *following* chunk, not
/// `c`'s own size: here that's the freshly carved `t`, whose size is
/// `rest`. Writing `c`'s own requested size there would violate the
/// adjacency invariant between neighbouring chunks and disagrees with
/// `wmalloc.h`'s own `set_next_chunk_size(to_remove, next_chunk_size)`
/// call, which passes the remainder, not the request (see DESIGN.md).
unsafe fn split(bins: &mut BinTable, c: Chunk, need: u64) -> Chunk {
    let curr = c.curr_size();
    if curr < need + MIN_CHUNK {
        return c;
    }

    let rest = curr - need;
    let saved_next_tag = c.next_tag();

    c.set_curr_size(need);
    c.set_next_tag(SizeTag::new(rest, true));

    let t = Chunk::new(c.0.add(need as usize));
    t.set_curr_size(rest);
    t.set_prev_tag(SizeTag::new(need, false));
    t.set_next_tag(saved_next_tag);

    if !saved_next_tag.is_none() {
        t.neighbour_next().set_prev_tag(SizeTag::new(rest, true));
    }

    bins.insert(t);

    c
}

/// `join(a, b)` where `b` immediately follows `a`. Returns the merged chunk.
unsafe fn join(a: Chunk, b: Chunk) -> Chunk {
    let combined = a.curr_size() + b.curr_size();
    a.set_curr_size(combined);
    a.set_next_tag(b.next_tag());
    a.publish_size(true);
    a
}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;
    use std::vec::Vec;

    /// A `RegionProvider` backed by leaked `Vec<u8>` buffers: regions are
    /// never returned to the OS by the core anyway, so leaking for the
    /// test process's lifetime mirrors production behaviour faithfully.
    struct TestProvider;

    impl RegionProvider for TestProvider {
        fn obtain_region(&mut self, min_size: u64) -> Result<Span, AllocError> {
            let size = crate::os::region_size_for(min_size) as usize;
            let mut buf = std::vec![0u8; size];
            let ptr = buf.as_mut_ptr();
            core::mem::forget(buf);
            Ok(Span::from_ptr_size(ptr, size))
        }

        fn bootstrap(&mut self, size: usize) -> Result<*mut u8, AllocError> {
            let mut buf: Vec<u8> = std::vec![0u8; size];
            let ptr = buf.as_mut_ptr();
            core::mem::forget(buf);
            Ok(ptr)
        }
    }

    #[test]
    fn allocate_zero_rounds_up_to_min_chunk_without_split() {
        let mut a = SegFit::new(TestProvider);
        let p = a.allocate(0);
        assert!(!p.is_null());
        unsafe {
            let c = Chunk::from_payload(p);
            assert_eq!(c.curr_size(), MIN_CHUNK);
        }
        unsafe { a.release(p) };
    }

    #[test]
    fn allocate_write_read_roundtrip() {
        let mut a = SegFit::new(TestProvider);
        let n = 100_000usize;
        let p = a.allocate((n * core::mem::size_of::<i32>()) as u64) as *mut i32;
        assert!(!p.is_null());
        unsafe {
            for i in 0..n {
                p.add(i).write(i as i32);
            }
            for i in 0..n {
                assert_eq!(p.add(i).read(), i as i32);
            }
            a.release(p.cast());
        }
    }

    #[test]
    fn repeated_allocate_release_reuses_same_chunk() {
        let mut a = SegFit::new(TestProvider);
        let p1 = a.allocate(20);
        unsafe { a.release(p1) };
        let p2 = a.allocate(20);
        assert_eq!(p1, p2);
        unsafe { a.release(p2) };
    }

    #[test]
    fn lifo_balanced_allocations_leave_single_free_chunk_per_region() {
        let mut a = SegFit::new(TestProvider);
        let mut stack = Vec::new();
        for i in 0..50 {
            stack.push(a.allocate((i % 64) as u64 + 1));
        }
        while let Some(p) = stack.pop() {
            unsafe { a.release(p) };
        }

        unsafe {
            let bins = a.bins_mut().unwrap();
            bins.scan_for_errors();
        }
    }

    #[test]
    fn large_allocation_exceeding_mmap_size_gets_padded_region() {
        let mut a = SegFit::new(TestProvider);
        let p = a.allocate(200_000);
        assert!(!p.is_null());
        unsafe {
            let c = Chunk::from_payload(p);
            assert!(c.curr_size() >= 200_000);
            a.release(p);
        }
    }

    #[test]
    fn random_stress_preserves_invariants() {
        let mut a = SegFit::new(TestProvider);
        let mut live = Vec::new();

        for _ in 0..500 {
            live.push((a.allocate(fastrand::u64(0..0x10000)), ()));
        }

        for _ in 0..1000 {
            if fastrand::bool() || live.is_empty() {
                live.push((a.allocate(fastrand::u64(0..0x10000)), ()));
            } else {
                let (p, _) = live.pop().unwrap();
                unsafe { a.release(p) };
            }
        }

        while let Some((p, _)) = live.pop() {
            unsafe { a.release(p) };
        }

        unsafe {
            a.bins_mut().unwrap().scan_for_errors();
        }
    }
}
