//! A mutex-guarded `GlobalAlloc` facade over [`SegFit`].
//!
//! The core is single-threaded and non-reentrant; this is the thin
//! concurrency layer that lets it serve as a `#[global_allocator]` in an
//! ordinary multi-threaded binary, grounded on the teacher's own
//! `Talck`, generic over a `lock_api::RawMutex` so the crate itself never
//! has to pick (or depend on) a particular mutex implementation. It adds
//! contention control around the core, not inside it.
//!
//! ```
//! # use segfit::{Locked, UnixRegionProvider};
//! let locked = Locked::<spin::Mutex<()>, _>::new(UnixRegionProvider::new());
//! let p = unsafe { core::alloc::GlobalAlloc::alloc(&locked, core::alloc::Layout::new::<u64>()) };
//! assert!(!p.is_null());
//! ```

use core::alloc::{GlobalAlloc, Layout};
#[cfg(feature = "allocator")]
use core::ptr::NonNull;

use crate::allocator::SegFit;
use crate::os::RegionProvider;

/// `SegFit<P>` behind a `lock_api`-generic mutex, usable as a
/// `#[global_allocator]`. `R` is the raw mutex type (e.g. `spin::Mutex<()>`).
#[derive(Debug)]
pub struct Locked<R: lock_api::RawMutex, P: RegionProvider> {
    mutex: lock_api::Mutex<R, SegFit<P>>,
}

impl<R: lock_api::RawMutex, P: RegionProvider> Locked<R, P> {
    pub const fn new(provider: P) -> Self {
        Self { mutex: lock_api::Mutex::new(SegFit::new(provider)) }
    }

    #[inline]
    pub fn lock(&self) -> lock_api::MutexGuard<R, SegFit<P>> {
        self.mutex.lock()
    }
}

/// Requests beyond this alignment can't have arisen from an 8-byte-aligned
/// allocator with 24 bytes of header overhead; reject rather than wrap.
#[inline]
fn layout_to_size(layout: Layout) -> usize {
    debug_assert!(layout.align() <= 8, "alignment beyond 8 bytes is not supported");
    layout.size()
}

unsafe impl<R: lock_api::RawMutex, P: RegionProvider> GlobalAlloc for Locked<R, P> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.lock().allocate(layout_to_size(layout) as u64)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.lock().release(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, old_layout: Layout, new_size: usize) -> *mut u8 {
        // The core doesn't support growing or shrinking in place:
        // every realloc is an allocate + copy + release.
        let mut guard = self.lock();
        let new_ptr = guard.allocate(new_size as u64);
        if !new_ptr.is_null() {
            let copy_len = core::cmp::min(old_layout.size(), new_size);
            core::ptr::copy_nonoverlapping(ptr, new_ptr, copy_len);
            guard.release(ptr);
        }
        new_ptr
    }
}

/// Implements `core::alloc::Allocator`, gated behind the `allocator`
/// feature, mirroring the teacher's own feature of the same name.
#[cfg(feature = "allocator")]
unsafe impl<R: lock_api::RawMutex, P: RegionProvider> core::alloc::Allocator for Locked<R, P> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, core::alloc::AllocError> {
        let size = layout_to_size(layout);
        if size == 0 {
            return Ok(NonNull::slice_from_raw_parts(layout.dangling(), 0));
        }
        let ptr = unsafe { self.lock().allocate(size as u64) };
        let nn = NonNull::new(ptr).ok_or(core::alloc::AllocError)?;
        Ok(NonNull::slice_from_raw_parts(nn, size))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            self.lock().release(ptr.as_ptr());
        }
    }
}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AllocError;
    use crate::span::Span;

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
            let mut buf = std::vec![0u8; size];
            let ptr = buf.as_mut_ptr();
            core::mem::forget(buf);
            Ok(ptr)
        }
    }

    #[test]
    fn global_alloc_facade_round_trips() {
        let locked: Locked<spin::Mutex<()>, _> = Locked::new(TestProvider);
        unsafe {
            let layout = Layout::from_size_align(128, 8).unwrap();
            let p = GlobalAlloc::alloc(&locked, layout);
            assert!(!p.is_null());
            p.write_bytes(0xAB, 128);
            GlobalAlloc::dealloc(&locked, p, layout);
        }
    }

    #[test]
    fn realloc_preserves_prefix_bytes() {
        let locked: Locked<spin::Mutex<()>, _> = Locked::new(TestProvider);
        unsafe {
            let layout = Layout::from_size_align(32, 8).unwrap();
            let p = GlobalAlloc::alloc(&locked, layout);
            for i in 0..32u8 {
                p.add(i as usize).write(i);
            }
            let grown = GlobalAlloc::realloc(&locked, p, layout, 256);
            assert!(!grown.is_null());
            for i in 0..32u8 {
                assert_eq!(grown.add(i as usize).read(), i);
            }
            GlobalAlloc::dealloc(&locked, grown, Layout::from_size_align(256, 8).unwrap());
        }
    }
}
