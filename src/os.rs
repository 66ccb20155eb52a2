//! OS region provider.
//!
//! Obtains fresh memory directly from the operating system: anonymous,
//! page-aligned, private read-write regions for chunk storage, and a
//! one-time program-break extension for the bin table at bootstrap.

use crate::error::AllocError;
use crate::span::Span;

pub const PAGE_SIZE: u64 = 4096;
pub const MMAP_SIZE: u64 = 0x20000;

/// Source of fresh OS memory. Implemented for the host platform; a test
/// double backed by `Vec<u8>` leaks lives for the test process, mirroring
/// the allocator's own "regions are never returned" lifecycle.
pub trait RegionProvider {
    /// Map a fresh, zeroed, read-write region of at least `min_size` bytes,
    /// sized per [`region_size_for`]. Returns the region's `Span`.
    fn obtain_region(&mut self, min_size: u64) -> Result<Span, AllocError>;

    /// Extend the program break by `size` bytes, once, for bin-table
    /// storage. Never called again after a successful first call.
    fn bootstrap(&mut self, size: usize) -> Result<*mut u8, AllocError>;
}

/// Compute the region size for a request of `need` bytes: `MMAP_SIZE`
/// when `need <= MMAP_SIZE`, otherwise the smallest page multiple that
/// strictly exceeds `need` by at least one page.
pub(crate) fn region_size_for(need: u64) -> u64 {
    if need <= MMAP_SIZE {
        MMAP_SIZE
    } else {
        (need / PAGE_SIZE + 1) * PAGE_SIZE
    }
}

/// The production `RegionProvider`: anonymous `mmap` regions and an
/// `sbrk`-based one-time bootstrap, grounded on the teacher's
/// `UnixMMapSource`.
#[cfg(unix)]
pub struct UnixRegionProvider;

#[cfg(unix)]
impl UnixRegionProvider {
    pub const fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl RegionProvider for UnixRegionProvider {
    fn obtain_region(&mut self, min_size: u64) -> Result<Span, AllocError> {
        let size = region_size_for(min_size);

        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                size as usize,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(AllocError::OutOfMemory);
        }

        Ok(Span::from_ptr_size(ptr.cast(), size as usize))
    }

    fn bootstrap(&mut self, size: usize) -> Result<*mut u8, AllocError> {
        let ptr = unsafe { libc::sbrk(size as libc::intptr_t) };
        if ptr == usize::MAX as *mut libc::c_void {
            return Err(AllocError::BootstrapFailed);
        }
        Ok(ptr.cast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_size_uses_default_below_mmap_size() {
        assert_eq!(region_size_for(100), MMAP_SIZE);
        assert_eq!(region_size_for(MMAP_SIZE), MMAP_SIZE);
    }

    #[test]
    fn region_size_pads_one_extra_page_above_mmap_size() {
        let need = MMAP_SIZE + 1;
        let expected = (need / PAGE_SIZE + 1) * PAGE_SIZE;
        assert_eq!(region_size_for(need), expected);
        // even an already page-aligned need still gets one extra page.
        assert_eq!(region_size_for(expected - PAGE_SIZE), expected);
    }

    #[test]
    fn large_request_region_size_matches_div_ceil() {
        // for a non-page-aligned `need`, (need/PAGE_SIZE + 1)*PAGE_SIZE
        // coincides with `need.div_ceil(PAGE_SIZE)*PAGE_SIZE`.
        let need = 200_000 + crate::chunk::CHUNK_OVERHEAD;
        assert_eq!(region_size_for(need), need.div_ceil(PAGE_SIZE) * PAGE_SIZE);
    }
}
