//! Typed error surface.
//!
//! The core `allocate`/`release` entry points stay pointer-in, pointer-out
//! (mirroring a C ABI and the teacher's own `GlobalAlloc::alloc`), while
//! `try_allocate` surfaces this enum for callers that want it, the same
//! split the teacher draws between `Talloc::alloc` and `Tallock`'s
//! `GlobalAlloc` impl.

/// Failure modes of the allocator's typed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The OS refused to provide a region. Internal state is unmodified.
    OutOfMemory,
    /// The one-time program-break extension for the bin table failed.
    BootstrapFailed,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("the operating system refused to provide a memory region"),
            Self::BootstrapFailed => f.write_str("failed to extend the program break for bin table storage"),
        }
    }
}

impl core::error::Error for AllocError {}


#[cfg(test)]
extern crate std;
