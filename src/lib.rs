//! A segregated-fit, boundary-tagged free-list allocator.
//!
//! The core, chunk layout, the 46-bin segregated index, split-on-allocate
//! and eager-coalesce-on-release, lives across [`chunk`], [`bins`],
//! [`os`] and [`allocator`]. It is single-threaded and non-reentrant: no
//! operation locks, suspends, or tolerates concurrent callers. [`locking`]
//! layers a mutex around it for use as a `#[global_allocator]`.
//!
//! ```
//! use segfit::{SegFit, UnixRegionProvider};
//!
//! let mut a = SegFit::new(UnixRegionProvider::new());
//! let p = a.allocate(128);
//! assert!(!p.is_null());
//! unsafe { a.release(p) };
//! ```

#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "allocator", feature(allocator_api))]

mod allocator;
mod bins;
mod chunk;
mod error;
mod llist;
mod locking;
mod os;
mod span;
mod tag;

pub use allocator::SegFit;
pub use bins::NUM_BINS;
pub use chunk::{CHUNK_OVERHEAD, MIN_CHUNK};
pub use error::AllocError;
pub use locking::Locked;
pub use os::{RegionProvider, MMAP_SIZE, PAGE_SIZE};
pub use span::Span;

#[cfg(unix)]
pub use os::UnixRegionProvider;
