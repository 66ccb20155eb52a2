//! Compares wall-clock allocate/release throughput against the system
//! allocator over a randomized scenario: 5 000 random-size allocations
//! followed by 10 000 fair-coin allocate/release flips against a live
//! stack, then draining the stack. Grounded on `wmalloc_test.c`'s
//! `wmalloc_test1`/`std_test1` pair.
//!
//! ```text
//! cargo run --release --example timing_harness [iterations]
//! ```

use std::alloc::Layout;
use std::time::Instant;

use segfit::{Locked, UnixRegionProvider};

const MAX_ALLOC_SIZE: u64 = 0x1000;

fn coin_flip_scenario(allocate: impl Fn(usize) -> *mut u8, release: impl Fn(*mut u8, usize)) {
    let mut stack: Vec<(*mut u8, usize)> = Vec::with_capacity(10_000);

    for _ in 0..5000 {
        let size = fastrand::u64(0..MAX_ALLOC_SIZE).max(1) as usize;
        stack.push((allocate(size), size));
    }

    for _ in 0..10_000 {
        if fastrand::bool() {
            if let Some((p, size)) = stack.pop() {
                release(p, size);
            }
        } else {
            let size = fastrand::u64(0..MAX_ALLOC_SIZE).max(1) as usize;
            stack.push((allocate(size), size));
        }
    }

    while let Some((p, size)) = stack.pop() {
        release(p, size);
    }
}

fn main() {
    let iterations: usize = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(20);

    fastrand::seed(1);

    let segfit: Locked<spin::Mutex<()>, _> = Locked::new(UnixRegionProvider::new());

    let start = Instant::now();
    for _ in 0..iterations {
        coin_flip_scenario(
            |size| unsafe { core::alloc::GlobalAlloc::alloc(&segfit, Layout::from_size_align(size, 8).unwrap()) },
            |p, size| unsafe {
                core::alloc::GlobalAlloc::dealloc(&segfit, p, Layout::from_size_align(size, 8).unwrap())
            },
        );
    }
    let segfit_elapsed = start.elapsed();

    let start = Instant::now();
    for _ in 0..iterations {
        coin_flip_scenario(
            |size| unsafe { std::alloc::alloc(Layout::from_size_align(size, 8).unwrap()) },
            |p, size| unsafe { std::alloc::dealloc(p, Layout::from_size_align(size, 8).unwrap()) },
        );
    }
    let system_elapsed = start.elapsed();

    println!("segfit:  {iterations} iterations in {segfit_elapsed:?}");
    println!("system:  {iterations} iterations in {system_elapsed:?}");
}
