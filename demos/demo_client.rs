//! Exercises `allocate`/`release` directly, as an external client of the
//! two public operations: the core doesn't know this binary exists.
//!
//! ```text
//! cargo run --example demo_client
//! ```

use segfit::{SegFit, UnixRegionProvider};

fn main() {
    let mut allocator = SegFit::new(UnixRegionProvider::new());

    let count = 100_000usize;
    let ptr = allocator.allocate((count * core::mem::size_of::<i32>()) as u64) as *mut i32;
    assert!(!ptr.is_null(), "allocate returned a null address");

    eprintln!("allocated array of {count} ints at {ptr:p}");

    unsafe {
        for i in 0..count {
            ptr.add(i).write(fastrand::i32(..));
        }

        print!("first 10 entries:");
        for i in 0..10 {
            print!(" {}", ptr.add(i).read());
        }
        println!();

        allocator.release(ptr.cast());
    }

    eprintln!("released. done.");
}
