//! Integration-test fixture: prints the addresses of two marker
//! functions, then calls them back-to-back some number of times. A test
//! harness uses the printed addresses as `addr_start`/`addr_end` without
//! having to hard-code anything linker- or ASLR-dependent.

use std::hint::black_box;
use std::io::Write;

#[inline(never)]
#[no_mangle]
pub extern "C" fn perfregion_fixture_region_start() {
    black_box(());
}

#[inline(never)]
#[no_mangle]
pub extern "C" fn perfregion_fixture_region_end() {
    black_box(());
}

fn main() {
    let iterations: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let start = perfregion_fixture_region_start as usize;
    let end = perfregion_fixture_region_end as usize;
    println!("{start:x} {end:x}");
    std::io::stdout().flush().expect("stdout flush");

    // Give the harness a chance to read the marker addresses before any
    // breakpoint gets installed: stop ourselves and wait to be resumed.
    unsafe {
        libc::raise(libc::SIGSTOP);
    }

    for _ in 0..iterations {
        perfregion_fixture_region_start();
        black_box(17u64.wrapping_mul(31));
        perfregion_fixture_region_end();
    }
}
