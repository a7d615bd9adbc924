//! Minimal relay guest: answers every request with its own envelope.
//!
//! Build with `cargo build --release --target wasm32-unknown-unknown` and
//! run `wasm-relay --module target/wasm32-unknown-unknown/release/echo_relay_guest.wasm`.

#![no_std]

use core::panic::PanicInfo;
use core::ptr::addr_of_mut;

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    core::arch::wasm32::unreachable()
}

#[link(wasm_import_module = "env")]
extern "C" {
    fn log(level: i32, ptr: *const u8, len: i32);
}

const DEBUG: i32 = 0;

const HEAP_SIZE: usize = 64 * 1024;

static mut HEAP: [u8; HEAP_SIZE] = [0u8; HEAP_SIZE];
static mut NEXT: usize = 0;

/// Bump allocator; a fresh instance serves each request, so nothing is freed.
#[no_mangle]
pub extern "C" fn alloc(len: i32) -> i32 {
    unsafe {
        let start = NEXT;
        let end = start + len as usize;
        if end > HEAP_SIZE {
            core::arch::wasm32::unreachable();
        }
        NEXT = end;
        addr_of_mut!(HEAP).cast::<u8>().add(start) as i32
    }
}

#[no_mangle]
pub extern "C" fn run(ptr: i32, len: i32) -> i64 {
    let message = "echoing request envelope";
    unsafe {
        log(DEBUG, message.as_ptr(), message.len() as i32);
    }
    ((ptr as u32 as i64) << 32) | (len as u32 as i64)
}
