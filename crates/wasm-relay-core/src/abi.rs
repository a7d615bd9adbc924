//! Guest memory protocol.
//!
//! A relay module exports linear memory, an allocator and an entry point:
//!
//! ```text
//! (func (export "alloc") (param $len i32) (result i32))
//! (func (export "run") (param $ptr i32) (param $len i32) (result i64))
//! ```
//!
//! The host allocates `len` bytes with `alloc`, copies the request envelope
//! there and calls `run(ptr, len)`. `run` returns the location of its UTF-8
//! output packed as `(ptr << 32) | len`.

use wasmtime::{AsContext, AsContextMut, Memory};

use wasm_relay_common::RuntimeError;

/// Pack a guest pointer and length into the `run` return value.
#[allow(clippy::cast_possible_wrap)]
pub fn pack(ptr: u32, len: u32) -> i64 {
    ((u64::from(ptr) << 32) | u64::from(len)) as i64
}

/// Split a `run` return value into guest pointer and length.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn unpack(packed: i64) -> (u32, u32) {
    let bits = packed as u64;
    ((bits >> 32) as u32, bits as u32)
}

/// Convert an input length to the `i32` the guest allocator takes.
pub fn input_len(bytes: &[u8]) -> Result<i32, RuntimeError> {
    i32::try_from(bytes.len()).map_err(|_| {
        RuntimeError::guest_abi(format!("Request of {} bytes is too large", bytes.len()))
    })
}

/// Copy `bytes` into guest memory at `ptr`.
pub fn write_input(
    memory: &Memory,
    store: impl AsContextMut,
    ptr: i32,
    bytes: &[u8],
) -> Result<(), RuntimeError> {
    let offset = u32::try_from(ptr)
        .map_err(|_| RuntimeError::guest_abi(format!("alloc returned negative pointer {ptr}")))?;

    memory
        .write(store, offset as usize, bytes)
        .map_err(|e| {
            RuntimeError::guest_abi(format!(
                "Cannot write {} bytes at {offset}: {e}",
                bytes.len()
            ))
        })
}

/// Read the UTF-8 output the guest left at `ptr..ptr + len`.
pub fn read_output(
    memory: &Memory,
    store: impl AsContext,
    ptr: u32,
    len: u32,
) -> Result<String, RuntimeError> {
    let data = memory.data(&store);

    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            RuntimeError::guest_abi(format!(
                "Output {start}+{len} is outside memory of {} bytes",
                data.len()
            ))
        })?;

    std::str::from_utf8(&data[start..end])
        .map(str::to_owned)
        .map_err(|e| RuntimeError::guest_abi(format!("Output is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, MemoryType, Store};

    fn memory() -> (Store<()>, Memory) {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let memory = Memory::new(&mut store, MemoryType::new(1, None)).unwrap();
        (store, memory)
    }

    #[test]
    fn test_pack_unpack() {
        assert_eq!(unpack(pack(1024, 17)), (1024, 17));
        assert_eq!(unpack(pack(u32::MAX, u32::MAX)), (u32::MAX, u32::MAX));
        assert_eq!(unpack(pack(0, 0)), (0, 0));
        assert_eq!(pack(1, 2), (1_i64 << 32) | 2);
    }

    #[test]
    fn test_write_then_read() {
        let (mut store, memory) = memory();

        write_input(&memory, &mut store, 16, "héllo".as_bytes()).unwrap();
        let out = read_output(&memory, &store, 16, 6).unwrap();

        assert_eq!(out, "héllo");
    }

    #[test]
    fn test_write_out_of_bounds() {
        let (mut store, memory) = memory();

        // One page is 64KiB
        let err = write_input(&memory, &mut store, 65_530, &[0; 16]).unwrap_err();
        assert!(matches!(err, RuntimeError::GuestAbi { .. }));

        let err = write_input(&memory, &mut store, -4, b"x").unwrap_err();
        assert!(matches!(err, RuntimeError::GuestAbi { .. }));
    }

    #[test]
    fn test_read_out_of_bounds() {
        let (store, memory) = memory();

        assert!(read_output(&memory, &store, 65_530, 16).is_err());
        assert!(read_output(&memory, &store, u32::MAX, u32::MAX).is_err());
        assert_eq!(read_output(&memory, &store, 65_536, 0).unwrap(), "");
    }

    #[test]
    fn test_read_invalid_utf8() {
        let (mut store, memory) = memory();

        write_input(&memory, &mut store, 0, &[0xc3, 0x28]).unwrap();
        let err = read_output(&memory, &store, 0, 2).unwrap_err();
        assert!(err.to_string().contains("not UTF-8"));
    }
}
