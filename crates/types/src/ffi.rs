// Copyright (c) 2026 the concur-bridge authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The byte-oriented entry point for the runtime boundary.
//!
//! Everything above this module is generic Rust (`TaskHandle<T>`,
//! `Channel<T>`, ...): the embedding layer never sees a `void*`. This
//! module exists only at the seam where the surface language's runtime
//! crosses into ours with plain byte buffers, per the redesign note on
//! `void*` payloads — it is deliberately small.

/// Copies a `Copy` value's representation into an owned byte buffer.
///
/// # Safety
/// `T` must not contain padding bytes that matter to the caller and must
/// be safe to reinterpret as a byte sequence (true for all plain
/// numeric/POD types the runtime boundary actually carries).
pub unsafe fn encode<T: Copy>(value: &T) -> Vec<u8> {
    let ptr = value as *const T as *const u8;
    std::slice::from_raw_parts(ptr, std::mem::size_of::<T>()).to_vec()
}

/// Reconstructs a `Copy` value from a byte buffer produced by [`encode`].
///
/// Returns `None` if `bytes` is shorter than `size_of::<T>()`.
///
/// # Safety
/// The caller must guarantee `bytes` actually holds a valid `T`
/// representation (correct layout, alignment is handled via a local
/// copy).
pub unsafe fn decode<T: Copy>(bytes: &[u8]) -> Option<T> {
    if bytes.len() < std::mem::size_of::<T>() {
        return None;
    }
    let mut value = std::mem::MaybeUninit::<T>::uninit();
    std::ptr::copy_nonoverlapping(
        bytes.as_ptr(),
        value.as_mut_ptr() as *mut u8,
        std::mem::size_of::<T>(),
    );
    Some(value.assume_init())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_plain_value() {
        let original: u64 = 0x1122_3344_5566_7788;
        let bytes = unsafe { encode(&original) };
        let restored: u64 = unsafe { decode(&bytes) }.unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn decode_rejects_short_buffers() {
        let bytes = [0u8; 2];
        let restored: Option<u64> = unsafe { decode(&bytes) };
        assert!(restored.is_none());
    }
}
