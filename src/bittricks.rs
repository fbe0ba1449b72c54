// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
alignment arithmetic.
*/

/// The minimum constant-buffer alignment on D3D12-class hardware.
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Rounds `value` down to the previous multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub const fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Byte size of a constant buffer holding one `T`.
pub const fn constant_buffer_size<T>() -> usize {
    align_up(std::mem::size_of::<T>(), CONSTANT_BUFFER_ALIGNMENT)
}
