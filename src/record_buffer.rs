// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Dynamic record buffer implementation.

A dynamic record buffer is a fixed-capacity array of records of one kind, living in
memory the CPU writes directly and the GPU reads.  Each record occupies `stride` bytes,
which is the record size rounded up to whatever alignment the binding model requires, so
record `n` starts at `base_address + n * stride`.

Each frame slot owns its own buffer per record kind.  No two slots alias memory, so
writing into the current slot never races the GPU reading another slot.
*/

use crate::imp::{DeviceError, RecordMemory};
use crate::layout::RecordKind;
use std::marker::PhantomData;

/**
Indicates that the type has a C layout and can be copied byte-for-byte into GPU memory.

# Safety

The type must be `#[repr(C)]` (or otherwise have a defined layout) and must not contain
padding bytes, pointers or references.  Insert explicit padding fields where the
shader-side layout needs them.
*/
pub unsafe trait CRepr: Copy + 'static {}

unsafe impl CRepr for u32 {}
unsafe impl CRepr for f32 {}
unsafe impl<T: CRepr, const N: usize> CRepr for [T; N] {}

pub(crate) fn bytes_of<T: CRepr>(value: &T) -> &[u8] {
    //safety: CRepr guarantees a padding-free, pointer-free layout
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>()) }
}

pub(crate) fn bytes_of_slice<T: CRepr>(values: &[T]) -> &[u8] {
    //safety: as above, and slice elements are contiguous
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values)) }
}

/// A record ordinal (or slot index) that is not inside the allocated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{what} {index} out of range for {kind:?} (capacity {capacity})")]
pub struct IndexOutOfRange {
    pub kind: RecordKind,
    pub what: &'static str,
    pub index: usize,
    pub capacity: usize,
}

impl IndexOutOfRange {
    pub(crate) fn ordinal(kind: RecordKind, index: usize, capacity: usize) -> Self {
        IndexOutOfRange {
            kind,
            what: "ordinal",
            index,
            capacity,
        }
    }
    pub(crate) fn slot(kind: RecordKind, index: usize, capacity: usize) -> Self {
        IndexOutOfRange {
            kind,
            what: "slot",
            index,
            capacity,
        }
    }
}

#[derive(Debug)]
pub struct DynamicRecordBuffer<T, M> {
    memory: M,
    kind: RecordKind,
    capacity: usize,
    stride: usize,
    _marker: PhantomData<T>,
}

impl<T: CRepr, M: RecordMemory> DynamicRecordBuffer<T, M> {
    /**
    Wraps `memory` as `capacity` records of `stride` bytes.

    # Panics

    If `stride` cannot hold a `T` or `memory` is smaller than `capacity * stride`.
    */
    pub fn new(memory: M, kind: RecordKind, capacity: usize, stride: usize) -> Self {
        assert!(
            stride >= std::mem::size_of::<T>(),
            "stride {stride} cannot hold a {} byte record",
            std::mem::size_of::<T>()
        );
        assert!(
            memory.byte_len() >= capacity * stride,
            "memory of {} bytes cannot hold {capacity} records of stride {stride}",
            memory.byte_len()
        );
        DynamicRecordBuffer {
            memory,
            kind,
            capacity,
            stride,
            _marker: PhantomData,
        }
    }

    fn check(&self, ordinal: usize) -> Result<(), IndexOutOfRange> {
        if ordinal < self.capacity {
            Ok(())
        } else {
            Err(IndexOutOfRange::ordinal(self.kind, ordinal, self.capacity))
        }
    }

    /// Copies `payload` into record `ordinal`.
    pub fn write(&mut self, ordinal: usize, payload: &T) -> Result<(), IndexOutOfRange> {
        self.check(ordinal)?;
        self.memory.write(ordinal * self.stride, bytes_of(payload));
        Ok(())
    }

    /// Copies record `ordinal` back out of the buffer.
    pub fn read(&self, ordinal: usize) -> Result<T, IndexOutOfRange> {
        self.check(ordinal)?;
        let offset = ordinal * self.stride;
        let bytes = &self.memory.as_bytes()[offset..offset + std::mem::size_of::<T>()];
        //safety: the range is in bounds and was produced from a T; records may be unaligned in host memory
        Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) })
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn stride(&self) -> usize {
        self.stride
    }
    pub fn base_address(&self) -> u64 {
        self.memory.base_address()
    }

    /// Device address of record `ordinal`, suitable for a root constant-buffer binding.
    pub fn address_of(&self, ordinal: usize) -> Result<u64, IndexOutOfRange> {
        self.check(ordinal)?;
        Ok(self.base_address() + (ordinal * self.stride) as u64)
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn flush(&mut self) -> Result<(), DeviceError> {
        self.memory.flush()
    }
}
