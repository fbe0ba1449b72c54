// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Per-slot streams.

A stream is a packed array of elements (typically vertices of geometry animated on the CPU)
that is rewritten in full every frame.  Unlike records it has no dirty tracking: whatever
the frame writes is what the GPU reads for that frame, and a slot's stream keeps its old
contents until a frame using that slot writes it again.
*/

use crate::imp::{DeviceError, RecordMemory};
use crate::record_buffer::{CRepr, bytes_of_slice};
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream element {index} out of range (length {len})")]
pub struct StreamOutOfRange {
    pub index: usize,
    pub len: usize,
}

#[derive(Debug)]
pub struct StreamBuffer<T, M> {
    memory: M,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: CRepr, M: RecordMemory> StreamBuffer<T, M> {
    /**
    Wraps `memory` as `len` packed elements.

    # Panics

    If `memory` is smaller than `len` elements.
    */
    pub fn new(memory: M, len: usize) -> Self {
        assert!(
            memory.byte_len() >= len * std::mem::size_of::<T>(),
            "memory of {} bytes cannot hold {len} stream elements",
            memory.byte_len()
        );
        StreamBuffer {
            memory,
            len,
            _marker: PhantomData,
        }
    }

    /// Copies `elements` to the start of the stream.
    pub fn write_all(&mut self, elements: &[T]) -> Result<(), StreamOutOfRange> {
        if elements.len() > self.len {
            return Err(StreamOutOfRange {
                index: elements.len() - 1,
                len: self.len,
            });
        }
        if !elements.is_empty() {
            self.memory.write(0, bytes_of_slice(elements));
        }
        Ok(())
    }

    pub fn write(&mut self, index: usize, element: &T) -> Result<(), StreamOutOfRange> {
        self.check(index)?;
        self.memory.write(index * self.stride(), bytes_of_slice(std::slice::from_ref(element)));
        Ok(())
    }

    pub fn read(&self, index: usize) -> Result<T, StreamOutOfRange> {
        self.check(index)?;
        let offset = index * self.stride();
        let bytes = &self.memory.as_bytes()[offset..offset + self.stride()];
        //safety: in bounds, and CRepr types may be read from any byte pattern we wrote
        Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) })
    }

    fn check(&self, index: usize) -> Result<(), StreamOutOfRange> {
        if index < self.len {
            Ok(())
        } else {
            Err(StreamOutOfRange { index, len: self.len })
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn stride(&self) -> usize {
        std::mem::size_of::<T>()
    }
    /// Bytes a vertex-buffer view over the whole stream covers.
    pub fn byte_len(&self) -> usize {
        self.len * self.stride()
    }
    pub fn base_address(&self) -> u64 {
        self.memory.base_address()
    }
    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn flush(&mut self) -> Result<(), DeviceError> {
        self.memory.flush()
    }
}
