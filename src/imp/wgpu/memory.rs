// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bittricks::{align_down, align_up};
use crate::imp::{DeviceError, RecordMemory};
use std::ops::Range;

const COPY_ALIGNMENT: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

/**
Record memory for the wgpu backend.

Writes land in a CPU shadow.  On flush, the written byte range is uploaded with
`Queue::write_buffer`, which wgpu stages and orders before the next submission.
*/
#[derive(Debug)]
pub struct WgpuMemory {
    shadow: Box<[u8]>,
    byte_len: usize,
    buffer: wgpu::Buffer,
    queue: wgpu::Queue,
    address: u64,
    dirty: Option<Range<usize>>,
}

impl WgpuMemory {
    pub(super) fn new(device: &wgpu::Device, queue: wgpu::Queue, byte_len: usize, address: u64, label: &str) -> Self {
        //write_buffer wants 4-byte sizes, and zero-sized uniform buffers are invalid
        let padded = align_up(byte_len.max(1), COPY_ALIGNMENT);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: padded as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        WgpuMemory {
            shadow: vec![0; padded].into_boxed_slice(),
            byte_len,
            buffer,
            queue,
            address,
            dirty: None,
        }
    }

    /// The buffer to bind.  Bind record `n` at offset `n * stride`.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Widens `dirty` to copy alignment, clamped to the padded allocation.
fn upload_range(dirty: &Range<usize>, padded_len: usize) -> Range<usize> {
    let start = align_down(dirty.start, COPY_ALIGNMENT);
    let end = align_up(dirty.end, COPY_ALIGNMENT).min(padded_len);
    start..end
}

impl RecordMemory for WgpuMemory {
    fn byte_len(&self) -> usize {
        self.byte_len
    }

    fn write(&mut self, byte_offset: usize, bytes: &[u8]) {
        let end = byte_offset + bytes.len();
        self.shadow[byte_offset..end].copy_from_slice(bytes);
        self.dirty = Some(match self.dirty.take() {
            None => byte_offset..end,
            Some(d) => d.start.min(byte_offset)..d.end.max(end),
        });
    }

    fn as_bytes(&self) -> &[u8] {
        &self.shadow[..self.byte_len]
    }

    fn base_address(&self) -> u64 {
        self.address
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        if let Some(dirty) = self.dirty.take() {
            let range = upload_range(&dirty, self.shadow.len());
            self.queue
                .write_buffer(&self.buffer, range.start as u64, &self.shadow[range]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_range_is_copy_aligned() {
        assert_eq!(upload_range(&(0..3), 4), 0..4);
        assert_eq!(upload_range(&(5..9), 256), 4..12);
        assert_eq!(upload_range(&(256..400), 512), 256..400);
        //never past the allocation
        assert_eq!(upload_range(&(0..13), 16), 0..16);
    }
}
