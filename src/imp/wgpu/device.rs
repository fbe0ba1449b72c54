// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bittricks::align_up;
use crate::imp::wgpu::context::WgpuContext;
use crate::imp::wgpu::memory::WgpuMemory;
use crate::imp::wgpu::timeline::WgpuTimeline;
use crate::imp::{Device, DeviceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

//synthetic addresses start here so that 0 never names a record
const ADDRESS_BASE: u64 = 0x1_0000_0000;

#[derive(Debug)]
struct Shared {
    device: wgpu::Device,
    queue: wgpu::Queue,
    timeline: Arc<WgpuTimeline>,
    alignment: usize,
    next_address: AtomicU64,
}

/**
A [Device] over an existing wgpu device and queue.

Clones share the same timeline and poll thread.
*/
#[derive(Debug, Clone)]
pub struct WgpuDevice {
    shared: Arc<Shared>,
}

impl WgpuDevice {
    /// Installs the device-lost callback and starts the poll thread.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, DeviceError> {
        let timeline = Arc::new(WgpuTimeline::new(&device, queue.clone())?);
        let alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        logwise::info_sync!("wgpu frame device with uniform alignment {alignment}", alignment = alignment);
        Ok(WgpuDevice {
            shared: Arc::new(Shared {
                device,
                queue,
                timeline,
                alignment,
                next_address: AtomicU64::new(ADDRESS_BASE),
            }),
        })
    }

    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.shared.device
    }

    pub fn wgpu_queue(&self) -> &wgpu::Queue {
        &self.shared.queue
    }
}

impl Device for WgpuDevice {
    type Timeline = WgpuTimeline;
    type Memory = WgpuMemory;
    type Context = WgpuContext;

    fn timeline(&self) -> Arc<Self::Timeline> {
        self.shared.timeline.clone()
    }

    fn min_uniform_alignment(&self) -> usize {
        self.shared.alignment
    }

    fn allocate(&self, byte_len: usize, debug_name: &str) -> Result<Self::Memory, DeviceError> {
        if self.shared.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        let reserve = align_up(byte_len.max(1), self.shared.alignment) as u64;
        let address = self.shared.next_address.fetch_add(reserve, Ordering::Relaxed);
        Ok(WgpuMemory::new(
            &self.shared.device,
            self.shared.queue.clone(),
            byte_len,
            address,
            debug_name,
        ))
    }

    fn create_context(&self, debug_name: &str) -> Result<Self::Context, DeviceError> {
        if self.shared.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        Ok(WgpuContext::new(
            self.shared.device.clone(),
            self.shared.queue.clone(),
            self.shared.timeline.clone(),
            debug_name,
        ))
    }
}
