// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::wgpu::timeline::WgpuTimeline;
use crate::imp::{DeviceError, RecordingContext};
use std::sync::Arc;

/**
A frame slot's command encoder.

Each reset starts a fresh `CommandEncoder`; submit finishes it and hands it to the queue.
*/
#[derive(Debug)]
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    timeline: Arc<WgpuTimeline>,
    label: String,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuContext {
    pub(super) fn new(device: wgpu::Device, queue: wgpu::Queue, timeline: Arc<WgpuTimeline>, label: &str) -> Self {
        WgpuContext {
            device,
            queue,
            timeline,
            label: label.to_string(),
            encoder: None,
        }
    }

    /// The encoder for the frame being recorded, or `None` outside a frame.
    pub fn encoder_mut(&mut self) -> Option<&mut wgpu::CommandEncoder> {
        self.encoder.as_mut()
    }

    fn new_encoder(&self) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&self.label),
        })
    }
}

impl RecordingContext for WgpuContext {
    fn reset(&mut self) -> Result<(), DeviceError> {
        if self.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        //an encoder left over from an abandoned frame is discarded unsubmitted
        self.encoder = Some(self.new_encoder());
        Ok(())
    }

    fn submit(&mut self) -> Result<(), DeviceError> {
        if self.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        let encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => self.new_encoder(),
        };
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
