// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

Wraps a `wgpu::Device` and `wgpu::Queue` the application already created.

wgpu has no fence objects, so the timeline is built from
`Queue::on_submitted_work_done`: every signal registers a callback that raises the
completed value once the work submitted before it has run.  Callbacks only fire while
the device is polled, which a dedicated `wgpu_poll` thread does whenever a signal is
outstanding.

wgpu also has no device addresses.  [WgpuMemory] hands out a synthetic base address per
allocation so tables and bindings can be compared, and exposes the `wgpu::Buffer` for
binding; the record's byte offset within it is the resolver's `slot_byte_offset`.
*/

mod context;
mod device;
mod memory;
mod timeline;

pub use context::WgpuContext;
pub use device::WgpuDevice;
pub use memory::WgpuMemory;
pub use timeline::WgpuTimeline;
