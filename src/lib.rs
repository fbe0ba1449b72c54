// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! frames_and_records keeps CPU-written records in sync with a GPU that is still
  reading frames from the past.

A renderer that waits for the GPU every frame leaves both processors idle half the
time.  Letting the CPU run ahead means the data a frame reads (transforms, material
parameters, camera globals) must not be overwritten while an earlier frame is still
executing.  The standard answer is N-buffering:

* keep `N` [frame slots](frame_slot::FrameSlot), each with its own copy of every record;
* tag each slot with a [fence ticket](fence::Ticket) when it is submitted, and only wait
  when the slot about to be reused is still in flight;
* when a record changes, write it into the next `N` slots, one per frame, via a
  [countdown](dirty::DirtyCountdown) instead of a dirty bit;
* find every record copy by [pure offset arithmetic](layout::SceneLayout::resolve).

# Getting started

Most applications want [frame_loop::FrameLoop], which runs the whole cycle.  The pieces
are public for applications that drive their own ring.

| Piece                        | Module           | Role                                          |
|------------------------------|------------------|-----------------------------------------------|
| Fence clock                  | [fence]          | monotonic tickets, bounded waits              |
| Dynamic record buffer        | [record_buffer]  | typed fixed-capacity view over device memory  |
| Scene layout + resolver      | [layout]         | capacities, strides, offsets, table offsets   |
| Dirty propagation            | [dirty]          | per-record countdown                          |
| Record tables                | [records]        | registration, mutation, removal               |
| Frame slot / ring            | [frame_slot], [ring] | rotation and fence-gated reuse            |
| Descriptor table             | [table]          | one view per record copy                      |
| Per-slot stream              | [stream]         | packed data rewritten every frame             |

# Backends

The [imp] module defines the device seam.  A software backend is always available and is
what the tests use.  A wgpu backend is available behind the `backend_wgpu` feature.
*/

mod bittricks;
pub mod constants;
pub mod dirty;
pub mod fence;
pub mod frame_loop;
pub mod frame_slot;
pub mod imp;
pub mod layout;
pub mod record_buffer;
pub mod records;
pub mod ring;
pub mod stream;
mod sys;
pub mod table;

pub use bittricks::{CONSTANT_BUFFER_ALIGNMENT, align_down, align_up, constant_buffer_size};
pub use fence::{FenceClock, Ticket};
pub use frame_loop::{DrawBindings, Frame, FrameLoop};
pub use imp::DeviceError;
pub use layout::{Capacities, RecordKind, RecordSchema, Resolved, SceneLayout, StrideAlignment};
pub use record_buffer::{CRepr, DynamicRecordBuffer, IndexOutOfRange};
pub use records::{RecordError, RecordHandle, RecordTable};
pub use ring::{FrameSlotRing, RingConfig, RingError};
pub use stream::{StreamBuffer, StreamOutOfRange};
