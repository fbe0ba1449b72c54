// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
One generation of per-frame resources.

A [FrameSlot] owns a dynamic record buffer for every record kind, a packed stream, a
recording context, and the ticket issued when it was last submitted.  The ring hands out exactly one slot
per frame; nothing else in the crate writes into a slot's memory.
*/

use crate::fence::Ticket;
use crate::imp::{Device, DeviceError};
use crate::layout::{RecordKind, RecordSchema, SceneLayout};
use crate::record_buffer::{DynamicRecordBuffer, IndexOutOfRange};
use crate::stream::StreamBuffer;

/// Where a slot is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Not being recorded.  Its last submission (if any) may still be executing.
    Idle,
    /// Handed out by the ring for the current frame.
    Recording,
    /// Submitted; the GPU may be reading it until its completion ticket is reached.
    Submitted,
}

pub struct FrameSlot<D: Device, S: RecordSchema> {
    index: usize,
    state: SlotState,
    completion: Ticket,
    objects: DynamicRecordBuffer<S::Object, D::Memory>,
    materials: DynamicRecordBuffer<S::Material, D::Memory>,
    passes: DynamicRecordBuffer<S::Pass, D::Memory>,
    stream: StreamBuffer<S::Stream, D::Memory>,
    context: D::Context,
}

impl<D: Device, S: RecordSchema> std::fmt::Debug for FrameSlot<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}

impl<D: Device, S: RecordSchema> FrameSlot<D, S> {
    /// Allocates slot `index` of `layout` on `device`.
    pub(crate) fn new(device: &D, layout: &SceneLayout, index: usize, ring_name: &str) -> Result<Self, DeviceError> {
        let objects = DynamicRecordBuffer::new(
            device.allocate(
                layout.buffer_len(RecordKind::Object),
                &format!("{ring_name} slot {index} objects"),
            )?,
            RecordKind::Object,
            layout.capacity(RecordKind::Object),
            layout.stride(RecordKind::Object),
        );
        let materials = DynamicRecordBuffer::new(
            device.allocate(
                layout.buffer_len(RecordKind::Material),
                &format!("{ring_name} slot {index} materials"),
            )?,
            RecordKind::Material,
            layout.capacity(RecordKind::Material),
            layout.stride(RecordKind::Material),
        );
        let passes = DynamicRecordBuffer::new(
            device.allocate(
                layout.buffer_len(RecordKind::Pass),
                &format!("{ring_name} slot {index} passes"),
            )?,
            RecordKind::Pass,
            layout.capacity(RecordKind::Pass),
            layout.stride(RecordKind::Pass),
        );
        let stream = StreamBuffer::new(
            device.allocate(layout.stream_byte_len(), &format!("{ring_name} slot {index} stream"))?,
            layout.stream_len(),
        );
        let context = device.create_context(&format!("{ring_name} slot {index}"))?;
        Ok(FrameSlot {
            index,
            state: SlotState::Idle,
            completion: Ticket::NONE,
            objects,
            materials,
            passes,
            stream,
            context,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }
    pub fn state(&self) -> SlotState {
        self.state
    }
    pub(crate) fn set_state(&mut self, state: SlotState) {
        self.state = state;
    }

    /// Ticket of the slot's last submission, or [Ticket::NONE].
    pub fn completion(&self) -> Ticket {
        self.completion
    }
    pub(crate) fn set_completion(&mut self, ticket: Ticket) {
        debug_assert!(ticket > self.completion, "completion tickets go backwards");
        self.completion = ticket;
    }

    pub fn objects(&self) -> &DynamicRecordBuffer<S::Object, D::Memory> {
        &self.objects
    }
    pub fn objects_mut(&mut self) -> &mut DynamicRecordBuffer<S::Object, D::Memory> {
        &mut self.objects
    }
    pub fn materials(&self) -> &DynamicRecordBuffer<S::Material, D::Memory> {
        &self.materials
    }
    pub fn materials_mut(&mut self) -> &mut DynamicRecordBuffer<S::Material, D::Memory> {
        &mut self.materials
    }
    pub fn passes(&self) -> &DynamicRecordBuffer<S::Pass, D::Memory> {
        &self.passes
    }
    pub fn passes_mut(&mut self) -> &mut DynamicRecordBuffer<S::Pass, D::Memory> {
        &mut self.passes
    }

    /// This slot's stream.  It is only ever written by frames recorded into this slot.
    pub fn stream(&self) -> &StreamBuffer<S::Stream, D::Memory> {
        &self.stream
    }
    pub fn stream_mut(&mut self) -> &mut StreamBuffer<S::Stream, D::Memory> {
        &mut self.stream
    }

    pub fn context(&self) -> &D::Context {
        &self.context
    }
    pub fn context_mut(&mut self) -> &mut D::Context {
        &mut self.context
    }

    /// Device address of record `ordinal` of `kind` in this slot.
    pub fn address_of(&self, kind: RecordKind, ordinal: usize) -> Result<u64, IndexOutOfRange> {
        match kind {
            RecordKind::Object => self.objects.address_of(ordinal),
            RecordKind::Material => self.materials.address_of(ordinal),
            RecordKind::Pass => self.passes.address_of(ordinal),
        }
    }

    /// Base address of this slot's buffer for `kind`.
    pub fn base_address(&self, kind: RecordKind) -> u64 {
        match kind {
            RecordKind::Object => self.objects.base_address(),
            RecordKind::Material => self.materials.base_address(),
            RecordKind::Pass => self.passes.base_address(),
        }
    }

    pub(crate) fn flush_buffers(&mut self) -> Result<(), DeviceError> {
        self.objects.flush()?;
        self.materials.flush()?;
        self.passes.flush()?;
        self.stream.flush()
    }
}
