// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The frame loop.

[FrameLoop] ties the pieces together for the usual update/record/submit cycle:

1. Between frames, register and mutate records through [FrameLoop::objects_mut],
   [FrameLoop::materials_mut] and [FrameLoop::passes_mut].
2. [FrameLoop::begin_frame] advances the ring (waiting on the fence only if the slot is
   still in flight) and writes every dirty record into the new slot.
3. Record draws through the returned [Frame], binding each draw with
   [Frame::draw_bindings].  Per-frame geometry goes into [Frame::stream_mut], which is
   written in full every frame and never dirty-tracked.
4. [Frame::end] submits the slot and returns its ticket.

```
# use frames_and_records::constants::{ObjectConstants, PassConstants, MaterialConstants, StandardSchema};
# use frames_and_records::frame_loop::FrameLoop;
# use frames_and_records::imp::software::{CompletionMode, SoftwareDevice};
# use frames_and_records::layout::Capacities;
# use frames_and_records::ring::RingConfig;
# test_executors::sleep_on(async {
let device = SoftwareDevice::new(CompletionMode::Immediate);
let capacities = Capacities { objects: 16, materials: 4, passes: 2 };
let mut frames = FrameLoop::<_, StandardSchema>::new(device, capacities, RingConfig::default()).unwrap();
let material = frames.materials_mut().register(MaterialConstants::default()).unwrap();
let object = frames.objects_mut().register(ObjectConstants::default()).unwrap();
let pass = frames.passes_mut().register(PassConstants::default()).unwrap();

let frame = frames.begin_frame().await.unwrap();
let bindings = frame.draw_bindings(object, material, pass).unwrap();
assert_eq!(bindings.object.resolved.slot, 0);
frame.end().unwrap();
# });
```
*/

use crate::fence::{FenceClock, Ticket};
use crate::frame_slot::FrameSlot;
use crate::imp::{Device, DeviceError};
use crate::layout::{Capacities, LayoutError, RecordKind, RecordSchema, Resolved, SceneLayout};
use crate::record_buffer::IndexOutOfRange;
use crate::records::{RecordError, RecordHandle, RecordTable};
use crate::ring::{EndFrameError, FrameSlotRing, RingConfig, RingError};
use crate::stream::{StreamBuffer, StreamOutOfRange};
use crate::table::DescriptorTable;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    IndexOutOfRange(#[from] IndexOutOfRange),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error(transparent)]
    Stream(#[from] StreamOutOfRange),
}

impl From<EndFrameError> for Error {
    fn from(e: EndFrameError) -> Self {
        match e {
            EndFrameError::Ring(e) => Error::Ring(e),
            EndFrameError::Device(e) => Error::Device(e),
        }
    }
}

/// Records written into the slot when a frame began.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Uploaded {
    pub objects: usize,
    pub materials: usize,
    pub passes: usize,
}

impl Uploaded {
    pub fn total(&self) -> usize {
        self.objects + self.materials + self.passes
    }
}

/// Where one record is bound for the current frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub resolved: Resolved,
    /// Device address of the record copy in the frame's slot.
    pub address: u64,
}

/**
Everything one draw needs to bind.

Only valid for commands recorded into the frame it came from.
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawBindings {
    pub object: Binding,
    pub material: Binding,
    pub pass: Binding,
}

pub struct FrameLoop<D: Device, S: RecordSchema> {
    device: D,
    debug_name: String,
    ring: FrameSlotRing<D, S>,
    table: DescriptorTable,
    objects: RecordTable<S::Object>,
    materials: RecordTable<S::Material>,
    passes: RecordTable<S::Pass>,
    layout_generation: u64,
}

impl<D: Device, S: RecordSchema> std::fmt::Debug for FrameLoop<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("debug_name", &self.debug_name)
            .field("ring", &self.ring)
            .field("layout_generation", &self.layout_generation)
            .finish_non_exhaustive()
    }
}

impl<D: Device, S: RecordSchema> FrameLoop<D, S> {
    pub fn new(device: D, capacities: Capacities, config: RingConfig) -> Result<Self, Error> {
        let layout = SceneLayout::new::<S>(config.slot_count, capacities, device.min_uniform_alignment())?
            .with_stream_len(config.stream_len)?;
        let fence = FenceClock::new(device.timeline(), config.wait_timeout);
        let ring = FrameSlotRing::new(&device, layout, fence, &config.debug_name)?;
        let table = DescriptorTable::build(&ring)?;
        let depth = config.slot_count;
        Ok(FrameLoop {
            objects: RecordTable::new(RecordKind::Object, capacities.objects, depth),
            materials: RecordTable::new(RecordKind::Material, capacities.materials, depth),
            passes: RecordTable::new(RecordKind::Pass, capacities.passes, depth),
            device,
            debug_name: config.debug_name,
            ring,
            table,
            layout_generation: 0,
        })
    }

    pub fn objects(&self) -> &RecordTable<S::Object> {
        &self.objects
    }
    pub fn objects_mut(&mut self) -> &mut RecordTable<S::Object> {
        &mut self.objects
    }
    pub fn materials(&self) -> &RecordTable<S::Material> {
        &self.materials
    }
    pub fn materials_mut(&mut self) -> &mut RecordTable<S::Material> {
        &mut self.materials
    }
    pub fn passes(&self) -> &RecordTable<S::Pass> {
        &self.passes
    }
    pub fn passes_mut(&mut self) -> &mut RecordTable<S::Pass> {
        &mut self.passes
    }

    /**
    Starts a frame.

    Advances the ring (possibly waiting for the GPU), then writes every record that the
    new slot has not seen yet.  A device error here is fatal; nothing is uploaded.
    */
    pub async fn begin_frame(&mut self) -> Result<Frame<'_, D, S>, Error> {
        let slot = self.ring.advance().await?;
        let uploaded = Uploaded {
            objects: self.objects.upload_into(slot.objects_mut())?,
            materials: self.materials.upload_into(slot.materials_mut())?,
            passes: self.passes.upload_into(slot.passes_mut())?,
        };
        logwise::trace_sync!(
            "slot {slot} begins with {count} uploads",
            slot = slot.index(),
            count = uploaded.total()
        );
        Ok(Frame {
            owner: self,
            uploaded,
        })
    }

    /**
    Where the live record `handle` sits in the most recently begun frame's slot.

    Fails with [RingError::NoFrameBegun] before the first [Self::begin_frame], and again
    after a [Self::rebuild], since no slot is current then.
    */
    pub fn resolve(&self, handle: RecordHandle) -> Result<Resolved, Error> {
        let slot = self.ring.last_advanced().ok_or(RingError::NoFrameBegun)?;
        self.resolve_in(handle, slot)
    }

    fn check_live(&self, handle: RecordHandle) -> Result<(), RecordError> {
        match handle.kind() {
            RecordKind::Object => self.objects.get(handle).map(|_| ()),
            RecordKind::Material => self.materials.get(handle).map(|_| ()),
            RecordKind::Pass => self.passes.get(handle).map(|_| ()),
        }
    }

    fn resolve_in(&self, handle: RecordHandle, slot: usize) -> Result<Resolved, Error> {
        self.check_live(handle)?;
        Ok(self.ring.layout().resolve(handle.kind(), handle.ordinal(), slot)?)
    }

    fn binding(&self, handle: RecordHandle, kind: RecordKind) -> Result<Binding, Error> {
        if handle.kind() != kind {
            return Err(RecordError::WrongKind { handle, table: kind }.into());
        }
        let slot = self.ring.current_slot();
        let resolved = self.resolve_in(handle, slot.index())?;
        Ok(Binding {
            resolved,
            address: slot.address_of(kind, resolved.ordinal)?,
        })
    }

    /// See [FrameSlotRing::current_slot] for what this is before the first frame.
    pub fn current_slot(&self) -> &FrameSlot<D, S> {
        self.ring.current_slot()
    }

    /**
    Changes record capacities.

    Waits for the GPU to finish every submitted frame, then replaces the ring's slots
    with ones sized for `capacities`.  Tickets keep increasing across the rebuild.
    Every live record keeps its handle and is marked dirty so it reaches each new slot,
    and the descriptor table is rebuilt.

    Fails without changing anything if a capacity is below a live record's ordinal.
    */
    pub async fn rebuild(&mut self, capacities: Capacities) -> Result<(), Error> {
        for (kind, required) in [
            (RecordKind::Object, self.objects.required_capacity()),
            (RecordKind::Material, self.materials.required_capacity()),
            (RecordKind::Pass, self.passes.required_capacity()),
        ] {
            if capacities.get(kind) < required {
                return Err(RecordError::CapacityExceeded {
                    kind,
                    capacity: capacities.get(kind),
                }
                .into());
            }
        }
        let layout = self.ring.layout().with_capacities(capacities)?;
        self.ring.wait_idle().await?;
        self.ring.rebuild(&self.device, layout)?;
        self.table = DescriptorTable::build(&self.ring)?;
        self.objects.set_capacity(capacities.objects)?;
        self.materials.set_capacity(capacities.materials)?;
        self.passes.set_capacity(capacities.passes)?;
        self.objects.mark_all_dirty();
        self.materials.mark_all_dirty();
        self.passes.mark_all_dirty();
        self.layout_generation += 1;
        logwise::info_sync!(
            "{name} layout generation {generation}",
            name = logwise::privacy::LogIt(&self.debug_name),
            generation = self.layout_generation
        );
        Ok(())
    }

    /// Counts rebuilds.  Descriptor tables and resolved bindings from an older generation are invalid.
    pub fn layout_generation(&self) -> u64 {
        self.layout_generation
    }

    /// Waits for every submitted frame.  Call before dropping resources the GPU reads.
    pub async fn wait_idle(&mut self) -> Result<(), Error> {
        Ok(self.ring.wait_idle().await?)
    }

    pub fn descriptor_table(&self) -> &DescriptorTable {
        &self.table
    }
    pub fn layout(&self) -> &SceneLayout {
        self.ring.layout()
    }
    pub fn ring(&self) -> &FrameSlotRing<D, S> {
        &self.ring
    }
    pub fn fence(&self) -> &FenceClock<D::Timeline> {
        self.ring.fence()
    }
    pub fn device(&self) -> &D {
        &self.device
    }
}

/**
A frame being recorded.

Dropping a frame without calling [Frame::end] abandons it: nothing is submitted and the
slot is recycled by the next [FrameLoop::begin_frame].
*/
#[must_use = "a frame is only submitted by Frame::end"]
pub struct Frame<'a, D: Device, S: RecordSchema> {
    owner: &'a mut FrameLoop<D, S>,
    uploaded: Uploaded,
}

impl<'a, D: Device, S: RecordSchema> std::fmt::Debug for Frame<'a, D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("slot", &self.slot_index())
            .field("uploaded", &self.uploaded)
            .finish()
    }
}

impl<'a, D: Device, S: RecordSchema> Frame<'a, D, S> {
    pub fn slot(&self) -> &FrameSlot<D, S> {
        self.owner.ring.current_slot()
    }

    pub fn slot_index(&self) -> usize {
        self.owner.ring.current_index()
    }

    pub fn context_mut(&mut self) -> &mut D::Context {
        self.owner.ring.current_slot_mut().context_mut()
    }

    /**
    This frame's stream.

    Holds whatever the last frame recorded into the same slot wrote, not the previous
    frame's data; write every element the frame draws from.
    */
    pub fn stream_mut(&mut self) -> &mut StreamBuffer<S::Stream, D::Memory> {
        self.owner.ring.current_slot_mut().stream_mut()
    }
    pub fn stream(&self) -> &StreamBuffer<S::Stream, D::Memory> {
        self.owner.ring.current_slot().stream()
    }

    pub fn resolve(&self, handle: RecordHandle) -> Result<Resolved, Error> {
        self.owner.resolve(handle)
    }

    /// Resolves by raw ordinal, without checking that a record is registered there.
    pub fn resolve_ordinal(&self, kind: RecordKind, ordinal: usize) -> Result<Resolved, IndexOutOfRange> {
        self.owner.ring.layout().resolve(kind, ordinal, self.slot_index())
    }

    /// Addresses and table offsets for drawing `object` with `material` under `pass`.
    pub fn draw_bindings(
        &self,
        object: RecordHandle,
        material: RecordHandle,
        pass: RecordHandle,
    ) -> Result<DrawBindings, Error> {
        Ok(DrawBindings {
            object: self.owner.binding(object, RecordKind::Object)?,
            material: self.owner.binding(material, RecordKind::Material)?,
            pass: self.owner.binding(pass, RecordKind::Pass)?,
        })
    }

    pub fn uploaded(&self) -> Uploaded {
        self.uploaded
    }

    /// Read access to the record tables.  Mutations wait until the frame has ended.
    pub fn objects(&self) -> &RecordTable<S::Object> {
        &self.owner.objects
    }
    pub fn materials(&self) -> &RecordTable<S::Material> {
        &self.owner.materials
    }
    pub fn passes(&self) -> &RecordTable<S::Pass> {
        &self.owner.passes
    }

    pub fn descriptor_table(&self) -> &DescriptorTable {
        &self.owner.table
    }

    pub fn fence(&self) -> &FenceClock<D::Timeline> {
        self.owner.ring.fence()
    }

    /// Submits the frame.
    pub fn end(self) -> Result<Ticket, Error> {
        Ok(self.owner.ring.end_frame()?)
    }
}
