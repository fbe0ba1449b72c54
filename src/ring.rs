// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The frame slot ring.

A ring of `N` [FrameSlot]s visited strictly round-robin.  Each frame the CPU advances to
the next slot, waits only if the GPU has not yet finished the frame that last used it,
and records into it.  At the end of the frame the slot is submitted and tagged with a
fresh ticket.

```text
        advance            end_frame             (fence reached)
Idle ----------> Recording ----------> Submitted --------------> reusable
```

Since the slot being reused was submitted `N` frames ago, the CPU can run up to `N - 1`
frames ahead of the GPU before [FrameSlotRing::advance] blocks.

The ring never blocks in `Drop`.  Call [FrameSlotRing::wait_idle] before tearing down
resources the GPU might still read.
*/

use crate::fence::{FenceClock, Ticket};
use crate::frame_slot::{FrameSlot, SlotState};
use crate::imp::{Device, DeviceError, RecordingContext};
use crate::layout::{RecordSchema, SceneLayout};
use std::time::Duration;

/// Misuse of the ring's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RingError {
    #[error("end_frame called without a frame being recorded")]
    NotRecording,
    /// Nothing has been advanced since the ring was created or rebuilt, so there is no current slot to resolve against.
    #[error("no frame has begun on this ring")]
    NoFrameBegun,
}

/**
Ring configuration.

The defaults match a typical triple-buffered renderer.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of frame slots, `N`.
    pub slot_count: usize,
    /// Longest a fence wait may take before the device is considered hung.  `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Prefix for debug names of the ring's allocations.
    pub debug_name: String,
    /// Elements in each slot's stream.  Zero for no stream.
    pub stream_len: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            slot_count: 3,
            wait_timeout: Some(Duration::from_secs(5)),
            debug_name: "frame ring".to_string(),
            stream_len: 0,
        }
    }
}

pub struct FrameSlotRing<D: Device, S: RecordSchema> {
    layout: SceneLayout,
    slots: Vec<FrameSlot<D, S>>,
    //index of the most recently advanced slot; starts at N-1 so the first advance yields 0
    current: usize,
    //false until the first advance after new or rebuild
    advanced: bool,
    fence: FenceClock<D::Timeline>,
    frames_begun: u64,
    debug_name: String,
}

impl<D: Device, S: RecordSchema> std::fmt::Debug for FrameSlotRing<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlotRing")
            .field("debug_name", &self.debug_name)
            .field("slots", &self.slots)
            .field("current", &self.current)
            .field("frames_begun", &self.frames_begun)
            .finish_non_exhaustive()
    }
}

impl<D: Device, S: RecordSchema> FrameSlotRing<D, S> {
    /**
    Allocates one [FrameSlot] per `layout.slot_count()`.

    `fence` is usually fresh, but a rebuilt ring takes over the fence of the ring it
    replaces so tickets keep increasing.
    */
    pub fn new(
        device: &D,
        layout: SceneLayout,
        fence: FenceClock<D::Timeline>,
        debug_name: &str,
    ) -> Result<Self, DeviceError> {
        let slots = (0..layout.slot_count())
            .map(|index| FrameSlot::new(device, &layout, index, debug_name))
            .collect::<Result<Vec<_>, _>>()?;
        logwise::info_sync!(
            "created {name} with {slots} slots",
            name = logwise::privacy::LogIt(debug_name),
            slots = layout.slot_count()
        );
        Ok(FrameSlotRing {
            current: layout.slot_count() - 1,
            advanced: false,
            layout,
            slots,
            fence,
            frames_begun: 0,
            debug_name: debug_name.to_string(),
        })
    }

    /**
    Moves to the next slot and prepares it for recording.

    Waits if (and only if) the GPU has not finished the slot's previous submission.
    Errors are fatal to the ring: a lost or hung device, or a context that cannot reset.
    */
    pub async fn advance(&mut self) -> Result<&mut FrameSlot<D, S>, DeviceError> {
        let next = (self.current + 1) % self.slots.len();
        let previous = self.current;
        if self.slots[previous].state() == SlotState::Recording {
            logwise::warn_sync!(
                "{name}: frame in slot {slot} was abandoned without end_frame",
                name = logwise::privacy::LogIt(&self.debug_name),
                slot = previous
            );
            self.slots[previous].set_state(SlotState::Idle);
        }

        let completion = self.slots[next].completion();
        if !self.fence.is_complete(completion) {
            logwise::trace_sync!(
                "{name}: slot {slot} waits for ticket {ticket}",
                name = logwise::privacy::LogIt(&self.debug_name),
                slot = next,
                ticket = completion.get()
            );
            self.fence.wait_until(completion).await?;
        }

        let slot = &mut self.slots[next];
        slot.set_state(SlotState::Idle);
        if let Err(e) = slot.context_mut().reset() {
            logwise::error_sync!(
                "could not reset recording context for slot {slot}: {err}",
                slot = next,
                err = logwise::privacy::LogIt(&e)
            );
            return Err(e);
        }
        slot.set_state(SlotState::Recording);
        self.current = next;
        self.advanced = true;
        self.frames_begun += 1;
        Ok(&mut self.slots[next])
    }

    /**
    The most recently advanced slot.

    Before the first [Self::advance] (and again after [Self::rebuild]) this is slot `N - 1`,
    the one *preceding* the slot the next frame uses.  Use [Self::last_advanced] to tell
    the cases apart.
    */
    pub fn current_slot(&self) -> &FrameSlot<D, S> {
        &self.slots[self.current]
    }
    pub fn current_slot_mut(&mut self) -> &mut FrameSlot<D, S> {
        &mut self.slots[self.current]
    }
    /// Index of [Self::current_slot].
    pub fn current_index(&self) -> usize {
        self.current
    }
    /// Index of the most recently advanced slot, or `None` if nothing was advanced since the ring was built.
    pub fn last_advanced(&self) -> Option<usize> {
        self.advanced.then_some(self.current)
    }

    pub fn slot(&self, index: usize) -> Option<&FrameSlot<D, S>> {
        self.slots.get(index)
    }
    pub fn slots(&self) -> &[FrameSlot<D, S>] {
        &self.slots
    }

    /**
    Submits the current frame and tags its slot with a new ticket.

    The slot's buffers are flushed and its context submitted before the ticket is issued,
    so the ticket covers everything recorded into the slot.
    */
    pub fn end_frame(&mut self) -> Result<Ticket, EndFrameError> {
        let current = self.current;
        let slot = &mut self.slots[current];
        if slot.state() != SlotState::Recording {
            return Err(EndFrameError::Ring(RingError::NotRecording));
        }
        let submitted = slot
            .flush_buffers()
            .and_then(|()| slot.context_mut().submit())
            .and_then(|()| self.fence.issue_ticket());
        let ticket = match submitted {
            Ok(ticket) => ticket,
            Err(e) => {
                logwise::error_sync!(
                    "could not submit slot {slot}: {err}",
                    slot = current,
                    err = logwise::privacy::LogIt(&e)
                );
                //nothing further is recorded into a slot after a fatal error
                self.slots[current].set_state(SlotState::Idle);
                return Err(EndFrameError::Device(e));
            }
        };
        let slot = &mut self.slots[current];
        slot.set_completion(ticket);
        slot.set_state(SlotState::Submitted);
        logwise::trace_sync!(
            "{name}: slot {slot} submitted as ticket {ticket}",
            name = logwise::privacy::LogIt(&self.debug_name),
            slot = current,
            ticket = ticket.get()
        );
        Ok(ticket)
    }

    /// Resumes once the GPU has finished everything submitted through this ring's fence.
    pub async fn wait_idle(&mut self) -> Result<(), DeviceError> {
        let last = self.fence.last_issued();
        self.fence.wait_until(last).await
    }

    /// Frames handed out by [Self::advance] so far.
    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }

    pub fn fence(&self) -> &FenceClock<D::Timeline> {
        &self.fence
    }

    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /**
    Replaces every slot with slots allocated for `layout`, keeping the fence.

    The caller must have waited for the ring to go idle; the old slots' memory is
    released here.  If allocation fails the ring is left unchanged.
    */
    pub fn rebuild(&mut self, device: &D, layout: SceneLayout) -> Result<(), DeviceError> {
        debug_assert!(
            self.fence.is_complete(self.fence.last_issued()),
            "rebuilding a ring the GPU may still be reading"
        );
        let slots = (0..layout.slot_count())
            .map(|index| FrameSlot::new(device, &layout, index, &self.debug_name))
            .collect::<Result<Vec<_>, _>>()?;
        logwise::info_sync!(
            "rebuilt {name} for {objects} objects, {materials} materials, {passes} passes, {stream} stream elements",
            name = logwise::privacy::LogIt(&self.debug_name),
            objects = layout.capacities().objects,
            materials = layout.capacities().materials,
            passes = layout.capacities().passes,
            stream = layout.stream_len()
        );
        self.current = layout.slot_count() - 1;
        self.advanced = false;
        self.slots = slots;
        self.layout = layout;
        Ok(())
    }

    /// Tears down the ring, keeping its fence for a replacement ring.
    pub fn into_fence(self) -> FenceClock<D::Timeline> {
        self.fence
    }
}

/// Why [FrameSlotRing::end_frame] failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EndFrameError {
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::StandardSchema;
    use crate::imp::software::{CompletionMode, SoftwareDevice};
    use crate::imp::{Device, Timeline};
    use crate::layout::Capacities;

    fn ring(device: &SoftwareDevice, n: usize) -> FrameSlotRing<SoftwareDevice, StandardSchema> {
        let layout = SceneLayout::new::<StandardSchema>(
            n,
            Capacities {
                objects: 2,
                materials: 1,
                passes: 1,
            },
            device.min_uniform_alignment(),
        )
        .unwrap();
        let fence = FenceClock::new(device.timeline(), None);
        FrameSlotRing::new(device, layout, fence, "test ring").unwrap()
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn visits_slots_round_robin() {
        let device = SoftwareDevice::new(CompletionMode::Immediate);
        let mut ring = ring(&device, 3);
        let mut visited = Vec::new();
        for _ in 0..7 {
            let index = test_executors::spin_on(ring.advance()).unwrap().index();
            visited.push(index);
            ring.end_frame().unwrap();
        }
        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.frames_begun(), 7);
        assert_eq!(ring.fence().waits(), 0);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn no_slot_is_current_before_the_first_advance() {
        let device = SoftwareDevice::new(CompletionMode::Immediate);
        let mut ring = ring(&device, 3);
        assert_eq!(ring.last_advanced(), None);
        assert_eq!(ring.current_index(), 2);
        let first = test_executors::spin_on(ring.advance()).unwrap().index();
        assert_eq!(first, 0);
        assert_eq!(ring.last_advanced(), Some(0));
        ring.end_frame().unwrap();
        assert_eq!(ring.last_advanced(), Some(0));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn state_machine() {
        let device = SoftwareDevice::new(CompletionMode::Manual);
        let mut ring = ring(&device, 2);
        assert!(ring.slots().iter().all(|s| s.state() == SlotState::Idle));
        assert_eq!(ring.end_frame(), Err(EndFrameError::Ring(RingError::NotRecording)));

        test_executors::spin_on(ring.advance()).unwrap();
        assert_eq!(ring.current_slot().state(), SlotState::Recording);
        let ticket = ring.end_frame().unwrap();
        assert_eq!(ring.current_slot().state(), SlotState::Submitted);
        assert_eq!(ring.current_slot().completion(), ticket);
        //a second end_frame without advancing is a state error
        assert_eq!(ring.end_frame(), Err(EndFrameError::Ring(RingError::NotRecording)));
        assert_eq!(ring.current_slot().context().submitted().len(), 1);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn abandoned_frame_returns_to_idle() {
        let device = SoftwareDevice::new(CompletionMode::Immediate);
        let mut ring = ring(&device, 2);
        test_executors::spin_on(ring.advance()).unwrap();
        //never ended
        test_executors::spin_on(ring.advance()).unwrap();
        assert_eq!(ring.slot(0).unwrap().state(), SlotState::Idle);
        assert_eq!(ring.slot(0).unwrap().completion(), Ticket::NONE);
        assert!(ring.slot(0).unwrap().context().submitted().is_empty());
        assert_eq!(ring.current_index(), 1);
    }

    #[test]
    fn wait_idle_reaches_last_ticket() {
        let device = SoftwareDevice::new(CompletionMode::Latency(Duration::from_millis(5)));
        let mut ring = ring(&device, 3);
        for _ in 0..3 {
            test_executors::spin_on(ring.advance()).unwrap();
            ring.end_frame().unwrap();
        }
        test_executors::sleep_on(ring.wait_idle()).unwrap();
        assert_eq!(device.timeline().completed(), ring.fence().last_issued());
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn replacement_ring_keeps_ticket_order() {
        let device = SoftwareDevice::new(CompletionMode::Immediate);
        let mut first = ring(&device, 2);
        test_executors::spin_on(first.advance()).unwrap();
        let before = first.end_frame().unwrap();
        let layout = first
            .layout()
            .with_capacities(Capacities {
                objects: 8,
                materials: 1,
                passes: 1,
            })
            .unwrap();
        let mut second = FrameSlotRing::<_, StandardSchema>::new(&device, layout, first.into_fence(), "second").unwrap();
        test_executors::spin_on(second.advance()).unwrap();
        assert!(second.end_frame().unwrap() > before);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn rebuild_restarts_at_slot_zero() {
        let device = SoftwareDevice::new(CompletionMode::Immediate);
        let mut ring = ring(&device, 3);
        test_executors::spin_on(ring.advance()).unwrap();
        ring.end_frame().unwrap();
        let layout = ring
            .layout()
            .with_capacities(Capacities {
                objects: 5,
                materials: 1,
                passes: 1,
            })
            .unwrap();
        ring.rebuild(&device, layout).unwrap();
        assert_eq!(ring.last_advanced(), None);
        assert_eq!(ring.slots()[0].objects().capacity(), 5);
        assert!(ring.slots().iter().all(|s| s.completion() == Ticket::NONE));
        let next = test_executors::spin_on(ring.advance()).unwrap().index();
        assert_eq!(next, 0);
    }
}
