// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Logical records.

A [RecordTable] holds the CPU-side truth for one record kind: the latest payload of every
live record plus its [DirtyCountdown].  Records are identified by a [RecordHandle] issued
at registration.  The handle's ordinal is the record's index in every frame slot's buffer
and never changes while the record is alive.

Removing a record frees its ordinal for reuse.  Every removal bumps the ordinal's
generation, so handles to the removed record are rejected instead of silently aliasing
whatever is registered there next.  A reused ordinal starts dirty, which rewrites every
slot's copy before any slot can draw it.
*/

use crate::dirty::DirtyCountdown;
use crate::imp::RecordMemory;
use crate::layout::RecordKind;
use crate::record_buffer::{CRepr, DynamicRecordBuffer, IndexOutOfRange};

/// Stable identity of one logical record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordHandle {
    kind: RecordKind,
    ordinal: usize,
    generation: u32,
}

impl RecordHandle {
    pub fn kind(&self) -> RecordKind {
        self.kind
    }
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("cannot register another {kind:?} record: capacity {capacity} is allocated")]
    CapacityExceeded { kind: RecordKind, capacity: usize },
    #[error("handle {0:?} refers to a removed record")]
    StaleHandle(RecordHandle),
    #[error("handle {handle:?} used with the {table:?} table")]
    WrongKind { handle: RecordHandle, table: RecordKind },
}

#[derive(Debug)]
enum Entry<T> {
    Live {
        payload: T,
        countdown: DirtyCountdown,
        generation: u32,
    },
    Vacant {
        generation: u32,
    },
}

#[derive(Debug)]
pub struct RecordTable<T> {
    kind: RecordKind,
    capacity: usize,
    depth: usize,
    entries: Vec<Entry<T>>,
    free: Vec<usize>,
    live: usize,
    //generation for ordinals pushed fresh; stays ahead of every truncated ordinal
    fresh_generation: u32,
}

impl<T: CRepr> RecordTable<T> {
    /// A table of at most `capacity` records, propagated through `depth` frame slots.
    pub fn new(kind: RecordKind, capacity: usize, depth: usize) -> Self {
        RecordTable {
            kind,
            capacity,
            depth,
            entries: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
            fresh_generation: 0,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.live
    }
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Registers a record.  It is dirty in every slot until each has been written once.
    pub fn register(&mut self, payload: T) -> Result<RecordHandle, RecordError> {
        let (ordinal, generation) = if let Some(ordinal) = self.free.pop() {
            let generation = match self.entries[ordinal] {
                Entry::Vacant { generation } => generation,
                Entry::Live { .. } => unreachable!("free list holds a live ordinal"),
            };
            (ordinal, generation)
        } else if self.entries.len() < self.capacity {
            let generation = self.fresh_generation;
            self.entries.push(Entry::Vacant { generation });
            (self.entries.len() - 1, generation)
        } else {
            return Err(RecordError::CapacityExceeded {
                kind: self.kind,
                capacity: self.capacity,
            });
        };
        self.entries[ordinal] = Entry::Live {
            payload,
            countdown: DirtyCountdown::new(self.depth),
            generation,
        };
        self.live += 1;
        Ok(RecordHandle {
            kind: self.kind,
            ordinal,
            generation,
        })
    }

    fn live_mut(&mut self, handle: RecordHandle) -> Result<(&mut T, &mut DirtyCountdown), RecordError> {
        if handle.kind != self.kind {
            return Err(RecordError::WrongKind {
                handle,
                table: self.kind,
            });
        }
        match self.entries.get_mut(handle.ordinal) {
            Some(Entry::Live {
                payload,
                countdown,
                generation,
            }) if *generation == handle.generation => Ok((payload, countdown)),
            _ => Err(RecordError::StaleHandle(handle)),
        }
    }

    fn live(&self, handle: RecordHandle) -> Result<(&T, &DirtyCountdown), RecordError> {
        if handle.kind != self.kind {
            return Err(RecordError::WrongKind {
                handle,
                table: self.kind,
            });
        }
        match self.entries.get(handle.ordinal) {
            Some(Entry::Live {
                payload,
                countdown,
                generation,
            }) if *generation == handle.generation => Ok((payload, countdown)),
            _ => Err(RecordError::StaleHandle(handle)),
        }
    }

    /// Replaces the payload and marks it dirty in every slot.
    pub fn mutate(&mut self, handle: RecordHandle, payload: T) -> Result<(), RecordError> {
        let (current, countdown) = self.live_mut(handle)?;
        *current = payload;
        countdown.mark_dirty();
        Ok(())
    }

    /// Edits the payload in place and marks it dirty in every slot.
    pub fn update<F: FnOnce(&mut T)>(&mut self, handle: RecordHandle, f: F) -> Result<(), RecordError> {
        let (current, countdown) = self.live_mut(handle)?;
        f(current);
        countdown.mark_dirty();
        Ok(())
    }

    pub fn get(&self, handle: RecordHandle) -> Result<&T, RecordError> {
        self.live(handle).map(|(payload, _)| payload)
    }

    /// Slots still waiting for the current payload.
    pub fn countdown(&self, handle: RecordHandle) -> Result<usize, RecordError> {
        self.live(handle).map(|(_, countdown)| countdown.remaining())
    }

    /// Removes a record, returning its last payload.  The ordinal may be reissued.
    pub fn remove(&mut self, handle: RecordHandle) -> Result<T, RecordError> {
        let (payload, _) = self.live(handle)?;
        let payload = *payload;
        self.entries[handle.ordinal] = Entry::Vacant {
            generation: handle.generation.wrapping_add(1),
        };
        self.free.push(handle.ordinal);
        self.live -= 1;
        Ok(payload)
    }

    /// Live records as `(handle, payload)`, in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordHandle, &T)> + '_ {
        let kind = self.kind;
        self.entries.iter().enumerate().filter_map(move |(ordinal, entry)| match entry {
            Entry::Live {
                payload, generation, ..
            } => Some((
                RecordHandle {
                    kind,
                    ordinal,
                    generation: *generation,
                },
                payload,
            )),
            Entry::Vacant { .. } => None,
        })
    }

    /// Live records still owed to at least one slot.
    pub fn dirty_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Live { countdown, .. } if countdown.should_write()))
            .count()
    }

    pub fn mark_all_dirty(&mut self) {
        for entry in &mut self.entries {
            if let Entry::Live { countdown, .. } = entry {
                countdown.mark_dirty();
            }
        }
    }

    /**
    Writes every dirty record into `buffer` (the current slot's copy) and counts the
    write against the record's countdown.

    Returns how many records were written.
    */
    pub fn upload_into<M: RecordMemory>(
        &mut self,
        buffer: &mut DynamicRecordBuffer<T, M>,
    ) -> Result<usize, IndexOutOfRange> {
        let mut written = 0;
        for (ordinal, entry) in self.entries.iter_mut().enumerate() {
            if let Entry::Live {
                payload, countdown, ..
            } = entry
            {
                if countdown.should_write() {
                    buffer.write(ordinal, payload)?;
                    countdown.after_write();
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    /// Smallest capacity that still holds every live ordinal.
    pub fn required_capacity(&self) -> usize {
        self.entries
            .iter()
            .rposition(|e| matches!(e, Entry::Live { .. }))
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /**
    Changes the capacity for a rebuilt layout.

    Shrinking is allowed only past the highest live ordinal.
    */
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), RecordError> {
        if capacity < self.required_capacity() {
            return Err(RecordError::CapacityExceeded {
                kind: self.kind,
                capacity,
            });
        }
        if capacity < self.entries.len() {
            for entry in self.entries.drain(capacity..) {
                if let Entry::Vacant { generation } = entry {
                    self.fresh_generation = self.fresh_generation.max(generation);
                }
            }
            self.free.retain(|ordinal| *ordinal < capacity);
        }
        self.capacity = capacity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(capacity: usize) -> RecordTable<[f32; 4]> {
        RecordTable::new(RecordKind::Object, capacity, 3)
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn ordinals_are_sequential_and_start_dirty() {
        let mut t = table(4);
        let a = t.register([1.0; 4]).unwrap();
        let b = t.register([2.0; 4]).unwrap();
        assert_eq!(a.ordinal(), 0);
        assert_eq!(b.ordinal(), 1);
        assert_eq!(t.countdown(a).unwrap(), 3);
        assert_eq!(t.dirty_count(), 2);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn capacity_is_not_silently_truncated() {
        let mut t = table(1);
        t.register([0.0; 4]).unwrap();
        assert_eq!(
            t.register([0.0; 4]),
            Err(RecordError::CapacityExceeded {
                kind: RecordKind::Object,
                capacity: 1
            })
        );
        assert_eq!(t.len(), 1);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn removed_handles_go_stale() {
        let mut t = table(2);
        let a = t.register([1.0; 4]).unwrap();
        assert_eq!(t.remove(a).unwrap(), [1.0; 4]);
        assert_eq!(t.get(a), Err(RecordError::StaleHandle(a)));
        assert_eq!(t.mutate(a, [3.0; 4]), Err(RecordError::StaleHandle(a)));
        let b = t.register([2.0; 4]).unwrap();
        //ordinal reused under a new generation
        assert_eq!(b.ordinal(), a.ordinal());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(t.countdown(b).unwrap(), 3);
        assert_eq!(*t.get(b).unwrap(), [2.0; 4]);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn rejects_foreign_handles() {
        let mut objects = table(1);
        let mut passes: RecordTable<[f32; 4]> = RecordTable::new(RecordKind::Pass, 1, 3);
        let p = passes.register([0.0; 4]).unwrap();
        assert!(matches!(objects.mutate(p, [1.0; 4]), Err(RecordError::WrongKind { .. })));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn shrinking_respects_live_records() {
        let mut t = table(4);
        let a = t.register([0.0; 4]).unwrap();
        let b = t.register([0.0; 4]).unwrap();
        assert!(t.set_capacity(1).is_err());
        t.remove(b).unwrap();
        t.set_capacity(1).unwrap();
        assert_eq!(t.capacity(), 1);
        assert!(t.get(a).is_ok());
        assert!(t.register([0.0; 4]).is_err());
        t.set_capacity(8).unwrap();
        let c = t.register([0.0; 4]).unwrap();
        assert_eq!(c.ordinal(), 1);
        assert_ne!(c, b);
        assert_eq!(t.get(b), Err(RecordError::StaleHandle(b)));
    }
}
