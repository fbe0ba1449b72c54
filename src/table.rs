// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The descriptor table.

A flat array with one constant-buffer view per record copy: every object record in
every slot, then every material record, then the pass block.  Entry positions come from
[SceneLayout::resolve](crate::layout::SceneLayout::resolve), so draws can bind by table
offset as well as by address.

The table is built once per ring and stays valid until the ring is rebuilt.
*/

use crate::frame_slot::FrameSlot;
use crate::imp::Device;
use crate::layout::{RecordKind, RecordSchema};
use crate::record_buffer::IndexOutOfRange;
use crate::ring::FrameSlotRing;

/// One constant-buffer view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableEntry {
    pub kind: RecordKind,
    pub slot: usize,
    pub ordinal: usize,
    /// Device address of the record copy.
    pub address: u64,
    /// Bytes covered by the view (the kind's stride).
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorTable {
    entries: Vec<TableEntry>,
}

impl DescriptorTable {
    /// Creates a view for every `(kind, slot, ordinal)` of `ring`.
    pub fn build<D: Device, S: RecordSchema>(ring: &FrameSlotRing<D, S>) -> Result<Self, IndexOutOfRange> {
        let layout = ring.layout();
        let mut entries = Vec::with_capacity(layout.table_len());
        //kind, then slot, then ordinal is table-offset order
        for kind in RecordKind::ALL {
            for slot in ring.slots() {
                for ordinal in 0..layout.capacity(kind) {
                    let resolved = layout.resolve(kind, ordinal, slot.index())?;
                    debug_assert_eq!(resolved.table_offset, entries.len());
                    entries.push(entry_for(slot, kind, ordinal, layout.stride(kind))?);
                }
            }
        }
        debug_assert_eq!(entries.len(), layout.table_len());
        Ok(DescriptorTable { entries })
    }

    pub fn entry(&self, table_offset: usize) -> Option<&TableEntry> {
        self.entries.get(table_offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }
}

fn entry_for<D: Device, S: RecordSchema>(
    slot: &FrameSlot<D, S>,
    kind: RecordKind,
    ordinal: usize,
    size: usize,
) -> Result<TableEntry, IndexOutOfRange> {
    Ok(TableEntry {
        kind,
        slot: slot.index(),
        ordinal,
        address: slot.address_of(kind, ordinal)?,
        size,
    })
}
