// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Scene layout and the slot/table index resolver.

A [SceneLayout] is an immutable value describing how many frame slots exist and how many
records of each kind every slot holds.  Changing either means building a new layout (and
a new ring); nothing here is mutated in place.

All offset arithmetic lives in [SceneLayout::resolve].  For a record kind with capacity
`C` and a ring of `N` slots,

```text
flat_index        = slot * C + ordinal
slot_byte_offset  = ordinal * stride          (inside that slot's own buffer)
arena_byte_offset = flat_index * stride       (if all N copies shared one allocation)
table_offset      = table_base(kind) + flat_index
```

Descriptor tables are laid out kind by kind: every object entry for every slot, then
every material entry, then the pass block.

Besides records, a layout may give every slot a packed stream of `stream_len` elements
(dynamic vertex data, say).  Streams have no descriptor-table entries.

```
# use frames_and_records::layout::{Capacities, RecordKind, RecordSchema, SceneLayout};
# use frames_and_records::constants::{ObjectConstants, MaterialConstants, PassConstants};
struct Scene;
impl RecordSchema for Scene {
    type Object = ObjectConstants;
    type Material = MaterialConstants;
    type Pass = PassConstants;
    type Stream = f32;
}
let capacities = Capacities { objects: 4, materials: 2, passes: 2 };
let layout = SceneLayout::new::<Scene>(3, capacities, 256).unwrap();
let resolved = layout.resolve(RecordKind::Pass, 1, 2).unwrap();
assert_eq!(resolved.flat_index, 2 * 2 + 1);
assert_eq!(resolved.table_offset, 3 * (4 + 2) + 5);
```
*/

use crate::bittricks::align_up;
use crate::record_buffer::{CRepr, IndexOutOfRange};

/// The kinds of record a frame slot carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// Per-object constants (world transform etc).
    Object,
    /// Per-material parameters.
    Material,
    /// Per-pass globals.  A mirrored pass is simply a second pass record.
    Pass,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Object, RecordKind::Material, RecordKind::Pass];

    pub(crate) const fn index(self) -> usize {
        match self {
            RecordKind::Object => 0,
            RecordKind::Material => 1,
            RecordKind::Pass => 2,
        }
    }
}

/// How a record kind's stride is derived from its size.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StrideAlignment {
    /// Rounded up to the device's minimum constant-buffer offset alignment.
    #[default]
    ConstantBuffer,
    /// No padding between records, e.g. dynamic vertex data.
    Packed,
}

/**
Names the payload type of each record kind, and the element type of the per-slot stream.
*/
pub trait RecordSchema: 'static {
    type Object: CRepr;
    type Material: CRepr;
    type Pass: CRepr;
    /// Element of the per-slot stream.  Streams are always packed.
    type Stream: CRepr;

    fn alignment(_kind: RecordKind) -> StrideAlignment {
        StrideAlignment::ConstantBuffer
    }
}

/// Record count per kind, per slot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capacities {
    pub objects: usize,
    pub materials: usize,
    pub passes: usize,
}

impl Capacities {
    pub const fn get(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Object => self.objects,
            RecordKind::Material => self.materials,
            RecordKind::Pass => self.passes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("a ring needs at least one frame slot")]
    ZeroSlots,
    #[error("{0:?} records have zero size")]
    ZeroSizedRecord(RecordKind),
    #[error("alignment {0} is not a power of two")]
    BadAlignment(usize),
    #[error("{0:?} buffers overflow the address space")]
    TooLarge(RecordKind),
    #[error("the per-slot stream overflows the address space")]
    StreamTooLarge,
    #[error("stream elements have zero size")]
    ZeroSizedStream,
}

/// Where one record copy lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Resolved {
    pub kind: RecordKind,
    pub ordinal: usize,
    pub slot: usize,
    pub flat_index: usize,
    pub slot_byte_offset: usize,
    pub arena_byte_offset: usize,
    pub table_offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SceneLayout {
    slot_count: usize,
    capacities: Capacities,
    record_sizes: [usize; 3],
    strides: [usize; 3],
    stream_len: usize,
    stream_stride: usize,
}

impl SceneLayout {
    /**
    Builds a layout for schema `S`.

    `uniform_alignment` is the device's minimum constant-buffer offset alignment.
    */
    pub fn new<S: RecordSchema>(
        slot_count: usize,
        capacities: Capacities,
        uniform_alignment: usize,
    ) -> Result<Self, LayoutError> {
        if slot_count == 0 {
            return Err(LayoutError::ZeroSlots);
        }
        if !uniform_alignment.is_power_of_two() {
            return Err(LayoutError::BadAlignment(uniform_alignment));
        }
        let record_sizes = [
            std::mem::size_of::<S::Object>(),
            std::mem::size_of::<S::Material>(),
            std::mem::size_of::<S::Pass>(),
        ];
        let mut strides = [0; 3];
        for kind in RecordKind::ALL {
            let size = record_sizes[kind.index()];
            if size == 0 {
                return Err(LayoutError::ZeroSizedRecord(kind));
            }
            strides[kind.index()] = match S::alignment(kind) {
                StrideAlignment::ConstantBuffer => align_up(size, uniform_alignment),
                StrideAlignment::Packed => size,
            };
        }
        let layout = SceneLayout {
            slot_count,
            capacities,
            record_sizes,
            strides,
            stream_len: 0,
            stream_stride: std::mem::size_of::<S::Stream>(),
        };
        layout.check_sizes()?;
        Ok(layout)
    }

    /// The same slot count, strides and stream with new capacities.
    pub fn with_capacities(&self, capacities: Capacities) -> Result<Self, LayoutError> {
        let layout = SceneLayout {
            capacities,
            ..self.clone()
        };
        layout.check_sizes()?;
        Ok(layout)
    }

    /// The same layout with a per-slot stream of `stream_len` elements.
    pub fn with_stream_len(&self, stream_len: usize) -> Result<Self, LayoutError> {
        if stream_len > 0 && self.stream_stride == 0 {
            return Err(LayoutError::ZeroSizedStream);
        }
        let layout = SceneLayout {
            stream_len,
            ..self.clone()
        };
        layout.check_sizes()?;
        Ok(layout)
    }

    /*
    Every offset this layout hands out is below one of these products, so once they fit
    the unchecked arithmetic elsewhere cannot overflow.
    */
    fn check_sizes(&self) -> Result<(), LayoutError> {
        let mut table_len: usize = 0;
        for kind in RecordKind::ALL {
            let copies = self
                .capacity(kind)
                .checked_mul(self.slot_count)
                .ok_or(LayoutError::TooLarge(kind))?;
            copies
                .checked_mul(self.stride(kind))
                .ok_or(LayoutError::TooLarge(kind))?;
            table_len = table_len.checked_add(copies).ok_or(LayoutError::TooLarge(kind))?;
        }
        self.stream_len
            .checked_mul(self.stream_stride)
            .and_then(|bytes| bytes.checked_mul(self.slot_count))
            .ok_or(LayoutError::StreamTooLarge)?;
        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
    pub fn capacities(&self) -> Capacities {
        self.capacities
    }
    pub fn capacity(&self, kind: RecordKind) -> usize {
        self.capacities.get(kind)
    }
    pub fn stride(&self, kind: RecordKind) -> usize {
        self.strides[kind.index()]
    }
    pub fn record_size(&self, kind: RecordKind) -> usize {
        self.record_sizes[kind.index()]
    }
    /// Bytes of one slot's buffer for `kind`.
    pub fn buffer_len(&self, kind: RecordKind) -> usize {
        self.capacity(kind) * self.stride(kind)
    }

    /// Elements in each slot's stream.  Zero when the layout has no stream.
    pub fn stream_len(&self) -> usize {
        self.stream_len
    }
    /// Bytes per stream element; streams are packed.
    pub fn stream_stride(&self) -> usize {
        self.stream_stride
    }
    pub fn stream_byte_len(&self) -> usize {
        self.stream_len * self.stream_stride
    }

    /// First descriptor-table entry of `kind`.
    pub fn table_base(&self, kind: RecordKind) -> usize {
        let n = self.slot_count;
        match kind {
            RecordKind::Object => 0,
            RecordKind::Material => n * self.capacities.objects,
            RecordKind::Pass => n * (self.capacities.objects + self.capacities.materials),
        }
    }

    /// Total descriptor-table entries across all kinds and slots.
    pub fn table_len(&self) -> usize {
        self.table_base(RecordKind::Pass) + self.slot_count * self.capacities.passes
    }

    /**
    Resolves record `ordinal` of `kind` in frame slot `slot`.

    Pure: the same inputs on the same layout always produce the same output, so a
    descriptor table built once from this stays valid for the life of the layout.
    */
    pub fn resolve(&self, kind: RecordKind, ordinal: usize, slot: usize) -> Result<Resolved, IndexOutOfRange> {
        let capacity = self.capacity(kind);
        if ordinal >= capacity {
            return Err(IndexOutOfRange::ordinal(kind, ordinal, capacity));
        }
        if slot >= self.slot_count {
            return Err(IndexOutOfRange::slot(kind, slot, self.slot_count));
        }
        let stride = self.stride(kind);
        let flat_index = slot * capacity + ordinal;
        Ok(Resolved {
            kind,
            ordinal,
            slot,
            flat_index,
            slot_byte_offset: ordinal * stride,
            arena_byte_offset: flat_index * stride,
            table_offset: self.table_base(kind) + flat_index,
        })
    }
}
