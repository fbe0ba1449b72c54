// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Dirty propagation.

With `N` frame slots there are `N` physical copies of every record.  A single logical
update has to reach all of them, but only one slot is writable per frame.  So instead of
a dirty *bit* each record carries a *countdown* seeded to `N`: every frame that writes
the record decrements it, and the record stops being written once every copy has been
refreshed.

Because slots are visited strictly round-robin, a record mutated at frame `T` is
written into the slots visited at `T, T+1, ..., T+N-1`, which is each slot exactly
once.
*/

/// Counts the frame slots that still hold a stale copy of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyCountdown {
    remaining: usize,
    depth: usize,
}

impl DirtyCountdown {
    /// A countdown for a ring of `depth` slots.  New records start fully dirty.
    pub fn new(depth: usize) -> Self {
        DirtyCountdown {
            remaining: depth,
            depth,
        }
    }

    /// The payload changed; every slot needs it again.
    pub fn mark_dirty(&mut self) {
        self.remaining = self.depth;
    }

    pub fn should_write(&self) -> bool {
        self.remaining > 0
    }

    /// One more slot now holds the current payload.
    pub fn after_write(&mut self) {
        debug_assert!(self.remaining > 0, "after_write on a clean record");
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}
