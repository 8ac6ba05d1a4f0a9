// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sparse offset table mapping routing nodes to segment-table ranges.
//!
//! # Encoding
//!
//! Nodes are numbered `0..n` and appended to the segment table in id order.
//! A node with one segment contributes one slot and nothing else; so does a
//! node with no segments, whose slot holds the
//! [`NO_GEOMETRY`](crate::Segment::NO_GEOMETRY) marker. A node with `k > 1`
//! segments gets an entry `(node_id, cumulative)`, where `cumulative` is the
//! running total of extra slots (`k - 1`) over that node and every earlier
//! entry.
//!
//! With `prev` the cumulative value of the last entry before node `n`, node
//! `n` starts at slot `prev + n`; an entry for `n` itself extends its range to
//! slot `cumulative + n` inclusive.
//!
//! # Invariants
//!
//! Entries are strictly ascending by `node_id`. Because every entry adds at
//! least one extra slot, `node_id + cumulative` (the last slot of the entry's
//! node) is strictly ascending too. The two lookups below each binary-search
//! on one of these orders.

use bytemuck::{Pod, Zeroable};

use crate::NodeId;

/// Offset table record (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SegOffset {
    node_id_le: u32,
    cumulative_le: u32,
}

const _: () = assert!(std::mem::size_of::<SegOffset>() == 8);

impl SegOffset {
    /// Creates a record.
    #[must_use]
    pub fn new(node_id: NodeId, cumulative: u32) -> Self {
        Self {
            node_id_le: node_id.to_le(),
            cumulative_le: cumulative.to_le(),
        }
    }

    /// Routing node with a segment count other than one.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        u32::from_le(self.node_id_le)
    }

    /// Extra slots contributed by this node and all earlier entries.
    #[must_use]
    pub fn cumulative(&self) -> u32 {
        u32::from_le(self.cumulative_le)
    }

    /// Index of the last segment-table slot owned by this node.
    #[must_use]
    pub fn last_slot(&self) -> u64 {
        u64::from(self.node_id()) + u64::from(self.cumulative())
    }
}

/// Contiguous range of segment-table slots owned by one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegRange {
    /// First slot.
    pub start: usize,
    /// Number of slots; at least one.
    pub len: usize,
}

impl SegRange {
    /// One past the last slot.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// True if `slot` lies inside the range.
    #[must_use]
    pub fn contains(&self, slot: usize) -> bool {
        (self.start..self.end()).contains(&slot)
    }

    /// As a standard range, for slicing.
    #[must_use]
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.end()
    }
}

/// Ordering defect found by [`OffsetTable::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDefect {
    /// `node_id` fails to ascend at this entry.
    NodeId(usize),
    /// `cumulative` fails to ascend at this entry.
    Cumulative(usize),
}

/// Orders entries by node id alone.
///
/// Relies on entries being strictly ascending by `node_id`.
fn precedes_node(entry: &SegOffset, node_id: NodeId) -> bool {
    entry.node_id() < node_id
}

/// Orders entries by the last slot their node owns.
///
/// Relies on `node_id + cumulative` being strictly ascending, which follows
/// from ascending node ids and each entry adding at least one extra slot.
fn precedes_slot(entry: &SegOffset, slot: u64) -> bool {
    entry.last_slot() < slot
}

/// Decodes the slot range of `node_id`.
///
/// Runs in `O(log entries)`. Ids outside the node domain yield a range past
/// the end of the segment table, never a failure. `table` must satisfy
/// [`OffsetTable::validate`].
#[allow(clippy::cast_possible_truncation)] // Slot indices address an in-memory table
pub(crate) fn segments_range(table: &[SegOffset], node_id: NodeId) -> SegRange {
    let index = table.partition_point(|entry| precedes_node(entry, node_id));
    let node = u64::from(node_id);
    let start = match index {
        0 => node,
        _ => u64::from(table[index - 1].cumulative()) + node,
    };

    match table.get(index) {
        Some(entry) if entry.node_id() == node_id => SegRange {
            start: start as usize,
            len: (entry.last_slot() - start + 1) as usize,
        },
        _ => SegRange {
            start: start as usize,
            len: 1,
        },
    }
}

/// Decodes the node owning segment-table slot `slot`.
///
/// Runs in `O(log entries)`. Slots past the end of the table yield an id
/// past the end of the node domain. `table` must satisfy
/// [`OffsetTable::validate`].
#[allow(clippy::cast_possible_truncation)] // Bounded by the node id domain for in-range slots
pub(crate) fn node_id(table: &[SegOffset], slot: usize) -> NodeId {
    let slot = slot as u64;
    let index = table.partition_point(|entry| precedes_slot(entry, slot));
    let prev = match index {
        0 => 0,
        _ => u64::from(table[index - 1].cumulative()),
    };

    if let Some(entry) = table.get(index) {
        let first_slot = prev + u64::from(entry.node_id());
        if (first_slot..=entry.last_slot()).contains(&slot) {
            return entry.node_id();
        }
    }

    (slot - prev) as NodeId
}

/// Owned, validated offset table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    entries: Vec<SegOffset>,
}

impl OffsetTable {
    /// Wraps `entries` after checking both orderings.
    ///
    /// # Errors
    ///
    /// Returns the first [`OrderDefect`] found.
    pub fn new(entries: Vec<SegOffset>) -> Result<Self, OrderDefect> {
        Self::validate(&entries)?;
        Ok(Self { entries })
    }

    /// Checks that `entries` are strictly ascending by node id and by
    /// cumulative offset.
    ///
    /// # Errors
    ///
    /// Returns the index of the first entry breaking either order.
    pub fn validate(entries: &[SegOffset]) -> Result<(), OrderDefect> {
        for (i, pair) in entries.windows(2).enumerate() {
            if pair[0].node_id() >= pair[1].node_id() {
                return Err(OrderDefect::NodeId(i + 1));
            }
            if pair[0].cumulative() >= pair[1].cumulative() {
                return Err(OrderDefect::Cumulative(i + 1));
            }
        }
        if entries.first().is_some_and(|e| e.cumulative() == 0) {
            return Err(OrderDefect::Cumulative(0));
        }
        Ok(())
    }

    /// The records.
    #[must_use]
    pub fn entries(&self) -> &[SegOffset] {
        &self.entries
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no node has more than one segment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total extra slots over the one-per-node baseline.
    #[must_use]
    pub fn total_extra(&self) -> u32 {
        self.entries.last().map_or(0, SegOffset::cumulative)
    }

    /// See [`segments_range`].
    #[must_use]
    pub fn segments_range(&self, node_id: NodeId) -> SegRange {
        segments_range(&self.entries, node_id)
    }

    /// See [`node_id`](fn@node_id).
    #[must_use]
    pub fn node_id(&self, slot: usize) -> NodeId {
        node_id(&self.entries, slot)
    }
}
