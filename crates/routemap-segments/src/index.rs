// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read side of the node ↔ segment index.

use std::fmt;

use routemap_container::{ContainerError, RegionSource, TypedRegion};
use thiserror::Error;
use tracing::debug;

use crate::config::IndexConfig;
use crate::offsets::{OffsetTable, OrderDefect, SegOffset, SegRange};
use crate::segment::Segment;
use crate::NodeId;

/// Errors raised by [`SegmentIndex::load`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// A region is missing or malformed.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// The offset table breaks its ordering invariants.
    #[error("offset table is out of order: {0:?}")]
    UnsortedOffsets(OrderDefect),

    /// The offset table addresses slots the segment table does not have.
    #[error("offset table reaches slot {last_slot} but only {segment_count} segments are stored")]
    OffsetsPastSegments {
        /// Last slot owned by the final offset entry.
        last_slot: u64,
        /// Number of stored segments.
        segment_count: usize,
    },
}

/// Traversal direction of a stored segment relative to its feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Along the feature's point order.
    Forward,
    /// Against the feature's point order.
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        })
    }
}

/// Errors raised by [`SegmentIndex::nodes_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The query must run along its feature (`point_start < point_end`).
    #[error("reverse lookup needs a forward query segment, got {query}")]
    QueryNotForward {
        /// The rejected query.
        query: Segment,
    },

    /// Two stored segments of the same direction both contain the query.
    #[error("segment {query} has more than one {direction} owner: nodes {first} and {second}")]
    AmbiguousOwner {
        /// The query segment.
        query: Segment,
        /// Direction that matched twice.
        direction: Direction,
        /// Owner found first (lower slot).
        first: NodeId,
        /// Owner found second.
        second: NodeId,
    },
}

/// Routing nodes whose geometry contains a queried segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeOwners {
    /// Owner traversing the feature forward.
    pub forward: Option<NodeId>,
    /// Owner traversing the feature in reverse.
    pub reverse: Option<NodeId>,
}

impl NodeOwners {
    fn slot_mut(&mut self, direction: Direction) -> &mut Option<NodeId> {
        match direction {
            Direction::Forward => &mut self.forward,
            Direction::Reverse => &mut self.reverse,
        }
    }

    fn is_complete(&self) -> bool {
        self.forward.is_some() && self.reverse.is_some()
    }
}

/// Memory-mapped node ↔ segment index.
///
/// Holds the offset table in memory and a scoped view of the segment table.
/// All lookups take `&self`; a loaded index is immutable and may be shared
/// across threads without locking.
///
/// # Lookup cost
///
/// - [`segments_range`](Self::segments_range), [`segments_for`](Self::segments_for)
///   and [`node_id`](Self::node_id): `O(log offsets)`
/// - [`nodes_for`](Self::nodes_for): `O(segments)`; there is no reverse
///   spatial index, so callers doing many reverse lookups should cache
#[derive(Debug, Default)]
pub struct SegmentIndex {
    offsets: OffsetTable,
    segments: Option<TypedRegion<Segment>>,
}

impl SegmentIndex {
    /// Creates an unloaded index. Every lookup on it sees zero segments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index loaded from `source` under the default region tags.
    pub fn open<S: RegionSource>(source: &S) -> Result<Self, LoadError> {
        let mut index = Self::new();
        index.load(source)?;
        Ok(index)
    }

    /// Loads the index from `source` under the default region tags.
    ///
    /// See [`load_with`](Self::load_with).
    pub fn load<S: RegionSource>(&mut self, source: &S) -> Result<(), LoadError> {
        self.load_with(source, &IndexConfig::default())
    }

    /// Loads the index from `source`, replacing anything loaded before.
    ///
    /// The offset table is copied out of its region; the segment table stays
    /// mapped. On failure the index is left cleared.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Container`] if either region is missing or its
    /// length is not a whole number of records, and the ordering errors if
    /// the offset table is inconsistent with itself or the segment table.
    pub fn load_with<S: RegionSource>(
        &mut self,
        source: &S,
        config: &IndexConfig,
    ) -> Result<(), LoadError> {
        self.clear();

        let offsets_region = source.map(&config.offsets_tag)?.typed::<SegOffset>()?;
        let entries = offsets_region.as_slice().to_vec();
        offsets_region.unmap();
        let offsets = OffsetTable::new(entries).map_err(LoadError::UnsortedOffsets)?;

        let segments = source.map(&config.segments_tag)?.typed::<Segment>()?;
        if let Some(last) = offsets.entries().last() {
            if last.last_slot() >= segments.len() as u64 {
                return Err(LoadError::OffsetsPastSegments {
                    last_slot: last.last_slot(),
                    segment_count: segments.len(),
                });
            }
        }

        debug!(
            segments = segments.len(),
            offsets = offsets.len(),
            segments_tag = %config.segments_tag,
            offsets_tag = %config.offsets_tag,
            "segment index loaded"
        );
        self.offsets = offsets;
        self.segments = Some(segments);
        Ok(())
    }

    /// Drops the offset table and releases the segment table mapping.
    pub fn clear(&mut self) {
        self.offsets = OffsetTable::default();
        if let Some(segments) = self.segments.take() {
            debug!(segments = segments.len(), "segment index cleared");
            segments.unmap();
        }
    }

    /// True once a load has succeeded and no clear has happened since.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.segments.is_some()
    }

    /// The whole segment table.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        self.segments
            .as_ref()
            .map(TypedRegion::as_slice)
            .unwrap_or_default()
    }

    /// Number of stored segments, markers included.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments().len()
    }

    /// The in-memory offset table.
    #[must_use]
    pub fn offset_table(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Slot range of `node_id` in the segment table.
    #[must_use]
    pub fn segments_range(&self, node_id: NodeId) -> SegRange {
        self.offsets.segments_range(node_id)
    }

    /// Node owning segment-table slot `slot`.
    #[must_use]
    pub fn node_id(&self, slot: usize) -> NodeId {
        self.offsets.node_id(slot)
    }

    /// Segments of `node_id`.
    ///
    /// Empty for nodes stored without geometry and for ids past the end of
    /// the table.
    #[must_use]
    pub fn segments_for(&self, node_id: NodeId) -> &[Segment] {
        let range = self.segments_range(node_id);
        match self.segments().get(range.as_range()) {
            Some([first, ..]) if first.is_no_geometry() => &[],
            Some(segments) => segments,
            None => &[],
        }
    }

    /// Finds the routing nodes whose stored segments contain `query`.
    ///
    /// Scans the segment table once in slot order, considering only
    /// segments on the query's feature. A stored segment owns the query when
    /// the query's point range lies inside its own. At most one forward and
    /// one reverse owner are reported; the scan stops as soon as both are
    /// found.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::QueryNotForward`] unless `query` runs forward,
    /// and [`LookupError::AmbiguousOwner`] if a second owner of an already
    /// found direction turns up before the scan stops.
    pub fn nodes_for(&self, query: &Segment) -> Result<NodeOwners, LookupError> {
        if !query.is_forward() {
            return Err(LookupError::QueryNotForward { query: *query });
        }

        let (q_start, q_end) = (query.point_start(), query.point_end());
        let mut owners = NodeOwners::default();

        for (slot, stored) in self.segments().iter().enumerate() {
            if stored.feature_id() != query.feature_id() || stored.is_no_geometry() {
                continue;
            }

            let (s_start, s_end) = (stored.point_start(), stored.point_end());
            let direction = if s_start <= s_end {
                if q_start < s_start || q_end > s_end {
                    continue;
                }
                Direction::Forward
            } else {
                if q_start < s_end || q_end > s_start {
                    continue;
                }
                Direction::Reverse
            };

            let node = self.node_id(slot);
            let found = owners.slot_mut(direction);
            if let Some(first) = *found {
                return Err(LookupError::AmbiguousOwner {
                    query: *query,
                    direction,
                    first,
                    second: node,
                });
            }
            *found = Some(node);

            if owners.is_complete() {
                break;
            }
        }

        Ok(owners)
    }

    /// Emits a `debug` event for every stored segment on `feature_id`.
    ///
    /// Returns the number of segments reported.
    pub fn dump_segments_by_feature(&self, feature_id: u32) -> usize {
        let mut count = 0;
        for (slot, segment) in self.segments().iter().enumerate() {
            if segment.feature_id() == feature_id {
                debug!(slot, %segment, "segment on feature {feature_id}");
                count += 1;
            }
        }
        count
    }

    /// Emits a `debug` event for every segment of `node_id`.
    ///
    /// Returns the number of segments reported.
    pub fn dump_segments_by_node(&self, node_id: NodeId) -> usize {
        let segments = self.segments_for(node_id);
        for segment in segments {
            debug!(node_id, %segment, "segment of node");
        }
        segments.len()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use routemap_container::{RegionFile, RegionFileWriter};

    use super::*;
    use crate::builder::SegmentIndexBuilder;

    fn seg(fid: u32, s: u32, e: u32) -> Segment {
        Segment::new(fid, s, e).unwrap()
    }

    fn index_of(nodes: &[Vec<Segment>]) -> SegmentIndex {
        let mut builder = SegmentIndexBuilder::new();
        for (node, segments) in (0u32..).zip(nodes) {
            builder.append(node, segments).unwrap();
        }
        let mut writer = RegionFileWriter::new();
        builder.save(&mut writer).unwrap();
        let file = RegionFile::from_bytes(&writer.finish()).unwrap();
        SegmentIndex::open(&file).unwrap()
    }

    #[test]
    fn unloaded_index_is_empty() {
        let index = SegmentIndex::new();
        assert!(!index.is_loaded());
        assert_eq!(index.segment_count(), 0);
        assert!(index.segments_for(0).is_empty());
        assert_eq!(index.nodes_for(&seg(1, 0, 1)).unwrap(), NodeOwners::default());
    }

    #[test]
    fn no_geometry_node_reports_no_segments() {
        let index = index_of(&[vec![seg(1, 0, 1)], vec![], vec![seg(1, 1, 2)]]);
        assert_eq!(index.segment_count(), 3);
        assert!(index.segments_for(1).is_empty());
        assert_eq!(index.segments_for(2), &[seg(1, 1, 2)]);
    }

    #[test]
    fn ids_past_the_end_yield_nothing() {
        let index = index_of(&[vec![seg(1, 0, 1)]]);
        assert!(index.segments_for(5).is_empty());
    }

    #[test]
    fn nodes_for_finds_both_directions() {
        let index = index_of(&[
            vec![seg(7, 0, 4)],
            vec![seg(7, 4, 0)],
            vec![seg(8, 0, 4)],
        ]);
        let owners = index.nodes_for(&seg(7, 1, 3)).unwrap();
        assert_eq!(owners.forward, Some(0));
        assert_eq!(owners.reverse, Some(1));
    }

    #[test]
    fn nodes_for_requires_containment_not_intersection() {
        let index = index_of(&[vec![seg(7, 0, 4)], vec![seg(7, 6, 4)]]);
        let owners = index.nodes_for(&seg(7, 3, 5)).unwrap();
        assert_eq!(owners, NodeOwners::default());
        let owners = index.nodes_for(&seg(7, 4, 6)).unwrap();
        assert_eq!(owners.forward, None);
        assert_eq!(owners.reverse, Some(1));
    }

    #[test]
    fn nodes_for_resolves_multi_segment_owner() {
        let index = index_of(&[
            vec![seg(2, 0, 1)],
            vec![seg(3, 0, 2), seg(3, 2, 5), seg(3, 5, 9)],
            vec![seg(3, 9, 0)],
        ]);
        let owners = index.nodes_for(&seg(3, 6, 8)).unwrap();
        assert_eq!(owners.forward, Some(1));
        assert_eq!(owners.reverse, Some(2));
    }

    #[test]
    fn nodes_for_rejects_reverse_query() {
        let index = index_of(&[vec![seg(7, 0, 4)]]);
        let err = index.nodes_for(&seg(7, 3, 1)).unwrap_err();
        assert!(matches!(err, LookupError::QueryNotForward { .. }));
    }

    #[test]
    fn nodes_for_reports_ambiguous_owner() {
        let index = index_of(&[vec![seg(7, 0, 4)], vec![seg(7, 1, 3)]]);
        let err = index.nodes_for(&seg(7, 1, 2)).unwrap_err();
        assert_eq!(
            err,
            LookupError::AmbiguousOwner {
                query: seg(7, 1, 2),
                direction: Direction::Forward,
                first: 0,
                second: 1,
            }
        );
    }

    #[test]
    fn nodes_for_stops_once_both_directions_found() {
        // The duplicate forward owner at node 2 lies past the point where the
        // scan has both owners, so it is never seen.
        let index = index_of(&[vec![seg(7, 0, 4)], vec![seg(7, 4, 0)], vec![seg(7, 0, 4)]]);
        let owners = index.nodes_for(&seg(7, 1, 2)).unwrap();
        assert_eq!(owners.forward, Some(0));
        assert_eq!(owners.reverse, Some(1));
    }

    #[test]
    fn nodes_for_skips_no_geometry_markers() {
        let index = index_of(&[vec![], vec![]]);
        let owners = index.nodes_for(&Segment::NO_GEOMETRY).unwrap();
        assert_eq!(owners, NodeOwners::default());
    }

    #[test]
    fn clear_releases_everything() {
        let mut index = index_of(&[vec![seg(1, 0, 1), seg(1, 1, 2)]]);
        assert!(index.is_loaded());
        assert_eq!(index.offset_table().len(), 1);
        index.clear();
        assert!(!index.is_loaded());
        assert!(index.offset_table().is_empty());
        assert!(index.segments_for(0).is_empty());
    }

    #[test]
    fn missing_region_leaves_index_unloaded() {
        let mut index = index_of(&[vec![seg(1, 0, 1)]]);
        let empty = RegionFile::from_bytes(&RegionFileWriter::new().finish()).unwrap();
        let err = index.load(&empty).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Container(ContainerError::MissingRegion { .. })
        ));
        assert!(!index.is_loaded());
    }

    #[test]
    fn dumps_count_reported_segments() {
        let index = index_of(&[
            vec![seg(4, 0, 1), seg(4, 1, 2)],
            vec![seg(5, 0, 1)],
            vec![],
        ]);
        assert_eq!(index.dump_segments_by_feature(4), 2);
        assert_eq!(index.dump_segments_by_feature(9), 0);
        assert_eq!(index.dump_segments_by_node(0), 2);
        assert_eq!(index.dump_segments_by_node(2), 0);
    }

    #[test]
    fn loaded_index_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SegmentIndex>();
    }
}
