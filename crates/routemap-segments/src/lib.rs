// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bidirectional index between routing-graph nodes and map-feature segments.
//!
//! Every routing node covers zero or more [`Segment`]s: point ranges along a
//! source map feature, stored with their traversal direction. The index
//! answers both questions:
//!
//! - node → segments: [`SegmentIndex::segments_for`]
//! - segment → nodes: [`SegmentIndex::nodes_for`], reporting at most one
//!   forward and one reverse owner
//!
//! # Storage
//!
//! Two container regions hold the index:
//!
//! - the segment table, every node's segments flattened in node order, with
//!   one [`Segment::NO_GEOMETRY`] marker per node that has none
//! - a sparse offset table ([`OffsetTable`]) with one entry per node that
//!   owns more than one segment
//!
//! Nodes with exactly one segment cost no offset entry, so the table stays
//! small on real graphs where most nodes map to a single segment.
//!
//! # Usage
//!
//! ```rust
//! use routemap_container::{RegionFile, RegionFileWriter};
//! use routemap_segments::{Segment, SegmentIndex, SegmentIndexBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = SegmentIndexBuilder::new();
//! builder.append(0, &[Segment::new(7, 0, 3)?])?;
//! builder.append(1, &[Segment::new(7, 3, 0)?, Segment::new(8, 0, 2)?])?;
//!
//! let mut writer = RegionFileWriter::new();
//! builder.save(&mut writer)?;
//! let file = RegionFile::from_bytes(&writer.finish())?;
//!
//! let index = SegmentIndex::open(&file)?;
//! assert_eq!(index.segments_for(1).len(), 2);
//! let owners = index.nodes_for(&Segment::new(7, 1, 2)?)?;
//! assert_eq!((owners.forward, owners.reverse), (Some(0), Some(1)));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod index;
pub mod offsets;
pub mod segment;

/// Dense routing-graph node identifier.
pub type NodeId = u32;

pub use builder::{BuildError, SegmentIndexBuilder};
pub use config::{ConfigError, IndexConfig, OFFSETS_TAG, SEGMENTS_TAG};
pub use index::{Direction, LoadError, LookupError, NodeOwners, SegmentIndex};
pub use offsets::{OffsetTable, OrderDefect, SegOffset, SegRange};
pub use segment::{Segment, SegmentError};
