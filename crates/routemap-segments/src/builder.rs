// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Single-pass writer for the node → segment index.

use std::io;

use routemap_container::{ContainerError, RegionTarget};
use thiserror::Error;
use tracing::debug;

use crate::config::IndexConfig;
use crate::offsets::SegOffset;
use crate::segment::Segment;
use crate::NodeId;

/// Errors raised while building or saving an index.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The running count of extra slots no longer fits the 32-bit record field.
    #[error("cumulative segment offset {cumulative} at node {node_id} overflows 32 bits")]
    OffsetOverflow {
        /// Node whose segments pushed the total over.
        node_id: NodeId,
        /// The total that did not fit.
        cumulative: u64,
    },

    /// The target container rejected a region.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// Writing region bytes failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Accumulates the segment table and the sparse offset table.
///
/// Nodes must be appended in strictly ascending id order with no gaps, the
/// first being node `0`; this is not re-checked. Segments are stored as
/// given: callers wanting adjacent segments combined should
/// [`merge`](Segment::merge) them before appending.
#[derive(Debug, Default)]
pub struct SegmentIndexBuilder {
    segments: Vec<Segment>,
    offsets: Vec<SegOffset>,
    cumulative: u64,
    nodes: usize,
}

impl SegmentIndexBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the segments of the next routing node.
    ///
    /// An empty list stores the [`NO_GEOMETRY`](Segment::NO_GEOMETRY)
    /// marker. A list of more than one segment also records an offset entry.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OffsetOverflow`] if the running extra-slot total
    /// no longer fits in 32 bits; the builder is left unchanged.
    pub fn append(&mut self, node_id: NodeId, segments: &[Segment]) -> Result<(), BuildError> {
        let mut entry = None;
        if segments.len() > 1 {
            let cumulative = self.cumulative + (segments.len() as u64 - 1);
            let narrow = u32::try_from(cumulative)
                .map_err(|_| BuildError::OffsetOverflow { node_id, cumulative })?;
            entry = Some((cumulative, SegOffset::new(node_id, narrow)));
        }

        if segments.is_empty() {
            self.segments.push(Segment::NO_GEOMETRY);
        } else {
            self.segments.extend_from_slice(segments);
        }
        if let Some((cumulative, offset)) = entry {
            self.cumulative = cumulative;
            self.offsets.push(offset);
        }
        self.nodes += 1;
        Ok(())
    }

    /// The flattened segment table so far.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The offset table so far.
    #[must_use]
    pub fn offsets(&self) -> &[SegOffset] {
        &self.offsets
    }

    /// Number of nodes appended.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    /// Writes the segment table, then the offset table, under the default
    /// region tags.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Container`] if a region cannot be opened and
    /// [`BuildError::Io`] if writing its bytes fails.
    pub fn save<T: RegionTarget>(&self, target: &mut T) -> Result<(), BuildError> {
        self.save_with(target, &IndexConfig::default())
    }

    /// Like [`save`](Self::save), with region tags taken from `config`.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save).
    pub fn save_with<T: RegionTarget>(
        &self,
        target: &mut T,
        config: &IndexConfig,
    ) -> Result<(), BuildError> {
        target
            .writer_for_tag(&config.segments_tag)?
            .write_all(bytemuck::cast_slice(&self.segments))?;
        target
            .writer_for_tag(&config.offsets_tag)?
            .write_all(bytemuck::cast_slice(&self.offsets))?;

        debug!(
            nodes = self.nodes,
            segments = self.segments.len(),
            offsets = self.offsets.len(),
            segments_tag = %config.segments_tag,
            offsets_tag = %config.offsets_tag,
            "segment index saved"
        );
        Ok(())
    }
}
