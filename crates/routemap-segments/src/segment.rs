// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Directed point ranges on geometry features.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

/// Errors raised when constructing a [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Start and end point coincide; a segment spans at least one edge.
    #[error("segment on feature {feature_id} is empty: start and end are both {point}")]
    EmptyRange {
        /// Feature the segment was meant for.
        feature_id: u32,
        /// The shared point index.
        point: u32,
    },

    /// A point index does not fit the 16-bit record field.
    #[error("point index {point} on feature {feature_id} does not fit in 16 bits")]
    PointOutOfRange {
        /// Feature the segment was meant for.
        feature_id: u32,
        /// The offending point index.
        point: u32,
    },
}

/// Fixed-size segment record (8 bytes).
///
/// A directed sub-range of one feature's point sequence. `point_end >
/// point_start` means the segment runs along the feature's point order; the
/// reverse means it runs against it. The record layout is the persisted
/// layout, so mapped segment tables are read without conversion.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Segment {
    feature_id_le: u32,
    point_start_le: u16,
    point_end_le: u16,
}

const _: () = assert!(std::mem::size_of::<Segment>() == 8);

impl Segment {
    /// Marker stored for routing nodes that carry no geometry.
    pub const NO_GEOMETRY: Self = Self {
        feature_id_le: u32::MAX.to_le(),
        point_start_le: 0u16.to_le(),
        point_end_le: 1u16.to_le(),
    };

    /// Creates a segment, rejecting empty ranges and point indices that do
    /// not fit in 16 bits.
    pub fn new(feature_id: u32, point_start: u32, point_end: u32) -> Result<Self, SegmentError> {
        if point_start == point_end {
            return Err(SegmentError::EmptyRange {
                feature_id,
                point: point_start,
            });
        }
        let narrow = |point: u32| {
            u16::try_from(point).map_err(|_| SegmentError::PointOutOfRange { feature_id, point })
        };
        Ok(Self::from_parts(
            feature_id,
            narrow(point_start)?,
            narrow(point_end)?,
        ))
    }

    fn from_parts(feature_id: u32, point_start: u16, point_end: u16) -> Self {
        Self {
            feature_id_le: feature_id.to_le(),
            point_start_le: point_start.to_le(),
            point_end_le: point_end.to_le(),
        }
    }

    /// Feature identifier.
    #[must_use]
    pub fn feature_id(&self) -> u32 {
        u32::from_le(self.feature_id_le)
    }

    /// First point index, in traversal order.
    #[must_use]
    pub fn point_start(&self) -> u16 {
        u16::from_le(self.point_start_le)
    }

    /// Last point index, in traversal order.
    #[must_use]
    pub fn point_end(&self) -> u16 {
        u16::from_le(self.point_end_le)
    }

    /// True when the segment runs along the feature's point order.
    #[must_use]
    pub fn is_forward(&self) -> bool {
        self.point_end() > self.point_start()
    }

    /// True for the [`NO_GEOMETRY`](Self::NO_GEOMETRY) marker.
    #[must_use]
    pub fn is_no_geometry(&self) -> bool {
        *self == Self::NO_GEOMETRY
    }

    /// Point range with direction dropped, as `(low, high)`.
    #[must_use]
    pub fn bounds(&self) -> (u16, u16) {
        let (s, e) = (self.point_start(), self.point_end());
        (s.min(e), s.max(e))
    }

    /// Extends `self` to cover `other`.
    ///
    /// Succeeds only for the same feature, the same direction, and point
    /// ranges that overlap or touch. On success `self` becomes the union of
    /// both ranges, keeping its direction. On failure `self` is unchanged.
    pub fn merge(&mut self, other: &Segment) -> bool {
        if other.feature_id() != self.feature_id() {
            return false;
        }

        let forward = other.is_forward();
        if forward != self.is_forward() {
            return false;
        }

        let (s1, e1) = self.bounds();
        let (s2, e2) = other.bounds();
        if !ranges_intersect(s1, e1, s2, e2) {
            return false;
        }

        let (low, high) = (s1.min(s2), e1.max(e2));
        *self = if forward {
            Self::from_parts(self.feature_id(), low, high)
        } else {
            Self::from_parts(self.feature_id(), high, low)
        };
        true
    }

    /// True for the same feature with overlapping or touching point ranges.
    ///
    /// Direction is ignored here, unlike [`merge`](Self::merge).
    #[must_use]
    pub fn is_intersect(&self, other: &Segment) -> bool {
        if other.feature_id() != self.feature_id() {
            return false;
        }
        let (s1, e1) = self.bounds();
        let (s2, e2) = other.bounds();
        ranges_intersect(s1, e1, s2, e2)
    }
}

/// Closed interval intersection; shared endpoints count.
fn ranges_intersect(s1: u16, e1: u16, s2: u16, e2: u16) -> bool {
    !(e1 < s2 || e2 < s1)
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ fID = {}; pStart = {}; pEnd = {} }}",
            self.feature_id(),
            self.point_start(),
            self.point_end()
        )
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("feature_id", &u32::from_le(self.feature_id_le))
            .field("point_start", &u16::from_le(self.point_start_le))
            .field("point_end", &u16::from_le(self.point_end_le))
            .finish()
    }
}
