// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Index configuration: region tags and how containers are opened.

use std::path::Path;

use routemap_container::{ContainerError, OpenMode, RegionFile};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default tag of the segment table region.
pub const SEGMENTS_TAG: &str = "feature-segment-table";

/// Default tag of the offset table region.
pub const OFFSETS_TAG: &str = "segment-to-node-index";

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Settings shared by [`SegmentIndex`](crate::SegmentIndex) and
/// [`SegmentIndexBuilder`](crate::SegmentIndexBuilder).
///
/// Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// How [`open_container`](Self::open_container) brings a file into memory.
    pub open_mode: OpenMode,
    /// Region holding the flattened segment table.
    pub segments_tag: String,
    /// Region holding the sparse offset table.
    pub offsets_tag: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            open_mode: OpenMode::default(),
            segments_tag: SEGMENTS_TAG.to_owned(),
            offsets_tag: OFFSETS_TAG.to_owned(),
        }
    }
}

impl IndexConfig {
    /// Parses a config from JSON bytes. Empty input yields the defaults.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Loads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    /// Serializes the config as pretty JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Opens a container file using [`open_mode`](Self::open_mode).
    pub fn open_container(&self, path: impl AsRef<Path>) -> Result<RegionFile, ContainerError> {
        RegionFile::open_with(path, self.open_mode)
    }
}
