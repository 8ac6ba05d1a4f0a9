// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-size rows of the container header and region directory.
//!
//! All fields use little-endian byte order. Every row is `#[repr(C)]`
//! without implicit padding and derives `bytemuck::Pod`, so rows can be read
//! straight out of a mapped file.

use bytemuck::{Pod, Zeroable};

use crate::read::ContainerError;

/// Maximum length of a region tag in bytes.
pub const TAG_LEN: usize = 32;

/// Alignment of every region start, in bytes.
pub const REGION_ALIGN: usize = 8;

/// Container file header (64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ContainerHeader {
    /// Magic bytes: `b"RMC\x00\x01\x00\x00\x00"` (version 1).
    pub magic: [u8; 8],
    /// Number of regions in the directory.
    pub region_count_le: u64,
    /// Offset of the region directory.
    pub dir_off_le: u64,
    /// Reserved for future header fields (must be zero).
    pub reserved0: [u8; 32],
    /// Reserved tail (must be zero).
    pub reserved1: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<ContainerHeader>() == 64);

impl ContainerHeader {
    /// Magic bytes for container format version 1.
    pub const MAGIC_V1: [u8; 8] = *b"RMC\x00\x01\x00\x00\x00";

    /// Returns the region count (converting from little-endian).
    #[must_use]
    pub fn region_count(&self) -> u64 {
        u64::from_le(self.region_count_le)
    }

    /// Returns the directory offset (converting from little-endian).
    #[must_use]
    pub fn dir_off(&self) -> u64 {
        u64::from_le(self.dir_off_le)
    }

    /// True when every reserved byte is zero.
    #[must_use]
    pub fn reserved_is_zero(&self) -> bool {
        self.reserved0.iter().chain(&self.reserved1).all(|&b| b == 0)
    }
}

/// Region directory entry (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RegionEntry {
    /// Region name, ASCII, zero padded.
    pub tag: [u8; TAG_LEN],
    /// Byte offset of the region (little-endian u64).
    pub off_le: u64,
    /// Byte length of the region (little-endian u64).
    pub len_le: u64,
}

const _: () = assert!(std::mem::size_of::<RegionEntry>() == 48);

impl RegionEntry {
    /// Returns the region offset (converting from little-endian).
    #[must_use]
    pub fn off(&self) -> u64 {
        u64::from_le(self.off_le)
    }

    /// Returns the region length in bytes (converting from little-endian).
    #[must_use]
    pub fn len(&self) -> u64 {
        u64::from_le(self.len_le)
    }

    /// Returns true if the region holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated region name.
///
/// Tags are non-empty printable ASCII of at most [`TAG_LEN`] bytes and are
/// stored zero padded in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionTag([u8; TAG_LEN]);

impl RegionTag {
    /// Builds a tag from its textual name.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidTag`] if `name` is empty, longer than
    /// [`TAG_LEN`] bytes, or contains anything but printable ASCII.
    pub fn new(name: &str) -> Result<Self, ContainerError> {
        let bytes = name.as_bytes();
        let printable = bytes.iter().all(u8::is_ascii_graphic);
        if bytes.is_empty() || bytes.len() > TAG_LEN || !printable {
            return Err(ContainerError::InvalidTag {
                tag: name.to_owned(),
            });
        }
        let mut raw = [0u8; TAG_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// Rebuilds a tag from its zero-padded directory form.
    pub(crate) fn from_raw(raw: [u8; TAG_LEN]) -> Result<Self, ContainerError> {
        let tag = Self(raw);
        // Round-trip through the textual form so padding rules are enforced.
        let name = std::str::from_utf8(tag.trimmed()).map_err(|_| ContainerError::InvalidTag {
            tag: String::from_utf8_lossy(&raw).into_owned(),
        })?;
        let reparsed = Self::new(name)?;
        if reparsed != tag {
            return Err(ContainerError::InvalidTag {
                tag: String::from_utf8_lossy(&raw).into_owned(),
            });
        }
        Ok(tag)
    }

    /// Returns the zero-padded directory form.
    #[must_use]
    pub fn raw(&self) -> [u8; TAG_LEN] {
        self.0
    }

    /// Returns the tag name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructors only admit ASCII.
        std::str::from_utf8(self.trimmed()).unwrap_or_default()
    }

    fn trimmed(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(TAG_LEN);
        &self.0[..end]
    }
}

impl std::fmt::Display for RegionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
