// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container writer.
//!
//! Regions are accumulated in memory, each behind its own byte sink, and laid
//! out in the order they were opened when the container is finished.

use std::io;
use std::path::Path;

use bytemuck::Pod;
use tracing::debug;

use super::read::ContainerError;
use super::types::{ContainerHeader, RegionEntry, RegionTag, REGION_ALIGN};
use super::RegionTarget;

/// In-memory container under construction.
#[derive(Debug, Default)]
pub struct RegionFileWriter {
    regions: Vec<(RegionTag, Vec<u8>)>,
}

impl RegionFileWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of regions opened so far.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Returns the bytes written to `tag` so far, if the region exists.
    pub fn region_bytes(&self, tag: &str) -> Option<&[u8]> {
        self.regions
            .iter()
            .find(|(t, _)| t.as_str() == tag)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Serializes the header, directory and regions into one buffer.
    ///
    /// The output is deterministic: the same regions written in the same
    /// order always produce identical bytes.
    pub fn finish(self) -> Vec<u8> {
        let header_size = std::mem::size_of::<ContainerHeader>();
        let dir_size = self.regions.len() * std::mem::size_of::<RegionEntry>();
        let dir_off = header_size;

        let mut entries = Vec::with_capacity(self.regions.len());
        let mut offset = align(dir_off + dir_size);
        for (tag, bytes) in &self.regions {
            entries.push(RegionEntry {
                tag: tag.raw(),
                off_le: (offset as u64).to_le(),
                len_le: (bytes.len() as u64).to_le(),
            });
            offset = align(offset + bytes.len());
        }
        let total_size = offset;

        let mut buf = Vec::with_capacity(total_size);

        let header = ContainerHeader {
            magic: ContainerHeader::MAGIC_V1,
            region_count_le: (self.regions.len() as u64).to_le(),
            dir_off_le: (dir_off as u64).to_le(),
            reserved0: [0u8; 32],
            reserved1: [0u8; 8],
        };
        write_struct(&mut buf, &header);

        for entry in &entries {
            write_struct(&mut buf, entry);
        }
        write_padding(&mut buf, REGION_ALIGN);

        for (_, bytes) in &self.regions {
            buf.extend_from_slice(bytes);
            write_padding(&mut buf, REGION_ALIGN);
        }

        debug_assert_eq!(buf.len(), total_size, "container size mismatch");
        debug!(
            regions = self.regions.len(),
            bytes = buf.len(),
            "container serialized"
        );

        buf
    }

    /// Serializes the container and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub fn write_to_path(self, path: impl AsRef<Path>) -> io::Result<()> {
        let bytes = self.finish();
        std::fs::write(path, bytes)
    }
}

impl RegionTarget for RegionFileWriter {
    fn writer_for_tag(&mut self, tag: &str) -> Result<&mut dyn io::Write, ContainerError> {
        let tag = RegionTag::new(tag)?;
        if self.regions.iter().any(|(t, _)| *t == tag) {
            return Err(ContainerError::DuplicateTag {
                tag: tag.to_string(),
            });
        }
        self.regions.push((tag, Vec::new()));
        let index = self.regions.len() - 1;
        Ok(&mut self.regions[index].1)
    }
}

/// Aligns a value up to the next region boundary.
#[inline]
const fn align(n: usize) -> usize {
    n.next_multiple_of(REGION_ALIGN)
}

/// Writes padding zeros until the buffer is aligned to the given boundary.
fn write_padding(buf: &mut Vec<u8>, align: usize) {
    let target = buf.len().next_multiple_of(align);
    buf.resize(target, 0);
}

/// Writes a `Pod` struct as raw bytes.
fn write_struct<T: Pod>(buf: &mut Vec<u8>, value: &T) {
    buf.extend_from_slice(bytemuck::bytes_of(value));
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::TAG_LEN;

    #[test]
    fn empty_container_is_header_only() {
        let bytes = RegionFileWriter::new().finish();
        assert_eq!(bytes.len(), std::mem::size_of::<ContainerHeader>());
        assert_eq!(&bytes[0..8], ContainerHeader::MAGIC_V1);
    }

    #[test]
    fn regions_are_padded_to_alignment() {
        let mut writer = RegionFileWriter::new();
        writer.writer_for_tag("odd").unwrap().write_all(&[9; 5]).unwrap();
        let bytes = writer.finish();
        assert_eq!(bytes.len() % REGION_ALIGN, 0);
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let mut writer = RegionFileWriter::new();
        writer.writer_for_tag("a").unwrap();
        let err = writer.writer_for_tag("a").err();
        assert!(matches!(err, Some(ContainerError::DuplicateTag { .. })));
        assert_eq!(writer.region_count(), 1);
    }

    #[test]
    fn malformed_tag_is_rejected() {
        let mut writer = RegionFileWriter::new();
        let long = "t".repeat(TAG_LEN + 1);
        for tag in ["", "two words", long.as_str()] {
            let err = writer.writer_for_tag(tag).err();
            assert!(matches!(err, Some(ContainerError::InvalidTag { .. })), "{tag:?}");
        }
        assert_eq!(writer.region_count(), 0);
    }

    #[test]
    fn output_is_deterministic() {
        let build = || {
            let mut writer = RegionFileWriter::new();
            writer.writer_for_tag("x").unwrap().write_all(b"abc").unwrap();
            writer.writer_for_tag("y").unwrap().write_all(b"defgh").unwrap();
            writer.finish()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn align_works() {
        assert_eq!(align(0), 0);
        assert_eq!(align(1), 8);
        assert_eq!(align(8), 8);
        assert_eq!(align(9), 16);
    }
}
