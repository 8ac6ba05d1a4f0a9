// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container directory validation.
//!
//! Runs once when a [`RegionFile`](super::view::RegionFile) is opened so that
//! region lookups afterwards never re-check bounds against the file.

use std::collections::HashSet;

use super::read::{read_bytes, read_slice, validate_header, ContainerError};
use super::types::{RegionEntry, RegionTag, REGION_ALIGN};

/// A directory entry that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidRegion {
    /// Region tag.
    pub tag: RegionTag,
    /// Byte offset within the file.
    pub off: usize,
    /// Byte length.
    pub len: usize,
}

/// Validates the header and the full region directory of `data`.
///
/// Checks, in order:
/// - header size, magic and reserved bytes
/// - directory bounds and alignment
/// - per region: tag well-formedness, start alignment, bounds
/// - tag uniqueness across the directory
///
/// # Errors
///
/// Returns the first violation found.
#[allow(clippy::cast_possible_truncation)] // Offsets are bounds-checked against data.len()
pub fn validate_directory(data: &[u8]) -> Result<Vec<ValidRegion>, ContainerError> {
    let header = validate_header(data)?;
    let entries = read_slice::<RegionEntry>(
        data,
        header.dir_off(),
        header.region_count(),
        "region_directory",
    )?;

    let mut seen = HashSet::with_capacity(entries.len());
    let mut regions = Vec::with_capacity(entries.len());

    for entry in entries {
        let tag = RegionTag::from_raw(entry.tag)?;
        let off = entry.off();

        if off % REGION_ALIGN as u64 != 0 {
            return Err(ContainerError::AlignmentViolation {
                name: tag.to_string(),
                offset: off,
                alignment: REGION_ALIGN,
            });
        }

        let bytes = read_bytes(data, off, entry.len(), tag.as_str())?;

        if !seen.insert(tag) {
            return Err(ContainerError::DuplicateTag {
                tag: tag.to_string(),
            });
        }

        regions.push(ValidRegion {
            tag,
            off: off as usize,
            len: bytes.len(),
        });
    }

    Ok(regions)
}
