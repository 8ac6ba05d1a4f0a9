// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Container reading primitives and error types.
//!
//! For region access see the [`view`](super::view) module.

use std::io;

use thiserror::Error;

use super::types::ContainerHeader;

/// Errors that can occur when reading, validating or writing containers.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File is too small to contain a valid header.
    #[error("file too small: {size} bytes, minimum {minimum}")]
    FileTooSmall {
        /// Actual file size.
        size: usize,
        /// Minimum required size.
        minimum: usize,
    },

    /// Magic bytes don't match expected value.
    #[error("invalid magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: [u8; 8],
        /// Actual magic bytes found.
        actual: [u8; 8],
    },

    /// Section offset or length would extend past end of file.
    #[error(
        "section {name} out of bounds: offset {offset}, length {length}, file size {file_size}"
    )]
    SectionOutOfBounds {
        /// Section name for diagnostics.
        name: String,
        /// Section offset.
        offset: u64,
        /// Section length in bytes.
        length: u64,
        /// Total file size.
        file_size: usize,
    },

    /// Region start is not aligned.
    #[error("region {name} at offset {offset} is not {alignment}-byte aligned")]
    AlignmentViolation {
        /// Region name.
        name: String,
        /// Region offset.
        offset: u64,
        /// Required alignment.
        alignment: usize,
    },

    /// Reserved bytes must be zero.
    #[error("non-zero reserved bytes in {field}")]
    NonZeroReservedBytes {
        /// The field containing non-zero reserved bytes.
        field: &'static str,
    },

    /// Region tag is empty, too long or not printable ASCII.
    #[error("invalid region tag {tag:?}")]
    InvalidTag {
        /// The offending tag, lossily decoded.
        tag: String,
    },

    /// Two regions share a tag.
    #[error("duplicate region tag {tag}")]
    DuplicateTag {
        /// The repeated tag.
        tag: String,
    },

    /// No region carries the requested tag.
    #[error("region {tag} not found")]
    MissingRegion {
        /// The requested tag.
        tag: String,
    },

    /// Region bytes cannot be viewed as the requested record type.
    #[error("region {tag} cannot be viewed as {record}: {source}")]
    RecordCast {
        /// Region tag.
        tag: String,
        /// Record type name.
        record: &'static str,
        /// Underlying cast failure (size or alignment).
        source: bytemuck::PodCastError,
    },

    /// Data not properly aligned for the target type.
    #[error("alignment error: {0}")]
    Alignment(#[from] bytemuck::PodCastError),
}

/// Validates that a byte slice starts with a valid container header.
///
/// # Errors
///
/// Returns [`ContainerError::FileTooSmall`] if the data is shorter than the header size.
/// Returns [`ContainerError::InvalidMagic`] if the magic bytes don't match.
/// Returns [`ContainerError::NonZeroReservedBytes`] if reserved header bytes are set.
pub fn validate_header(data: &[u8]) -> Result<&ContainerHeader, ContainerError> {
    let header_size = std::mem::size_of::<ContainerHeader>();

    if data.len() < header_size {
        return Err(ContainerError::FileTooSmall {
            size: data.len(),
            minimum: header_size,
        });
    }

    let header: &ContainerHeader = bytemuck::try_from_bytes(&data[..header_size])?;

    if header.magic != ContainerHeader::MAGIC_V1 {
        return Err(ContainerError::InvalidMagic {
            expected: ContainerHeader::MAGIC_V1,
            actual: header.magic,
        });
    }

    if !header.reserved_is_zero() {
        return Err(ContainerError::NonZeroReservedBytes { field: "header" });
    }

    Ok(header)
}

/// Reads a slice of `Pod` structs from a byte buffer.
///
/// # Errors
///
/// Returns [`ContainerError::SectionOutOfBounds`] if the slice would extend past the buffer.
/// Returns [`ContainerError::Alignment`] if the data is not properly aligned for type `T`.
pub fn read_slice<'a, T: bytemuck::Pod>(
    data: &'a [u8],
    offset: u64,
    count: u64,
    name: &str,
) -> Result<&'a [T], ContainerError> {
    let elem_size = std::mem::size_of::<T>();
    let byte_len = count.saturating_mul(elem_size as u64);
    let bytes = read_bytes(data, offset, byte_len, name)?;
    Ok(bytemuck::try_cast_slice(bytes)?)
}

/// Reads a byte slice from a buffer.
///
/// # Errors
///
/// Returns [`ContainerError::SectionOutOfBounds`] if the slice would extend past the buffer.
#[allow(clippy::cast_possible_truncation)] // We bounds-check against data.len() first
pub fn read_bytes<'a>(
    data: &'a [u8],
    offset: u64,
    length: u64,
    name: &str,
) -> Result<&'a [u8], ContainerError> {
    let end = offset.saturating_add(length);

    if end > data.len() as u64 {
        return Err(ContainerError::SectionOutOfBounds {
            name: name.to_owned(),
            offset,
            length,
            file_size: data.len(),
        });
    }

    Ok(&data[offset as usize..end as usize])
}
