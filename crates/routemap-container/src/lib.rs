// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named-region container files for routemap data.
//!
//! A container is a flat file holding any number of byte regions, each named
//! by a short ASCII tag. Index structures elsewhere in routemap persist
//! themselves as one or more regions of fixed-size records and read them back
//! through zero-copy, memory-mapped views.
//!
//! # Layout
//!
//! - A fixed 64-byte header ([`ContainerHeader`])
//! - A region directory of 48-byte entries ([`RegionEntry`])
//! - The regions, each starting on an 8-byte boundary, in the order they
//!   were written
//!
//! # Ports
//!
//! Consumers depend on two narrow traits rather than on the file type:
//! [`RegionSource`] to map a region for reading and [`RegionTarget`] to open
//! a byte sink for writing one. [`RegionFile`] and [`RegionFileWriter`] are
//! the file-backed implementations.
//!
//! # Usage
//!
//! ```rust,no_run
//! use routemap_container::{RegionFile, RegionFileWriter, RegionSource, RegionTarget};
//!
//! # fn main() -> Result<(), routemap_container::ContainerError> {
//! let mut writer = RegionFileWriter::new();
//! writer.writer_for_tag("ids")?.write_all(&7u32.to_le_bytes())?;
//! writer.write_to_path("map.rmc")?;
//!
//! let file = RegionFile::open("map.rmc")?;
//! let ids = file.map("ids")?.typed::<u32>()?;
//! assert_eq!(ids.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod read;
pub mod types;
pub mod validate;
pub mod view;
pub mod write;

pub use read::ContainerError;
pub use types::{ContainerHeader, RegionEntry, RegionTag, REGION_ALIGN, TAG_LEN};
pub use view::{OpenMode, RegionFile, RegionHandle, TypedRegion};
pub use write::RegionFileWriter;

/// Read side of a container: maps named regions.
pub trait RegionSource {
    /// Maps the region named `tag`.
    ///
    /// The returned handle is a scoped view; the bytes stay valid for as long
    /// as the handle lives.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::MissingRegion`] if no region carries `tag`.
    fn map(&self, tag: &str) -> Result<RegionHandle, ContainerError>;
}

/// Write side of a container: opens a byte sink per named region.
pub trait RegionTarget {
    /// Opens a new region named `tag` and returns its byte sink.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidTag`] for malformed tags and
    /// [`ContainerError::DuplicateTag`] if the region was already opened.
    fn writer_for_tag(&mut self, tag: &str) -> Result<&mut dyn std::io::Write, ContainerError>;
}
