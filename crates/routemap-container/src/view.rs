// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Zero-copy region views over container files.
//!
//! [`RegionFile`] owns (or maps) the container bytes. [`RegionHandle`] and
//! [`TypedRegion`] are scoped views into one region: they share ownership of
//! the backing bytes, so the mapping stays alive exactly as long as some view
//! or the file itself does.
//!
//! # Example
//!
//! ```ignore
//! let file = RegionFile::open("map.rmc")?;
//! let ids = file.map("ids")?.typed::<u32>()?;
//! for id in ids.as_slice() {
//!     tracing::debug!(id, "stored id");
//! }
//! ```

use std::fmt;
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use bytemuck::Pod;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::read::ContainerError;
use super::types::RegionTag;
use super::validate::{validate_directory, ValidRegion};
use super::RegionSource;

/// How a container file is brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Memory-map the file read-only.
    #[default]
    Mmap,
    /// Read the whole file into an owned, 8-byte aligned buffer.
    Read,
}

/// Bytes backing an open container.
enum Backing {
    Mapped(Mmap),
    /// Words keep the buffer 8-byte aligned; `len` is the byte length.
    Owned { words: Box<[u64]>, len: usize },
}

impl Backing {
    fn copy_aligned(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(8)].into_boxed_slice();
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Self::Owned {
            words,
            len: bytes.len(),
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => &map[..],
            Self::Owned { words, len } => &bytemuck::cast_slice::<u64, u8>(words)[..*len],
        }
    }
}

#[allow(unsafe_code)]
fn map_file(file: &File) -> std::io::Result<Mmap> {
    // SAFETY: the map is read-only and container files are immutable once
    // written; a file truncated underneath an open map is outside the contract.
    unsafe { Mmap::map(file) }
}

/// An open container file.
///
/// Opening validates the header and the whole region directory, so region
/// lookups never touch unchecked offsets.
pub struct RegionFile {
    backing: Arc<Backing>,
    regions: Vec<ValidRegion>,
}

impl RegionFile {
    /// Opens and memory-maps a container file.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] if the file cannot be opened or mapped,
    /// or any validation error from [`validate_directory`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        Self::open_with(path, OpenMode::Mmap)
    }

    /// Opens a container file using the given [`OpenMode`].
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let backing = match mode {
            OpenMode::Mmap => Backing::Mapped(map_file(&File::open(path)?)?),
            OpenMode::Read => Backing::copy_aligned(&std::fs::read(path)?),
        };
        let file = Self::from_backing(backing)?;
        debug!(path = %path.display(), ?mode, regions = file.regions.len(), "container opened");
        Ok(file)
    }

    /// Creates a container from raw bytes (copied into an aligned buffer).
    ///
    /// # Errors
    ///
    /// Returns any validation error from [`validate_directory`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContainerError> {
        Self::from_backing(Backing::copy_aligned(bytes))
    }

    fn from_backing(backing: Backing) -> Result<Self, ContainerError> {
        let regions = validate_directory(backing.bytes())?;
        Ok(Self {
            backing: Arc::new(backing),
            regions,
        })
    }

    /// Returns true if the file was memory-mapped.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(*self.backing, Backing::Mapped(_))
    }

    /// Number of regions in the directory.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Iterates region tags in directory order.
    pub fn tags(&self) -> impl Iterator<Item = &RegionTag> + '_ {
        self.regions.iter().map(|r| &r.tag)
    }

    /// Returns true if a region with `tag` exists.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.find(tag).is_some()
    }

    /// Returns the raw container bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.backing.bytes()
    }

    fn find(&self, tag: &str) -> Option<&ValidRegion> {
        self.regions.iter().find(|r| r.tag.as_str() == tag)
    }
}

impl fmt::Debug for RegionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionFile")
            .field("mapped", &self.is_mapped())
            .field("bytes", &self.backing.bytes().len())
            .field("regions", &self.regions)
            .finish_non_exhaustive()
    }
}

impl RegionSource for RegionFile {
    fn map(&self, tag: &str) -> Result<RegionHandle, ContainerError> {
        let region = self.find(tag).ok_or_else(|| ContainerError::MissingRegion {
            tag: tag.to_owned(),
        })?;
        Ok(RegionHandle {
            backing: Arc::clone(&self.backing),
            tag: region.tag,
            off: region.off,
            len: region.len,
        })
    }
}

/// Scoped byte view of one region.
///
/// The view keeps the backing bytes alive; dropping it (or calling
/// [`unmap`](Self::unmap)) releases its share of the mapping.
#[derive(Clone)]
pub struct RegionHandle {
    backing: Arc<Backing>,
    tag: RegionTag,
    off: usize,
    len: usize,
}

impl RegionHandle {
    /// Region tag.
    #[must_use]
    pub fn tag(&self) -> &RegionTag {
        &self.tag
    }

    /// Region bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        // Offsets were bounds-checked when the directory was validated.
        &self.backing.bytes()[self.off..self.off + self.len]
    }

    /// Region length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the region holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of whole `T` records the region holds.
    #[must_use]
    pub fn count<T: Pod>(&self) -> usize {
        match std::mem::size_of::<T>() {
            0 => 0,
            size => self.len / size,
        }
    }

    /// Reinterprets the region as a slice of fixed-size records.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::RecordCast`] if the region length is not a
    /// multiple of `size_of::<T>()` or the region start is not aligned for `T`.
    pub fn typed<T: Pod>(self) -> Result<TypedRegion<T>, ContainerError> {
        bytemuck::try_cast_slice::<u8, T>(self.bytes()).map_err(|source| {
            ContainerError::RecordCast {
                tag: self.tag.to_string(),
                record: std::any::type_name::<T>(),
                source,
            }
        })?;
        Ok(TypedRegion {
            handle: self,
            _record: PhantomData,
        })
    }

    /// Releases this view of the region.
    pub fn unmap(self) {
        debug!(tag = %self.tag, "region unmapped");
    }
}

impl fmt::Debug for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionHandle")
            .field("tag", &self.tag)
            .field("off", &self.off)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Scoped view of a region as fixed-size records.
///
/// Size and alignment were checked once by [`RegionHandle::typed`], so
/// [`as_slice`](Self::as_slice) is a plain reinterpretation.
pub struct TypedRegion<T> {
    handle: RegionHandle,
    _record: PhantomData<fn() -> T>,
}

impl<T: Pod> TypedRegion<T> {
    /// The records.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        bytemuck::cast_slice(self.handle.bytes())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handle.count::<T>()
    }

    /// Returns true if the region holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Region tag.
    #[must_use]
    pub fn tag(&self) -> &RegionTag {
        self.handle.tag()
    }

    /// Releases this view of the region.
    pub fn unmap(self) {
        self.handle.unmap();
    }
}

impl<T> Clone for TypedRegion<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedRegion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedRegion")
            .field("record", &std::any::type_name::<T>())
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
