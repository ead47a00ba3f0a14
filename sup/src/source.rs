/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Random access to the raw bytes of a subtitle stream.
//!
//! Both stream formats are parsed by jumping around inside one immutable blob, so every read is
//! made at an absolute offset and is bounds-checked against the total size of the source.


use std::{
    fs,
    io::Error as IoError,
    path::Path,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for byte source reads.
pub type SourceResult<T> = Result<T, SourceError>;

/// The error type for [`ByteSource`] reads.
#[derive(ThisError, Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SourceError {
    /// A read would have extended past the end of the source.
    #[error("read of {length} bytes at offset {offset:#010x} exceeds source size {size:#010x}")]
    OutOfRange {
        offset: usize,
        length: usize,
        size: usize,
    },
}

impl SourceError {
    /// The absolute offset at which the failed read started.
    pub fn offset(&self) -> usize {
        match self {
            SourceError::OutOfRange { offset, .. } => *offset,
        }
    }
}

/// Fixed-width integer reads at absolute offsets over a bounded binary blob.
pub trait ByteSource {

    /// The total number of bytes available.
    fn size(&self) -> usize;

    /// Borrows `length` bytes starting at `offset`.
    fn bytes(&self, offset: usize, length: usize) -> SourceResult<&[u8]>;

    fn read_u8(&self, offset: usize) -> SourceResult<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    fn read_u16_be(&self, offset: usize) -> SourceResult<u16> {
        Ok(BigEndian::read_u16(self.bytes(offset, 2)?))
    }

    fn read_u16_le(&self, offset: usize) -> SourceResult<u16> {
        Ok(LittleEndian::read_u16(self.bytes(offset, 2)?))
    }

    fn read_u24_be(&self, offset: usize) -> SourceResult<u32> {
        Ok(BigEndian::read_u24(self.bytes(offset, 3)?))
    }

    fn read_u32_be(&self, offset: usize) -> SourceResult<u32> {
        Ok(BigEndian::read_u32(self.bytes(offset, 4)?))
    }

    fn read_u32_le(&self, offset: usize) -> SourceResult<u32> {
        Ok(LittleEndian::read_u32(self.bytes(offset, 4)?))
    }
}

impl<T> ByteSource for T where
    T: AsRef<[u8]> + ?Sized,
{

    fn size(&self) -> usize {
        self.as_ref().len()
    }

    fn bytes(&self, offset: usize, length: usize) -> SourceResult<&[u8]> {

        let data = self.as_ref();

        match offset.checked_add(length) {
            Some(end) if end <= data.len() => Ok(&data[offset..end]),
            _ => Err(
                SourceError::OutOfRange {
                    offset,
                    length,
                    size: data.len(),
                }
            ),
        }
    }
}

/// A byte source holding the complete contents of a file.
///
/// The file handle is only held for the duration of [`FileSource::open`]; the contents live in
/// memory until the source is dropped.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct FileSource {
    data: Vec<u8>,
}

impl FileSource {

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        Ok(Self { data: fs::read(path)? })
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for FileSource {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl AsRef<[u8]> for FileSource {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
