/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Error types shared by both stream formats.

use super::{
    bits::BitsExhausted,
    source::SourceError,
};
use std::io::Error as IoError;
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for stream parsing.
pub type ReadResult<T> = Result<T, ReadError>;

/// A specialized [`Result`](std::result::Result) type for deferred frame decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// The error type for stream parsing.
///
/// These errors end a parse. If at least one frame has already been catalogued, the parse is
/// considered partially successful instead and the error is kept as the catalog's stop reason.
#[derive(ThisError, Debug)]
pub enum ReadError {
    /// The stream could not be loaded.
    #[error("stream IO error")]
    IoError {
        #[from]
        source: IoError,
    },
    /// The stream does not begin with a known magic number.
    #[error("stream kind not recognized")]
    UnrecognizedStream,
    /// A record header does not begin with the expected magic number.
    #[error("record at offset {offset:#010x} has unrecognized magic number {magic:#06x}")]
    BadMagic {
        offset: usize,
        magic: u16,
    },
    /// A record header or payload extends past the end of the stream.
    #[error("record is truncated")]
    Truncated {
        #[from]
        source: SourceError,
    },
    /// A command chain contains an opcode that is not understood.
    #[error("unexpected command {command:#04x} at offset {offset:#010x}")]
    UnexpectedCommand {
        offset: usize,
        command: u8,
    },
    /// The cancellation predicate was raised.
    #[error("canceled by user at offset {offset:#010x}")]
    Canceled {
        offset: usize,
    },
}

impl ReadError {

    /// The byte offset at which parsing stopped, if known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ReadError::BadMagic { offset, .. } => Some(*offset),
            ReadError::Truncated { source } => Some(source.offset()),
            ReadError::UnexpectedCommand { offset, .. } => Some(*offset),
            ReadError::Canceled { offset } => Some(*offset),
            ReadError::IoError { .. } | ReadError::UnrecognizedStream => None,
        }
    }

    /// Whether the container itself is malformed (bad magic number or truncated record).
    pub fn is_malformed_container(&self) -> bool {
        matches!(self, ReadError::BadMagic { .. } | ReadError::Truncated { .. })
    }
}

/// The error type for deferred palette and bitmap decoding of a single frame.
#[derive(ThisError, Debug)]
pub enum DecodeError {
    #[error("frame index {index} out of bounds")]
    FrameIndexOutOfBounds {
        index: usize,
    },
    /// The frame never received a palette with the ID its image refers to.
    #[error("palette {id} is not defined for this frame")]
    MissingPalette {
        id: u8,
    },
    /// The frame's command chain never located a color or alpha table.
    #[error("frame has no color table")]
    MissingColorTable,
    #[error("frame has no image object")]
    NoImageObject,
    #[error("subpicture too large: {width}x{height} at offset {offset:#010x}")]
    ImageTooLarge {
        width: u32,
        height: u32,
        offset: usize,
    },
    #[error("corrupt buffer offset information (even: {even:#010x}, odd: {odd:#010x})")]
    CorruptBufferOffsets {
        even: usize,
        odd: usize,
    },
    #[error("frame data lies outside of the stream")]
    Source {
        #[from]
        source: SourceError,
    },
}

/// A run-length decoding fault.
///
/// These never fail a decode. The affected object or field is abandoned and a warning is logged.
#[derive(ThisError, Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RleError {
    /// Compressed data ended mid-run or a run fell outside of the canvas.
    #[error("corrupt run data at byte {position:#x}")]
    CorruptFragment {
        position: usize,
    },
    #[error("bit stream exhausted")]
    BitsExhausted {
        #[from]
        source: BitsExhausted,
    },
}
