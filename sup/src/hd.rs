/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Operates on HD DVD sub-picture streams (HD-SUP).
//!
//! # Overview
//!
//! Every caption is stored in one self-contained record:
//!
//! | Offset | Size | Field                                          |
//! |--------|------|------------------------------------------------|
//! | 0      | 2    | magic number (`SP`)                            |
//! | 2      | 4    | presentation timestamp (little endian)         |
//! | 6      | 4    | reserved                                       |
//! | 12     | 4    | packet size, relative to offset 10             |
//! | 16     | 4    | command sequence offset, relative to offset 10 |
//! | 20     |      | even and odd field image data                  |
//!
//! The command sequence starts with a 2-byte delay (in units of 1024 ticks) and the offset of the
//! next sequence, followed by a chain of commands. Those commands locate the color table, the alpha
//! table, the image area and the two image fields within the record. A second sequence usually
//! holds nothing but the stop command, its delay giving the display duration.
//!
//! The stream carries no video dimensions. Every frame is assumed to cover a 1920x1080 canvas.

#[cfg(test)]
mod tests;

mod hddecode;
mod hdread;

pub use hddecode::*;
pub use hdread::*;

pub const MAGIC: u16 = 0x5350;
pub const WIDTH: u16 = 1920;
pub const HEIGHT: u16 = 1080;
/// The size of the color table: 256 three-byte entries.
pub const PALETTE_TABLE_SIZE: usize = 0x300;
/// The size of the alpha table: 256 one-byte entries.
pub const ALPHA_TABLE_SIZE: usize = 0x100;
/// Command sequence delays are given in units of this many ticks.
pub const DELAY_UNIT: u64 = 1024;

/// A command within a display control sequence.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Command {
    /// Starts the display. Only expected once, right at the beginning of the first sequence.
    SequenceStart,
    /// Stops the display and ends the command walk.
    SequenceStop,
    /// Followed by the 768-byte color table.
    Palette,
    /// Followed by the 256-byte alpha table.
    Alpha,
    /// Followed by six bytes packing the image area's corners.
    Area,
    /// Followed by the offsets of the even and odd field image data.
    BufferOffsets,
    /// Ends the current sequence and continues with the next one.
    NextSequence,
    Unknown(u8),
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Command::SequenceStart,
            0x02 => Command::SequenceStop,
            0x83 => Command::Palette,
            0x84 => Command::Alpha,
            0x85 => Command::Area,
            0x86 => Command::BufferOffsets,
            0xFF => Command::NextSequence,
            other => Command::Unknown(other),
        }
    }
}

/// Where a caption's tables and image data live within the stream.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Picture {
    /// The offset of the record holding this caption.
    pub record_offset: usize,
    pub palette_offset: Option<usize>,
    /// The offset of the most opaque alpha table found.
    pub alpha_offset: Option<usize>,
    pub x: u16,
    pub y: u16,
    pub image_width: u16,
    pub image_height: u16,
    pub even_offset: usize,
    pub odd_offset: usize,
    /// The combined size of both fields' image data.
    pub image_buffer_size: usize,
}

impl Picture {

    /// The stream range holding the even field's image data.
    pub fn even_range(&self) -> Option<(usize, usize)> {
        self.odd_offset.checked_sub(self.even_offset)
            .filter(|size| *size > 0)
            .map(|size| (self.even_offset, size))
    }

    /// The stream range holding the odd field's image data.
    pub fn odd_range(&self) -> Option<(usize, usize)> {
        (self.even_offset + self.image_buffer_size).checked_sub(self.odd_offset)
            .filter(|size| *size > 0)
            .map(|size| (self.odd_offset, size))
    }
}
