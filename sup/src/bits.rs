/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Sequential, most-significant-bit-first reads over a byte slice, backed by `bitreader`.


use thiserror::Error as ThisError;

/// The error type for [`BitReader`] reads that run past the end of the data.
#[derive(ThisError, Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[error("requested {requested} bits with only {remaining} remaining")]
pub struct BitsExhausted {
    pub requested: u32,
    pub remaining: usize,
}

pub struct BitReader<'a> {
    reader: bitreader::BitReader<'a>,
}

impl<'a> BitReader<'a> {

    pub fn new(data: &'a [u8]) -> Self {
        Self { reader: bitreader::BitReader::new(data) }
    }

    pub fn bits_remaining(&self) -> usize {
        self.reader.remaining() as usize
    }

    /// The offset of the byte holding the next unread bit.
    pub fn byte_position(&self) -> usize {
        (self.reader.position() / 8) as usize
    }

    /// Reads `count` bits (at most 32) and returns them right-aligned.
    pub fn read_bits(&mut self, count: u32) -> Result<u32, BitsExhausted> {

        let remaining = self.bits_remaining();
        let exhausted = BitsExhausted { requested: count, remaining };

        if count > 32 || count as usize > remaining {
            return Err(exhausted)
        }

        self.reader.read_u32(count as u8).map_err(|_| exhausted)
    }

    /// Skips the remaining bits of a partially consumed byte.
    pub fn sync_to_byte(&mut self) -> Result<(), BitsExhausted> {

        let remaining = self.bits_remaining();

        self.reader.align(1).map_err(|_| BitsExhausted { requested: 0, remaining })
    }
}
