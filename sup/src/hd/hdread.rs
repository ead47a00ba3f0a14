/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

use super::{
    Command,
    Picture,
    ALPHA_TABLE_SIZE,
    DELAY_UNIT,
    HEIGHT,
    MAGIC,
    PALETTE_TABLE_SIZE,
    WIDTH,
    super::{
        catalog::{Catalog, Frame, FrameContent},
        error::{ReadError, ReadResult},
        monitor::Monitor,
        pts_to_timestamp,
        source::ByteSource,
    },
};
use log::{info, trace, warn};

/// A parsed record header.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RecordHeader {
    pub offset: usize,
    pub pts: u32,
    /// The offset all other offsets in the record are relative to.
    pub data: usize,
    pub packet_size: usize,
    /// The absolute offset of the first command sequence.
    pub command_offset: usize,
}

impl RecordHeader {

    pub fn next_offset(&self) -> usize {
        self.data + self.packet_size
    }

    pub fn image_buffer_size(&self) -> usize {
        self.command_offset.saturating_sub(self.offset + 20)
    }
}

/// Reads the record header at `offset` and makes sure the whole record lies within the source.
pub fn read_record_header<S>(source: &S, offset: usize) -> ReadResult<RecordHeader> where
    S: ByteSource + ?Sized,
{
    let magic = source.read_u16_be(offset)?;

    if magic != MAGIC {
        return Err(ReadError::BadMagic { offset, magic })
    }

    let pts = source.read_u32_le(offset + 2)?;
    let data = offset + 10;
    let packet_size = source.read_u32_be(offset + 12)? as usize;
    let command_offset = source.read_u32_be(offset + 16)? as usize + data;

    source.bytes(data, packet_size)?;

    Ok(RecordHeader { offset, pts, data, packet_size, command_offset })
}

/// Walks an entire HD-SUP stream and catalogs the frames it contains.
///
/// Parsing stops at the first malformed record or unexpected command. If any frames have been
/// catalogued by then, the error is logged and kept as the catalog's stop reason; otherwise it is
/// returned.
pub fn read_catalog<S, M>(source: &S, monitor: &mut M) -> ReadResult<Catalog> where
    S: ByteSource + ?Sized,
    M: Monitor + ?Sized,
{
    let mut catalog = Catalog::new();
    let outcome = walk(source, monitor, &mut catalog);
    let catalog = catalog.conclude(outcome)?;

    monitor.progress(source.size());
    info!("Detected {} captions", catalog.len());

    Ok(catalog)
}

fn walk<S, M>(source: &S, monitor: &mut M, catalog: &mut Catalog) -> ReadResult<()> where
    S: ByteSource + ?Sized,
    M: Monitor + ?Sized,
{
    let size = source.size();
    let mut offset = 0;

    while offset < size {

        if monitor.is_canceled() {
            return Err(ReadError::Canceled { offset })
        }

        let header = read_record_header(source, offset)?;

        info!("#{}", catalog.len() + 1);
        catalog.push(read_frame(source, &header, monitor)?);

        offset = header.next_offset();
        monitor.progress(offset);
    }

    Ok(())
}

/// Walks the command sequences of one record.
fn read_frame<S, M>(source: &S, header: &RecordHeader, monitor: &M) -> ReadResult<Frame> where
    S: ByteSource + ?Sized,
    M: Monitor + ?Sized,
{

    let mut picture = Picture {
        record_offset: header.offset,
        image_buffer_size: header.image_buffer_size(),
        ..Default::default()
    };
    let mut index = header.command_offset;
    let mut delay = source.read_u16_be(index)? as u64;
    let start = header.pts as u64 + delay * DELAY_UNIT;
    let mut next = source.read_u32_be(index + 2)? as usize + header.data;
    let mut visited = vec![index];
    let mut min_alpha_sum = u32::MAX;

    trace!("DCSQ start    ofs: {:#010x}  ({})", index, pts_to_timestamp(start));

    // The delay, the next sequence offset and the start command.
    index += 7;

    let end = loop {

        if monitor.is_canceled() {
            return Err(ReadError::Canceled { offset: index })
        }

        let command_offset = index;
        let code = source.read_u8(index)?;

        index += 1;

        match Command::from(code) {
            Command::SequenceStart => {
                warn!("DCSQ start ignored due to missing DCSQ stop at {:#010x}", command_offset);
            }
            Command::SequenceStop => {
                let end = start + delay * DELAY_UNIT;
                trace!("DCSQ stop     ofs: {:#010x}  ({})", command_offset, pts_to_timestamp(end));
                break end
            }
            Command::Palette => {
                trace!("Palette info  ofs: {:#010x}", index);
                source.bytes(index, PALETTE_TABLE_SIZE)?;
                picture.palette_offset = Some(index);
                index += PALETTE_TABLE_SIZE;
            }
            Command::Alpha => {
                trace!("Alpha info    ofs: {:#010x}", index);
                let alpha_sum = source.bytes(index, ALPHA_TABLE_SIZE)?
                    .iter()
                    .map(|alpha| *alpha as u32)
                    .sum::<u32>();
                if alpha_sum < min_alpha_sum {
                    picture.alpha_offset = Some(index);
                    min_alpha_sum = alpha_sum;
                } else {
                    warn!("Found faded alpha buffer -> alpha buffer skipped");
                }
                index += ALPHA_TABLE_SIZE;
            }
            Command::Area => {
                let area = source.bytes(index, 6)?;
                let x_start = (area[0] as u16) << 4 | (area[1] as u16) >> 4;
                let x_end = (area[1] as u16 & 0x0F) << 8 | area[2] as u16;
                let y_start = (area[3] as u16) << 4 | (area[4] as u16) >> 4;
                let y_end = (area[4] as u16 & 0x0F) << 8 | area[5] as u16;
                picture.x = x_start;
                picture.y = y_start;
                picture.image_width = (x_end + 1).saturating_sub(x_start);
                picture.image_height = (y_end + 1).saturating_sub(y_start);
                trace!(
                    "Area info     ofs: {:#010x}  ({}, {}) - ({}, {})",
                    index,
                    picture.x,
                    picture.y,
                    picture.x as u32 + picture.image_width as u32,
                    picture.y as u32 + picture.image_height as u32,
                );
                index += 6;
            }
            Command::BufferOffsets => {
                picture.even_offset = source.read_u32_be(index)? as usize + header.data;
                picture.odd_offset = source.read_u32_be(index + 4)? as usize + header.data;
                trace!(
                    "RLE buffers   ofs: {:#010x}  (even: {:#010x}, odd: {:#010x})",
                    index,
                    picture.even_offset,
                    picture.odd_offset,
                );
                index += 8;
            }
            Command::NextSequence => {
                if visited.contains(&next) {
                    warn!("DCSQ stop missing at {:#010x}", command_offset);
                    break start + delay * DELAY_UNIT
                }
                index = next;
                visited.push(index);
                delay = source.read_u16_be(index)? as u64;
                next = source.read_u32_be(index + 2)? as usize + header.data;
                trace!(
                    "DCSQ          ofs: {:#010x}  ({}ms),    next DCSQ at ofs: {:#010x}",
                    index,
                    delay * DELAY_UNIT / 90,
                    next,
                );
                index += 6;
            }
            Command::Unknown(command) => {
                return Err(ReadError::UnexpectedCommand { offset: command_offset, command })
            }
        }
    };

    Ok(
        Frame {
            start,
            end,
            width: WIDTH,
            height: HEIGHT,
            forced: false,
            content: FrameContent::HdDvd(picture),
        }
    )
}
