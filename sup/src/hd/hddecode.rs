/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

use super::{
    Picture,
    ALPHA_TABLE_SIZE,
    PALETTE_TABLE_SIZE,
    super::{
        bitmap::Bitmap,
        bits::BitReader,
        error::{DecodeError, DecodeResult, RleError},
        options::DecodeOptions,
        palette::{Palette, RgbPixel, YcbcrPixel},
        source::ByteSource,
    },
};
use log::{debug, warn};

/// Builds a picture's palette from its color and alpha tables.
///
/// Color entries are laid out as `[Y, Cr, Cb]`, or `[Y, Cb, Cr]` when `swap_cr_cb` is set. Alpha
/// values are stored inverted. Entries less opaque than `alpha_crop` are set to black.
pub fn decode_palette<S>(
    source: &S,
    picture: &Picture,
    options: &DecodeOptions,
) -> DecodeResult<Palette> where
    S: ByteSource + ?Sized,
{

    let (palette_offset, alpha_offset) = match (picture.palette_offset, picture.alpha_offset) {
        (Some(palette_offset), Some(alpha_offset)) => (palette_offset, alpha_offset),
        _ => return Err(DecodeError::MissingColorTable),
    };
    let colors = source.bytes(palette_offset, PALETTE_TABLE_SIZE)?;
    let alphas = source.bytes(alpha_offset, ALPHA_TABLE_SIZE)?;
    let mut palette = Palette::new(options.color_matrix);

    for (index, (color, alpha)) in colors.chunks_exact(3).zip(alphas.iter()).enumerate() {

        let index = index as u8;
        let alpha = 0xFF - alpha;
        let (cb, cr) = if options.swap_cr_cb {
            (color[1], color[2])
        } else {
            (color[2], color[1])
        };

        if alpha < options.alpha_crop {
            palette.set_rgb(index, RgbPixel::default());
        } else {
            palette.set_ycbcr(index, YcbcrPixel { y: color[0], cb, cr });
        }

        palette.set_alpha(index, alpha);
    }

    Ok(palette)
}

/// Decodes a picture's two interlaced fields onto one bitmap.
///
/// The bitmap is positioned at the picture's area and pre-filled with `transparent`. A field whose
/// data is corrupt or cut short is decoded as far as possible and a warning is logged.
pub fn decode_bitmap<S>(
    source: &S,
    picture: &Picture,
    canvas_width: u16,
    canvas_height: u16,
    transparent: u8,
) -> DecodeResult<Bitmap> where
    S: ByteSource + ?Sized,
{

    let width = picture.image_width;
    let height = picture.image_height;

    if width > canvas_width || height > canvas_height {
        return Err(
            DecodeError::ImageTooLarge {
                width: width as u32,
                height: height as u32,
                offset: picture.even_offset,
            }
        )
    }

    let (even, odd) = match (picture.even_range(), picture.odd_range()) {
        (Some(even), Some(odd)) => (even, odd),
        _ => {
            return Err(
                DecodeError::CorruptBufferOffsets {
                    even: picture.even_offset,
                    odd: picture.odd_offset,
                }
            )
        }
    };
    let mut bitmap = Bitmap::new(width, height, transparent).with_position(picture.x, picture.y);
    let width = width as usize;
    let height = height as usize;
    let mut warnings = 0;

    let fields = [
        (even, 0, width * (height / 2 + height % 2)),
        (odd, width, width * (height / 2)),
    ];

    for ((offset, size), row_offset, max_pixels) in fields {

        let available = size.min(source.size().saturating_sub(offset));

        if available < size {
            warnings += 1;
        }

        let data = source.bytes(offset.min(source.size()), available)?;

        if let Err(err) = decode_field(data, bitmap.pixels_mut(), row_offset, width, max_pixels) {
            debug!("Field at {:#010x}: {}", offset, err);
            warnings += 1;
        }
    }

    if warnings > 0 {
        warn!(
            "Problems during RLE decoding of picture at offset {:#010x}",
            picture.even_offset,
        );
    }

    Ok(bitmap)
}

/// Expands one bit-packed field into every other row of `pixels`.
///
/// Decoding starts at `row_offset` and stops once `max_pixels` pixels have been produced or the
/// data runs out. Each row of the field begins on a byte boundary. A run passing the end of a row
/// continues at the start of the field's next row.
pub fn decode_field(
    data: &[u8],
    pixels: &mut [u8],
    row_offset: usize,
    width: usize,
    max_pixels: usize,
) -> Result<(), RleError> {

    if width == 0 {
        return Ok(())
    }

    let mut reader = BitReader::new(data);
    let mut row_start = row_offset;
    let mut x = 0;
    let mut total = 0;

    while reader.bits_remaining() > 0 && total < max_pixels {

        let run_type = reader.read_bits(1)?;
        let color_bits = if reader.read_bits(1)? == 1 { 8 } else { 2 };
        let color = reader.read_bits(color_bits)? as u8;
        let mut count = if run_type == 1 {
            if reader.read_bits(1)? == 1 {
                match reader.read_bits(7)? as usize + 9 {
                    9 => width - x,
                    count => count,
                }
            } else {
                reader.read_bits(3)? as usize + 2
            }
        } else {
            1
        };
        let mut line_feed = false;

        if x + count == width {
            reader.sync_to_byte()?;
            line_feed = true;
        }

        total += count;

        let spill = if x + count > width {
            let spill = x + count - width;
            count = width - x;
            line_feed = true;
            spill
        } else {
            0
        };

        fill(pixels, row_start + x, count, color, reader.byte_position())?;

        if line_feed {
            // Skip the row belonging to the other field.
            row_start += x + count + width;
            x = spill.min(width);
        } else {
            x += count;
        }

        fill(pixels, row_start, spill, color, reader.byte_position())?;
    }

    Ok(())
}

fn fill(
    pixels: &mut [u8],
    offset: usize,
    count: usize,
    color: u8,
    position: usize,
) -> Result<(), RleError> {

    if count == 0 {
        return Ok(())
    }

    match pixels.get_mut(offset..offset + count) {
        Some(run) => {
            run.fill(color);
            Ok(())
        }
        None => Err(RleError::CorruptFragment { position }),
    }
}
