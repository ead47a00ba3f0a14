/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

use super::{
    Composition,
    ImageObject,
    super::{
        bitmap::Bitmap,
        error::{DecodeError, DecodeResult, RleError},
        options::DecodeOptions,
        palette::{AlphaUpdate, Palette, YcbcrPixel},
        source::ByteSource,
    },
};
use log::{debug, warn};

/// Builds the palette a composition's image is drawn with.
///
/// Every chunk received for the palette ID is applied in arrival order. Each 5-byte entry is laid
/// out as `[index, Y, Cr, Cb, alpha]`, or `[index, Y, Cb, Cr, alpha]` when `swap_cr_cb` is set.
pub fn decode_palette<S>(
    source: &S,
    composition: &Composition,
    options: &DecodeOptions,
) -> DecodeResult<Palette> where
    S: ByteSource + ?Sized,
{

    let id = composition.primary_object()
        .map_or(composition.palette_id, |object| object.palette_id);
    let chunks = composition.palettes.get(&id).ok_or(DecodeError::MissingPalette { id })?;
    let mut palette = Palette::new(options.color_matrix);
    let mut fade_out = false;

    for chunk in chunks.iter() {

        let data = source.bytes(chunk.offset, chunk.count * 5)?;

        for entry in data.chunks_exact(5) {

            let (cb, cr) = if options.swap_cr_cb {
                (entry[2], entry[3])
            } else {
                (entry[3], entry[2])
            };
            let ycbcr = YcbcrPixel { y: entry[1], cb, cr };

            if palette.update(entry[0], ycbcr, entry[4], options.alpha_crop)
                == AlphaUpdate::FadeOutRejected
            {
                fade_out = true;
            }
        }
    }

    if fade_out {
        warn!("fade out detected -> patched palette");
    }

    Ok(palette)
}

/// Decodes every image object of a composition onto one bitmap.
///
/// The bitmap covers the bounding box of all objects and is positioned at its top left corner.
/// Pixels no object writes keep the `transparent` index. An object whose run data turns out to be
/// corrupt is abandoned with a warning; whatever it wrote up to that point is kept.
pub fn decode_bitmap<S>(
    source: &S,
    composition: &Composition,
    canvas_width: u16,
    canvas_height: u16,
    transparent: u8,
) -> DecodeResult<Bitmap> where
    S: ByteSource + ?Sized,
{

    if composition.image_objects.is_empty() {
        return Err(DecodeError::NoImageObject)
    }

    let objects = composition.image_objects.values();
    let min_x = objects.clone().map(|object| object.x as u32).min().unwrap_or(0);
    let min_y = objects.clone().map(|object| object.y as u32).min().unwrap_or(0);
    let max_x = objects.clone()
        .map(|object| object.x as u32 + object.width as u32)
        .max()
        .unwrap_or(0);
    let max_y = objects.map(|object| object.y as u32 + object.height as u32).max().unwrap_or(0);
    let width = max_x - min_x;
    let height = max_y - min_y;

    if width > canvas_width as u32 || height > canvas_height as u32 {
        return Err(
            DecodeError::ImageTooLarge {
                width,
                height,
                offset: composition.primary_object()
                    .and_then(|object| object.fragments.first())
                    .map_or(0, |fragment| fragment.offset),
            }
        )
    }

    let mut bitmap = Bitmap::new(width as u16, height as u16, transparent)
        .with_position(min_x as u16, min_y as u16);

    for object in composition.image_objects.values() {

        let data = assemble(source, object)?;
        let origin_x = (object.x as u32 - min_x) as usize;
        let origin_y = (object.y as u32 - min_y) as usize;

        debug!(
            "Decoding object {} ({}x{}) at {},{} from {} bytes",
            object.id,
            object.width,
            object.height,
            origin_x,
            origin_y,
            data.len(),
        );

        if let Err(err) = rle_decompress(
            &data,
            bitmap.pixels_mut(),
            width as usize,
            origin_x,
            origin_y,
        ) {
            let position = match err {
                RleError::CorruptFragment { position } => position,
                RleError::BitsExhausted { .. } => 0,
            };
            warn!(
                "Problems during RLE decoding of object {} at offset {:#010x}: {}",
                object.id,
                object.fragments.first().map_or(0, |fragment| fragment.offset) + position,
                err,
            );
        }
    }

    Ok(bitmap)
}

/// Copies an image object's fragments out of the stream into one contiguous buffer.
fn assemble<S>(source: &S, object: &ImageObject) -> DecodeResult<Vec<u8>> where
    S: ByteSource + ?Sized,
{
    let mut data = Vec::with_capacity(object.buffer_size());

    for fragment in object.fragments.iter() {
        data.extend_from_slice(source.bytes(fragment.offset, fragment.length)?);
    }

    Ok(data)
}

/// Expands byte-oriented run-length data into `pixels`, a buffer `width` pixels wide.
///
/// Drawing begins at (`origin_x`, `origin_y`) and every end of line marker returns to `origin_x`
/// on the following row. Runs that pass the edge of the buffer continue on the next row.
pub fn rle_decompress(
    data: &[u8],
    pixels: &mut [u8],
    width: usize,
    origin_x: usize,
    origin_y: usize,
) -> Result<(), RleError> {

    let mut input = data.iter().copied().enumerate();
    let mut line_start = origin_y * width + origin_x;
    let mut offset = line_start;

    while let Some((position, byte)) = input.next() {

        let mut next = || {
            input.next()
                .map(|(_, value)| value)
                .ok_or(RleError::CorruptFragment { position: data.len() })
        };

        let (color, count) = if byte != 0x00 {
            (byte, 1)
        } else {
            let flags = next()?;
            match flags & 0xC0 {
                _ if flags == 0x00 => {
                    line_start += width;
                    offset = line_start;
                    continue
                }
                0x00 => (0x00, flags as usize),
                0x40 => (0x00, ((flags as usize & 0x3F) << 8) | next()? as usize),
                0x80 => {
                    let count = flags as usize & 0x3F;
                    (next()?, count)
                }
                _ => {
                    let count = ((flags as usize & 0x3F) << 8) | next()? as usize;
                    (next()?, count)
                }
            }
        };

        match pixels.get_mut(offset..offset + count) {
            Some(run) => run.fill(color),
            None => return Err(RleError::CorruptFragment { position }),
        }

        offset += count;
    }

    Ok(())
}
