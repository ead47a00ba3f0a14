/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! The ordered list of frames recovered from a stream, and deferred decoding of those frames.
//!
//! Parsing only records where each frame's palette and image data live inside the stream. The
//! pixels themselves are decoded on demand, one frame at a time, through [`SupStream`].

#[cfg(test)]
mod tests;

use super::{
    bd::{self, Composition},
    bitmap::Bitmap,
    error::{DecodeError, DecodeResult, ReadError, ReadResult},
    hd::{self, Picture},
    monitor::Monitor,
    options::DecodeOptions,
    palette::Palette,
    source::{ByteSource, FileSource},
};
use std::{path::Path, slice::Iter};
use log::{error, trace};

/// One displayed caption.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Presentation start in 90 kHz ticks.
    pub start: u64,
    /// Presentation end in 90 kHz ticks, or zero if the stream never closed the frame.
    pub end: u64,
    /// Width of the video canvas.
    pub width: u16,
    /// Height of the video canvas.
    pub height: u16,
    pub forced: bool,
    pub content: FrameContent,
}

/// The format-specific inputs needed to decode a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameContent {
    BluRay(Composition),
    HdDvd(Picture),
}

impl Frame {

    /// The offset of the first byte of image data belonging to this frame.
    pub fn start_offset(&self) -> Option<usize> {
        match &self.content {
            FrameContent::BluRay(composition) => composition.primary_object()
                .and_then(|object| object.fragments.first())
                .map(|fragment| fragment.offset),
            FrameContent::HdDvd(picture) => Some(picture.even_offset),
        }
    }

    pub fn duration(&self) -> Option<u64> {
        self.end.checked_sub(self.start).filter(|_| self.end != 0)
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    frames: Vec<Frame>,
    stop_reason: Option<ReadError>,
}

impl Catalog {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The offset of the first byte of image data belonging to the frame at `index`.
    pub fn start_offset(&self, index: usize) -> Option<usize> {
        self.frames.get(index).and_then(Frame::start_offset)
    }

    pub fn forced_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.forced).count()
    }

    /// The error that ended the parse early, if any.
    ///
    /// Every frame in the catalog was completely parsed before this error occurred.
    pub fn stop_reason(&self) -> Option<&ReadError> {
        self.stop_reason.as_ref()
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Applies the outcome of a parse. Errors are only fatal when nothing has been recovered.
    pub(crate) fn conclude(mut self, outcome: ReadResult<()>) -> ReadResult<Self> {
        match outcome {
            Ok(()) => Ok(self),
            Err(err) if self.frames.is_empty() => Err(err),
            Err(err) => {
                error!("{}", err);
                trace!("Probably not all captions imported due to error.");
                self.stop_reason = Some(err);
                Ok(self)
            }
        }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Frame;
    type IntoIter = Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Identifies which of the two supported formats a stream uses.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StreamKind {
    /// Blu-ray presentation graphics (BD-SUP).
    BluRay,
    /// HD DVD sub-pictures (HD-SUP).
    HdDvd,
}

impl StreamKind {

    pub fn detect<S: ByteSource + ?Sized>(source: &S) -> Option<Self> {
        match source.read_u16_be(0).ok()? {
            bd::MAGIC => Some(StreamKind::BluRay),
            hd::MAGIC => Some(StreamKind::HdDvd),
            _ => None,
        }
    }

    pub fn read_catalog<S, M>(&self, source: &S, monitor: &mut M) -> ReadResult<Catalog> where
        S: ByteSource + ?Sized,
        M: Monitor + ?Sized,
    {
        match self {
            StreamKind::BluRay => bd::read_catalog(source, monitor),
            StreamKind::HdDvd => hd::read_catalog(source, monitor),
        }
    }
}

/// The fully decoded form of a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFrame {
    pub palette: Palette,
    pub bitmap: Bitmap,
    /// The most dominant visible palette index, if any.
    pub primary_color_index: Option<u8>,
}

/// A parsed stream: the source bytes together with the catalog of frames found in them.
#[derive(Debug)]
pub struct SupStream<S> {
    source: S,
    kind: StreamKind,
    catalog: Catalog,
}

impl SupStream<FileSource> {

    pub fn open<P: AsRef<Path>>(path: P) -> ReadResult<Self> {
        Self::new(FileSource::open(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> ReadResult<Self> {
        Self::new(FileSource::from(data))
    }
}

impl<S: ByteSource> SupStream<S> {

    pub fn new(source: S) -> ReadResult<Self> {
        Self::with_monitor(source, &mut ())
    }

    pub fn with_monitor<M>(source: S, monitor: &mut M) -> ReadResult<Self> where
        M: Monitor + ?Sized,
    {
        let kind = StreamKind::detect(&source).ok_or(ReadError::UnrecognizedStream)?;
        let catalog = kind.read_catalog(&source, monitor)?;

        Ok(SupStream { source, kind, catalog })
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_parts(self) -> (S, Catalog) {
        (self.source, self.catalog)
    }

    fn frame(&self, index: usize) -> DecodeResult<&Frame> {
        self.catalog.get(index).ok_or(DecodeError::FrameIndexOutOfBounds { index })
    }

    pub fn decode_palette(&self, index: usize, options: &DecodeOptions) -> DecodeResult<Palette> {
        decode_palette(&self.source, self.frame(index)?, options)
    }

    pub fn decode_bitmap(&self, index: usize, palette: &Palette) -> DecodeResult<Bitmap> {
        decode_bitmap(&self.source, self.frame(index)?, palette)
    }

    pub fn decode(&self, index: usize, options: &DecodeOptions) -> DecodeResult<DecodedFrame> {
        decode(&self.source, self.frame(index)?, options)
    }
}

pub fn decode_palette<S>(
    source: &S,
    frame: &Frame,
    options: &DecodeOptions,
) -> DecodeResult<Palette> where
    S: ByteSource + ?Sized,
{
    match &frame.content {
        FrameContent::BluRay(composition) => bd::decode_palette(source, composition, options),
        FrameContent::HdDvd(picture) => hd::decode_palette(source, picture, options),
    }
}

/// Decodes a frame's image, pre-filled with the palette's most transparent entry.
pub fn decode_bitmap<S>(source: &S, frame: &Frame, palette: &Palette) -> DecodeResult<Bitmap> where
    S: ByteSource + ?Sized,
{
    let transparent = palette.most_transparent_index();

    match &frame.content {
        FrameContent::BluRay(composition) => {
            bd::decode_bitmap(source, composition, frame.width, frame.height, transparent)
        }
        FrameContent::HdDvd(picture) => {
            hd::decode_bitmap(source, picture, frame.width, frame.height, transparent)
        }
    }
}

pub fn decode<S>(source: &S, frame: &Frame, options: &DecodeOptions) -> DecodeResult<DecodedFrame>
where
    S: ByteSource + ?Sized,
{
    let palette = decode_palette(source, frame, options)?;
    let bitmap = decode_bitmap(source, frame, &palette)?;
    let primary_color_index = bitmap.primary_color_index(&palette, options.alpha_threshold);

    Ok(DecodedFrame { palette, bitmap, primary_color_index })
}
