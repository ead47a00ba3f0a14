/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Operates on Blu-ray presentation graphics streams (BD-SUP).
//!
//! # Overview
//!
//! A BD-SUP stream is a flat sequence of segments. Each one has a fixed 13-byte header:
//!
//! | Size | Field                       |
//! |------|-----------------------------|
//! | 2    | magic number (`PG`)         |
//! | 4    | presentation timestamp      |
//! | 4    | decoding timestamp (unused) |
//! | 1    | segment kind                |
//! | 2    | payload size                |
//!
//! The payload follows immediately. There are five kinds of segments:
//!
//! 1. Presentation Composition Segment (PCS)
//! 2. Window Definition Segment (WDS)
//! 3. Palette Definition Segment (PDS)
//! 4. Object Definition Segment (ODS)
//! 5. End Segment (ES)
//!
//! A PCS with an epoch start or acquisition point composition state opens a new frame. The
//! segments that follow fill that frame in until an ES or the next such PCS seals it. Any PCS
//! closes the frame catalogued before it, which is how display durations come about.
//!
//! Image objects may be split across several ODS segments, and palettes may be built from several
//! PDS segments. Neither is copied out of the stream while parsing: only offsets are recorded,
//! and [`decode_palette`] and [`decode_bitmap`] read the bytes later on.


mod bddecode;
mod bdread;

pub use bddecode::*;
pub use bdread::*;

use std::collections::BTreeMap;

pub const MAGIC: u16 = 0x5047;
pub const HEADER_SIZE: usize = 13;
/// The highest valid palette ID.
pub const MAX_PALETTE_ID: u8 = 7;

/// The kind of a segment, as given by its header.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SegmentKind {
    /// Palette Definition Segment (PDS).
    PaletteDefinition,
    /// Object Definition Segment (ODS).
    ObjectDefinition,
    /// Presentation Composition Segment (PCS).
    PresentationComposition,
    /// Window Definition Segment (WDS).
    WindowDefinition,
    /// End Segment (ES).
    End,
    Unknown(u8),
}

impl From<u8> for SegmentKind {
    fn from(value: u8) -> Self {
        match value {
            0x14 => SegmentKind::PaletteDefinition,
            0x15 => SegmentKind::ObjectDefinition,
            0x16 => SegmentKind::PresentationComposition,
            0x17 => SegmentKind::WindowDefinition,
            0x80 => SegmentKind::End,
            other => SegmentKind::Unknown(other),
        }
    }
}

/// Defines the role of a PCS within an epoch.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CompositionState {
    /// Starts a new epoch. The display set should define everything needed to render the
    /// composition.
    EpochStart,
    /// Refreshes the current composition so that a player seeking into the middle of an epoch can
    /// still show it.
    AcquisitionPoint,
    /// Updates the composition on screen, typically to clear it.
    Normal,
    /// Any other value, including epoch continue (`0xC0`). Handled exactly like `Normal`.
    Unspecified(u8),
}

impl From<u8> for CompositionState {
    fn from(value: u8) -> Self {
        match value {
            0x00 => CompositionState::Normal,
            0x40 => CompositionState::AcquisitionPoint,
            0x80 => CompositionState::EpochStart,
            other => CompositionState::Unspecified(other),
        }
    }
}

impl Default for CompositionState {
    fn default() -> Self { Self::EpochStart }
}

/// The video frame rate, taken from the high nibble of the PCS frame rate field.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FrameRate {
    Film,
    Fps24,
    Pal,
    Ntsc,
    PalInterlaced,
    NtscInterlaced,
    Unknown(u8),
}

impl FrameRate {

    pub fn from_code(value: u8) -> Self {
        match value >> 4 {
            0x1 => FrameRate::Film,
            0x2 => FrameRate::Fps24,
            0x3 => FrameRate::Pal,
            0x4 => FrameRate::Ntsc,
            0x6 => FrameRate::PalInterlaced,
            0x7 => FrameRate::NtscInterlaced,
            other => FrameRate::Unknown(other),
        }
    }

    pub fn fps(&self) -> Option<f64> {
        match self {
            FrameRate::Film => Some(24_000.0 / 1_001.0),
            FrameRate::Fps24 => Some(24.0),
            FrameRate::Pal => Some(25.0),
            FrameRate::Ntsc => Some(30_000.0 / 1_001.0),
            FrameRate::PalInterlaced => Some(50.0),
            FrameRate::NtscInterlaced => Some(60_000.0 / 1_001.0),
            FrameRate::Unknown(_) => None,
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self { Self::Film }
}

/// Everything an epoch accumulated: composition details, windows, image objects and palettes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Composition {
    pub number: u16,
    pub state: CompositionState,
    pub frame_rate: FrameRate,
    /// The palette the composition's objects are drawn with.
    pub palette_id: u8,
    pub objects: Vec<CompositionObject>,
    pub windows: BTreeMap<u8, Window>,
    pub image_objects: BTreeMap<u16, ImageObject>,
    /// The palette chunks received so far, by palette ID, in arrival order.
    pub palettes: BTreeMap<u8, Vec<PaletteChunk>>,
}

impl Composition {

    /// The window with the lowest ID.
    pub fn window(&self) -> Option<&Window> {
        self.windows.values().next()
    }

    /// The image object referenced by the first composition object, falling back to the image
    /// object with the lowest ID.
    pub fn primary_object(&self) -> Option<&ImageObject> {
        self.objects.iter()
            .find_map(|co| self.image_objects.get(&co.object_id))
            .or_else(|| self.image_objects.values().next())
    }

    pub fn has_complete_object(&self) -> bool {
        self.image_objects.values().any(|object| object.complete)
    }

    pub fn has_palette(&self) -> bool {
        self.palettes.values().any(|chunks| !chunks.is_empty())
    }
}

/// Places an image object within a window.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct CompositionObject {
    pub object_id: u16,
    pub window_id: u8,
    pub forced: bool,
    pub x: u16,
    pub y: u16,
    pub crop: Option<Crop>,
}

#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct Crop {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct Window {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// A run-length compressed image, possibly spread across several ODS segments.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ImageObject {
    pub id: u16,
    pub version: u8,
    pub width: u16,
    pub height: u16,
    pub palette_id: u8,
    /// Horizontal placement on the video canvas.
    pub x: u16,
    /// Vertical placement on the video canvas.
    pub y: u16,
    /// The compressed size announced by the first fragment.
    pub declared_size: usize,
    pub fragments: Vec<Fragment>,
    /// Set once the fragment flagged as last in sequence has arrived.
    pub complete: bool,
}

impl ImageObject {

    pub fn new(id: u16) -> Self {
        Self { id, ..Default::default() }
    }

    /// The number of compressed bytes received so far.
    pub fn buffer_size(&self) -> usize {
        self.fragments.iter().map(|fragment| fragment.length).sum()
    }
}

/// A window into the stream holding part of an image object's compressed data.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Fragment {
    pub offset: usize,
    pub length: usize,
}

/// A window into the stream holding the entries of one PDS.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PaletteChunk {
    pub id: u8,
    pub version: u8,
    /// The offset of the first 5-byte entry.
    pub offset: usize,
    pub count: usize,
}
