/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Recovers timed bitmap subtitles from Blu-ray (BD-SUP) and HD DVD (HD-SUP) streams.
//!
//! Parsing walks the whole stream once and produces a [`Catalog`] of frames, each carrying its
//! presentation timestamps, its forced flag and the stream offsets of its palette and image data.
//! Palettes and bitmaps are only decoded when asked for, one frame at a time:
//!
//! ```no_run
//! use sup::{DecodeOptions, SupStream};
//!
//! let stream = SupStream::open("movie.sup")?;
//!
//! for index in 0..stream.catalog().len() {
//!     let frame = stream.decode(index, &DecodeOptions::default())?;
//!     println!("{}x{}", frame.bitmap.width(), frame.bitmap.height());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! A stream that turns out to be damaged part way through still yields every frame that was
//! completely parsed before the damage. The error that ended the parse is then available from
//! [`Catalog::stop_reason`].


pub mod bd;
pub mod bitmap;
pub mod bits;
pub mod catalog;
pub mod error;
pub mod hd;
pub mod monitor;
pub mod options;
pub mod palette;
pub mod source;

pub use bitmap::Bitmap;
pub use catalog::{Catalog, DecodedFrame, Frame, FrameContent, StreamKind, SupStream};
pub use error::{DecodeError, DecodeResult, ReadError, ReadResult};
pub use monitor::{Callbacks, Monitor};
pub use options::DecodeOptions;
pub use palette::{ColorMatrix, Palette};
pub use source::{ByteSource, FileSource};

/// The number of timestamp ticks per second.
pub const TICKS_PER_SECOND: u64 = 90_000;

/// Formats a 90 kHz timestamp as `HH:MM:SS.mmm`.
pub fn pts_to_timestamp(ticks: u64) -> String {

    let ms = ticks / 90;
    let h = ms / 3_600_000;
    let m = ms / 60_000 % 60;
    let s = ms / 1_000 % 60;

    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms % 1_000)
}
