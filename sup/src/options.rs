/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

use super::palette::ColorMatrix;

pub const DEFAULT_ALPHA_CROP: u8 = 14;
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 80;

/// Settings applied when decoding a frame's palette and bitmap.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DecodeOptions {
    /// Palette entries whose alpha falls below this value have their color forced to black.
    pub alpha_crop: u8,
    /// Palette entries whose alpha falls below this value are ignored when looking for the
    /// primary color of a frame.
    pub alpha_threshold: u8,
    pub color_matrix: ColorMatrix,
    /// Whether palette entries store Cb before Cr instead of the usual Cr before Cb.
    pub swap_cr_cb: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            alpha_crop: DEFAULT_ALPHA_CROP,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            color_matrix: ColorMatrix::default(),
            swap_cr_cb: false,
        }
    }
}
