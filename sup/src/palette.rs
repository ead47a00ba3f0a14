/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Color palettes and YCbCr/RGB conversion.
//!
//! Both stream formats describe colors as studio-range YCbCr triples with a separate alpha value.
//! A [`Palette`] keeps those raw values for each of its 256 entries and derives the matching RGB
//! values as entries are set, using whichever [`ColorMatrix`] it was created with.


/// The number of entries in every palette.
pub const PALETTE_SIZE: usize = 256;

/// The YCbCr value used for entries forced to black.
pub const BLACK: YcbcrPixel = YcbcrPixel { y: 16, cb: 128, cr: 128 };

/// Selects the coefficients used to convert between YCbCr and RGB.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ColorMatrix {
    /// ITU-R BT.601, as used by standard definition material.
    Bt601,
    /// ITU-R BT.709, as used by high definition material.
    Bt709,
}

impl Default for ColorMatrix {
    fn default() -> Self { Self::Bt709 }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct YcbcrPixel {
    pub y: u8,
    pub cb: u8,
    pub cr: u8,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct RgbPixel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

pub fn rgb_pixel(input: YcbcrPixel, matrix: ColorMatrix) -> RgbPixel {

    let y = (input.y as f64 - 16.0) * 1.164383562;
    let cb = input.cb as f64 - 128.0;
    let cr = input.cr as f64 - 128.0;
    let (red, green, blue) = match matrix {
        ColorMatrix::Bt601 => (
            y + 1.596026317 * cr,
            y - 0.3917615979 * cb - 0.8129674985 * cr,
            y + 2.017232218 * cb,
        ),
        ColorMatrix::Bt709 => (
            y + 1.792741071 * cr,
            y - 0.2132486143 * cb - 0.5329093286 * cr,
            y + 2.112401786 * cb,
        ),
    };

    RgbPixel {
        red: clamp(red, 0.0, 255.0),
        green: clamp(green, 0.0, 255.0),
        blue: clamp(blue, 0.0, 255.0),
    }
}

pub fn ycbcr_pixel(input: RgbPixel, matrix: ColorMatrix) -> YcbcrPixel {

    let red = input.red as f64 / 255.0;
    let green = input.green as f64 / 255.0;
    let blue = input.blue as f64 / 255.0;
    let (kr, kb) = match matrix {
        ColorMatrix::Bt601 => (0.299, 0.114),
        ColorMatrix::Bt709 => (0.2126, 0.0722),
    };
    let luma = kr * red + (1.0 - kr - kb) * green + kb * blue;

    YcbcrPixel {
        y: clamp(16.0 + 219.0 * luma, 16.0, 235.0),
        cb: clamp(128.0 + 224.0 * (blue - luma) / (2.0 * (1.0 - kb)), 16.0, 240.0),
        cr: clamp(128.0 + 224.0 * (red - luma) / (2.0 * (1.0 - kr)), 16.0, 240.0),
    }
}

fn clamp(value: f64, min: f64, max: f64) -> u8 {
    value.max(min).min(max).round() as u8
}

/// One palette entry: the raw YCbCr and alpha values plus the RGB value derived from them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PaletteEntry {
    pub ycbcr: YcbcrPixel,
    pub rgb: RgbPixel,
    pub alpha: u8,
}

impl Default for PaletteEntry {
    fn default() -> Self {
        Self {
            ycbcr: BLACK,
            rgb: RgbPixel::default(),
            alpha: 0,
        }
    }
}

/// The outcome of applying an incremental update to a palette entry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AlphaUpdate {
    /// The new alpha value was at least as opaque as the old one and replaced it.
    Accepted,
    /// The new alpha value would have faded the entry out; the old value was kept.
    FadeOutRejected,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Palette {
    matrix: ColorMatrix,
    entries: Vec<PaletteEntry>,
    fade_out: bool,
}

impl Palette {

    /// Creates a palette with every entry black and fully transparent.
    pub fn new(matrix: ColorMatrix) -> Self {
        Self {
            matrix,
            entries: vec![PaletteEntry::default(); PALETTE_SIZE],
            fade_out: false,
        }
    }

    pub fn matrix(&self) -> ColorMatrix {
        self.matrix
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn entry(&self, index: u8) -> &PaletteEntry {
        &self.entries[index as usize]
    }

    pub fn alpha(&self, index: u8) -> u8 {
        self.entries[index as usize].alpha
    }

    pub fn set_alpha(&mut self, index: u8, alpha: u8) {
        self.entries[index as usize].alpha = alpha;
    }

    pub fn set_ycbcr(&mut self, index: u8, ycbcr: YcbcrPixel) {
        let entry = &mut self.entries[index as usize];
        entry.ycbcr = ycbcr;
        entry.rgb = rgb_pixel(ycbcr, self.matrix);
    }

    pub fn set_rgb(&mut self, index: u8, rgb: RgbPixel) {
        let entry = &mut self.entries[index as usize];
        entry.rgb = rgb;
        entry.ycbcr = ycbcr_pixel(rgb, self.matrix);
    }

    /// Applies one incremental palette update without ever lowering an entry's alpha.
    ///
    /// An accepted alpha below `alpha_crop` is stored as-is, but the entry's color is forced to
    /// black so that scaling algorithms do not bleed stray chroma into the edges of the image. A
    /// rejected update still takes the new color.
    pub fn update(
        &mut self,
        index: u8,
        ycbcr: YcbcrPixel,
        alpha: u8,
        alpha_crop: u8,
    ) -> AlphaUpdate {

        if alpha >= self.alpha(index) {
            self.set_alpha(index, alpha);
            self.set_ycbcr(index, if alpha < alpha_crop { BLACK } else { ycbcr });
            AlphaUpdate::Accepted
        } else {
            self.set_ycbcr(index, ycbcr);
            self.fade_out = true;
            AlphaUpdate::FadeOutRejected
        }
    }

    /// Whether any call to [`Palette::update`] has rejected a fade-out.
    pub fn fade_out_detected(&self) -> bool {
        self.fade_out
    }

    /// The first entry with the lowest alpha value.
    pub fn most_transparent_index(&self) -> u8 {

        let mut index = 0;
        let mut min_alpha = u8::MAX as u16 + 1;

        for (i, entry) in self.entries.iter().enumerate() {
            if (entry.alpha as u16) < min_alpha {
                min_alpha = entry.alpha as u16;
                index = i;
                if min_alpha == 0 {
                    break
                }
            }
        }

        index as u8
    }

    pub fn rgba(&self, index: u8) -> [u8; 4] {
        let entry = self.entry(index);
        [entry.rgb.red, entry.rgb.green, entry.rgb.blue, entry.alpha]
    }
}
