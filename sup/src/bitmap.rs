/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Indexed pictures produced by the run-length decoders.


use super::palette::{Palette, PALETTE_SIZE};

/// A rectangle of palette indices placed somewhere on the video canvas.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Bitmap {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl Bitmap {

    /// Creates a bitmap with every pixel set to `fill`.
    pub fn new(width: u16, height: u16, fill: u8) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    pub fn with_position(mut self, x: u16, y: u16) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn x(&self) -> u16 {
        self.x
    }

    pub fn y(&self) -> u16 {
        self.y
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.pixels[y as usize * self.width as usize + x as usize])
        } else {
            None
        }
    }

    pub fn row(&self, y: u16) -> Option<&[u8]> {
        if y < self.height {
            let start = y as usize * self.width as usize;
            Some(&self.pixels[start..start + self.width as usize])
        } else {
            None
        }
    }

    /// Finds the dominant visible color.
    ///
    /// Each index is weighted by its pixel count times its alpha, where alpha values below
    /// `alpha_threshold` count as zero. The palette's most transparent entry never qualifies. If
    /// no index has any weight, `None` is returned.
    pub fn primary_color_index(&self, palette: &Palette, alpha_threshold: u8) -> Option<u8> {

        let mut histogram = [0_u64; PALETTE_SIZE];
        let transparent = palette.most_transparent_index();
        let mut primary = None;
        let mut max_weight = 0;

        for pixel in self.pixels.iter() {
            histogram[*pixel as usize] += 1;
        }

        for (index, count) in histogram.iter().enumerate() {

            let index = index as u8;

            if index == transparent {
                continue
            }

            let alpha = match palette.alpha(index) {
                alpha if alpha < alpha_threshold => 0,
                alpha => alpha as u64,
            };
            let weight = count * alpha;

            if weight > max_weight {
                max_weight = weight;
                primary = Some(index);
            }
        }

        primary
    }
}
