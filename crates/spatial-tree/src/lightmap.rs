//! Lightmap images and the atlas they are packed into.

use crate::TextureHandle;

/// Bytes per lightmap luxel (RGB8).
pub const LIGHTMAP_BYTES_PER_LUXEL: usize = 3;

/// Tunables of the lightmap preparation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightmapConfig {
    /// Brightness multiplier applied to every lightmap.
    pub gamma: f32,
    /// World units covered by one luxel along each texture axis.
    pub luxel_size: u32,
}

impl Default for LightmapConfig {
    fn default() -> Self {
        Self {
            gamma: 2.0,
            luxel_size: 16,
        }
    }
}

/// An RGB8 lightmap image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightmapImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LightmapImage {
    /// Creates an image from tightly packed RGB8 rows.
    ///
    /// Returns `None` if `data` is not exactly `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == Self::byte_len(width, height)).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Number of bytes an image of this size occupies.
    #[inline]
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * LIGHTMAP_BYTES_PER_LUXEL
    }

    /// Width in luxels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in luxels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB8 bytes, row by row.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Brightens the image by `gamma`.
    ///
    /// Every channel is multiplied by `gamma`. A pixel whose brightest channel
    /// would overflow is scaled back down as a whole, so its hue is kept.
    pub fn apply_gamma(&mut self, gamma: f32) {
        if gamma == 1.0 {
            return;
        }

        for pixel in self.data.chunks_exact_mut(LIGHTMAP_BYTES_PER_LUXEL) {
            let scaled = [0, 1, 2].map(|i| f32::from(pixel[i]) * gamma);
            let brightest = scaled.iter().copied().fold(0.0_f32, f32::max);
            let scale = if brightest > 255.0 { 255.0 / brightest } else { 1.0 };
            for (byte, value) in pixel.iter_mut().zip(scaled) {
                *byte = (value * scale) as u8;
            }
        }
    }
}

/// Where the atlas placed an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasSlot {
    /// Atlas page (texture) holding the image.
    pub page: u32,
    /// Horizontal position of the image in the page, in luxels.
    pub offset_u: u32,
    /// Vertical position of the image in the page, in luxels.
    pub offset_v: u32,
}

/// Packs lightmap images into shared textures.
///
/// The BSP world is the only writer, during [`crate::Bsp::init`]; afterwards
/// it only reads page textures.
pub trait LightmapAtlas {
    /// Called once before the first [`insert_image`](Self::insert_image).
    fn begin_packing(&mut self) {}

    /// Stores an image, returning its slot, or `None` if it cannot be placed.
    fn insert_image(&mut self, image: &LightmapImage) -> Option<AtlasSlot>;

    /// Called once after the last [`insert_image`](Self::insert_image).
    fn end_packing(&mut self) {}

    /// Returns the texture of a page.
    fn texture(&self, page: u32) -> TextureHandle;

    /// Side length of a (square) page, in luxels.
    fn page_size(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_size() {
        assert!(LightmapImage::new(2, 1, vec![0; 6]).is_some());
        assert!(LightmapImage::new(2, 1, vec![0; 5]).is_none());
    }

    #[test]
    fn gamma_doubles_dark_pixels() {
        let mut image = LightmapImage::new(1, 1, vec![10, 20, 100]).unwrap();
        image.apply_gamma(2.0);
        assert_eq!(image.data(), &[20, 40, 200]);
    }

    #[test]
    fn gamma_keeps_hue_on_overflow() {
        let mut image = LightmapImage::new(1, 1, vec![255, 100, 50]).unwrap();
        image.apply_gamma(2.0);
        // 510 is the brightest channel, so everything is scaled by 255/510.
        assert_eq!(image.data(), &[255, 100, 50]);
    }

    #[test]
    fn gamma_one_is_identity() {
        let mut image = LightmapImage::new(1, 2, vec![1, 2, 3, 250, 251, 252]).unwrap();
        image.apply_gamma(1.0);
        assert_eq!(image.data(), &[1, 2, 3, 250, 251, 252]);
    }
}
