//! Rendered pixel tiles.

use image::RgbaImage;

/// An immutable RGBA tile image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelTile {
    image: RgbaImage,
}

impl PixelTile {
    /// A fully transparent tile.
    #[must_use]
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Wraps a rendered image.
    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Tile width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Tile height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The tile pixels.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub(crate) fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Bytes of pixel storage, used as the cache cost.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }

    /// Returns true if every pixel is fully transparent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p.0[3] == 0)
    }
}
