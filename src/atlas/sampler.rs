//! Concrete atlas samplers.
//!
//! `ImageAtlas` reads a decoded RGBA image with the sampler state the voxel
//! renderer binds for its atlas: nearest filtering and clamp-to-edge
//! addressing. `PaletteAtlas` stores one flat color per cell and is what
//! tests and benches shade against.

use bevy::math::{Vec2, Vec4};
use image::RgbaImage;
use std::path::Path;

use super::{AtlasSampler, MaterialId, ATLAS_CELLS, ATLAS_GRID};

/// Synthetic atlas with a single flat color per cell.
#[derive(Clone, Debug)]
pub struct PaletteAtlas {
    cells: Vec<Vec4>,
}

impl PaletteAtlas {
    /// Create a palette where every cell holds `color`.
    #[must_use]
    pub fn filled(color: Vec4) -> Self {
        Self {
            cells: vec![color; ATLAS_CELLS],
        }
    }

    /// Set the color of one cell. Invalid ids are ignored.
    ///
    /// # Arguments
    /// * `material` - cell to overwrite.
    /// * `color` - RGBA value returned for every coordinate inside that cell.
    pub fn set(&mut self, material: MaterialId, color: Vec4) {
        if let Some(idx) = material.cell_index() {
            self.cells[idx] = color;
        }
    }

    /// Builder-style variant of [`PaletteAtlas::set`].
    #[must_use]
    pub fn with(mut self, material: MaterialId, color: Vec4) -> Self {
        self.set(material, color);
        self
    }
}

impl Default for PaletteAtlas {
    fn default() -> Self {
        Self::filled(Vec4::ZERO)
    }
}

impl AtlasSampler for PaletteAtlas {
    fn sample(&self, coord: Vec2) -> Vec4 {
        let cell = (coord * ATLAS_GRID as f32).floor();
        let x = (cell.x as i32).clamp(0, ATLAS_GRID - 1);
        let y = (cell.y as i32).clamp(0, ATLAS_GRID - 1);
        self.cells[(y * ATLAS_GRID + x) as usize]
    }
}

/// Atlas backed by an RGBA image.
///
/// Both image dimensions must be multiples of 16 so every cell covers the
/// same whole number of texels.
#[derive(Clone, Debug)]
pub struct ImageAtlas {
    image: RgbaImage,
}

impl ImageAtlas {
    /// Wrap an already decoded image.
    ///
    /// # Errors
    /// Returns an error when the image is empty or a dimension is not a
    /// multiple of the 16-cell grid.
    pub fn from_image(image: RgbaImage) -> Result<Self, Box<dyn std::error::Error>> {
        let (w, h) = image.dimensions();
        let grid = ATLAS_GRID as u32;
        if w == 0 || h == 0 || w % grid != 0 || h % grid != 0 {
            return Err(format!(
                "atlas image is {w}x{h}; both sides must be non-zero multiples of {grid}"
            )
            .into());
        }
        Ok(Self { image })
    }

    /// Decode an atlas image from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded, or if its
    /// dimensions do not fit the grid (see [`ImageAtlas::from_image`]).
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let decoded = image::open(path)?;
        Self::from_image(decoded.to_rgba8())
    }

    /// Size of one cell in texels `(width, height)`.
    #[must_use]
    pub fn cell_size(&self) -> (u32, u32) {
        let grid = ATLAS_GRID as u32;
        (self.image.width() / grid, self.image.height() / grid)
    }
}

impl AtlasSampler for ImageAtlas {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn sample(&self, coord: Vec2) -> Vec4 {
        let (w, h) = self.image.dimensions();
        // nearest texel, clamped to the edge
        let x = ((coord.x * w as f32).floor() as i64).clamp(0, i64::from(w) - 1) as u32;
        let y = ((coord.y * h as f32).floor() as i64).clamp(0, i64::from(h) - 1) as u32;
        let [r, g, b, a] = self.image.get_pixel(x, y).0;
        Vec4::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }
}
