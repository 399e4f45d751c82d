//! Atlas builder: pack material tiles into the fixed 16×16 grid.
//!
//! Tiles are addressed by their cell, not by name: a file called
//! `3_0.png` lands in column 3, row 0. Cells without a tile stay fully
//! transparent, so fragments that address them are dropped by the alpha
//! test instead of showing a placeholder color.
//!
//! When no tile directory is available the builder can synthesize a small
//! procedural atlas covering the materials the preview scene uses.

use bevy::prelude::{info, warn};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use noise::{NoiseFn, Perlin};
use std::fs;
use std::path::Path;

use super::{ImageAtlas, MaterialId, ATLAS_GRID};

/// Cell used for grass tops. Grayscale, so it takes the vertex tint.
pub const GRASS_TOP: MaterialId = MaterialId::new(0, 0);
pub const STONE: MaterialId = MaterialId::new(1, 0);
pub const DIRT: MaterialId = MaterialId::new(2, 0);
pub const GRASS_SIDE: MaterialId = MaterialId::new(3, 0);
pub const SAND: MaterialId = MaterialId::new(2, 1);

pub struct AtlasBuilder;

impl AtlasBuilder {
    /// Build an atlas from a directory of `<col>_<row>.png` tiles.
    ///
    /// # Arguments
    /// * `tile_dir` - directory scanned (non-recursively) for PNG tiles.
    /// * `cell_px` - side length of one cell in texels; tiles of another
    ///   size are resized with nearest filtering.
    ///
    /// # Errors
    /// Returns an `Err` when the directory cannot be read, when `cell_px` is
    /// zero, or when no tile in the directory could be placed.
    pub fn build_grid_from_directory(
        tile_dir: &Path,
        cell_px: u32,
    ) -> Result<ImageAtlas, Box<dyn std::error::Error>> {
        if cell_px == 0 {
            return Err("cell size must be at least one texel".into());
        }
        let side = cell_px * ATLAS_GRID as u32;
        let mut atlas = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));
        let mut placed = 0usize;

        for entry in fs::read_dir(tile_dir)? {
            let path = entry?.path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|s| s.eq_ignore_ascii_case("png"));
            if !is_png {
                continue;
            }
            let Some(material) = path
                .file_stem()
                .and_then(std::ffi::OsStr::to_str)
                .and_then(parse_cell_name)
            else {
                warn!("atlas: skipping {} (expected <col>_<row>.png)", path.display());
                continue;
            };
            let tile = match image::open(&path) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    warn!("atlas: failed to decode {}: {e}", path.display());
                    continue;
                }
            };
            let tile = if tile.dimensions() == (cell_px, cell_px) {
                tile
            } else {
                imageops::resize(&tile, cell_px, cell_px, FilterType::Nearest)
            };
            let origin = cell_pixel_origin(material, cell_px);
            imageops::replace(&mut atlas, &tile, i64::from(origin.0), i64::from(origin.1));
            placed += 1;
        }

        if placed == 0 {
            return Err(format!("no atlas tiles found in {}", tile_dir.display()).into());
        }
        info!("atlas: packed {placed} tiles from {}", tile_dir.display());
        ImageAtlas::from_image(atlas)
    }

    /// Synthesize a fallback atlas for the preview materials.
    ///
    /// Grass tops are grayscale speckle so the vertex tint colors them;
    /// stone, dirt, grass sides and sand carry their own colors. The water
    /// cell is filled too, although its color is never shown.
    ///
    /// # Errors
    /// Returns an `Err` only when `cell_px` is zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn procedural(cell_px: u32, seed: u32) -> Result<ImageAtlas, Box<dyn std::error::Error>> {
        if cell_px == 0 {
            return Err("cell size must be at least one texel".into());
        }
        let side = cell_px * ATLAS_GRID as u32;
        let mut atlas = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));
        let perlin = Perlin::new(seed);

        let speckle = |x: u32, y: u32, salt: f64| -> f32 {
            let n = perlin.get([f64::from(x) * 0.45 + salt, f64::from(y) * 0.45 - salt]);
            ((n * 0.5 + 0.5).clamp(0.0, 1.0)) as f32
        };
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;

        let palette: [(MaterialId, [f32; 3], bool); 6] = [
            (GRASS_TOP, [0.78, 0.78, 0.78], true),
            (STONE, [0.50, 0.50, 0.54], false),
            (DIRT, [0.47, 0.33, 0.22], false),
            (GRASS_SIDE, [0.42, 0.45, 0.20], false),
            (SAND, [0.86, 0.80, 0.58], false),
            (MaterialId::WATER, [0.20, 0.40, 0.60], false),
        ];

        for (salt, (material, base, gray)) in palette.iter().enumerate() {
            let (ox, oy) = cell_pixel_origin(*material, cell_px);
            for y in 0..cell_px {
                for x in 0..cell_px {
                    let n = speckle(ox + x, oy + y, salt as f64 * 17.0);
                    let shade = 0.82 + n * 0.3;
                    let px = if *gray {
                        let v = to_u8(base[0] * shade);
                        Rgba([v, v, v, 255])
                    } else {
                        Rgba([
                            to_u8(base[0] * shade),
                            to_u8(base[1] * shade),
                            to_u8(base[2] * shade),
                            255,
                        ])
                    };
                    atlas.put_pixel(ox + x, oy + y, px);
                }
            }
        }

        ImageAtlas::from_image(atlas)
    }
}

/// Parse a tile stem like `"15_13"` into its cell.
fn parse_cell_name(stem: &str) -> Option<MaterialId> {
    let (col, row) = stem.split_once('_')?;
    let id = MaterialId::new(col.trim().parse().ok()?, row.trim().parse().ok()?);
    id.is_valid().then_some(id)
}

#[allow(clippy::cast_sign_loss)] // valid ids are non-negative
fn cell_pixel_origin(material: MaterialId, cell_px: u32) -> (u32, u32) {
    (material.x as u32 * cell_px, material.y as u32 * cell_px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{atlas_coord, AtlasSampler};
    use bevy::math::Vec2;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn parses_cell_names() {
        assert_eq!(parse_cell_name("15_13"), Some(MaterialId::WATER));
        assert_eq!(parse_cell_name("0_0"), Some(GRASS_TOP));
        assert_eq!(parse_cell_name("16_0"), None);
        assert_eq!(parse_cell_name("grass"), None);
        assert_eq!(parse_cell_name("a_b"), None);
    }

    #[test]
    fn procedural_atlas_has_gray_grass_and_transparent_gaps() {
        let atlas = AtlasBuilder::procedural(8, 7).expect("procedural atlas");
        assert_eq!(atlas.cell_size(), (8, 8));

        let grass = atlas.sample(atlas_coord(GRASS_TOP, Vec2::splat(0.5)));
        assert_eq!(grass.x, grass.y);
        assert_eq!(grass.y, grass.z);
        assert_eq!(grass.w, 1.0);

        let dirt = atlas.sample(atlas_coord(DIRT, Vec2::splat(0.5)));
        assert!(dirt.x > dirt.z);

        let unused = atlas.sample(atlas_coord(MaterialId::new(9, 9), Vec2::splat(0.5)));
        assert_eq!(unused.w, 0.0);
    }

    #[test]
    fn zero_cell_size_is_rejected() {
        assert!(AtlasBuilder::procedural(0, 1).is_err());
        assert!(AtlasBuilder::build_grid_from_directory(Path::new("."), 0).is_err());
    }

    #[test]
    fn grid_builder_places_tiles_by_name() {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("voxshade_atlas_test_{epoch}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        RgbaImage::from_pixel(4, 4, Rgba([10, 200, 30, 255]))
            .save(dir.join("2_1.png"))
            .expect("write tile");
        // wrong size, gets resized to the cell
        RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]))
            .save(dir.join("15_13.png"))
            .expect("write tile");
        fs::write(dir.join("notes.txt"), "ignored").expect("write note");

        let atlas = AtlasBuilder::build_grid_from_directory(&dir, 4).expect("grid atlas");
        let _ = fs::remove_dir_all(&dir);

        let tile = atlas.sample(atlas_coord(SAND, Vec2::splat(0.5)));
        assert_eq!(tile.y, 200.0 / 255.0);
        let water = atlas.sample(atlas_coord(MaterialId::WATER, Vec2::splat(0.9)));
        assert_eq!(water, bevy::math::Vec4::ONE);
        let empty = atlas.sample(atlas_coord(STONE, Vec2::splat(0.5)));
        assert_eq!(empty.w, 0.0);
    }
}
