//! Offline preview renderer.
//!
//! Renders a top-down orthographic view of a generated terrain patch through
//! the fragment pipeline on the CPU. Every pixel produces a floor fragment
//! (the top face of its terrain column) and, where the column is below sea
//! level, a water fragment on the sea-level plane above it. Visible water
//! replaces the floor; everything discarded shows the sky color.
//!
//! The light vectors follow the mesher's rules: each corner of a top face is
//! darkened by the number of solid neighbours above it, and faces covered by
//! water get the water occlusion filter, which is what sends them down the
//! jitter and rim path.

use bevy::math::{Vec2, Vec3, Vec4};
use bevy::prelude::info;
use image::{Rgba, RgbaImage};
use noise::{NoiseFn, Perlin};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::atlas::builder::{GRASS_TOP, SAND, STONE};
use crate::atlas::{AtlasSampler, MaterialId};
use crate::debug::{record_thread_once, FragmentCounts};
use crate::highlight::is_highlighted;
use crate::settings::{PreviewSettings, ShadingTuning};
use crate::shading::{shade_fragment, FragmentInput, FragmentOutput, FrameUniforms, ShadingContext};

/// Light levels by number of occluding neighbours (0, 1, 2, 3+).
pub const OCCLUSION_LEVELS: [f32; 4] = [0.975, 0.8, 0.7, 0.65];

/// Vertex tint for grass tops.
pub const GRASS_TINT: Vec4 = Vec4::new(0.36, 0.62, 0.1, 1.0);

/// Shown where every fragment of a pixel was discarded.
pub const SKY_COLOR: Vec3 = Vec3::new(0.53, 0.81, 0.92);

const TERRAIN_SCALE: f64 = 0.045;
const DETAIL_SCALE: f64 = 0.17;

/// Light of one corner with `occluders` solid neighbours above it.
#[must_use]
pub fn occlusion_light(occluders: usize) -> Vec3 {
    Vec3::splat(OCCLUSION_LEVELS[occluders.min(3)])
}

/// Blue shift applied to faces whose neighbour across the face is water.
///
/// Blue is derived from green, so any positive light ends up with blue above
/// red.
#[must_use]
pub fn water_filter(light: Vec3) -> Vec3 {
    Vec3::new(light.x, light.y * 1.1, light.y * 1.5)
}

/// Column heights of a terrain patch, in blocks.
///
/// A column of height `h` is solid below `y = h`; its top face lies at
/// `y = h`.
#[derive(Clone, Debug)]
pub struct TerrainPatch {
    heights: Vec<i32>,
    size_x: i32,
    size_z: i32,
    sea_level: i32,
    stone_level: i32,
}

impl TerrainPatch {
    /// Generate a patch from Perlin noise.
    ///
    /// # Arguments
    /// * `size_x`, `size_z` - patch size in blocks; world coordinates run
    ///   from 0 to the size on each axis.
    /// * `seed` - noise seed.
    /// * `sea_level` - water surface height; heights vary around it.
    /// * `amplitude` - maximum height deviation from sea level.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn generate(size_x: u32, size_z: u32, seed: u32, sea_level: i32, amplitude: f32) -> Self {
        let perlin = Perlin::new(seed);
        let size_x = size_x.max(1) as i32;
        let size_z = size_z.max(1) as i32;
        let mut heights = Vec::with_capacity((size_x * size_z) as usize);
        for z in 0..size_z {
            for x in 0..size_x {
                let (fx, fz) = (f64::from(x), f64::from(z));
                let n = perlin.get([fx * TERRAIN_SCALE, fz * TERRAIN_SCALE]) * 0.8
                    + perlin.get([fx * DETAIL_SCALE + 31.7, fz * DETAIL_SCALE - 12.9]) * 0.2;
                let offset = (n * f64::from(amplitude) * 1.6).round() as i32;
                heights.push(sea_level + offset);
            }
        }
        Self {
            heights,
            size_x,
            size_z,
            sea_level,
            stone_level: sea_level + (amplitude * 0.6).round() as i32,
        }
    }

    /// Build a patch from explicit heights (row-major by z, then x).
    ///
    /// # Errors
    /// Returns an `Err` when `heights` does not hold `size_x * size_z` values.
    pub fn from_heights(
        size_x: u32,
        size_z: u32,
        heights: Vec<i32>,
        sea_level: i32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let expected = size_x as usize * size_z as usize;
        if expected == 0 || heights.len() != expected {
            return Err(format!("expected {expected} heights, got {}", heights.len()).into());
        }
        Ok(Self {
            heights,
            size_x: i32::try_from(size_x)?,
            size_z: i32::try_from(size_z)?,
            sea_level,
            stone_level: i32::MAX,
        })
    }

    #[must_use]
    pub fn size(&self) -> (i32, i32) {
        (self.size_x, self.size_z)
    }

    /// Height of a column; coordinates outside the patch clamp to its edge.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn height(&self, x: i32, z: i32) -> i32 {
        let x = x.clamp(0, self.size_x - 1);
        let z = z.clamp(0, self.size_z - 1);
        self.heights[(z * self.size_x + x) as usize]
    }

    /// Whether the block at `(x, y, z)` is solid.
    #[must_use]
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        y < self.height(x, z)
    }

    /// Surface material and vertex tint of a column top.
    #[must_use]
    pub fn top_material(&self, height: i32) -> (MaterialId, Vec4) {
        if height <= self.sea_level + 1 {
            (SAND, Vec4::ONE)
        } else if height >= self.stone_level {
            (STONE, Vec4::ONE)
        } else {
            (GRASS_TOP, GRASS_TINT)
        }
    }

    /// Occluder count of the four top-face corners of column `(x, z)`.
    ///
    /// Corners are ordered `(-x,-z)`, `(+x,-z)`, `(+x,+z)`, `(-x,+z)`; each
    /// counts the solid blocks among the three neighbours sharing that corner
    /// in the layer just above the face.
    #[must_use]
    pub fn corner_occlusion(&self, x: i32, z: i32) -> [usize; 4] {
        let above = self.height(x, z);
        let solid = |dx: i32, dz: i32| usize::from(self.is_solid(x + dx, above, z + dz));
        [(-1, -1), (1, -1), (1, 1), (-1, 1)].map(|(sx, sz)| solid(sx, 0) + solid(0, sz) + solid(sx, sz))
    }

    /// Light at a point on the top face of column `(x, z)`.
    ///
    /// The four corner levels are blended bilinearly across the face, the
    /// way vertex attributes interpolate.
    #[must_use]
    pub fn top_light(&self, x: i32, z: i32, local: Vec2) -> Vec3 {
        let [c00, c10, c11, c01] = self.corner_occlusion(x, z).map(occlusion_light);
        let near = c00.lerp(c10, local.x);
        let far = c01.lerp(c11, local.x);
        let light = near.lerp(far, local.y);
        if self.height(x, z) < self.sea_level {
            water_filter(light)
        } else {
            light
        }
    }

    /// The floor fragment seen at world `(wx, wz)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn floor_fragment(&self, wx: f32, wz: f32) -> FragmentInput {
        let (cx, cz) = (wx.floor() as i32, wz.floor() as i32);
        let h = self.height(cx, cz);
        let (material, color) = self.top_material(h);
        let local = Vec2::new(wx - wx.floor(), wz - wz.floor());
        FragmentInput {
            material,
            uv: Vec2::new(wx, wz),
            world_pos: Vec3::new(wx, h as f32, wz),
            light: self.top_light(cx, cz, local),
            color,
            clip_w: 1.0,
        }
    }

    /// The water-surface fragment at world `(wx, wz)`, if the column is
    /// submerged.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn water_fragment(&self, wx: f32, wz: f32) -> Option<FragmentInput> {
        let h = self.height(wx.floor() as i32, wz.floor() as i32);
        (h < self.sea_level).then(|| FragmentInput {
            material: MaterialId::WATER,
            uv: Vec2::new(wx, wz),
            world_pos: Vec3::new(wx, self.sea_level as f32, wz),
            light: occlusion_light(0),
            color: Vec4::ONE,
            clip_w: 1.0,
        })
    }
}

/// Composite one pixel: visible water over the floor over the sky.
#[must_use]
pub fn composite(floor: FragmentOutput, water: Option<FragmentOutput>) -> Vec3 {
    if let Some(c) = water.and_then(|w| w.clamped().color()) {
        return c.truncate();
    }
    floor
        .clamped()
        .color()
        .map_or(SKY_COLOR, |c| c.truncate() * c.w + SKY_COLOR * (1.0 - c.w))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_rgba8(c: Vec3) -> Rgba<u8> {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([q(c.x), q(c.y), q(c.z), 255])
}

fn count_fragment<A: AtlasSampler + ?Sized>(
    counts: &mut FragmentCounts,
    input: &FragmentInput,
    output: FragmentOutput,
    ctx: &ShadingContext<'_, A>,
) {
    let highlighted = is_highlighted(input.world_pos, ctx.frame.cursor_pos, ctx.tuning.highlight_margin);
    counts.record(input.material, output, highlighted);
}

/// A rendered frame and what its fragments did.
pub struct RenderedFrame {
    pub image: RgbaImage,
    pub counts: FragmentCounts,
    pub elapsed: Duration,
}

/// Top-down preview of a terrain patch.
pub struct PreviewRenderer {
    settings: PreviewSettings,
    terrain: TerrainPatch,
}

impl PreviewRenderer {
    /// Generate the terrain for `settings` and prepare the renderer.
    #[must_use]
    pub fn new(settings: &PreviewSettings) -> Self {
        let ppb = settings.pixels_per_block.max(1);
        let size_x = settings.width.div_ceil(ppb);
        let size_z = settings.height.div_ceil(ppb);
        let terrain = TerrainPatch::generate(
            size_x,
            size_z,
            settings.seed,
            settings.sea_level,
            settings.terrain_amplitude,
        );
        Self::with_terrain(settings, terrain)
    }

    #[must_use]
    pub fn with_terrain(settings: &PreviewSettings, terrain: TerrainPatch) -> Self {
        let mut settings = settings.clone();
        settings.pixels_per_block = settings.pixels_per_block.max(1);
        Self { settings, terrain }
    }

    #[must_use]
    pub fn terrain(&self) -> &TerrainPatch {
        &self.terrain
    }

    /// World `(x, z)` at the centre of pixel `(px, py)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_to_world(&self, px: u32, py: u32) -> Vec2 {
        (Vec2::new(px as f32, py as f32) + 0.5) / self.settings.pixels_per_block as f32
    }

    /// Camera position above the centre of the view.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn camera_pos(&self) -> Vec3 {
        let centre = self.pixel_to_world(self.settings.width / 2, self.settings.height / 2);
        Vec3::new(
            centre.x,
            self.settings.sea_level as f32 + self.settings.camera_height,
            centre.y,
        )
    }

    /// Uniforms for frame number `index`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_uniforms(&self, index: u32) -> FrameUniforms {
        FrameUniforms {
            time: self.settings.start_time + index as f32 * self.settings.time_step,
            camera_pos: self.camera_pos(),
            cursor_pos: self.settings.cursor_pos(),
        }
    }

    /// Shade every pixel of one frame, rows in parallel.
    pub fn render_frame<A: AtlasSampler + Sync + ?Sized>(
        &self,
        atlas: &A,
        frame: FrameUniforms,
        tuning: ShadingTuning,
    ) -> RenderedFrame {
        let start = Instant::now();
        let width = self.settings.width.max(1);
        let height = self.settings.height.max(1);
        let mut image = RgbaImage::new(width, height);
        let ctx = ShadingContext::new(atlas, frame, tuning);
        let row_len = width as usize * 4;

        let counts = image
            .par_chunks_mut(row_len)
            .enumerate()
            .map(|(py, row)| {
                record_thread_once("preview_rows");
                let mut counts = FragmentCounts::default();
                #[allow(clippy::cast_possible_truncation)]
                let py = py as u32;
                for (px, pixel) in (0..width).zip(row.chunks_exact_mut(4)) {
                    let w = self.pixel_to_world(px, py);
                    let floor_in = self.terrain.floor_fragment(w.x, w.y);
                    let floor = shade_fragment(&floor_in, &ctx);
                    count_fragment(&mut counts, &floor_in, floor, &ctx);

                    let water = self.terrain.water_fragment(w.x, w.y).map(|water_in| {
                        let out = shade_fragment(&water_in, &ctx);
                        count_fragment(&mut counts, &water_in, out, &ctx);
                        out
                    });
                    pixel.copy_from_slice(&to_rgba8(composite(floor, water)).0);
                }
                counts
            })
            .reduce(FragmentCounts::default, |mut a, b| {
                a.merge(&b);
                a
            });

        RenderedFrame {
            image,
            counts,
            elapsed: start.elapsed(),
        }
    }

    /// Directory frames are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        Path::new(&self.settings.output_dir)
    }
}

/// Write a frame as `frame-NNNN.png` into `dir`.
///
/// # Errors
/// Returns an `Err` if the directory cannot be created or the PNG cannot be
/// encoded.
pub fn write_frame(image: &RgbaImage, dir: &Path, index: u32) -> Result<PathBuf, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("frame-{index:04}.png"));
    image.save(&path)?;
    info!("preview: wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::PaletteAtlas;
    use crate::lighting::receives_jitter;
    use crate::water;

    fn flat_patch(height: i32, sea_level: i32) -> TerrainPatch {
        TerrainPatch::from_heights(4, 4, vec![height; 16], sea_level).expect("heights")
    }

    fn small_settings() -> PreviewSettings {
        PreviewSettings {
            width: 32,
            height: 32,
            pixels_per_block: 8,
            ..PreviewSettings::default()
        }
    }

    #[test]
    fn occlusion_levels_follow_the_neighbour_count() {
        assert_eq!(occlusion_light(0), Vec3::splat(0.975));
        assert_eq!(occlusion_light(1), Vec3::splat(0.8));
        assert_eq!(occlusion_light(2), Vec3::splat(0.7));
        assert_eq!(occlusion_light(3), Vec3::splat(0.65));
        assert_eq!(occlusion_light(7), Vec3::splat(0.65));
    }

    #[test]
    fn water_filter_turns_light_blue() {
        for level in OCCLUSION_LEVELS {
            let light = water_filter(Vec3::splat(level));
            assert!(receives_jitter(light));
            assert!((light.z - level * 1.5).abs() < 1e-6);
        }
        assert!(!receives_jitter(occlusion_light(0)));
    }

    #[test]
    fn corners_count_taller_neighbours() {
        // centre column lower than the one at +x
        let mut heights = vec![5; 9];
        heights[5] = 6; // (x=2, z=1)
        let patch = TerrainPatch::from_heights(3, 3, heights, 0).expect("heights");
        assert_eq!(patch.corner_occlusion(1, 1), [0, 1, 1, 0]);
        assert_eq!(flat_patch(5, 0).corner_occlusion(1, 1), [0; 4]);
    }

    #[test]
    fn only_submerged_columns_have_water() {
        let dry = flat_patch(9, 8);
        assert!(dry.water_fragment(1.5, 1.5).is_none());
        assert!(!receives_jitter(dry.floor_fragment(1.5, 1.5).light));

        let wet = flat_patch(5, 8);
        let water_in = wet.water_fragment(1.5, 1.5).expect("water");
        assert_eq!(water_in.material, MaterialId::WATER);
        assert_eq!(water_in.world_pos.y, 8.0);
        let floor_in = wet.floor_fragment(1.5, 1.5);
        assert_eq!(floor_in.material, SAND);
        assert!(receives_jitter(floor_in.light));
    }

    #[test]
    fn heights_must_match_the_patch_size() {
        assert!(TerrainPatch::from_heights(4, 4, vec![1; 15], 0).is_err());
        assert!(TerrainPatch::from_heights(0, 4, Vec::new(), 0).is_err());
    }

    #[test]
    fn generated_terrain_is_seeded() {
        let a = TerrainPatch::generate(16, 16, 7, 8, 6.0);
        let b = TerrainPatch::generate(16, 16, 7, 8, 6.0);
        for z in 0..16 {
            for x in 0..16 {
                assert_eq!(a.height(x, z), b.height(x, z));
            }
        }
    }

    #[test]
    fn composite_prefers_visible_water() {
        let floor = FragmentOutput::Visible(Vec4::new(0.2, 0.3, 0.4, 1.0));
        let water = FragmentOutput::Visible(Vec4::new(0.1, 0.5, 0.6, 1.0));
        assert_eq!(composite(floor, Some(water)), Vec3::new(0.1, 0.5, 0.6));
        assert_eq!(composite(floor, Some(FragmentOutput::Discarded)), Vec3::new(0.2, 0.3, 0.4));
        assert_eq!(composite(FragmentOutput::Discarded, None), SKY_COLOR);
    }

    #[test]
    fn translucent_floor_blends_with_the_sky() {
        let floor = FragmentOutput::Visible(Vec4::new(0.0, 0.0, 0.0, 0.5));
        let c = composite(floor, None);
        assert!((c - SKY_COLOR * 0.5).abs().max_element() < 1e-6);
    }

    #[test]
    fn rendered_frame_counts_every_fragment() {
        let settings = small_settings();
        let renderer = PreviewRenderer::with_terrain(&settings, flat_patch(5, 8));
        let atlas = PaletteAtlas::filled(Vec4::new(0.7, 0.6, 0.5, 1.0));
        let frame = renderer.frame_uniforms(0);

        let rendered = renderer.render_frame(&atlas, frame, ShadingTuning::default());
        assert_eq!(rendered.image.dimensions(), (32, 32));
        // every pixel has a floor and a water fragment
        assert_eq!(rendered.counts.fragments, 2 * 32 * 32);
        assert_eq!(rendered.counts.water_visible + rendered.counts.water_discarded, 32 * 32);

        // pixels agree with the water stage
        let w = renderer.pixel_to_world(3, 5);
        let water_in = renderer.terrain().water_fragment(w.x, w.y).expect("water");
        let sample = water::evaluate(water_in.world_pos, frame.time, frame.camera_pos);
        if !sample.is_discarded() {
            assert_eq!(*rendered.image.get_pixel(3, 5), to_rgba8(sample.color().truncate()));
        }
    }

    #[test]
    fn rendering_is_reproducible() {
        let settings = small_settings();
        let renderer = PreviewRenderer::new(&settings);
        let atlas = PaletteAtlas::filled(Vec4::new(0.8, 0.8, 0.8, 1.0));
        let frame = renderer.frame_uniforms(3);
        let a = renderer.render_frame(&atlas, frame, ShadingTuning::default());
        let b = renderer.render_frame(&atlas, frame, ShadingTuning::default());
        assert_eq!(a.image, b.image);
        assert_eq!(a.counts, b.counts);
    }

    #[test]
    fn frame_time_advances_by_the_step() {
        let renderer = PreviewRenderer::new(&small_settings());
        let f0 = renderer.frame_uniforms(0);
        let f2 = renderer.frame_uniforms(2);
        assert_eq!(f2.time - f0.time, 0.5);
        assert_eq!(f0.camera_pos, f2.camera_pos);
    }
}
