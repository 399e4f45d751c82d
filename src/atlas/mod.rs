//! Atlas: cell addressing and sampling for the shared 16×16 material atlas.
//!
//! Every material lives in one equally sized cell of a single atlas image.
//! A material is addressed by its `(column, row)` pair and a fragment's
//! local texture coordinate is wrapped into its cell, so tiling surfaces
//! repeat the cell without ever reading a neighbour.
//!
//! The sampler itself is an opaque capability ([`AtlasSampler`]) so the
//! shading core does not care whether texels come from a decoded PNG
//! ([`ImageAtlas`]) or from a flat synthetic palette ([`PaletteAtlas`]).

use bevy::math::{Vec2, Vec4};

use crate::noise_field::fract2;

/// Number of cells along each atlas axis.
pub const ATLAS_GRID: i32 = 16;

/// Total number of material cells in the atlas.
pub const ATLAS_CELLS: usize = (ATLAS_GRID * ATLAS_GRID) as usize;

/// Width of one cell in normalized atlas coordinates.
pub const CELL_SPAN: f32 = 1.0 / ATLAS_GRID as f32;

/// Largest `f32` below 1.
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// A material identifier: the `(column, row)` of its atlas cell.
///
/// Valid identifiers have both components in `[0, 15]`. The geometry stage
/// is responsible for never emitting anything else; the shading core only
/// checks it in debug builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MaterialId {
    pub x: i32, // Atlas column.
    pub y: i32, // Atlas row.
}

impl MaterialId {
    /// The animated water surface. Fragments with this id never show their
    /// atlas cell; the water synthesizer replaces the color entirely.
    pub const WATER: MaterialId = MaterialId::new(15, 13);

    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Whether both components address a real cell.
    #[must_use]
    pub fn is_valid(self) -> bool {
        (0..ATLAS_GRID).contains(&self.x) && (0..ATLAS_GRID).contains(&self.y)
    }

    /// Linear cell index in row-major order.
    ///
    /// # Return
    /// `Some(index)` in `[0, 256)` for valid ids, `None` otherwise.
    #[must_use]
    pub fn cell_index(self) -> Option<usize> {
        self.is_valid()
            .then(|| (self.y * ATLAS_GRID + self.x) as usize)
    }

    /// Top-left corner of the cell in normalized atlas coordinates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // components are in [0, 15]
    pub fn cell_origin(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32) * CELL_SPAN
    }
}

/// Undo the perspective pre-scale applied upstream.
///
/// The vertex stage multiplies the texture coordinate by the clip-space `w`
/// so that it interpolates linearly in screen space; dividing here restores
/// the local coordinate.
///
/// Callers guarantee `clip_w > 0`: degenerate geometry is culled before
/// shading. This is only asserted in debug builds.
#[inline]
#[must_use]
pub fn perspective_uv(uv: Vec2, clip_w: f32) -> Vec2 {
    debug_assert!(clip_w > 0.0, "clip_w must be positive, got {clip_w}");
    uv / clip_w
}

/// Wrap a local coordinate into `[0, 1)` on both axes.
///
/// Invariant under integer translation: `wrap_uv(uv)` and
/// `wrap_uv(uv + (3, -2))` are the same cell position. A tiny negative
/// input, whose floor-based fraction rounds to 1, is held just below 1.
#[inline]
#[must_use]
pub fn wrap_uv(uv: Vec2) -> Vec2 {
    fract2(uv).min(Vec2::splat(BELOW_ONE))
}

/// The largest `f32` strictly below a positive value.
#[inline]
fn next_below(x: f32) -> f32 {
    f32::from_bits(x.to_bits() - 1)
}

/// Absolute atlas coordinate for a wrapped local coordinate inside the cell of
/// `material`.
///
/// # Arguments
/// * `material` - the cell to address.
/// * `local` - position inside the cell, each axis in `[0, 1)`.
///
/// # Return
/// `material / 16 + local / 16`, which lies in
/// `[mx/16, (mx+1)/16) × [my/16, (my+1)/16)`. A local value close enough
/// to 1 that the sum rounds onto the next cell's edge is held on the last
/// float inside the cell.
#[inline]
#[must_use]
pub fn atlas_coord(material: MaterialId, local: Vec2) -> Vec2 {
    debug_assert!(material.is_valid(), "material id out of range: {material:?}");
    let origin = material.cell_origin();
    let end = origin + Vec2::splat(CELL_SPAN);
    let last = Vec2::new(next_below(end.x), next_below(end.y));
    (origin + local * CELL_SPAN).clamp(origin, last)
}

/// Read-only access to atlas texels.
///
/// `coord` is a normalized atlas coordinate (`[0, 1]` on both axes, origin at
/// the top-left). Implementations must be pure: the same coordinate always
/// returns the same RGBA value for the lifetime of a draw.
pub trait AtlasSampler {
    fn sample(&self, coord: Vec2) -> Vec4;
}

impl<T: AtlasSampler + ?Sized> AtlasSampler for &T {
    fn sample(&self, coord: Vec2) -> Vec4 {
        (**self).sample(coord)
    }
}

pub mod builder;
pub mod sampler;

pub use builder::AtlasBuilder;
pub use sampler::{ImageAtlas, PaletteAtlas};
