//! Text variant of the fragment shader.
//!
//! Text meshes reuse the voxel vertex layout with different meaning: the
//! vertex color is the glyph (foreground) color and the light vector carries
//! the background color. Glyph cells are 8 texels wide, and each glyph
//! casts a one-texel drop shadow down and to the right, found by looking
//! one texel back toward the origin.

use bevy::math::{Vec2, Vec3, Vec4};

use crate::atlas::{atlas_coord, perspective_uv, wrap_uv, AtlasSampler, MaterialId};
use crate::shading::FragmentOutput;

/// One texel of an 8-texel glyph cell in atlas coordinates.
pub const SHADOW_OFFSET: f32 = 1.0 / (16.0 * 8.0);

/// Glyph and shadow coverage at or above this is opaque.
pub const GLYPH_ALPHA_CUTOFF: f32 = 0.5;

/// Shade one text fragment.
///
/// # Arguments
/// * `atlas` - glyph atlas.
/// * `material` - glyph cell.
/// * `uv` - texture coordinate pre-scaled by `clip_w`.
/// * `clip_w` - perspective divisor, positive.
/// * `light` - background (shadow) color.
/// * `color` - foreground color.
///
/// # Return
/// The foreground color on glyph texels, the background color with the
/// foreground alpha on shadow texels, and `Discarded` elsewhere.
#[must_use]
pub fn shade_text_fragment<A: AtlasSampler + ?Sized>(
    atlas: &A,
    material: MaterialId,
    uv: Vec2,
    clip_w: f32,
    light: Vec3,
    color: Vec4,
) -> FragmentOutput {
    let coord = atlas_coord(material, wrap_uv(perspective_uv(uv, clip_w)));

    if atlas.sample(coord).w >= GLYPH_ALPHA_CUTOFF {
        return FragmentOutput::Visible(color);
    }
    if atlas.sample(coord - Vec2::splat(SHADOW_OFFSET)).w >= GLYPH_ALPHA_CUTOFF {
        return FragmentOutput::Visible(light.extend(color.w));
    }
    FragmentOutput::Discarded
}
