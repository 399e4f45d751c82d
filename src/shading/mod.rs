//! The voxel fragment pipeline.
//!
//! [`shade_fragment`] is a pure function of one [`FragmentInput`] and the
//! per-draw [`ShadingContext`]. Stages run in a fixed order:
//!
//! 1. perspective divide and wrap of the texture coordinate,
//! 2. lighting (darkness, jitter, rim) and the atlas lookup,
//! 3. recolor against the vertex tint,
//! 4. the water synthesizer for the water cell,
//! 5. the global alpha test,
//! 6. the cursor highlight.
//!
//! A discard is carried as [`FragmentOutput::Discarded`] and short-circuits
//! the remaining stages.

use bevy::math::{Vec2, Vec3, Vec4};
use bevy::prelude::Resource;
use rayon::prelude::*;

use crate::atlas::{atlas_coord, perspective_uv, wrap_uv, AtlasSampler, MaterialId};
use crate::settings::ShadingTuning;
use crate::{highlight, lighting, water};

/// Fragments with alpha strictly below this are dropped.
pub const ALPHA_CUTOFF: f32 = 0.1;

/// Per-fragment attributes, already interpolated by the geometry stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FragmentInput {
    pub material: MaterialId,
    pub uv: Vec2,         // Texture coordinate pre-multiplied by `clip_w`.
    pub world_pos: Vec3,
    pub light: Vec3,      // Baked light; may exceed 1.
    pub color: Vec4,      // Vertex tint.
    pub clip_w: f32,      // Perspective divisor, positive.
}

/// Per-frame uniforms shared by every fragment of a draw.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Default)]
pub struct FrameUniforms {
    pub time: f32,
    pub camera_pos: Vec3,
    pub cursor_pos: Vec3,
}

/// Immutable per-draw context: atlas, uniforms and tuning.
pub struct ShadingContext<'a, A: AtlasSampler + ?Sized> {
    pub atlas: &'a A,
    pub frame: FrameUniforms,
    pub tuning: ShadingTuning,
}

impl<'a, A: AtlasSampler + ?Sized> ShadingContext<'a, A> {
    #[must_use]
    pub fn new(atlas: &'a A, frame: FrameUniforms, tuning: ShadingTuning) -> Self {
        Self { atlas, frame, tuning }
    }
}

/// Result of shading one fragment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FragmentOutput {
    Visible(Vec4),
    Discarded,
}

impl FragmentOutput {
    /// Chain a stage that may itself discard.
    #[must_use]
    pub fn and_then(self, f: impl FnOnce(Vec4) -> FragmentOutput) -> FragmentOutput {
        match self {
            FragmentOutput::Visible(c) => f(c),
            FragmentOutput::Discarded => FragmentOutput::Discarded,
        }
    }

    /// Transform a visible color.
    #[must_use]
    pub fn map(self, f: impl FnOnce(Vec4) -> Vec4) -> FragmentOutput {
        self.and_then(|c| FragmentOutput::Visible(f(c)))
    }

    /// Clamp every channel to `[0, 1]`, as the framebuffer would.
    #[must_use]
    pub fn clamped(self) -> FragmentOutput {
        self.map(|c| c.clamp(Vec4::ZERO, Vec4::ONE))
    }

    #[must_use]
    pub fn is_discarded(self) -> bool {
        matches!(self, FragmentOutput::Discarded)
    }

    #[must_use]
    pub fn color(self) -> Option<Vec4> {
        match self {
            FragmentOutput::Visible(c) => Some(c),
            FragmentOutput::Discarded => None,
        }
    }
}

/// Drop fragments below [`ALPHA_CUTOFF`].
#[inline]
#[must_use]
pub fn alpha_test(color: Vec4) -> FragmentOutput {
    if color.w < ALPHA_CUTOFF {
        FragmentOutput::Discarded
    } else {
        FragmentOutput::Visible(color)
    }
}

/// Shade one voxel fragment.
///
/// # Arguments
/// * `input` - interpolated fragment attributes.
/// * `ctx` - atlas, frame uniforms and tuning for this draw.
///
/// # Return
/// The unclamped RGBA color, or `Discarded`. Use
/// [`FragmentOutput::clamped`] for the value a framebuffer would store.
#[must_use]
pub fn shade_fragment<A: AtlasSampler + ?Sized>(
    input: &FragmentInput,
    ctx: &ShadingContext<'_, A>,
) -> FragmentOutput {
    let frame = &ctx.frame;
    let local = wrap_uv(perspective_uv(input.uv, input.clip_w));
    let lit = lighting::apply(local, input.world_pos, input.light, frame.time, &ctx.tuning);
    let sample = ctx.atlas.sample(atlas_coord(input.material, lit.local_uv));
    let base = FragmentOutput::Visible(lighting::recolor(sample, input.color, lit.darkness));

    let surfaced = if input.material == MaterialId::WATER {
        base.and_then(|_| water::shade(input.world_pos, frame))
    } else {
        base
    };

    surfaced
        .and_then(alpha_test)
        .map(|c| highlight::apply(c, input.world_pos, frame.cursor_pos, &ctx.tuning))
}

/// Shade a batch of fragments on the rayon pool.
///
/// Output order matches `inputs`.
#[must_use]
pub fn shade_batch<A: AtlasSampler + Sync + ?Sized>(
    inputs: &[FragmentInput],
    ctx: &ShadingContext<'_, A>,
) -> Vec<FragmentOutput> {
    inputs.par_iter().map(|input| shade_fragment(input, ctx)).collect()
}
