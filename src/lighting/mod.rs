//! Per-fragment lighting: darkness, water-side jitter, rim highlights and
//! the tint/preserve recolor decision.
//!
//! The light vector arrives from the mesher already baked (ambient
//! occlusion levels, plus a blue shift on faces that border water). It is
//! turned into an additive `darkness` term rather than a multiplier, so a
//! light component above 1 brightens.
//!
//! Faces whose light is bluer than it is red get a shimmering, texel-snapped
//! offset on their atlas lookup, and the horizontal ones among them also
//! pick up a warm mottled highlight. Both gates are heuristics over the
//! baked light and are exposed through [`ShadingTuning`].

use bevy::math::{Vec2, Vec3, Vec4};

use crate::noise_field::noise3;
use crate::settings::ShadingTuning;

/// Texels per block along each axis; jitter and rim noise are evaluated on
/// this grid so the effect stays pixel-aligned with the atlas.
pub const TEXELS_PER_BLOCK: f32 = 16.0;

/// Nudge applied before flooring world positions onto the texel grid so a
/// face lying exactly on a block boundary does not flicker between texels.
const TEXEL_BIAS: f32 = 0.01;

const JITTER_AMPLITUDE: f32 = 0.1;
const JITTER_TIME_SCALE: f32 = 0.5;
const JITTER_WARP: f32 = 8.0;

const RIM_SCALE: f32 = 0.5;
const RIM_TIME_SCALE: f32 = 0.8;
/// Time offset between the two rim samples.
pub const RIM_PHASE: f32 = 100.0;
/// Warm weighting of the rim highlight.
pub const RIM_TINT: Vec3 = Vec3::new(1.0, 0.5, 0.4);

/// Outcome of the lighting stage that the atlas lookup and recolor need.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingResult {
    pub local_uv: Vec2,  // Local cell coordinate after any jitter, in [0, 1).
    pub darkness: Vec3,  // Additive RGB correction.
}

/// Smoothstep between two edges, as the GPU defines it.
///
/// # Arguments
/// * `edge0`, `edge1` - interpolation range; `x <= edge0` gives 0 and
///   `x >= edge1` gives 1.
/// * `x` - value to map.
#[inline]
#[must_use]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Additive correction from the baked light: `light - 1` per channel.
#[inline]
#[must_use]
pub fn darkness(light: Vec3) -> Vec3 {
    light - Vec3::ONE
}

/// Whether the fragment takes the jitter (and possibly rim) treatment.
///
/// True when red is strictly below blue, which is how the mesher marks faces
/// next to water.
#[inline]
#[must_use]
pub fn receives_jitter(light: Vec3) -> bool {
    light.x < light.z
}

/// Whether `world_y` lies on a horizontal block boundary, i.e. the fragment
/// belongs to a top or bottom face.
#[inline]
#[must_use]
pub fn on_horizontal_face(world_y: f32, epsilon: f32) -> bool {
    (world_y - world_y.floor()).abs() < epsilon
}

#[inline]
fn texel_position(world_pos: Vec3) -> Vec3 {
    (world_pos * TEXELS_PER_BLOCK + Vec3::splat(TEXEL_BIAS)).floor()
}

#[inline]
fn snap_to_texel(v: f32) -> f32 {
    (v * TEXELS_PER_BLOCK).floor() / TEXELS_PER_BLOCK
}

/// Texel-snapped, time-varying offset for the atlas lookup.
///
/// Each component is `noise3(..) * 0.1` floored onto the 1/16 grid, so it
/// is either 0 or one texel.
#[must_use]
pub fn jitter_offset(world_pos: Vec3, time: f32) -> Vec2 {
    let texel = texel_position(world_pos);
    let noise_t = noise3(Vec3::new(
        texel.x * 0.1,
        texel.z * 0.1,
        time * JITTER_TIME_SCALE,
    ));
    let dx = noise3(texel + Vec3::new(noise_t * JITTER_WARP, 0.0, time)) * JITTER_AMPLITUDE;
    let dy = noise3(texel + Vec3::new(0.0, noise_t * JITTER_WARP, time + 37.0)) * JITTER_AMPLITUDE;
    Vec2::new(snap_to_texel(dx), snap_to_texel(dy))
}

/// Warm rim highlight added to `darkness` on horizontal faces.
///
/// Two noise samples `RIM_PHASE` seconds apart are averaged and folded to
/// `max(0.5 - |avg|, 0)`; the result is weighted by [`RIM_TINT`].
#[must_use]
pub fn rim_highlight(world_pos: Vec3, time: f32) -> Vec3 {
    let texel = texel_position(world_pos);
    let at = |t: f32| {
        noise3(Vec3::new(
            texel.x * RIM_SCALE,
            texel.z * RIM_SCALE,
            t * RIM_TIME_SCALE,
        ))
    };
    let avg = (at(time) + at(time + RIM_PHASE)) * 0.5;
    let sample = (0.5 - avg.abs()).max(0.0);
    RIM_TINT * sample
}

/// Run the lighting stage for one fragment.
///
/// # Arguments
/// * `local_uv` - wrapped coordinate inside the material cell.
/// * `world_pos` - fragment world position.
/// * `light` - baked light vector.
/// * `time` - frame time in seconds.
/// * `tuning` - gate switches and thresholds.
///
/// # Return
/// The (possibly jittered) local coordinate and the darkness term. A jittered
/// coordinate is clamped to `[0, tuning.jitter_clamp]` so it never leaves its
/// cell.
#[must_use]
pub fn apply(
    local_uv: Vec2,
    world_pos: Vec3,
    light: Vec3,
    time: f32,
    tuning: &ShadingTuning,
) -> LightingResult {
    let mut result = LightingResult {
        local_uv,
        darkness: darkness(light),
    };

    if !(tuning.jitter_enabled && receives_jitter(light)) {
        return result;
    }

    result.local_uv = (local_uv + jitter_offset(world_pos, time))
        .clamp(Vec2::ZERO, Vec2::splat(tuning.jitter_clamp));

    if tuning.rim_enabled && on_horizontal_face(world_pos.y, tuning.top_face_epsilon) {
        result.darkness += rim_highlight(world_pos, time);
    }

    result
}

/// Whether an atlas texel is exactly gray (bit-identical R, G and B).
#[inline]
#[must_use]
#[allow(clippy::float_cmp)]
pub fn is_grayscale(sample: Vec4) -> bool {
    sample.x == sample.y && sample.y == sample.z
}

/// Combine the atlas sample, vertex tint and darkness.
///
/// Gray cells are tintable: the vertex color supplies the hue and the cell
/// only shades it (`vertex + (sample - 1) + darkness`). Colored cells keep
/// their own color (`sample + darkness`). Alpha always comes from the
/// sample.
#[must_use]
pub fn recolor(sample: Vec4, vertex_color: Vec4, darkness: Vec3) -> Vec4 {
    let rgb = if is_grayscale(sample) {
        let offset = sample.truncate() - Vec3::ONE;
        vertex_color.truncate() + offset + darkness
    } else {
        sample.truncate() + darkness
    };
    rgb.extend(sample.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> ShadingTuning {
        ShadingTuning::default()
    }

    #[test]
    fn full_light_has_no_darkness() {
        assert_eq!(darkness(Vec3::ONE), Vec3::ZERO);
        let d = darkness(Vec3::new(0.8, 0.5, 1.2));
        assert!((d - Vec3::new(-0.2, -0.5, 0.2)).abs().max_element() < 1e-6);
    }

    #[test]
    fn gray_cells_take_the_vertex_tint() {
        let out = recolor(
            Vec4::new(0.8, 0.8, 0.8, 1.0),
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec3::ZERO,
        );
        assert!((out - Vec4::new(0.8, -0.2, -0.2, 1.0)).abs().max_element() < 1e-6);
    }

    #[test]
    fn nearly_gray_cells_keep_their_color() {
        let b = f32::from_bits(0.5f32.to_bits() + 1);
        let sample = Vec4::new(0.5, 0.5, b, 0.75);
        assert!(!is_grayscale(sample));
        let out = recolor(sample, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec3::ZERO);
        assert_eq!(out, sample);
    }

    #[test]
    fn darkness_is_added_on_both_paths() {
        let dark = Vec3::splat(-0.25);
        let tinted = recolor(Vec4::splat(1.0), Vec4::new(0.5, 0.5, 0.5, 1.0), dark);
        assert_eq!(tinted, Vec4::new(0.25, 0.25, 0.25, 1.0));
        let kept = recolor(Vec4::new(1.0, 0.5, 0.25, 1.0), Vec4::ONE, dark);
        assert_eq!(kept, Vec4::new(0.75, 0.25, 0.0, 1.0));
    }

    #[test]
    fn neutral_light_skips_jitter_and_rim() {
        let uv = Vec2::new(0.3, 0.6);
        let res = apply(uv, Vec3::new(4.0, 2.0, 7.0), Vec3::splat(0.8), 12.5, &tuning());
        assert_eq!(res.local_uv, uv);
        assert_eq!(res.darkness, darkness(Vec3::splat(0.8)));
    }

    #[test]
    fn jitter_is_texel_snapped_and_small() {
        for i in 0..200 {
            let p = Vec3::new(i as f32 * 0.173, 3.0, i as f32 * -0.311);
            let off = jitter_offset(p, i as f32 * 0.25);
            for c in [off.x, off.y] {
                assert!(c == 0.0 || c == 1.0 / 16.0, "offset {c} not on the grid");
            }
        }
    }

    #[test]
    fn jittered_uv_stays_inside_the_clamp() {
        let light = Vec3::new(0.6, 0.7, 0.9);
        for i in 0..200 {
            let uv = Vec2::new((i % 20) as f32 / 20.0, 0.99);
            let p = Vec3::new(i as f32 * 0.37, 2.5, i as f32 * 0.11);
            let res = apply(uv, p, light, i as f32, &tuning());
            assert!(res.local_uv.x >= 0.0 && res.local_uv.x <= 0.95);
            assert!(res.local_uv.y >= 0.0 && res.local_uv.y <= 0.95);
        }
    }

    #[test]
    fn rim_only_lights_horizontal_faces() {
        let light = Vec3::new(0.6, 0.7, 0.9);
        let uv = Vec2::splat(0.5);
        let mut saw_rim = false;
        for i in 0..400 {
            let x = i as f32 * 0.0625;
            let side = apply(uv, Vec3::new(x, 2.5, 1.0), light, 3.0, &tuning());
            assert_eq!(side.darkness, darkness(light));

            let top = apply(uv, Vec3::new(x, 2.0, 1.0), light, 3.0, &tuning());
            let added = top.darkness - darkness(light);
            assert!(added.x >= 0.0 && added.x <= 0.5);
            assert!((added.y - added.x * 0.5).abs() < 1e-6);
            saw_rim |= added.x > 0.0;
        }
        assert!(saw_rim, "rim highlight never triggered");
    }

    #[test]
    fn rim_folds_the_average_of_two_samples() {
        let pos = Vec3::new(5.3, 2.0, -1.7);
        let time = 7.25;
        // texel (84, 32, -28) after the bias and floor
        let texel = Vec3::new(84.0, 32.0, -28.0);
        assert_eq!((pos * 16.0 + Vec3::splat(0.01)).floor(), texel);

        let now = noise3(Vec3::new(texel.x * 0.5, texel.z * 0.5, time * 0.8));
        let later = noise3(Vec3::new(texel.x * 0.5, texel.z * 0.5, (time + 100.0) * 0.8));
        let avg = (now + later) * 0.5;
        let expected = Vec3::new(1.0, 0.5, 0.4) * (0.5 - avg.abs()).max(0.0);
        assert_eq!(rim_highlight(pos, time), expected);

        let res = apply(Vec2::splat(0.5), pos, Vec3::new(0.6, 0.7, 0.9), time, &tuning());
        assert_eq!(res.darkness, darkness(Vec3::new(0.6, 0.7, 0.9)) + expected);
    }

    #[test]
    fn tuning_switches_disable_the_branches() {
        let light = Vec3::new(0.6, 0.7, 0.9);
        let off = ShadingTuning {
            jitter_enabled: false,
            ..ShadingTuning::default()
        };
        let uv = Vec2::new(0.9, 0.9);
        let res = apply(uv, Vec3::new(1.0, 2.0, 3.0), light, 1.0, &off);
        assert_eq!(res.local_uv, uv);
        assert_eq!(res.darkness, darkness(light));
    }

    #[test]
    fn horizontal_face_test_uses_epsilon() {
        assert!(on_horizontal_face(3.0, 0.001));
        assert!(on_horizontal_face(-2.0, 0.001));
        assert!(on_horizontal_face(3.0005, 0.001));
        assert!(!on_horizontal_face(3.5, 0.001));
        assert!(!on_horizontal_face(2.9995, 0.001));
    }

    #[test]
    fn smoothstep_matches_gpu_definition() {
        assert_eq!(smoothstep(0.0, 10.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 10.0, 12.0), 1.0);
        assert!((smoothstep(0.0, 10.0, 5.0) - 0.5).abs() < 1e-6);
    }
}
