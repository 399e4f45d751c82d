//! Animated water surface.
//!
//! Water does not read its atlas cell. Its color and coverage come from a
//! three-octave wave field evaluated on the 1/16 voxel grid:
//!
//! - each octave travels along a direction given by a slowly drifting noise
//!   angle, and each octave's angle is chained off the previous one with a
//!   halved range, so the small ripples roughly follow the big swells;
//! - the summed waves, a 4×4 ordered dither and a camera-distance bias form a
//!   threshold; below 1.0 the fragment is dropped, which gives the surface
//!   its stippled, wave-synchronized transparency;
//! - surviving fragments are colored from the first octave alone.

use bevy::math::{Vec2, Vec3, Vec4};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::lighting::{smoothstep, TEXELS_PER_BLOCK};
use crate::noise_field::noise3;
use crate::shading::{FragmentOutput, FrameUniforms};

/// Base frequency of each octave.
pub const WAVE_FREQUENCIES: [f32; 3] = [0.1, 0.8, 4.6];
/// Amplitude of each octave.
pub const WAVE_AMPLITUDES: [f32; 3] = [0.3, 0.2, 0.2];
/// How fast each octave's direction drifts.
pub const ANGLE_TIME_SCALES: [f32; 3] = [0.0002, 0.005, 0.01];
const ANGLE_SPATIAL_SCALES: [f32; 3] = [0.01, 0.02, 0.04];
const WAVE_SPEEDS: [f32; 3] = [0.4, 0.9, 1.7];

pub const DARK_WATER: Vec3 = Vec3::new(0.05, 0.17, 0.10);
pub const LIGHT_WATER: Vec3 = Vec3::new(0.45, 0.71, 0.73);

/// Fragments whose threshold falls below this are discarded.
pub const DISCARD_THRESHOLD: f32 = 1.0;
/// Camera distance over which the surface fades from sparse to dense.
pub const FADE_DISTANCE: f32 = 10.0;

/// Ordered-dither matrix, row-major, in sixteenths.
pub const BAYER_4X4: [u8; 16] = [0, 8, 2, 10, 12, 4, 14, 6, 3, 11, 1, 9, 15, 7, 13, 5];

/// Everything the water stage derives for one fragment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterSample {
    pub layers: [f32; 3],
    pub waves: f32,
    pub origin: f32,
    pub dither: f32,
    pub distance_bias: f32,
    pub threshold: f32,
}

impl WaterSample {
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.threshold < DISCARD_THRESHOLD
    }

    /// Gradient color from the first octave, fully opaque.
    #[must_use]
    pub fn color(&self) -> Vec4 {
        let t = self.layers[0] * 0.5 + 0.5;
        DARK_WATER.lerp(LIGHT_WATER, t).extend(1.0)
    }

    #[must_use]
    pub fn resolve(&self) -> FragmentOutput {
        if self.is_discarded() {
            FragmentOutput::Discarded
        } else {
            FragmentOutput::Visible(self.color())
        }
    }
}

/// Snap a world position down onto the 1/16 voxel grid.
#[inline]
#[must_use]
pub fn floor_to_texel(world_pos: Vec3) -> Vec3 {
    (world_pos * TEXELS_PER_BLOCK).floor() / TEXELS_PER_BLOCK
}

/// 4×4 ordered dither value in `[0, 15/16]` for a texel coordinate.
///
/// Periodic with period 4 on both axes; negative coordinates wrap.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn dither4x4(p: Vec2) -> f32 {
    let x = (p.x.floor() as i32).rem_euclid(4);
    let y = (p.y.floor() as i32).rem_euclid(4);
    f32::from(BAYER_4X4[(y * 4 + x) as usize]) / 16.0
}

/// Direction angles for the three octaves at a grid position.
#[must_use]
pub fn wave_angles(floored: Vec3, time: f32) -> [f32; 3] {
    let drift = |octave: usize| {
        let s = ANGLE_SPATIAL_SCALES[octave];
        noise3(Vec3::new(
            floored.x * s,
            floored.z * s,
            time * ANGLE_TIME_SCALES[octave],
        ))
    };
    let angle1 = drift(0) * TAU;
    let angle2 = angle1 + (drift(1) - 0.5) * PI;
    let angle3 = angle2 + (drift(2) - 0.5) * FRAC_PI_2;
    [angle1, angle2, angle3]
}

/// The three wave layers at a grid position.
///
/// Layers one and three are cosines, layer two a sine, each of the position
/// projected on its octave's frequency vector plus a time phase.
#[must_use]
pub fn wave_layers(floored: Vec3, time: f32) -> [f32; 3] {
    let angles = wave_angles(floored, time);
    let pos = Vec2::new(floored.x, floored.z);
    let mut layers = [0.0; 3];
    for (octave, layer) in layers.iter_mut().enumerate() {
        let freq = Vec2::new(angles[octave].cos(), angles[octave].sin()) * WAVE_FREQUENCIES[octave];
        let phase = pos.dot(freq) + time * WAVE_SPEEDS[octave];
        let wave = if octave == 1 { phase.sin() } else { phase.cos() };
        *layer = wave * WAVE_AMPLITUDES[octave];
    }
    layers
}

/// Evaluate the water stage without deciding anything.
///
/// # Arguments
/// * `world_pos` - unsnapped fragment position; the dither uses it directly,
///   the wave field uses its 1/16-floored version.
/// * `time` - frame time in seconds.
/// * `camera_pos` - camera world position.
#[must_use]
pub fn evaluate(world_pos: Vec3, time: f32, camera_pos: Vec3) -> WaterSample {
    let floored = floor_to_texel(world_pos);
    let layers = wave_layers(floored, time);
    let waves = layers[0] + layers[1] + layers[2];
    let origin = waves * 0.5 + 0.5;
    let distance_bias = smoothstep(0.0, FADE_DISTANCE, floored.distance(camera_pos)) - 0.5;
    let dither = dither4x4(Vec2::new(world_pos.x, world_pos.z) * TEXELS_PER_BLOCK);
    WaterSample {
        layers,
        waves,
        origin,
        dither,
        distance_bias,
        threshold: origin + dither + distance_bias,
    }
}

/// Water stage of the fragment pipeline: discard or the opaque gradient.
#[must_use]
pub fn shade(world_pos: Vec3, frame: &FrameUniforms) -> FragmentOutput {
    evaluate(world_pos, frame.time, frame.camera_pos).resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dither_holds_the_bayer_values() {
        let mut seen = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                let v = dither4x4(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                assert_eq!(v, f32::from(BAYER_4X4[y * 4 + x]) / 16.0);
                seen.push((v * 16.0) as u32);
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<u32>>());
        assert_eq!(dither4x4(Vec2::new(0.0, 0.0)), 0.0);
        assert_eq!(dither4x4(Vec2::new(0.0, 3.0)), 15.0 / 16.0);
    }

    #[test]
    fn dither_is_periodic() {
        for y in -6..6 {
            for x in -6..6 {
                let p = Vec2::new(x as f32 + 0.25, y as f32 + 0.75);
                let base = dither4x4(p);
                assert_eq!(base, dither4x4(p + Vec2::new(4.0, 0.0)));
                assert_eq!(base, dither4x4(p + Vec2::new(0.0, -8.0)));
                assert_eq!(base, dither4x4(p + Vec2::new(-12.0, 4.0)));
            }
        }
    }

    #[test]
    fn octave_angles_chain_with_halving_range() {
        for i in 0..200 {
            let floored = floor_to_texel(Vec3::new(i as f32 * 3.7, 2.0, i as f32 * -5.3));
            let time = i as f32 * 13.0;
            let [a1, a2, a3] = wave_angles(floored, time);
            assert!((a2 - a1).abs() <= FRAC_PI_2 + 1e-5);
            assert!((a3 - a2).abs() <= FRAC_PI_2 * 0.5 + 1e-5);
        }

        let floored = floor_to_texel(Vec3::new(37.3, 4.0, -12.6));
        let time = 250.0;
        let [a1, a2, a3] = wave_angles(floored, time);
        let n1 = noise3(Vec3::new(floored.x * 0.01, floored.z * 0.01, time * 0.0002));
        let n2 = noise3(Vec3::new(floored.x * 0.02, floored.z * 0.02, time * 0.005));
        let n3 = noise3(Vec3::new(floored.x * 0.04, floored.z * 0.04, time * 0.01));
        assert_eq!(a1, n1 * TAU);
        assert_eq!(a2, a1 + (n2 - 0.5) * PI);
        assert_eq!(a3, a2 + (n3 - 0.5) * FRAC_PI_2);
    }

    #[test]
    fn evaluation_is_reproducible() {
        let pos = Vec3::new(12.34, 5.0, -7.89);
        let cam = Vec3::new(3.0, 9.0, 1.0);
        let a = evaluate(pos, 42.5, cam);
        let b = evaluate(pos, 42.5, cam);
        assert_eq!(a, b);
        assert_eq!(a.threshold.to_bits(), b.threshold.to_bits());
        assert_eq!(a.resolve(), b.resolve());
    }

    #[test]
    fn waves_stay_within_amplitude_sum() {
        for i in 0..300 {
            let p = Vec3::new(i as f32 * 0.7, 4.0, i as f32 * -1.3);
            let s = evaluate(p, i as f32 * 0.1, Vec3::ZERO);
            assert!(s.waves.abs() <= 0.7 + 1e-5);
            assert!(s.origin >= 0.15 - 1e-5 && s.origin <= 0.85 + 1e-5);
            assert!(s.distance_bias >= -0.5 && s.distance_bias <= 0.5);
        }
    }

    #[test]
    fn close_to_camera_with_zero_dither_discards() {
        let pos = Vec3::new(0.01, 0.0, 0.01);
        let frame = FrameUniforms {
            time: 17.0,
            camera_pos: floor_to_texel(pos),
            cursor_pos: Vec3::splat(-100.0),
        };
        let s = evaluate(pos, frame.time, frame.camera_pos);
        assert_eq!(s.dither, 0.0);
        assert_eq!(s.distance_bias, -0.5);
        assert!(s.is_discarded());
        assert_eq!(shade(pos, &frame), FragmentOutput::Discarded);
    }

    #[test]
    fn far_from_camera_with_high_dither_survives_with_gradient_color() {
        let pos = Vec3::new(0.01, 0.0, 0.1975);
        let frame = FrameUniforms {
            time: 5.0,
            camera_pos: Vec3::new(100.0, 0.0, 100.0),
            cursor_pos: Vec3::splat(-100.0),
        };
        let s = evaluate(pos, frame.time, frame.camera_pos);
        assert_eq!(s.dither, 15.0 / 16.0);
        assert_eq!(s.distance_bias, 0.5);
        assert!(!s.is_discarded());

        let expected = DARK_WATER.lerp(LIGHT_WATER, s.layers[0] * 0.5 + 0.5).extend(1.0);
        assert_eq!(shade(pos, &frame), FragmentOutput::Visible(expected));
    }

    #[test]
    fn water_color_lies_between_the_two_tones() {
        for i in 0..100 {
            let s = evaluate(Vec3::new(i as f32, 0.0, i as f32 * 0.5), i as f32, Vec3::ZERO);
            let c = s.color();
            assert_eq!(c.w, 1.0);
            for ch in 0..3 {
                let lo = DARK_WATER[ch].min(LIGHT_WATER[ch]) - 1e-5;
                let hi = DARK_WATER[ch].max(LIGHT_WATER[ch]) + 1e-5;
                assert!(c[ch] >= lo && c[ch] <= hi);
            }
        }
    }
}
