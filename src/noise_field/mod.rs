//! Seedless value noise used by every procedural effect in the shader core.
//!
//! The hashes here fold a coordinate through a fractional multiply and a dot
//! product. They carry no state, so the same input gives the same output in
//! any process or thread. The multiplier and offset constants are part of the
//! look of the terrain: changing them changes every animated surface.
//!
//! `fract` follows GPU semantics (`x - floor(x)`), which differs from
//! `f32::fract` for negative inputs.

use bevy::math::{Vec2, Vec3};

const HASH2_SCALE: Vec2 = Vec2::new(234.34, 435.345);
const HASH2_OFFSET: f32 = 34.23;
const HASH3_SCALE: Vec3 = Vec3::new(0.1031, 0.1030, 0.0973);
const HASH3_OFFSET: f32 = 33.33;

/// Fractional part with floor semantics.
///
/// A tiny negative input rounds to exactly 1; [`crate::atlas::wrap_uv`]
/// holds texture coordinates below that.
#[inline]
#[must_use]
pub fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Component-wise [`fract`].
#[inline]
#[must_use]
pub fn fract2(v: Vec2) -> Vec2 {
    v - v.floor()
}

/// Component-wise [`fract`].
#[inline]
#[must_use]
pub fn fract3(v: Vec3) -> Vec3 {
    v - v.floor()
}

/// Linear blend `a + (b - a) * t`.
#[inline]
#[must_use]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Hermite weight `t²(3 − 2t)` applied to a lattice fraction.
#[inline]
fn hermite(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Pseudo-random scalar in `[0, 1)` for a 2D coordinate.
///
/// # Arguments
/// * `p` - any finite 2D coordinate, typically a lattice point.
///
/// # Return
/// A deterministic value in `[0, 1)`.
#[must_use]
pub fn hash2(p: Vec2) -> f32 {
    let mut q = fract2(p * HASH2_SCALE);
    q += q.dot(q + HASH2_OFFSET);
    fract(q.x * q.y)
}

/// Pseudo-random scalar in `[0, 1)` for a 3D coordinate.
#[must_use]
pub fn hash3(p: Vec3) -> f32 {
    let mut q = fract3(p * HASH3_SCALE);
    q += q.dot(Vec3::new(q.y, q.x, q.z) + HASH3_OFFSET);
    fract((q.x + q.y) * q.z)
}

/// Smoothed 2D value noise.
///
/// Blends [`hash2`] at the four lattice corners around `p` with Hermite
/// weights on the fractional part. Continuous, roughly in `[0, 1]`, and equal
/// to the corner hash on lattice points.
#[must_use]
pub fn noise2(p: Vec2) -> f32 {
    let i = p.floor();
    let f = p - i;
    let u = Vec2::new(hermite(f.x), hermite(f.y));

    let a = hash2(i);
    let b = hash2(i + Vec2::X);
    let c = hash2(i + Vec2::Y);
    let d = hash2(i + Vec2::ONE);

    mix(mix(a, b, u.x), mix(c, d, u.x), u.y)
}

/// Smoothed 3D value noise.
///
/// Trilinear blend of [`hash3`] at the eight lattice corners around `p`,
/// weighted the same way as [`noise2`].
#[must_use]
pub fn noise3(p: Vec3) -> f32 {
    let i = p.floor();
    let f = p - i;
    let u = Vec3::new(hermite(f.x), hermite(f.y), hermite(f.z));

    let c000 = hash3(i);
    let c100 = hash3(i + Vec3::new(1.0, 0.0, 0.0));
    let c010 = hash3(i + Vec3::new(0.0, 1.0, 0.0));
    let c110 = hash3(i + Vec3::new(1.0, 1.0, 0.0));
    let c001 = hash3(i + Vec3::new(0.0, 0.0, 1.0));
    let c101 = hash3(i + Vec3::new(1.0, 0.0, 1.0));
    let c011 = hash3(i + Vec3::new(0.0, 1.0, 1.0));
    let c111 = hash3(i + Vec3::new(1.0, 1.0, 1.0));

    let near = mix(mix(c000, c100, u.x), mix(c010, c110, u.x), u.y);
    let far = mix(mix(c001, c101, u.x), mix(c011, c111, u.x), u.y);
    mix(near, far, u.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fract_uses_floor_semantics() {
        assert_eq!(fract(1.25), 0.25);
        assert_eq!(fract(-0.25), 0.75);
        assert_eq!(fract2(Vec2::new(-1.5, 2.5)), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn hashes_are_deterministic_and_in_unit_range() {
        for i in -40..40 {
            for j in -40..40 {
                let p2 = Vec2::new(i as f32 * 0.73, j as f32 * 1.31);
                let h = hash2(p2);
                assert!((0.0..1.0).contains(&h), "hash2({p2}) = {h}");
                assert_eq!(h.to_bits(), hash2(p2).to_bits());

                let p3 = Vec3::new(i as f32 * 0.5, j as f32 * 0.25, (i + j) as f32);
                let h = hash3(p3);
                assert!((0.0..1.0).contains(&h), "hash3({p3}) = {h}");
                assert_eq!(h.to_bits(), hash3(p3).to_bits());
            }
        }
    }

    #[test]
    fn hashes_vary_between_lattice_points() {
        let a = hash2(Vec2::new(0.0, 1.0));
        let b = hash2(Vec2::new(1.0, 0.0));
        let c = hash3(Vec3::new(1.0, 2.0, 3.0));
        let d = hash3(Vec3::new(3.0, 2.0, 1.0));
        assert_ne!(a, b);
        assert_ne!(c, d);
    }

    #[test]
    fn noise_matches_hash_on_lattice_points() {
        for &(x, y) in &[(0.0, 0.0), (3.0, -2.0), (-7.0, 11.0)] {
            let p = Vec2::new(x, y);
            assert!((noise2(p) - hash2(p)).abs() < 1e-6);
            let q = Vec3::new(x, y, x - y);
            assert!((noise3(q) - hash3(q)).abs() < 1e-6);
        }
    }

    #[test]
    fn noise_stays_near_unit_range_and_is_continuous() {
        let step = 1e-3;
        for i in 0..500 {
            let t = i as f32 * 0.037 - 9.0;
            let p = Vec2::new(t, t * 0.61 + 2.0);
            let n = noise2(p);
            assert!((-1e-5..=1.0 + 1e-5).contains(&n));
            assert!((noise2(p + Vec2::splat(step)) - n).abs() < 0.05);

            let q = Vec3::new(t, 1.0 - t, t * 0.3);
            let m = noise3(q);
            assert!((-1e-5..=1.0 + 1e-5).contains(&m));
            assert!((noise3(q + Vec3::splat(step)) - m).abs() < 0.05);
        }
    }
}
