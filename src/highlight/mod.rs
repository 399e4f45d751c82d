//! Cursor highlight: darken everything inside the selected block's box.

use bevy::math::{Vec3, Vec4};

use crate::settings::ShadingTuning;

/// Whether `world_pos` lies in `[cursor - margin, cursor + 1 + margin]` on all
/// three axes. Both bounds are inclusive.
#[inline]
#[must_use]
pub fn is_highlighted(world_pos: Vec3, cursor_pos: Vec3, margin: f32) -> bool {
    let min = cursor_pos - Vec3::splat(margin);
    let max = cursor_pos + Vec3::splat(1.0 + margin);
    world_pos.cmpge(min).all() && world_pos.cmple(max).all()
}

/// Darken `color` when the fragment is inside the cursor box.
///
/// Only RGB changes; no clamping happens here.
#[must_use]
pub fn apply(color: Vec4, world_pos: Vec3, cursor_pos: Vec3, tuning: &ShadingTuning) -> Vec4 {
    if is_highlighted(world_pos, cursor_pos, tuning.highlight_margin) {
        (color.truncate() - Vec3::splat(tuning.highlight_darken)).extend(color.w)
    } else {
        color
    }
}
