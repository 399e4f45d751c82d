//! Settings, types and defaults.
//!
//! Settings are stored as a RON file under `data/settings/` and are hot-reloadable
//! using the RON watcher utilities (see `ron::setup_ron_watcher`).
use bevy::math::Vec3;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

pub mod loader;

/// Shading switches and thresholds. The defaults reproduce the reference
/// look exactly; changing them is for experimentation only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadingTuning {
    #[serde(default = "ShadingTuning::default_jitter_enabled")]
    pub jitter_enabled: bool, // Enable the texel jitter on faces whose light is bluer than red.
    #[serde(default = "ShadingTuning::default_rim_enabled")]
    pub rim_enabled: bool, // Enable the warm rim highlight on horizontal jittered faces.
    #[serde(default = "ShadingTuning::default_top_face_epsilon")]
    pub top_face_epsilon: f32, // Max distance of world y from a whole block for the rim gate.
    #[serde(default = "ShadingTuning::default_jitter_clamp")]
    pub jitter_clamp: f32, // Upper bound of a jittered local coordinate.
    #[serde(default = "ShadingTuning::default_highlight_margin")]
    pub highlight_margin: f32, // How far the cursor box extends past the block on every side.
    #[serde(default = "ShadingTuning::default_highlight_darken")]
    pub highlight_darken: f32, // Amount subtracted from RGB inside the cursor box.
}

impl ShadingTuning {
    fn default_jitter_enabled() -> bool { true }
    fn default_rim_enabled() -> bool { true }
    fn default_top_face_epsilon() -> f32 { 0.001 }
    fn default_jitter_clamp() -> f32 { 0.95 }
    fn default_highlight_margin() -> f32 { 0.05 }
    fn default_highlight_darken() -> f32 { 0.1 }
}

impl Default for ShadingTuning {
    fn default() -> Self {
        Self {
            jitter_enabled: Self::default_jitter_enabled(),
            rim_enabled: Self::default_rim_enabled(),
            top_face_epsilon: Self::default_top_face_epsilon(),
            jitter_clamp: Self::default_jitter_clamp(),
            highlight_margin: Self::default_highlight_margin(),
            highlight_darken: Self::default_highlight_darken(),
        }
    }
}

/// Offline preview renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSettings {
    #[serde(default = "PreviewSettings::default_width")]
    pub width: u32, // Output image width in pixels.
    #[serde(default = "PreviewSettings::default_height")]
    pub height: u32, // Output image height in pixels.
    #[serde(default = "PreviewSettings::default_pixels_per_block")]
    pub pixels_per_block: u32, // Screen pixels covering one block; 16 shows every atlas texel.
    #[serde(default = "PreviewSettings::default_frames")]
    pub frames: u32, // Number of frames rendered before the app exits.
    #[serde(default = "PreviewSettings::default_time_step")]
    pub time_step: f32, // Seconds of shading time between frames.
    #[serde(default = "PreviewSettings::default_start_time")]
    pub start_time: f32, // Shading time of the first frame.
    #[serde(default = "PreviewSettings::default_seed")]
    pub seed: u32, // Terrain and procedural atlas seed.
    #[serde(default = "PreviewSettings::default_sea_level")]
    pub sea_level: i32, // Height of the water sheet in blocks.
    #[serde(default = "PreviewSettings::default_terrain_amplitude")]
    pub terrain_amplitude: f32, // Height variation of the terrain in blocks.
    #[serde(default = "PreviewSettings::default_camera_height")]
    pub camera_height: f32, // Camera height above the view centre.
    #[serde(default)]
    pub cursor: Option<[f32; 3]>, // Highlighted block corner; `None` for no highlight.
    #[serde(default = "PreviewSettings::default_atlas_path")]
    pub atlas_path: String, // Atlas PNG; the procedural atlas is used when it cannot be read.
    #[serde(default = "PreviewSettings::default_output_dir")]
    pub output_dir: String, // Directory receiving `frame-NNNN.png`.
}

impl PreviewSettings {
    fn default_width() -> u32 { 256 }
    fn default_height() -> u32 { 256 }
    fn default_pixels_per_block() -> u32 { 8 }
    fn default_frames() -> u32 { 4 }
    fn default_time_step() -> f32 { 0.25 }
    fn default_start_time() -> f32 { 0.0 }
    fn default_seed() -> u32 { 1337 }
    fn default_sea_level() -> i32 { 8 }
    fn default_terrain_amplitude() -> f32 { 6.0 }
    fn default_camera_height() -> f32 { 24.0 }
    fn default_atlas_path() -> String { "assets/textures/atlas.png".to_string() }
    fn default_output_dir() -> String { "preview-out".to_string() }

    /// Cursor position as a vector, or a point far outside the scene.
    #[must_use]
    pub fn cursor_pos(&self) -> Vec3 {
        self.cursor.map_or(Vec3::splat(-1.0e6), Vec3::from)
    }
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            pixels_per_block: Self::default_pixels_per_block(),
            frames: Self::default_frames(),
            time_step: Self::default_time_step(),
            start_time: Self::default_start_time(),
            seed: Self::default_seed(),
            sea_level: Self::default_sea_level(),
            terrain_amplitude: Self::default_terrain_amplitude(),
            camera_height: Self::default_camera_height(),
            cursor: None,
            atlas_path: Self::default_atlas_path(),
            output_dir: Self::default_output_dir(),
        }
    }
}

/// Diagnostics output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugSettings {
    #[serde(default)]
    pub write_stats_dump: bool, // Write a stats dump to `dump_dir` after the last frame.
    #[serde(default = "DebugSettings::default_dump_dir")]
    pub dump_dir: String, // Directory for stats dumps.
    #[serde(default = "DebugSettings::default_log_every_frame")]
    pub log_every_frame: bool, // Log per-frame fragment counts at info level.
}

impl DebugSettings {
    fn default_dump_dir() -> String { "debug-dumps".to_string() }
    fn default_log_every_frame() -> bool { true }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            write_stats_dump: false,
            dump_dir: Self::default_dump_dir(),
            log_every_frame: Self::default_log_every_frame(),
        }
    }
}

/// Top-level settings.
#[derive(Resource, Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShadingSettings {
    #[serde(default)]
    pub tuning: ShadingTuning,
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub debug: DebugSettings,
}

impl ShadingSettings {
    #[must_use]
    pub fn defaults() -> Self {
        Self::default()
    }
}
