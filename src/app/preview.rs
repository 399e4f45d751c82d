//! Per-frame preview systems.
use bevy::prelude::*;
use std::path::Path;
use voxshade::debug::{write_stats_dump, ShadingStats};
use voxshade::preview::{write_frame, PreviewRenderer};
use voxshade::settings::ShadingSettings;
use voxshade::shading::FrameUniforms;

use super::setup::PreviewAtlas;

/// Renderer plus the index of the next frame to produce.
#[derive(Resource)]
pub struct PreviewState {
    pub renderer: PreviewRenderer,
    pub next_frame: u32,
    pub finished: bool,
}

impl PreviewState {
    #[must_use]
    pub fn new(renderer: PreviewRenderer) -> Self {
        Self {
            renderer,
            next_frame: 0,
            finished: false,
        }
    }
}

/// Render and write one frame per update; exit after the configured count.
///
/// # Arguments
/// - `state`: renderer and frame cursor.
/// - `atlas`: the shared atlas.
/// - `settings`: tuning, frame count and debug options.
/// - `stats`: accumulated fragment statistics.
/// - `uniforms`: updated with the uniforms of the frame just rendered.
/// - `exit`: receives `AppExit` once every frame is written.
#[allow(clippy::needless_pass_by_value)]
pub fn render_preview_frame(
    state: Option<ResMut<PreviewState>>,
    atlas: Option<Res<PreviewAtlas>>,
    settings: Res<ShadingSettings>,
    mut stats: ResMut<ShadingStats>,
    mut uniforms: ResMut<FrameUniforms>,
    mut exit: EventWriter<AppExit>,
) {
    let (Some(mut state), Some(atlas)) = (state, atlas) else {
        return;
    };
    if state.finished {
        return;
    }

    if state.next_frame >= settings.preview.frames {
        state.finished = true;
        info!(
            "preview: done, {} frames, mean {:.2} ms/frame",
            stats.frames,
            stats.mean_frame_ms()
        );
        if settings.debug.write_stats_dump
            && let Err(e) = write_stats_dump(Path::new(&settings.debug.dump_dir), &stats)
        {
            error!("stats dump: {e}");
        }
        exit.send(AppExit::Success);
        return;
    }

    let index = state.next_frame;
    let frame = state.renderer.frame_uniforms(index);
    let rendered = state.renderer.render_frame(atlas.0.as_ref(), frame, settings.tuning);
    *uniforms = frame;

    if let Err(e) = write_frame(&rendered.image, state.renderer.output_dir(), index) {
        error!("preview: failed to write frame {index}: {e}");
    }
    if settings.debug.log_every_frame {
        let c = &rendered.counts;
        info!(
            "frame {index}: t={:.2} visible={} discarded={} water {}/{} in {:.2?}",
            frame.time,
            c.visible,
            c.discarded,
            c.water_visible,
            c.water_visible + c.water_discarded,
            rendered.elapsed
        );
    }
    stats.finish_frame(rendered.counts, rendered.elapsed);
    state.next_frame += 1;
}

/// Rebuild the renderer when reloaded settings change the preview scene.
///
/// Tuning changes need nothing here; they are read every frame.
#[allow(clippy::needless_pass_by_value)]
pub fn sync_preview_settings(settings: Res<ShadingSettings>, state: Option<ResMut<PreviewState>>) {
    if !settings.is_changed() || settings.is_added() {
        return;
    }
    if let Some(mut state) = state {
        let next_frame = state.next_frame;
        state.renderer = PreviewRenderer::new(&settings.preview);
        state.next_frame = next_frame;
        info!("preview: settings reloaded, scene rebuilt");
    }
}
