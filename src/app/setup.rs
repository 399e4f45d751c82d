//! Startup systems for the preview app.
//!
//! Loads the atlas named in the settings (falling back to a procedural one)
//! and prepares the preview renderer. Both are inserted as resources used by
//! the per-frame render system.
use bevy::prelude::*;
use std::path::Path;
use std::sync::Arc;
use voxshade::atlas::{AtlasBuilder, ImageAtlas};
use voxshade::preview::PreviewRenderer;
use voxshade::settings::{PreviewSettings, ShadingSettings};

use super::preview::PreviewState;

/// Cell size of the fallback atlas, in texels.
const FALLBACK_CELL_PX: u32 = 16;

/// The atlas every frame is shaded against.
#[derive(Resource, Clone)]
pub struct PreviewAtlas(pub Arc<ImageAtlas>);

/// Load the atlas image, or build the procedural fallback.
///
/// # Errors
/// Returns an `Err` only when neither the configured image nor the fallback
/// could be produced.
pub fn load_atlas(settings: &PreviewSettings) -> Result<ImageAtlas, Box<dyn std::error::Error>> {
    let path = Path::new(&settings.atlas_path);
    match ImageAtlas::open(path) {
        Ok(atlas) => {
            let (cw, ch) = atlas.cell_size();
            info!("atlas: loaded {} ({cw}x{ch} texels per cell)", path.display());
            Ok(atlas)
        }
        Err(e) => {
            warn!("atlas: cannot use {} ({e}), using procedural atlas", path.display());
            AtlasBuilder::procedural(FALLBACK_CELL_PX, settings.seed)
        }
    }
}

/// Insert the atlas and renderer resources.
///
/// # Arguments
/// - `commands`: inserts `PreviewAtlas` and `PreviewState`.
/// - `settings`: the loaded shading settings.
/// - `exit`: used to stop the app when no atlas can be produced.
#[allow(clippy::needless_pass_by_value)]
pub fn setup_preview(
    mut commands: Commands,
    settings: Res<ShadingSettings>,
    mut exit: EventWriter<AppExit>,
) {
    let atlas = match load_atlas(&settings.preview) {
        Ok(atlas) => atlas,
        Err(e) => {
            error!("atlas: {e}");
            exit.send(AppExit::error());
            return;
        }
    };
    commands.insert_resource(PreviewAtlas(Arc::new(atlas)));

    let renderer = PreviewRenderer::new(&settings.preview);
    let (sx, sz) = renderer.terrain().size();
    info!(
        "preview: {}x{} px, {sx}x{sz} blocks, {} frames",
        settings.preview.width, settings.preview.height, settings.preview.frames
    );
    commands.insert_resource(PreviewState::new(renderer));
}
