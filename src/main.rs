use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::path::Path;
use voxshade::debug::ShadingStats;
use voxshade::settings::loader as settings_loader;
use voxshade::shading::FrameUniforms;

mod app;
use app::{render_preview_frame, setup_preview, sync_preview_settings};

fn main() {
    let settings_dir = Path::new(settings_loader::SETTINGS_DIR);
    let settings = settings_loader::load_settings_from_dir(settings_dir);
    let settings_watcher = settings_loader::setup_settings_watcher(settings_dir)
        .unwrap_or_else(|_| settings_loader::SettingsWatcher::stub());

    let mut app = App::new();

    app.add_plugins(MinimalPlugins).add_plugins(LogPlugin::default());

    app.insert_resource(settings);
    app.insert_resource(settings_watcher);
    app.insert_resource(ShadingStats::default());
    app.insert_resource(FrameUniforms::default());

    app.add_systems(Startup, setup_preview);
    app.add_systems(
        Update,
        (
            settings_loader::check_settings_changes,
            sync_preview_settings,
            render_preview_frame,
        )
            .chain(),
    );

    app.run();
}
