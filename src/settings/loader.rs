//! Settings loading and hot-reloading.
//!
//! Settings are loaded from RON files in the `data/settings` directory. If
//! several RON files are present, the first one (by file name) that parses is
//! used. If none exists or none parses, the defaults are used.
use crate::ron::{load_ron_files, setup_ron_watcher, RonWatcher};
use crate::settings::ShadingSettings;
use bevy::prelude::{info, Res, ResMut, Resource};
use std::path::{Path, PathBuf};

/// Directory scanned for settings files.
pub const SETTINGS_DIR: &str = "data/settings";

#[derive(Resource)]
pub struct SettingsWatcher {
    pub watcher: RonWatcher,
    pub dir: PathBuf,
}

impl SettingsWatcher {
    #[must_use]
    pub fn stub() -> Self {
        SettingsWatcher {
            watcher: RonWatcher::stub(),
            dir: PathBuf::from(SETTINGS_DIR),
        }
    }
}

/// Load settings from `path` (directory).
///
/// # Arguments
/// * `path` - The directory where settings RON files are located (e.g. `data/settings`).
///
/// # Returns
/// The first successfully parsed `ShadingSettings`, or the defaults.
#[must_use]
pub fn load_settings_from_dir(path: &Path) -> ShadingSettings {
    let items: Vec<ShadingSettings> = load_ron_files(path);
    if let Some(first) = items.into_iter().next() {
        info!("loaded shading settings from {}", path.display());
        first
    } else {
        info!("no settings in {}, using defaults", path.display());
        ShadingSettings::defaults()
    }
}

/// Create a watcher for the settings directory (hot-reload).
///
/// # Errors
/// Returns a `notify::Error` when the OS watcher cannot be created or the
/// directory cannot be watched.
pub fn setup_settings_watcher(path: &Path) -> Result<SettingsWatcher, notify::Error> {
    setup_ron_watcher(path).map(|watcher| SettingsWatcher {
        watcher,
        dir: path.to_path_buf(),
    })
}

/// Reload the settings resource when the watched files change.
///
/// Tuning changes take effect on the next rendered frame.
#[allow(clippy::needless_pass_by_value)]
pub fn check_settings_changes(watcher: Res<SettingsWatcher>, mut settings: ResMut<ShadingSettings>) {
    if watcher.watcher.take_changed() {
        info!("settings changed, reloading");
        *settings = load_settings_from_dir(&watcher.dir);
    }
}
