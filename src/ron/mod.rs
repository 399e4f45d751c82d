//! Utilities for loading RON files and watching directories for changes.
//!
//! This module provides a small helper for reading RON files from disk and a
//! filesystem watcher resource that raises a shared flag when files change.
//! The watcher drives hot-reloading of the shading settings while the preview
//! is running.

use bevy::prelude::{warn, Resource};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// File-watcher resource for RON hot-reload.
#[derive(Resource)]
pub struct RonWatcher {
    changed: Arc<AtomicBool>, // Raised when a watched file is modified.
    _watcher: Option<RecommendedWatcher>, // Kept alive for as long as the resource.
}

impl RonWatcher {
    /// Create a `RonWatcher` without an OS watcher.
    ///
    /// # Return
    /// A watcher whose flag is never raised by the filesystem. Used as the
    /// fallback when watcher creation fails.
    #[must_use]
    pub fn stub() -> Self {
        RonWatcher {
            changed: Arc::new(AtomicBool::new(false)),
            _watcher: None,
        }
    }

    /// Clear the change flag and report whether it was set.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Raise the change flag by hand.
    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }
}

/// Load all `.ron` files from a directory and deserialize them into `T`.
///
/// # Arguments
/// * `path` - Directory path to scan for `.ron` files.
///
/// # Return
/// All successfully deserialized items, ordered by file name so the result
/// does not depend on directory iteration order. Files that fail to parse are
/// skipped with a warning.
#[must_use]
pub fn load_ron_files<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(entries) = std::fs::read_dir(path) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();

    let mut items = Vec::with_capacity(files.len());
    for file in files {
        let content = match std::fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                warn!("failed to read {}: {e}", file.display());
                continue;
            }
        };
        match ::ron::from_str::<T>(&content) {
            Ok(item) => items.push(item),
            Err(e) => warn!("failed to parse {}: {e}", file.display()),
        }
    }
    items
}

/// Create a `RonWatcher` that watches a directory for modifications.
///
/// # Arguments
/// * `path` - Directory path to watch for `.ron` file changes.
///
/// # Return
/// A `RonWatcher` whose flag is raised when a modification event under the
/// watched directory is observed.
///
/// # Errors
/// Returns a `notify::Error` if the underlying file-watcher cannot be
/// created or cannot be registered for the provided path.
pub fn setup_ron_watcher(path: &Path) -> Result<RonWatcher, notify::Error> {
    let changed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&changed);
    let watched_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(event.kind, notify::EventKind::Modify(_) | notify::EventKind::Create(_)) {
                    return;
                }
                let relevant = event.paths.iter().any(|p| {
                    std::fs::canonicalize(p)
                        .unwrap_or_else(|_| p.clone())
                        .starts_with(&watched_path)
                });
                if relevant {
                    flag.store(true, Ordering::Release);
                }
            }
            Err(e) => warn!("watch error: {e}"),
        },
        Config::default(),
    )?;

    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(RonWatcher {
        changed,
        _watcher: Some(watcher),
    })
}
