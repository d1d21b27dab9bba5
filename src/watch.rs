// ABOUTME: Watch module for monitoring the slide folder for changes
// ABOUTME: Debounces filesystem events and hands each batch of relevant changes to a callback

use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{DebounceEventResult, new_debouncer};
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, ShowError};
use crate::utils;

/// How often the watch loop checks for cancellation while idle
const CANCEL_POLL: Duration = Duration::from_millis(250);

/// Configuration for watch mode
pub struct WatchConfig {
    /// Folder to watch, recursively
    pub slide_root: PathBuf,

    /// Debounce time in milliseconds
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            slide_root: PathBuf::from("slides"),
            debounce_ms: 500,
        }
    }
}

/// Watch the slide folder until `cancel` fires. `on_change` is called once
/// per debounced batch that touched at least one relevant path.
pub fn watch_slides<F>(
    config: &WatchConfig,
    cancel: &CancellationToken,
    mut on_change: F,
) -> Result<()>
where
    F: FnMut(&[PathBuf]),
{
    utils::validate_directory_exists(&config.slide_root)?;

    let (tx, rx) = mpsc::channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(Duration::from_millis(config.debounce_ms), None, tx)
        .map_err(|e| ShowError::WatchError(format!("Failed to create file watcher: {}", e)))?;

    let abs_watch_path = utils::get_absolute_path(&config.slide_root)?;
    debug!("Watching absolute path: {:?}", abs_watch_path);

    debouncer
        .watcher()
        .watch(&abs_watch_path, RecursiveMode::Recursive)
        .map_err(|e| {
            ShowError::WatchError(format!(
                "Failed to start watching directory {:?}: {}",
                abs_watch_path, e
            ))
        })?;
    debouncer
        .cache()
        .add_root(&abs_watch_path, RecursiveMode::Recursive);

    info!("Watching for changes in {:?}", config.slide_root);

    while !cancel.is_cancelled() {
        let result = match rx.recv_timeout(CANCEL_POLL) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        match result {
            Ok(events) => {
                let mut changed: Vec<PathBuf> = events
                    .iter()
                    .filter(|event| is_relevant_kind(&event.kind))
                    .flat_map(|event| event.paths.iter())
                    .filter(|path| is_relevant_path(path))
                    .cloned()
                    .collect();
                changed.sort();
                changed.dedup();

                if changed.is_empty() {
                    continue;
                }
                debug!("Detected relevant changes in {:?}", changed);
                on_change(&changed);
            }
            Err(errors) => {
                for e in errors {
                    error!("Watch error: {:?}", e);
                }
            }
        }
    }

    info!("Stopped watching {:?}", config.slide_root);
    Ok(())
}

fn is_relevant_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Hidden files and editor backups never affect the rendered slides
pub fn is_relevant_path(path: &Path) -> bool {
    match path.file_name() {
        Some(name) => {
            let name = name.to_string_lossy();
            !name.starts_with('.') && !name.ends_with('~')
        }
        None => false,
    }
}
