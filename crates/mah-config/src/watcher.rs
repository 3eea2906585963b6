//! Reload the shared setting when its file changes on disk.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify_debouncer_full::notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use tracing::{debug, info, warn};

use crate::store::ConfigStore;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the underlying watcher alive. Dropping it stops watching.
pub struct ConfigWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Watch `path` and call [`ConfigStore::reload`] whenever it is written.
    ///
    /// The parent directory is watched so editors that replace the file by
    /// rename are still seen.
    pub fn start(store: Arc<ConfigStore>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(OsString::from)
            .with_context(|| format!("setting path has no file name: {}", path.display()))?;
        let dir = watch_dir(&path);

        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let touched = events.iter().any(|event| {
                        matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_)
                        ) && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()))
                    });
                    if !touched {
                        return;
                    }
                    match store.reload() {
                        Ok(true) => debug!("setting reloaded from disk"),
                        Ok(false) => debug!("setting file touched, content unchanged"),
                        Err(e) => warn!(error = %e, "keeping previous setting"),
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "setting watcher error");
                    }
                }
            }
        })
        .context("failed to create setting file watcher")?;

        debouncer
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        info!(path = %path.display(), "watching setting file");

        Ok(Self {
            _debouncer: debouncer,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
