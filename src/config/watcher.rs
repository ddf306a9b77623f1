//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - The parent directory is watched, so saves that rename a temporary file
//!   over the config are still seen
//! - A reload only happens when the file contents changed; a single save
//!   usually fires several events
//! - A file that fails to parse or validate is logged and skipped, the
//!   running configuration stays in place

use std::fs;
use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::StripConfig;

/// Watches a configuration file and sends every new valid configuration.
pub struct ConfigWatcher {
    reloader: Reloader,
}

impl ConfigWatcher {
    /// Create a watcher for `path` and the receiver its updates arrive on.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<StripConfig>) {
        let (updates, update_rx) = mpsc::unbounded_channel();
        let reloader = Reloader {
            path: path.to_path_buf(),
            last: fs::read(path).ok(),
            updates,
        };
        (Self { reloader }, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.reloader.path);
        let path = self.reloader.path.clone();
        let mut reloader = self.reloader;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => reloader.on_event(&event),
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

struct Reloader {
    path: PathBuf,
    last: Option<Vec<u8>>,
    updates: mpsc::UnboundedSender<StripConfig>,
}

impl Reloader {
    fn on_event(&mut self, event: &Event) {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        if event.paths.iter().any(|p| p.file_name() == self.path.file_name()) {
            self.reload();
        }
    }

    fn reload(&mut self) {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Config file unreadable, keeping current configuration");
                return;
            }
        };
        if self.last.as_deref() == Some(contents.as_slice()) {
            tracing::debug!(path = ?self.path, "Config file unchanged");
            return;
        }

        let parsed = std::str::from_utf8(&contents)
            .map_err(|e| e.to_string())
            .and_then(|text| parse_config(text).map_err(|e| e.to_string()));
        self.last = Some(contents);

        match parsed {
            Ok(config) => {
                tracing::info!(path = ?self.path, "Config file changed, reloading");
                if self.updates.send(config).is_err() {
                    tracing::debug!("Config receiver dropped");
                }
            }
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
