//! Durable JSON records on local disk.
//!
//! Each record is a single owned value that is replaced as a whole on every
//! mutation: read, apply a closure, write to a temp file, rename over the old
//! file, then publish the new value to subscribers.

use crate::error::StoreError;
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const APP_DIR_NAME: &str = "stock-video-cli";
pub const HISTORY_FILE: &str = "video_history.json";
pub const FORM_FILE: &str = "video_form.json";

/// Default data directory (`$XDG_DATA_HOME/stock-video-cli` on Linux).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub struct JsonRecord<T> {
    path: PathBuf,
    value: Mutex<T>,
    tx: watch::Sender<T>,
}

impl<T> JsonRecord<T>
where
    T: Serialize + DeserializeOwned + Clone + Default + PartialEq + Send + Sync + 'static,
{
    /// Open the record at `path`, seeding it with `T::default()` when the file
    /// is missing. A corrupt file is treated as missing and overwritten on the
    /// next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let value = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable record");
                    T::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let seeded = T::default();
                write_atomic(&path, &seeded)?;
                seeded
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let (tx, _) = watch::channel(value.clone());
        Ok(Self {
            path,
            value: Mutex::new(value),
            tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Reactive view of the record; updated after every successful write.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Read-modify-write the whole record and persist before returning.
    ///
    /// The closure's return value is handed back to the caller. When the
    /// closure leaves the record unchanged nothing is written.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        let mut guard = self.value.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = guard.clone();
        let out = f(&mut next);
        if next == *guard {
            return Ok(out);
        }
        write_atomic(&self.path, &next)?;
        *guard = next.clone();
        self.tx.send_replace(next);
        debug!(path = %self.path.display(), "record persisted");
        Ok(out)
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let data = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serde {
        path: path.display().to_string(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Export any serializable value as pretty JSON to a user-chosen path.
pub fn export_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value).context("serialize export")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    #[test]
    fn open_seeds_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("counter.json");
        let rec = JsonRecord::<Counter>::open(&path).unwrap();
        assert_eq!(rec.get(), Counter::default());
        assert!(path.exists());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let rec = JsonRecord::<Counter>::open(&path).unwrap();
        let seen = rec.update(|c| {
            c.n += 2;
            c.n
        });
        assert_eq!(seen.unwrap(), 2);

        let reopened = JsonRecord::<Counter>::open(&path).unwrap();
        assert_eq!(reopened.get().n, 2);
    }

    #[test]
    fn unchanged_update_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let rec = JsonRecord::<Counter>::open(&path).unwrap();
        std::fs::write(&path, b"{\"n\":0}").unwrap();
        rec.update(|_| ()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"n\":0}");
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        std::fs::write(&path, b"not json").unwrap();
        let rec = JsonRecord::<Counter>::open(&path).unwrap();
        assert_eq!(rec.get(), Counter::default());
    }

    #[test]
    fn subscribers_see_updates() {
        let dir = tempfile::tempdir().unwrap();
        let rec = JsonRecord::<Counter>::open(dir.path().join("c.json")).unwrap();
        let mut rx = rec.subscribe();
        rec.update(|c| c.n = 7).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().n, 7);
    }
}
