//! Durable storage for the base layer selection.
//!
//! The engine only talks to [`BaseLayerStore`]. [`FileStore`] keeps the
//! selection in a small TOML state file, [`MemoryStore`] keeps it in memory
//! (tests, `--no-persist`), and [`WriteBehind`] queues writes so that a slow
//! store never sits between two key events.

use crate::models::LayerId;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage collaborator for the persisted base layer.
pub trait BaseLayerStore {
    /// Reads the persisted base layer, `None` if nothing was saved yet.
    fn load_base_layer(&mut self) -> Result<Option<LayerId>>;

    /// Persists the base layer.
    fn save_base_layer(&mut self, layer: LayerId) -> Result<()>;

    /// Completes deferred writes. Stores that write inline have nothing to do.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: BaseLayerStore + ?Sized> BaseLayerStore for Box<S> {
    fn load_base_layer(&mut self) -> Result<Option<LayerId>> {
        (**self).load_base_layer()
    }

    fn save_base_layer(&mut self, layer: LayerId) -> Result<()> {
        (**self).save_base_layer(layer)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// On-disk layout of the state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedState {
    /// Selected base layer
    base_layer: LayerId,
    /// When the selection was written
    saved_at: DateTime<Utc>,
}

/// Base layer store backed by a TOML file.
///
/// Writes use the temp file + rename pattern so an interrupted write never
/// leaves a truncated state file behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store for the given state file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamp of the last save, if the file exists.
    pub fn saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read_state()?.map(|state| state.saved_at))
    }

    fn read_state(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).context(format!(
            "Failed to read state file: {}",
            self.path.display()
        ))?;

        let state: PersistedState = toml::from_str(&content).context(format!(
            "Failed to parse state file: {}",
            self.path.display()
        ))?;

        Ok(Some(state))
    }
}

impl BaseLayerStore for FileStore {
    fn load_base_layer(&mut self) -> Result<Option<LayerId>> {
        Ok(self.read_state()?.map(|state| state.base_layer))
    }

    fn save_base_layer(&mut self, layer: LayerId) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).context(format!(
                    "Failed to create state directory: {}",
                    dir.display()
                ))?;
            }
        }

        let state = PersistedState {
            base_layer: layer,
            saved_at: Utc::now(),
        };
        let content = toml::to_string_pretty(&state).context("Failed to serialize state")?;

        let temp_path = self.path.with_extension("toml.tmp");
        fs::write(&temp_path, content).context(format!(
            "Failed to write temp state file: {}",
            temp_path.display()
        ))?;

        fs::rename(&temp_path, &self.path).context(format!(
            "Failed to rename temp state file to: {}",
            self.path.display()
        ))?;

        Ok(())
    }
}

/// In-memory base layer store that records every save.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    current: Option<LayerId>,
    saves: Vec<LayerId>,
    fail_saves: bool,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds a persisted selection.
    #[must_use]
    pub fn with_base_layer(layer: LayerId) -> Self {
        Self {
            current: Some(layer),
            ..Self::default()
        }
    }

    /// Makes every subsequent save fail (storage fault simulation).
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    /// Every successful save, in call order.
    #[must_use]
    pub fn saves(&self) -> &[LayerId] {
        &self.saves
    }

    /// Currently persisted value.
    #[must_use]
    pub fn current(&self) -> Option<LayerId> {
        self.current
    }
}

impl BaseLayerStore for MemoryStore {
    fn load_base_layer(&mut self) -> Result<Option<LayerId>> {
        Ok(self.current)
    }

    fn save_base_layer(&mut self, layer: LayerId) -> Result<()> {
        if self.fail_saves {
            anyhow::bail!("Simulated storage failure while saving base layer {layer}");
        }
        self.current = Some(layer);
        self.saves.push(layer);
        Ok(())
    }
}

/// Write-behind wrapper: saves are queued and written on [`BaseLayerStore::flush`].
#[derive(Debug, Clone)]
pub struct WriteBehind<S> {
    inner: S,
    pending: VecDeque<LayerId>,
}

impl<S: BaseLayerStore> WriteBehind<S> {
    /// Wraps a store.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
        }
    }

    /// Number of queued writes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: BaseLayerStore> BaseLayerStore for WriteBehind<S> {
    fn load_base_layer(&mut self) -> Result<Option<LayerId>> {
        // Queued writes are newer than anything on disk
        if let Some(layer) = self.pending.back() {
            return Ok(Some(*layer));
        }
        self.inner.load_base_layer()
    }

    fn save_base_layer(&mut self, layer: LayerId) -> Result<()> {
        self.pending.push_back(layer);
        Ok(())
    }

    /// Writes every queued value in order. Failed writes are dropped; the
    /// first failure is returned after the queue is drained.
    fn flush(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(layer) = self.pending.pop_front() {
            if let Err(e) = self.inner.save_base_layer(layer) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
