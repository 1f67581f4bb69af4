//! The list of places the alert monitor checks.
//!
//! Names are stored title-cased, so "  prague" and "PRAGUE" are the same
//! entry. Every mutation is persisted before it becomes visible in memory.

use anyhow::{Context, Result};
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::model::title_case;

/// Shared handle used by command handlers (write) and the monitor (read).
pub type SharedWatchList = Arc<RwLock<WatchList>>;

/// Durable backing store for the watch list.
pub trait WatchListStore: Send + Sync + Debug {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Vec<String>>>;

    /// Replace the stored list as a whole.
    fn save(&self, names: &[String]) -> Result<()>;
}

/// JSON array on disk, replaced atomically via a temp file + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WatchListStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read watch list: {}", self.path.display()))?;
        let names: Vec<String> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse watch list: {}", self.path.display()))?;

        Ok(Some(names))
    }

    fn save(&self, names: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create watch list directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(names).context("Failed to serialize watch list")?;
        let tmp = self.temp_path();

        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write watch list: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace watch list: {}", self.path.display()))?;

        Ok(())
    }
}

/// Result of [`WatchList::add`] / [`WatchList::remove`], carrying the
/// normalized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchChange {
    Added(String),
    AlreadyPresent(String),
    Removed(String),
    NotPresent(String),
    /// The name was empty after normalization; nothing was changed.
    Blank,
}

#[derive(Debug)]
pub struct WatchList {
    names: Vec<String>,
    store: Box<dyn WatchListStore>,
}

impl WatchList {
    /// Load from `store`, seeding it with `default_city` on first run.
    pub fn load(store: Box<dyn WatchListStore>, default_city: &str) -> Result<Self> {
        let names = match store.load()? {
            Some(names) => dedup_normalized(names),
            None => {
                let seed = vec![title_case(default_city)];
                store.save(&seed)?;
                info!("Seeded watch list with {}", seed[0]);
                seed
            }
        };

        Ok(Self { names, store })
    }

    pub fn into_shared(self) -> SharedWatchList {
        Arc::new(RwLock::new(self))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = title_case(name);
        self.names.contains(&name)
    }

    pub fn add(&mut self, name: &str) -> Result<WatchChange> {
        let name = title_case(name);
        if name.is_empty() {
            return Ok(WatchChange::Blank);
        }
        if self.names.contains(&name) {
            return Ok(WatchChange::AlreadyPresent(name));
        }

        let mut next = self.names.clone();
        next.push(name.clone());
        self.commit(next)?;

        info!("Added {} to the watch list", name);
        Ok(WatchChange::Added(name))
    }

    pub fn remove(&mut self, name: &str) -> Result<WatchChange> {
        let name = title_case(name);
        if name.is_empty() {
            return Ok(WatchChange::Blank);
        }
        if !self.names.contains(&name) {
            return Ok(WatchChange::NotPresent(name));
        }

        let next: Vec<String> = self.names.iter().filter(|n| **n != name).cloned().collect();
        self.commit(next)?;

        info!("Removed {} from the watch list", name);
        Ok(WatchChange::Removed(name))
    }

    fn commit(&mut self, next: Vec<String>) -> Result<()> {
        self.store.save(&next)?;
        self.names = next;
        Ok(())
    }
}

fn dedup_normalized(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names.iter().map(|n| title_case(n)) {
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
