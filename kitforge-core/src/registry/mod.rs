//! Kitforge Registry - generated component files on disk
//!
//! The registry is the human-readable mirror of the catalog. For every live
//! component it holds:
//!
//! ```text
//! components/generated/
//!     ├── my-card.tsx     ← generated source, one per slug
//!     ├── hero.tsx
//!     ├── index.ts        ← export { MyCard } from "./my-card"; ...
//!     └── registry.json   ← { "my-card": { name, variants, addedAt }, ... }
//! ```
//!
//! [`Registry::write`] and [`Registry::remove`] touch the three artifacts in a
//! fixed order without holding a lock across them. Callers that run
//! concurrently go through [`RegistryHandle`], which funnels every mutation
//! through one task.

mod actor;
mod export_index;
mod manifest;
mod remover;
mod writer;

pub use actor::{RegistryCommand, RegistryHandle};
pub use export_index::{export_line, ExportIndex, PLACEHOLDER};
pub use manifest::{ManifestEntry, RegistryManifest};
pub use remover::{RemoveReport, RemoveStep};
pub use writer::{WriteReport, WriteRequest};

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{KitforgeError, Result};

/// Default registry directory, relative to the project root
pub const DEFAULT_REGISTRY_DIR: &str = "components/generated";

/// Where the registry artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLayout {
    pub root: PathBuf,
    pub source_extension: String,
    pub index_file: String,
    pub manifest_file: String,
}

impl RegistryLayout {
    /// Layout with default file names under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source_extension: "tsx".to_string(),
            index_file: "index.ts".to_string(),
            manifest_file: "registry.json".to_string(),
        }
    }

    pub fn source_path(&self, slug: &str) -> PathBuf {
        self.root
            .join(format!("{slug}.{}", self.source_extension))
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index_file)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_file)
    }
}

impl Default for RegistryLayout {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_DIR)
    }
}

/// File-backed component registry
#[derive(Debug, Clone)]
pub struct Registry {
    layout: RegistryLayout,
}

impl Registry {
    pub fn new(layout: RegistryLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    /// Create the registry directory, placeholder index and empty manifest
    /// if they do not exist. Existing artifacts are left alone.
    pub fn init(&self) -> Result<()> {
        let root = &self.layout.root;
        std::fs::create_dir_all(root).map_err(|e| KitforgeError::io(root, e))?;

        let index_path = self.layout.index_path();
        if !index_path.exists() {
            ExportIndex::new().save(&index_path)?;
        }

        let manifest_path = self.layout.manifest_path();
        if !manifest_path.exists() {
            RegistryManifest::new().save(&manifest_path)?;
        }

        tracing::debug!("Initialized registry at {}", root.display());
        Ok(())
    }

    /// Slugs currently present in each artifact
    pub fn status(&self) -> Result<RegistryStatus> {
        let index_slugs = ExportIndex::load(&self.layout.index_path())?
            .slugs()
            .into_iter()
            .collect();
        let manifest_slugs = RegistryManifest::load(&self.layout.manifest_path())?
            .slugs()
            .map(str::to_string)
            .collect();
        let source_slugs = self.source_slugs()?;

        Ok(RegistryStatus {
            index_slugs,
            manifest_slugs,
            source_slugs,
        })
    }

    fn source_slugs(&self) -> Result<BTreeSet<String>> {
        let root = &self.layout.root;
        let mut slugs = BTreeSet::new();
        if !root.exists() {
            return Ok(slugs);
        }

        let index_path = self.layout.index_path();
        for entry in std::fs::read_dir(root).map_err(|e| KitforgeError::io(root, e))? {
            let entry = entry.map_err(|e| KitforgeError::io(root, e))?;
            let path = entry.path();
            if path == index_path || !path.is_file() {
                continue;
            }
            if let Some(slug) = slug_for_source(&path, &self.layout.source_extension) {
                slugs.insert(slug);
            }
        }
        Ok(slugs)
    }
}

fn slug_for_source(path: &Path, extension: &str) -> Option<String> {
    if path.extension()?.to_str()? != extension {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    crate::naming::is_valid_slug(stem).then(|| stem.to_string())
}

/// Slug sets found in each registry artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    pub index_slugs: BTreeSet<String>,
    pub manifest_slugs: BTreeSet<String>,
    pub source_slugs: BTreeSet<String>,
}

impl RegistryStatus {
    /// Whether all three artifacts agree on the set of live slugs
    pub fn is_consistent(&self) -> bool {
        self.index_slugs == self.manifest_slugs && self.manifest_slugs == self.source_slugs
    }

    /// Union of slugs seen anywhere in the registry
    pub fn all_slugs(&self) -> BTreeSet<String> {
        self.index_slugs
            .iter()
            .chain(&self.manifest_slugs)
            .chain(&self.source_slugs)
            .cloned()
            .collect()
    }
}
