//! JSON-file catalog (`.kitforge/catalog.json`)
//!
//! The whole catalog is read and rewritten on every mutation. A mutex keeps
//! mutations within one process sequential; the file is not safe to share
//! between processes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{apply_patch, check_slug_free, CatalogError, CatalogResult, CatalogStore};
use crate::component::{ComponentPatch, ComponentRecord};

/// Default catalog file location
pub const DEFAULT_CATALOG_FILE: &str = ".kitforge/catalog.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    #[serde(default)]
    components: Vec<ComponentRecord>,
}

#[derive(Debug)]
pub struct JsonFileCatalog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> CatalogResult<CatalogFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(CatalogFile::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                CatalogError::Backend(format!(
                    "failed to parse catalog {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CatalogFile::default()),
            Err(e) => Err(CatalogError::Backend(format!(
                "failed to read catalog {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, file: &CatalogFile) -> CatalogResult<()> {
        let backend = |e: std::io::Error| {
            CatalogError::Backend(format!(
                "failed to write catalog {}: {e}",
                self.path.display()
            ))
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(backend)?;
        }
        let content = serde_json::to_string_pretty(file)
            .map_err(|e| CatalogError::Backend(format!("failed to serialize catalog: {e}")))?;
        tokio::fs::write(&self.path, content).await.map_err(backend)
    }
}

#[async_trait]
impl CatalogStore for JsonFileCatalog {
    async fn get_by_id(&self, id: &str) -> CatalogResult<Option<ComponentRecord>> {
        let file = self.load().await?;
        Ok(file.components.into_iter().find(|r| r.id == id))
    }

    async fn get_by_slug(&self, slug: &str) -> CatalogResult<Option<ComponentRecord>> {
        let file = self.load().await?;
        Ok(file.components.into_iter().find(|r| r.slug == slug))
    }

    async fn list(&self) -> CatalogResult<Vec<ComponentRecord>> {
        let mut records = self.load().await?.components;
        records.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(records)
    }

    async fn insert(&self, record: ComponentRecord) -> CatalogResult<ComponentRecord> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        if file.components.iter().any(|r| r.id == record.id) {
            return Err(CatalogError::Conflict(format!(
                "id '{}' already exists",
                record.id
            )));
        }
        check_slug_free(&file.components, &record.slug, None)?;

        file.components.push(record.clone());
        self.save(&file).await?;
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &ComponentPatch) -> CatalogResult<ComponentRecord> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        let pos = file
            .components
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        let next = apply_patch(&file.components[pos], patch)?;
        check_slug_free(&file.components, &next.slug, Some(id))?;
        file.components[pos] = next.clone();
        self.save(&file).await?;
        Ok(next)
    }

    async fn delete(&self, id: &str) -> CatalogResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        let before = file.components.len();
        file.components.retain(|r| r.id != id);
        if file.components.len() == before {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        self.save(&file).await
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}
