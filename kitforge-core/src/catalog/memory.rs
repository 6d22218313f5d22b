//! In-memory catalog, for tests and embedding

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{apply_patch, check_slug_free, CatalogError, CatalogResult, CatalogStore};
use crate::component::{ComponentPatch, ComponentRecord};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: RwLock<Vec<ComponentRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ComponentRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn get_by_id(&self, id: &str) -> CatalogResult<Option<ComponentRecord>> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> CatalogResult<Option<ComponentRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.slug == slug)
            .cloned())
    }

    async fn list(&self) -> CatalogResult<Vec<ComponentRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(records)
    }

    async fn insert(&self, record: ComponentRecord) -> CatalogResult<ComponentRecord> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(CatalogError::Conflict(format!(
                "id '{}' already exists",
                record.id
            )));
        }
        check_slug_free(&records, &record.slug, None)?;
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &ComponentPatch) -> CatalogResult<ComponentRecord> {
        let mut records = self.records.write().await;
        let pos = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        let next = apply_patch(&records[pos], patch)?;
        check_slug_free(&records, &next.slug, Some(id))?;
        records[pos] = next.clone();
        Ok(next)
    }

    async fn delete(&self, id: &str) -> CatalogResult<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
