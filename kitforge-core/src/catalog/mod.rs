//! Catalog store contract
//!
//! The catalog is the authoritative record of every component. Kitforge only
//! relies on the CRUD contract below; the backing store can be a database, a
//! JSON file ([`JsonFileCatalog`]) or memory ([`MemoryCatalog`]).
//!
//! Store errors are reported as [`CatalogError`] and translated into
//! [`KitforgeError`](crate::error::KitforgeError) by the service layer.

mod file;
mod memory;

pub use file::{JsonFileCatalog, DEFAULT_CATALOG_FILE};
pub use memory::MemoryCatalog;

use async_trait::async_trait;
use thiserror::Error;

use crate::component::{ComponentPatch, ComponentRecord};

/// Store-specific failures
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("no component with id '{0}'")]
    NotFound(String),

    /// A uniqueness constraint (id or slug) would be violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store itself failed (connection, file, serialization)
    #[error("{0}")]
    Backend(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// CRUD contract for the authoritative component store
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> CatalogResult<Option<ComponentRecord>>;

    async fn get_by_slug(&self, slug: &str) -> CatalogResult<Option<ComponentRecord>>;

    /// All records, ordered by slug
    async fn list(&self) -> CatalogResult<Vec<ComponentRecord>>;

    /// Insert a new record; id and slug must be unused
    async fn insert(&self, record: ComponentRecord) -> CatalogResult<ComponentRecord>;

    /// Apply a partial update and return the stored result
    async fn update(&self, id: &str, patch: &ComponentPatch) -> CatalogResult<ComponentRecord>;

    async fn delete(&self, id: &str) -> CatalogResult<()>;

    /// Store identifier for logging
    fn name(&self) -> &'static str;
}

/// Shared insert/update rules for the bundled stores
fn check_slug_free(
    records: &[ComponentRecord],
    slug: &str,
    except_id: Option<&str>,
) -> CatalogResult<()> {
    let taken = records
        .iter()
        .any(|r| r.slug == slug && Some(r.id.as_str()) != except_id);
    if taken {
        return Err(CatalogError::Conflict(format!("slug '{slug}' already exists")));
    }
    Ok(())
}

fn apply_patch(record: &ComponentRecord, patch: &ComponentPatch) -> CatalogResult<ComponentRecord> {
    patch
        .apply(record)
        .map_err(|e| CatalogError::Conflict(e.to_string()))
}
