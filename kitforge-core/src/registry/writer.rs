//! Registry writer: persist one component into the registry

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{ExportIndex, Registry, RegistryManifest};
use crate::component::Variants;
use crate::error::{KitforgeError, Result};
use crate::naming::{self, NamingWarning};

/// Everything the writer needs for one component
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub slug: String,
    pub code: String,
    pub name: String,
    pub variants: Variants,
}

impl WriteRequest {
    pub fn new(slug: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            code: code.into(),
            name: name.into(),
            variants: Variants::default(),
        }
    }

    pub fn with_variants(mut self, variants: Variants) -> Self {
        self.variants = variants;
        self
    }

    /// Check preconditions without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        naming::validate_slug(&self.slug)?;
        if self.code.trim().is_empty() {
            return Err(KitforgeError::Validation(format!(
                "code for '{}' cannot be empty",
                self.slug
            )));
        }
        naming::validate_name(&self.name)
    }
}

/// Outcome of a successful write
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub slug: String,
    pub source_path: PathBuf,
    /// Whether the export index changed (false when the line was present)
    pub index_updated: bool,
    pub warnings: Vec<NamingWarning>,
}

impl Registry {
    /// Write one component's source, export line and manifest entry
    ///
    /// Steps run in order: source file (overwritten), export index, manifest.
    /// A failure stops at that step and leaves earlier steps applied; undoing
    /// them is the caller's job.
    pub fn write(&self, request: &WriteRequest) -> Result<WriteReport> {
        request.validate()?;
        let WriteRequest {
            slug,
            code,
            name,
            variants,
        } = request;

        let warnings = naming::naming_warnings(slug);
        for warning in &warnings {
            warn!("{}", warning);
        }

        let root = &self.layout.root;
        std::fs::create_dir_all(root).map_err(|e| KitforgeError::io(root, e))?;

        let source_path = self.layout.source_path(slug);
        std::fs::write(&source_path, code).map_err(|e| KitforgeError::io(&source_path, e))?;
        debug!("Wrote source for {} to {}", slug, source_path.display());

        let index_path = self.layout.index_path();
        let mut index = ExportIndex::load(&index_path)?;
        let index_updated = index.insert(name, slug);
        if index_updated {
            index.save(&index_path)?;
            debug!("Added export for {} to {}", name, index_path.display());
        } else {
            debug!("Export for {} already present", name);
        }

        let manifest_path = self.layout.manifest_path();
        let mut manifest = RegistryManifest::load(&manifest_path)?;
        manifest.upsert(slug, name, variants.clone());
        manifest.save(&manifest_path)?;
        debug!("Upserted manifest entry for {}", slug);

        info!("Registered component {} ({})", name, slug);
        Ok(WriteReport {
            slug: slug.clone(),
            source_path,
            index_updated,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RegistryLayout, PLACEHOLDER};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn registry(temp_dir: &TempDir) -> Registry {
        let registry = Registry::new(RegistryLayout::new(temp_dir.path().join("generated")));
        registry.init().unwrap();
        registry
    }

    #[test]
    fn test_write_creates_all_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        let report = registry
            .write(&WriteRequest::new("my-card", "export const MyCard = 1;", "MyCard"))
            .unwrap();

        assert!(report.index_updated);
        assert!(report.warnings.is_empty());
        assert_eq!(
            std::fs::read_to_string(&report.source_path).unwrap(),
            "export const MyCard = 1;"
        );

        let index = std::fs::read_to_string(registry.layout().index_path()).unwrap();
        assert!(!index.contains(PLACEHOLDER));
        assert!(index.contains("export { MyCard } from \"./my-card\";"));

        let status = registry.status().unwrap();
        assert!(status.is_consistent());
    }

    #[test]
    fn test_rewrite_overwrites_without_duplication() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        registry
            .write(&WriteRequest::new("my-card", "A", "MyCard"))
            .unwrap();
        let report = registry
            .write(&WriteRequest::new("my-card", "B", "MyCard"))
            .unwrap();

        assert!(!report.index_updated);
        assert_eq!(std::fs::read_to_string(&report.source_path).unwrap(), "B");

        let index = std::fs::read_to_string(registry.layout().index_path()).unwrap();
        assert_eq!(index.matches("./my-card").count(), 1);
        let manifest = RegistryManifest::load(&registry.layout().manifest_path()).unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_validation_has_no_side_effects() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Registry::new(RegistryLayout::new(temp_dir.path().join("generated")));

        for request in [
            WriteRequest::new("My Card", "code", "MyCard"),
            WriteRequest::new("my-card", "   ", "MyCard"),
            WriteRequest::new("my-card", "code", "myCard"),
        ] {
            assert!(matches!(
                registry.write(&request),
                Err(KitforgeError::Validation(_))
            ));
        }
        assert!(!temp_dir.path().join("generated").exists());
    }

    #[test]
    fn test_digit_adjacent_slug_warns() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        let report = registry
            .write(&WriteRequest::new("button2", "code", "Button2"))
            .unwrap();
        assert_eq!(report.warnings.len(), 1);
    }
}
