//! Registry manifest (`registry.json`)
//!
//! Slug-keyed metadata mirroring what tooling needs without querying the
//! catalog:
//!
//! ```json
//! {
//!   "my-card": { "name": "MyCard", "variants": { "size": ["sm", "lg"] }, "addedAt": "..." }
//! }
//! ```
//!
//! Older registries stored an array of `{slug, name, variants, addedAt}`
//! records. That shape is still read and is rewritten as the keyed map on the
//! next save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::component::Variants;
use crate::error::{KitforgeError, Result};

/// Metadata for one registered component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default)]
    pub variants: Variants,
    pub added_at: DateTime<Utc>,
}

/// Array-of-records layout written by older tooling
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyEntry {
    slug: String,
    name: String,
    #[serde(default)]
    variants: Variants,
    added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl RegistryManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the manifest, or an empty one if the file does not exist yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| KitforgeError::io(path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_json(&content).map_err(|reason| KitforgeError::parse(path, reason))
    }

    fn from_json(content: &str) -> std::result::Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))?;

        match value {
            serde_json::Value::Object(_) => {
                serde_json::from_value(value).map_err(|e| format!("invalid manifest entry: {e}"))
            }
            serde_json::Value::Array(_) => {
                let legacy: Vec<LegacyEntry> = serde_json::from_value(value)
                    .map_err(|e| format!("invalid legacy manifest record: {e}"))?;
                tracing::debug!(
                    "Migrating legacy array manifest with {} records",
                    legacy.len()
                );
                let mut manifest = Self::default();
                for record in legacy {
                    manifest.entries.insert(
                        record.slug,
                        ManifestEntry {
                            name: record.name,
                            variants: record.variants,
                            added_at: record.added_at.unwrap_or_else(Utc::now),
                        },
                    );
                }
                Ok(manifest)
            }
            _ => Err("manifest must be a JSON object keyed by slug".to_string()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KitforgeError::io(parent, e))?;
        }
        let mut content = serde_json::to_string_pretty(self)
            .map_err(|e| KitforgeError::parse(path, e))?;
        content.push('\n');
        std::fs::write(path, content).map_err(|e| KitforgeError::io(path, e))
    }

    /// Insert or replace the entry for `slug`
    pub fn upsert(&mut self, slug: &str, name: &str, variants: Variants) {
        self.entries.insert(
            slug.to_string(),
            ManifestEntry {
                name: name.to_string(),
                variants,
                added_at: Utc::now(),
            },
        );
    }

    pub fn remove(&mut self, slug: &str) -> Option<ManifestEntry> {
        self.entries.remove(slug)
    }

    pub fn get(&self, slug: &str) -> Option<&ManifestEntry> {
        self.entries.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.entries.contains_key(slug)
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_replaces_existing() {
        let mut manifest = RegistryManifest::new();
        manifest.upsert("my-card", "MyCard", Variants::new());
        let variants = Variants::new().with_axis("size", ["sm", "lg"]).unwrap();
        manifest.upsert("my-card", "MyCard", variants.clone());

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("my-card").unwrap().variants, variants);
    }

    #[test]
    fn test_save_writes_keyed_shape() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");

        let mut manifest = RegistryManifest::new();
        manifest.upsert(
            "my-card",
            "MyCard",
            Variants::new().with_axis("size", ["sm", "lg"]).unwrap(),
        );
        manifest.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["my-card"]["name"], json!("MyCard"));
        assert_eq!(raw["my-card"]["variants"], json!({"size": ["sm", "lg"]}));
        assert!(raw["my-card"]["addedAt"].is_string());

        assert_eq!(RegistryManifest::load(&path).unwrap(), manifest);
    }

    #[test]
    fn test_load_migrates_legacy_array() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"[
  {"slug": "my-card", "name": "MyCard", "variants": {"size": ["sm"]}, "addedAt": "2024-05-01T10:00:00Z"},
  {"slug": "hero", "name": "Hero"}
]"#,
        )
        .unwrap();

        let manifest = RegistryManifest::load(&path).unwrap();
        assert_eq!(manifest.slugs().collect::<Vec<_>>(), vec!["hero", "my-card"]);
        assert_eq!(manifest.get("my-card").unwrap().name, "MyCard");
    }

    #[test]
    fn test_load_rejects_unexpected_shape() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");

        std::fs::write(&path, "\"nope\"").unwrap();
        assert!(matches!(
            RegistryManifest::load(&path),
            Err(KitforgeError::Parse { .. })
        ));

        std::fs::write(&path, r#"{"my-card": {"variants": {}}}"#).unwrap();
        assert!(matches!(
            RegistryManifest::load(&path),
            Err(KitforgeError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = RegistryManifest::load(&temp_dir.path().join("absent.json")).unwrap();
        assert!(manifest.is_empty());
    }
}
