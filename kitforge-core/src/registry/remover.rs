//! Registry remover: best-effort inverse of the writer
//!
//! The three artifacts are cleaned independently. A failure on one step is
//! recorded and logged, and the remaining steps still run. Removing a slug
//! that was never written succeeds with nothing to do.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{ExportIndex, Registry, RegistryManifest};
use crate::error::Result;
use crate::naming;

/// One cleanup step of a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveStep {
    Source,
    Index,
    Manifest,
}

impl std::fmt::Display for RemoveStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RemoveStep::Source => "source file",
            RemoveStep::Index => "export index",
            RemoveStep::Manifest => "manifest",
        };
        f.write_str(label)
    }
}

/// Result of a removal attempt
#[derive(Debug, Clone, Serialize)]
pub struct RemoveReport {
    pub slug: String,
    /// Steps that found something and removed it
    pub removed: Vec<RemoveStep>,
    /// Steps that failed, with the error text
    pub failed: Vec<(RemoveStep, String)>,
}

impl RemoveReport {
    fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            removed: vec![],
            failed: vec![],
        }
    }

    fn record(&mut self, step: RemoveStep, outcome: Result<bool>) {
        match outcome {
            Ok(true) => self.removed.push(step),
            Ok(false) => debug!("Nothing to remove from {} for {}", step, self.slug),
            Err(e) => {
                warn!("Failed to clean {} for {}: {}", step, self.slug, e);
                self.failed.push((step, e.to_string()));
            }
        }
    }

    /// Whether every step succeeded (finding nothing counts as success)
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_complete() {
            format!("Removed {} ({} artifacts cleaned)", self.slug, self.removed.len())
        } else {
            format!(
                "Partial removal of {}: {} cleaned, {} failed",
                self.slug,
                self.removed.len(),
                self.failed.len()
            )
        }
    }
}

impl Registry {
    /// Remove a component's source file, export line and manifest entry
    ///
    /// Only a malformed slug is an error. I/O failures are reported in the
    /// returned [`RemoveReport`], never raised.
    pub fn remove(&self, slug: &str) -> Result<RemoveReport> {
        naming::validate_slug(slug)?;

        let mut report = RemoveReport::new(slug);
        report.record(RemoveStep::Source, self.remove_source(slug));
        report.record(RemoveStep::Index, self.remove_export(slug));
        report.record(RemoveStep::Manifest, self.remove_manifest_entry(slug));

        if report.is_complete() {
            info!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
        }
        Ok(report)
    }

    fn remove_source(&self, slug: &str) -> Result<bool> {
        let path = self.layout.source_path(slug);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(crate::error::KitforgeError::io(path, e)),
        }
    }

    fn remove_export(&self, slug: &str) -> Result<bool> {
        let path = self.layout.index_path();
        if !path.exists() {
            return Ok(false);
        }
        let mut index = ExportIndex::load(&path)?;
        if !index.remove(slug) {
            return Ok(false);
        }
        index.save(&path)?;
        Ok(true)
    }

    fn remove_manifest_entry(&self, slug: &str) -> Result<bool> {
        let path = self.layout.manifest_path();
        if !path.exists() {
            return Ok(false);
        }
        let mut manifest = RegistryManifest::load(&path)?;
        if manifest.remove(slug).is_none() {
            return Ok(false);
        }
        manifest.save(&path)?;
        Ok(true)
    }
}
