//! Component service: keeps the catalog and the registry in step
//!
//! There is no transaction spanning the catalog and the registry files. The
//! service approximates all-or-nothing by ordering the steps and undoing the
//! registry side when the catalog refuses a change.
//!
//! # Per-slug states
//!
//! ```text
//!  ABSENT ──write ok──► REGISTRY_ONLY ──catalog commit ok──► LIVE
//!    ▲                        │                                │
//!    └──── compensation ◄─────┘ commit failed        catalog delete
//!    ▲                                                         ▼
//!    └──────────────── registry cleanup ok ◄────────── CATALOG_GONE
//! ```
//!
//! A failed cleanup after a catalog delete leaves the slug in `CATALOG_GONE`
//! with orphaned artifacts. That drift is logged and reported by
//! [`ComponentService::drift`]; nothing here repairs it.
//!
//! # Ordering
//!
//! - Create/update: registry first, then catalog. A catalog failure triggers
//!   compensation, then the error is returned.
//! - Delete: catalog first (it is authoritative), then best-effort registry
//!   cleanup. Cleanup failures never fail the delete.
//!
//! Each flow holds the lock of every slug it touches, from its first catalog
//! read until compensation has finished. Two flows on the same slug never
//! interleave, so one flow's compensation cannot remove artifacts another
//! flow just committed.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogError, CatalogStore};
use crate::component::{ComponentDraft, ComponentPatch, ComponentRecord};
use crate::config::RateLimitSettings;
use crate::error::{KitforgeError, Result};
use crate::naming::NamingWarning;
use crate::rate_limit::{RateLimitDecision, RateLimiter, SweeperGuard};
use crate::registry::{RegistryHandle, RegistryStatus, RemoveReport, WriteRequest};

/// Which limiter a check goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterKind {
    /// Create, update and delete
    Mutation,
    /// Generator calls made by the caller before a create
    Generation,
}

/// The service's independent limiters
#[derive(Debug, Clone)]
pub struct Limiters {
    pub mutation: RateLimiter,
    pub generation: RateLimiter,
}

impl Limiters {
    pub fn from_settings(settings: &RateLimitSettings) -> Result<Self> {
        Ok(Self {
            mutation: RateLimiter::new("mutation", settings.mutation)?,
            generation: RateLimiter::new("generation", settings.generation)?,
        })
    }

    pub fn get(&self, kind: LimiterKind) -> &RateLimiter {
        match kind {
            LimiterKind::Mutation => &self.mutation,
            LimiterKind::Generation => &self.generation,
        }
    }

    /// Start one sweeper per limiter; they stop when the guards drop
    pub fn spawn_sweepers(&self, settings: &RateLimitSettings) -> Vec<SweeperGuard> {
        vec![
            self.mutation.spawn_sweeper(settings.sweep_interval()),
            self.generation.spawn_sweeper(settings.sweep_interval()),
        ]
    }
}

/// Result of a successful create or update
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub record: ComponentRecord,
    pub warnings: Vec<NamingWarning>,
}

/// Result of a successful delete
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub record: ComponentRecord,
    /// Registry cleanup report; `None` if cleanup could not run at all
    pub cleanup: Option<RemoveReport>,
}

impl DeleteOutcome {
    /// Whether the registry still holds traces of the deleted component
    pub fn left_orphans(&self) -> bool {
        self.cleanup.as_ref().map_or(true, |r| !r.is_complete())
    }
}

/// How a slug diverges between the catalog and the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drift {
    /// Catalog record without a complete set of registry artifacts
    MissingArtifacts { slug: String, missing: Vec<String> },
    /// Registry artifacts without a catalog record
    Orphaned { slug: String, present: Vec<String> },
}

/// Per-slug async locks held across a whole create/update/delete flow
#[derive(Debug, Default)]
struct SlugLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SlugLocks {
    /// Lock every slug in `slugs`, in sorted order so overlapping sets
    /// cannot deadlock
    async fn acquire(&self, slugs: &[&str]) -> Vec<OwnedMutexGuard<()>> {
        let mut wanted: Vec<&str> = slugs.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let mutexes: Vec<_> = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            wanted
                .iter()
                .map(|slug| locks.entry(slug.to_string()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        debug!("Locked slugs {:?}", wanted);
        guards
    }
}

pub struct ComponentService {
    catalog: Arc<dyn CatalogStore>,
    registry: RegistryHandle,
    limiters: Limiters,
    slug_locks: SlugLocks,
}

impl ComponentService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        registry: RegistryHandle,
        limiters: Limiters,
    ) -> Self {
        Self {
            catalog,
            registry,
            limiters,
            slug_locks: SlugLocks::default(),
        }
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn limiters(&self) -> &Limiters {
        &self.limiters
    }

    /// Check and count one request against a limiter
    pub fn rate_limiter_check(&self, kind: LimiterKind, identifier: &str) -> RateLimitDecision {
        self.limiters.get(kind).check(identifier)
    }

    fn admit(&self, caller: &str) -> Result<()> {
        self.rate_limiter_check(LimiterKind::Mutation, caller)
            .into_result(caller)
            .map(|_| ())
    }

    pub async fn get(&self, id: &str) -> Result<ComponentRecord> {
        self.catalog
            .get_by_id(id)
            .await
            .map_err(translate)?
            .ok_or_else(|| KitforgeError::NotFound(format!("component '{id}'")))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<ComponentRecord> {
        self.catalog
            .get_by_slug(slug)
            .await
            .map_err(translate)?
            .ok_or_else(|| KitforgeError::NotFound(format!("component '{slug}'")))
    }

    pub async fn list(&self) -> Result<Vec<ComponentRecord>> {
        self.catalog.list().await.map_err(translate)
    }

    /// Create a component: registry write, then catalog insert
    pub async fn create(&self, caller: &str, draft: ComponentDraft) -> Result<MutationOutcome> {
        self.admit(caller)?;

        let name = draft.resolve_name()?;
        let request = WriteRequest::new(&draft.slug, &draft.code, &name)
            .with_variants(draft.variants.clone());
        request.validate()?;

        let _locks = self.slug_locks.acquire(&[draft.slug.as_str()]).await;
        if self
            .catalog
            .get_by_slug(&draft.slug)
            .await
            .map_err(translate)?
            .is_some()
        {
            return Err(KitforgeError::Validation(format!(
                "component '{}' already exists",
                draft.slug
            )));
        }

        let slug = draft.slug.clone();
        let report = match self.registry.write(request).await {
            Ok(report) => report,
            Err(e) => {
                self.compensate_remove(&slug).await;
                return Err(e);
            }
        };

        let record = match self.catalog.insert(draft.into_record(name)).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Catalog insert failed for {}: {}", slug, e);
                self.compensate_remove(&slug).await;
                return Err(translate(e));
            }
        };

        info!("Created component {} ({})", record.slug, record.id);
        Ok(MutationOutcome {
            record,
            warnings: report.warnings,
        })
    }

    /// Update a component: registry write, then catalog update
    ///
    /// If the catalog rejects the update, the registry is restored from the
    /// previous record. A slug change removes the old slug's artifacts only
    /// after the catalog commit.
    pub async fn update(
        &self,
        caller: &str,
        id: &str,
        patch: ComponentPatch,
    ) -> Result<MutationOutcome> {
        self.admit(caller)?;

        let (previous, next, _locks) = self.lock_for_update(id, &patch).await?;
        let slug_changed = next.slug != previous.slug;

        if slug_changed {
            let taken = self
                .catalog
                .get_by_slug(&next.slug)
                .await
                .map_err(translate)?
                .is_some();
            if taken {
                return Err(KitforgeError::Validation(format!(
                    "component '{}' already exists",
                    next.slug
                )));
            }
        }

        let request = WriteRequest::new(&next.slug, &next.code, &next.name)
            .with_variants(next.variants.clone());
        let report = match self.registry.write(request).await {
            Ok(report) => report,
            Err(e) => {
                self.compensate_restore(&previous, &next.slug).await;
                return Err(e);
            }
        };

        let record = match self.catalog.update(id, &patch).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Catalog update failed for {}: {}", id, e);
                self.compensate_restore(&previous, &next.slug).await;
                return Err(translate(e));
            }
        };

        if slug_changed {
            self.cleanup(&previous.slug).await;
        }

        info!("Updated component {} ({})", record.slug, record.id);
        Ok(MutationOutcome {
            record,
            warnings: report.warnings,
        })
    }

    /// Delete a component: catalog delete, then best-effort registry cleanup
    pub async fn delete(&self, caller: &str, id: &str) -> Result<DeleteOutcome> {
        self.admit(caller)?;

        let (record, _locks) = loop {
            let seen = self.get(id).await?;
            let locks = self.slug_locks.acquire(&[seen.slug.as_str()]).await;
            let current = self.get(id).await?;
            if current.slug == seen.slug {
                break (current, locks);
            }
            debug!("Slug of {} changed while waiting for its lock, retrying", id);
        };
        self.catalog.delete(id).await.map_err(translate)?;
        info!("Deleted catalog record {} ({})", record.slug, record.id);

        let cleanup = self.cleanup(&record.slug).await;
        Ok(DeleteOutcome { record, cleanup })
    }

    /// Read the record, lock its current and target slugs, then re-read it
    ///
    /// Retries when a concurrent rename moved the record to another slug
    /// while this flow was waiting.
    async fn lock_for_update(
        &self,
        id: &str,
        patch: &ComponentPatch,
    ) -> Result<(ComponentRecord, ComponentRecord, Vec<OwnedMutexGuard<()>>)> {
        loop {
            let seen = self.get(id).await?;
            let target = patch.apply(&seen)?;
            let locks = self
                .slug_locks
                .acquire(&[seen.slug.as_str(), target.slug.as_str()])
                .await;

            let previous = self.get(id).await?;
            if previous.slug == seen.slug {
                let next = patch.apply(&previous)?;
                return Ok((previous, next, locks));
            }
            debug!("Slug of {} changed while waiting for its lock, retrying", id);
        }
    }

    /// Compare catalog slugs with each registry artifact
    pub async fn drift(&self) -> Result<Vec<Drift>> {
        let catalog: BTreeSet<String> = self.list().await?.into_iter().map(|r| r.slug).collect();
        let status = self.registry.status().await?;
        Ok(compare(&catalog, &status))
    }

    /// Best-effort registry removal; failures are logged, never raised
    async fn cleanup(&self, slug: &str) -> Option<RemoveReport> {
        match self.registry.remove(slug).await {
            Ok(report) => {
                if !report.is_complete() {
                    warn!(
                        "Registry cleanup for {} incomplete, orphaned artifacts remain: {:?}",
                        slug, report.failed
                    );
                }
                Some(report)
            }
            Err(e) => {
                warn!("Registry cleanup for {} did not run: {}", slug, e);
                None
            }
        }
    }

    async fn compensate_remove(&self, slug: &str) {
        warn!("Compensating: removing registry artifacts for {}", slug);
        match self.registry.remove(slug).await {
            Ok(report) if report.is_complete() => {}
            Ok(report) => error!("Compensation for {} incomplete: {}", slug, report.summary()),
            Err(e) => error!("Compensation for {} failed: {}", slug, e),
        }
    }

    /// Put the registry back the way `previous` had it
    async fn compensate_restore(&self, previous: &ComponentRecord, attempted_slug: &str) {
        warn!("Compensating: restoring registry entry for {}", previous.slug);
        if attempted_slug != previous.slug {
            self.compensate_remove(attempted_slug).await;
        }

        let request = WriteRequest::new(&previous.slug, &previous.code, &previous.name)
            .with_variants(previous.variants.clone());
        if let Err(e) = self.registry.write(request).await {
            error!("Compensation for {} failed to restore: {}", previous.slug, e);
        }
    }
}

fn compare(catalog: &BTreeSet<String>, status: &RegistryStatus) -> Vec<Drift> {
    let artifacts = |slug: &str| -> Vec<(&'static str, bool)> {
        vec![
            ("source", status.source_slugs.contains(slug)),
            ("index", status.index_slugs.contains(slug)),
            ("manifest", status.manifest_slugs.contains(slug)),
        ]
    };

    let mut drift = Vec::new();
    for slug in catalog {
        let missing: Vec<String> = artifacts(slug)
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(artifact, _)| artifact.to_string())
            .collect();
        if !missing.is_empty() {
            drift.push(Drift::MissingArtifacts {
                slug: slug.clone(),
                missing,
            });
        }
    }
    for slug in status.all_slugs().difference(catalog) {
        let present = artifacts(slug)
            .into_iter()
            .filter(|(_, present)| *present)
            .map(|(artifact, _)| artifact.to_string())
            .collect();
        drift.push(Drift::Orphaned {
            slug: slug.clone(),
            present,
        });
    }
    drift
}

/// Map store failures onto the engine's error kinds
fn translate(err: CatalogError) -> KitforgeError {
    match err {
        CatalogError::NotFound(id) => KitforgeError::NotFound(format!("component '{id}'")),
        CatalogError::Conflict(reason) => KitforgeError::Validation(reason),
        CatalogError::Backend(reason) => KitforgeError::Catalog(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compare_reports_both_directions() {
        let status = RegistryStatus {
            index_slugs: set(&["live", "orphan"]),
            manifest_slugs: set(&["live"]),
            source_slugs: set(&["live", "orphan"]),
        };
        let drift = compare(&set(&["live", "half"]), &status);

        assert_eq!(
            drift,
            vec![
                Drift::MissingArtifacts {
                    slug: "half".into(),
                    missing: vec!["source".into(), "index".into(), "manifest".into()],
                },
                Drift::Orphaned {
                    slug: "orphan".into(),
                    present: vec!["source".into(), "index".into()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_slug_lock_is_exclusive_until_dropped() {
        let locks = SlugLocks::default();
        let held = locks.acquire(&["my-card"]).await;

        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.acquire(&["my-card"]),
        )
        .await;
        assert!(waiting.is_err());

        // Other slugs are independent
        let other = locks.acquire(&["hero"]).await;
        assert_eq!(other.len(), 1);

        drop(held);
        let reacquired = locks.acquire(&["my-card", "my-card"]).await;
        assert_eq!(reacquired.len(), 1);
    }

    #[tokio::test]
    async fn test_slug_locks_are_pruned_when_released() {
        let locks = SlugLocks::default();
        drop(locks.acquire(&["a", "b"]).await);
        let _held = locks.acquire(&["c"]).await;

        let table = locks.locks.lock().unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn test_translate() {
        assert!(matches!(
            translate(CatalogError::NotFound("x".into())),
            KitforgeError::NotFound(_)
        ));
        assert!(matches!(
            translate(CatalogError::Backend("down".into())),
            KitforgeError::Catalog(_)
        ));
        assert!(matches!(
            translate(CatalogError::Conflict("dup".into())),
            KitforgeError::Validation(_)
        ));
    }
}
