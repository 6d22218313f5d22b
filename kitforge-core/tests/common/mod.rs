//! Test helpers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use kitforge_core::catalog::{CatalogError, CatalogResult, CatalogStore, MemoryCatalog};
use kitforge_core::component::{ComponentPatch, ComponentRecord};
use kitforge_core::config::RateLimitSettings;
use kitforge_core::rate_limit::RateLimitConfig;
use kitforge_core::registry::{Registry, RegistryHandle, RegistryLayout};
use kitforge_core::service::{ComponentService, Limiters};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Memory catalog whose mutations can be switched to fail
#[derive(Default)]
pub struct FailingCatalog {
    inner: MemoryCatalog,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FailingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, on: bool) {
        self.fail_insert.store(on, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, on: bool) {
        self.fail_update.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }
}

fn injected(op: &str) -> CatalogError {
    CatalogError::Backend(format!("injected {op} failure"))
}

#[async_trait]
impl CatalogStore for FailingCatalog {
    async fn get_by_id(&self, id: &str) -> CatalogResult<Option<ComponentRecord>> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_slug(&self, slug: &str) -> CatalogResult<Option<ComponentRecord>> {
        self.inner.get_by_slug(slug).await
    }

    async fn list(&self) -> CatalogResult<Vec<ComponentRecord>> {
        self.inner.list().await
    }

    async fn insert(&self, record: ComponentRecord) -> CatalogResult<ComponentRecord> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        self.inner.insert(record).await
    }

    async fn update(&self, id: &str, patch: &ComponentPatch) -> CatalogResult<ComponentRecord> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(injected("update"));
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> CatalogResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete(id).await
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// A service over a temp registry and a switchable catalog
pub struct TestHarness {
    pub temp_dir: TempDir,
    pub catalog: Arc<FailingCatalog>,
    pub registry: Registry,
    pub service: ComponentService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_mutation_limit(RateLimitConfig::new(1_000, 60_000))
    }

    pub fn with_mutation_limit(mutation: RateLimitConfig) -> Self {
        init_test_logging();

        let temp_dir = TempDir::new().expect("temp dir");
        let registry = Registry::new(RegistryLayout::new(temp_dir.path().join("generated")));
        registry.init().expect("registry init");

        let settings = RateLimitSettings {
            mutation,
            ..RateLimitSettings::default()
        };
        let limiters = Limiters::from_settings(&settings).expect("limiters");
        let catalog = Arc::new(FailingCatalog::new());
        let (handle, _join) = RegistryHandle::spawn(registry.clone());
        let service = ComponentService::new(catalog.clone(), handle, limiters);

        Self {
            temp_dir,
            catalog,
            registry,
            service,
        }
    }

    pub fn index(&self) -> String {
        std::fs::read_to_string(self.registry.layout().index_path()).expect("read index")
    }

    pub fn manifest(&self) -> serde_json::Value {
        let content =
            std::fs::read_to_string(self.registry.layout().manifest_path()).expect("read manifest");
        serde_json::from_str(&content).expect("parse manifest")
    }

    pub fn source_exists(&self, slug: &str) -> bool {
        self.registry.layout().source_path(slug).exists()
    }

    /// Assert the registry holds no trace of `slug`
    pub fn assert_no_traces(&self, slug: &str) {
        assert!(!self.source_exists(slug), "source for {slug} still present");
        assert!(
            !self.index().contains(&format!("\"./{slug}\"")),
            "export line for {slug} still present"
        );
        assert!(
            self.manifest().get(slug).is_none(),
            "manifest entry for {slug} still present"
        );
    }
}
