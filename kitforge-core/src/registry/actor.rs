//! Single-owner registry task
//!
//! The export index and manifest are read-modify-written files. Two writers
//! racing on them lose updates, so every mutation is sent to one task that
//! owns the [`Registry`] and applies commands one at a time.
//!
//! ```text
//! create ──┐
//!          │
//! update ──┼──► mpsc::Sender<RegistryCommand> ──► RegistryActor
//!          │                                          │
//! delete ──┘                                          ▼
//!                                             Registry (sequential apply)
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Registry, RegistryStatus, RemoveReport, WriteReport, WriteRequest};
use crate::error::{KitforgeError, Result};

/// Queue depth for pending registry commands
const DEFAULT_BUFFER: usize = 64;

/// Commands applied by the registry task
#[derive(Debug)]
pub enum RegistryCommand {
    Write {
        request: WriteRequest,
        reply: oneshot::Sender<Result<WriteReport>>,
    },
    Remove {
        slug: String,
        reply: oneshot::Sender<Result<RemoveReport>>,
    },
    Status {
        reply: oneshot::Sender<Result<RegistryStatus>>,
    },
    /// Stop after the commands already queued
    Shutdown,
}

struct RegistryActor {
    registry: Registry,
    command_rx: mpsc::Receiver<RegistryCommand>,
}

impl RegistryActor {
    async fn run(mut self) {
        info!(
            "Registry actor started for {}",
            self.registry.layout().root.display()
        );

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                RegistryCommand::Write { request, reply } => {
                    debug!("Registry write: {}", request.slug);
                    let result = self.blocking(move |r| r.write(&request)).await;
                    let _ = reply.send(result);
                }
                RegistryCommand::Remove { slug, reply } => {
                    debug!("Registry remove: {}", slug);
                    let result = self.blocking(move |r| r.remove(&slug)).await;
                    let _ = reply.send(result);
                }
                RegistryCommand::Status { reply } => {
                    let result = self.blocking(|r| r.status()).await;
                    let _ = reply.send(result);
                }
                RegistryCommand::Shutdown => {
                    info!("Registry actor received shutdown");
                    break;
                }
            }
        }

        info!("Registry actor stopped");
    }

    /// Run one command's file I/O off the runtime workers
    ///
    /// Awaited before the next command is received, so commands still apply
    /// one at a time.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Registry) -> Result<T> + Send + 'static,
    {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || op(&registry))
            .await
            .map_err(|e| {
                error!("Registry command panicked or was cancelled: {}", e);
                KitforgeError::ActorUnavailable
            })?
    }
}

/// Cloneable handle to the registry task
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    command_tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Spawn the registry task on the current tokio runtime
    pub fn spawn(registry: Registry) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(DEFAULT_BUFFER);
        let actor = RegistryActor {
            registry,
            command_rx,
        };
        let join = tokio::spawn(actor.run());
        (Self { command_tx }, join)
    }

    pub async fn write(&self, request: WriteRequest) -> Result<WriteReport> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Write { request, reply }).await?;
        rx.await.map_err(|_| KitforgeError::ActorUnavailable)?
    }

    pub async fn remove(&self, slug: &str) -> Result<RemoveReport> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Remove {
            slug: slug.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| KitforgeError::ActorUnavailable)?
    }

    pub async fn status(&self) -> Result<RegistryStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Status { reply }).await?;
        rx.await.map_err(|_| KitforgeError::ActorUnavailable)?
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(RegistryCommand::Shutdown).await
    }

    async fn send(&self, cmd: RegistryCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| KitforgeError::ActorUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryLayout;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_concurrent_writes_lose_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Registry::new(RegistryLayout::new(temp_dir.path()));
        registry.init().unwrap();
        let (handle, join) = RegistryHandle::spawn(registry);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let slug = format!("widget-{}", ["a", "b", "c", "d"][i % 4].repeat(i + 1));
                let name = crate::naming::slug_to_name(&slug);
                handle
                    .write(WriteRequest::new(slug, "export const X = 1;", name))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let status = handle.status().await.unwrap();
        assert!(status.is_consistent());
        assert_eq!(status.index_slugs.len(), 16);

        handle.shutdown().await.unwrap();
        join.await.unwrap();
        assert!(matches!(
            handle.status().await,
            Err(KitforgeError::ActorUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_remove_through_handle() {
        let temp_dir = TempDir::new().unwrap();
        let (handle, _join) = RegistryHandle::spawn(Registry::new(RegistryLayout::new(
            temp_dir.path(),
        )));

        handle
            .write(WriteRequest::new("my-card", "code", "MyCard"))
            .await
            .unwrap();
        let report = handle.remove("my-card").await.unwrap();
        assert!(report.is_complete());
        assert!(handle.status().await.unwrap().all_slugs().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_commands_apply_in_order_off_the_worker() {
        let temp_dir = TempDir::new().unwrap();
        let layout = RegistryLayout::new(temp_dir.path());
        let (handle, join) = RegistryHandle::spawn(Registry::new(layout.clone()));

        // Queue everything before awaiting; the single worker must stay free
        // to run this task while the actor's file I/O is in flight
        let write = handle.write(WriteRequest::new("my-card", "v1", "MyCard"));
        let remove = handle.remove("my-card");
        let rewrite = handle.write(WriteRequest::new("my-card", "v2", "MyCard"));
        let (write, remove, rewrite) = tokio::join!(write, remove, rewrite);
        write.unwrap();
        assert!(remove.unwrap().is_complete());
        rewrite.unwrap();

        let status = handle.status().await.unwrap();
        assert!(status.is_consistent());
        assert!(status.all_slugs().contains("my-card"));
        assert_eq!(
            std::fs::read_to_string(layout.source_path("my-card")).unwrap(),
            "v2"
        );

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }
}
