//! Persistence gateway: one flush/load protocol over the local cache and the
//! remote store.
//!
//! A flush writes the local cache first (a failure there is fatal to the
//! call), then opportunistically syncs the snapshot to the remote store. A
//! remote failure is recoverable: the state stays dirty and the next tick or
//! explicit save retries, with the local cache as the fallback of record.

use std::sync::Mutex;

use atelier_core::error::CoreError;
use atelier_core::project::Project;
use atelier_core::types::ProjectId;

use crate::cache::{CacheError, LocalCache, ProjectSummary};
use crate::remote::{RemoteClient, RemoteError};
use crate::store::FileTreeStore;

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    /// The local cache write failed; nothing durable happened.
    #[error("Local save failed: {0}")]
    Persistence(#[from] CacheError),

    /// The local cache holds the snapshot but the remote write failed;
    /// retried on the next tick or explicit save.
    #[error("Remote sync failed: {0}")]
    Sync(#[from] RemoteError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Snapshot fully persisted: local cache, plus the remote store when one
    /// is configured.
    Saved,
    /// Nothing to do: no project loaded, or the state was already clean.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Project {0} not found")]
    NotFound(ProjectId),

    #[error("The open project has unsaved changes")]
    UnsavedChanges,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Malformed project document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Translates store snapshots to and from durable documents. Never mutates
/// tree structure; it only reads snapshots and replaces them wholesale on
/// load.
#[derive(Debug)]
pub struct PersistenceGateway {
    cache: LocalCache,
    remote: Option<RemoteClient>,
}

impl PersistenceGateway {
    /// Local-only gateway (anonymous/offline use).
    pub fn local(cache: LocalCache) -> Self {
        Self {
            cache,
            remote: None,
        }
    }

    /// Gateway that also syncs to the remote store.
    pub fn with_remote(cache: LocalCache, remote: RemoteClient) -> Self {
        Self {
            cache,
            remote: Some(remote),
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Persist the store's current snapshot if it is dirty.
    ///
    /// The snapshot and its generation are taken under the store lock; all
    /// I/O happens with the lock released. On completion the dirty flag is
    /// cleared only if the same project is still loaded and no mutation
    /// interleaved ([`FileTreeStore::confirm_flushed`]).
    pub async fn flush(&self, store: &Mutex<FileTreeStore>) -> Result<FlushOutcome, FlushError> {
        let snapshot = {
            let store = store.lock().expect("file tree store lock poisoned");
            if !store.is_dirty() {
                return Ok(FlushOutcome::Skipped);
            }
            store.snapshot_for_flush()
        };
        let Some((project, generation)) = snapshot else {
            return Ok(FlushOutcome::Skipped);
        };

        self.cache.save(&project)?;

        let synced = match &self.remote {
            None => None,
            Some(remote) => {
                let synced = if project.owner_id.is_none() {
                    // First sync: the server assigns the canonical identity.
                    remote.create(&project).await?
                } else {
                    remote.push(&project).await?
                };

                // Refresh the cached copy with the synced identity/revision;
                // the snapshot itself stays authoritative for the tree.
                let mut cached = project.clone();
                cached.id = synced.id;
                cached.owner_id = synced.owner_id;
                cached.revision = synced.revision;
                if let Err(error) = self.cache.save(&cached) {
                    tracing::warn!(project_id = %cached.id, error = %error, "Failed to refresh cached copy after sync");
                }
                if synced.id != project.id {
                    if let Err(error) = self.cache.remove(project.id) {
                        tracing::warn!(project_id = %project.id, error = %error, "Failed to drop pre-sync cache entry");
                    }
                }
                Some(synced)
            }
        };

        {
            let mut store = store.lock().expect("file tree store lock poisoned");
            let effective_id = match &synced {
                Some(synced) => {
                    store.apply_sync_result(project.id, synced);
                    synced.id
                }
                None => project.id,
            };
            store.confirm_flushed(effective_id, generation);
        }

        tracing::debug!(project_id = %project.id, "Flush completed");
        Ok(FlushOutcome::Saved)
    }

    /// Load a project document: remote preferred when configured, local
    /// cache when the remote is unreachable or has no copy.
    pub async fn load(&self, id: ProjectId) -> Result<Project, LoadError> {
        if let Some(remote) = &self.remote {
            match remote.fetch(id).await {
                Ok(project) => {
                    if let Err(error) = self.cache.save(&project) {
                        tracing::warn!(project_id = %id, error = %error, "Failed to cache remote copy");
                    }
                    return Ok(project);
                }
                // A document that only ever lived locally is not on the
                // remote; fall through to the cache.
                Err(RemoteError::NotFound) => {}
                Err(error) if error.is_unreachable() => {
                    tracing::warn!(project_id = %id, error = %error, "Remote unreachable, falling back to local cache");
                }
                Err(error) => return Err(error.into()),
            }
        }

        match self.cache.load(id)? {
            Some(project) => Ok(project),
            None => Err(LoadError::NotFound(id)),
        }
    }

    /// Listing source for the project picker: the local cache.
    pub fn load_all_summaries(&self) -> Result<Vec<ProjectSummary>, CacheError> {
        self.cache.load_summaries()
    }

    /// Drop a project from the local cache and, when configured, the remote
    /// store.
    pub async fn delete(&self, id: ProjectId) -> Result<(), LoadError> {
        self.cache.remove(id)?;
        if let Some(remote) = &self.remote {
            match remote.delete(id).await {
                Ok(()) | Err(RemoteError::NotFound) => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }
}

/// Serialize a project as its self-describing export document (flat node
/// collection, never the derived nested view).
pub fn export_project(project: &Project) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(project)
}

/// Parse an export document, re-validating every structural invariant before
/// acceptance.
pub fn import_project(json: &str) -> Result<Project, ImportError> {
    let project: Project = serde_json::from_str(json)?;
    project.validate()?;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use atelier_core::template::project_from_template;
    use atelier_core::tree::FileNode;

    use super::*;

    fn local_gateway() -> (tempfile::TempDir, PersistenceGateway) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::local(LocalCache::new(dir.path()));
        (dir, gateway)
    }

    fn dirty_store() -> (Mutex<FileTreeStore>, ProjectId) {
        let mut store = FileTreeStore::new();
        store.load(project_from_template("demo").unwrap());
        store.create_file("extra.js", "x", None).unwrap();
        let id = store.current().unwrap().id;
        (Mutex::new(store), id)
    }

    #[tokio::test]
    async fn test_flush_persists_and_clears_dirty() {
        let (_dir, gateway) = local_gateway();
        let (store, id) = dirty_store();

        let outcome = gateway.flush(&store).await.unwrap();
        assert_eq!(outcome, FlushOutcome::Saved);
        assert!(!store.lock().unwrap().is_dirty());

        let cached = gateway.cache().load(id).unwrap().unwrap();
        assert_eq!(cached.files.len(), 4);
    }

    #[tokio::test]
    async fn test_flush_skips_clean_store() {
        let (_dir, gateway) = local_gateway();
        let mut store = FileTreeStore::new();
        store.load(project_from_template("demo").unwrap());
        let id = store.current().unwrap().id;
        let store = Mutex::new(store);

        let outcome = gateway.flush(&store).await.unwrap();
        assert_eq!(outcome, FlushOutcome::Skipped);
        // An idempotent no-op: nothing was written.
        assert!(gateway.cache().load(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_skips_empty_store() {
        let (_dir, gateway) = local_gateway();
        let store = Mutex::new(FileTreeStore::new());
        let outcome = gateway.flush(&store).await.unwrap();
        assert_eq!(outcome, FlushOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_load_prefers_cache_when_no_remote() {
        let (_dir, gateway) = local_gateway();
        let project = project_from_template("demo").unwrap();
        gateway.cache().save(&project).unwrap();

        let loaded = gateway.load(project.id).await.unwrap();
        assert_eq!(loaded, project);
    }

    #[tokio::test]
    async fn test_load_missing_project() {
        let (_dir, gateway) = local_gateway();
        assert_matches!(
            gateway.load(ProjectId::new_v4()).await,
            Err(LoadError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_delete_removes_cached_copy() {
        let (_dir, gateway) = local_gateway();
        let project = project_from_template("demo").unwrap();
        gateway.cache().save(&project).unwrap();

        gateway.delete(project.id).await.unwrap();
        assert!(gateway.cache().load(project.id).unwrap().is_none());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut project = project_from_template("demo").unwrap();
        let folder = FileNode::folder("src", None).unwrap();
        let nested = FileNode::file("lib.js", "export {}", Some(folder.id)).unwrap();
        project.files.push(folder);
        project.files.push(nested);

        let exported = export_project(&project).unwrap();
        let imported = import_project(&exported).unwrap();

        // Structural equality: same ids, names, kinds, parents, content.
        assert_eq!(imported.files, project.files);
        assert_eq!(imported.id, project.id);
        assert_eq!(imported.settings, project.settings);
    }

    #[test]
    fn test_import_rejects_invalid_tree() {
        let mut project = project_from_template("demo").unwrap();
        let mut orphan = FileNode::file("orphan.js", "", None).unwrap();
        orphan.parent_id = Some(uuid::Uuid::new_v4());
        project.files.push(orphan);

        let exported = export_project(&project).unwrap();
        assert_matches!(
            import_project(&exported),
            Err(ImportError::Invalid(CoreError::InvalidParent(_)))
        );
    }

    #[test]
    fn test_import_discards_embedded_children_views() {
        let project = project_from_template("demo").unwrap();
        let mut value = serde_json::to_value(&project).unwrap();
        // Simulate a legacy document with a stale embedded children array.
        value["files"][0]["children"] = serde_json::json!([{"id": "bogus"}]);

        let imported = import_project(&value.to_string()).unwrap();
        assert_eq!(imported.files, project.files);
    }
}
