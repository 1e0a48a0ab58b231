//! Workbench session: ties the store, the persistence gateway, and the
//! autosave scheduler together for one open project at a time.
//!
//! The session owns the scheduler lifecycle: it is started when a project
//! with autosave enabled is loaded, restarted when the setting flips on, and
//! stopped on unload or when the setting flips off. User-triggered saves and
//! scheduler ticks share one in-flight flush guard.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use atelier_core::error::CoreError;
use atelier_core::project::{Project, SettingsPatch};
use atelier_core::template::project_from_template;
use atelier_core::types::ProjectId;

use crate::autosave::{AutosaveScheduler, DEFAULT_AUTOSAVE_PERIOD};
use crate::cache::{CacheError, ProjectSummary};
use crate::gateway::{FlushError, FlushOutcome, LoadError, PersistenceGateway};
use crate::store::{FileTreeStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Flush(#[from] FlushError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub struct Workbench {
    store: Arc<Mutex<FileTreeStore>>,
    gateway: Arc<PersistenceGateway>,
    flush_guard: Arc<tokio::sync::Mutex<()>>,
    autosave: Option<AutosaveScheduler>,
    autosave_period: Duration,
}

impl Workbench {
    pub fn new(gateway: PersistenceGateway) -> Self {
        Self {
            store: Arc::new(Mutex::new(FileTreeStore::new())),
            gateway: Arc::new(gateway),
            flush_guard: Arc::new(tokio::sync::Mutex::new(())),
            autosave: None,
            autosave_period: DEFAULT_AUTOSAVE_PERIOD,
        }
    }

    /// Override the autosave period (mainly for tests and demos).
    pub fn with_autosave_period(mut self, period: Duration) -> Self {
        self.autosave_period = period;
        self
    }

    /// Handle for issuing tree mutations. All UI mutation intents go through
    /// this store; the session only orchestrates persistence around it.
    pub fn store(&self) -> Arc<Mutex<FileTreeStore>> {
        Arc::clone(&self.store)
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Create a new project from the starter template, cache it, and open
    /// it. Refused while the current project has unsaved changes.
    pub fn create_project(&mut self, name: &str) -> Result<ProjectId, WorkbenchError> {
        if self.store.lock().expect("file tree store lock poisoned").is_dirty() {
            return Err(LoadError::UnsavedChanges.into());
        }
        let project = project_from_template(name)?;
        let id = project.id;
        self.gateway.cache().save(&project)?;
        self.install(project);
        tracing::info!(project_id = %id, "Created project");
        Ok(id)
    }

    /// Open a stored project. Refused while the current project has unsaved
    /// changes: save or discard first, a load never clobbers in-memory
    /// edits.
    pub async fn open_project(&mut self, id: ProjectId) -> Result<(), WorkbenchError> {
        if self.store.lock().expect("file tree store lock poisoned").is_dirty() {
            return Err(LoadError::UnsavedChanges.into());
        }
        let project = self.gateway.load(id).await?;
        self.install(project);
        tracing::info!(project_id = %id, "Opened project");
        Ok(())
    }

    /// Stop autosave and drop the in-memory project.
    pub fn close_project(&mut self) {
        self.stop_autosave();
        self.store
            .lock()
            .expect("file tree store lock poisoned")
            .unload();
    }

    /// User-triggered save. Waits for any in-flight flush to finish, then
    /// flushes the current snapshot.
    pub async fn save(&self) -> Result<FlushOutcome, WorkbenchError> {
        let _permit = self.flush_guard.lock().await;
        Ok(self.gateway.flush(&self.store).await?)
    }

    /// Apply a partial settings update and re-evaluate the autosave
    /// lifecycle (the scheduler follows the setting).
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<(), WorkbenchError> {
        self.store
            .lock()
            .expect("file tree store lock poisoned")
            .update_settings(patch)?;
        self.sync_autosave();
        Ok(())
    }

    /// Summaries of locally known projects for the picker.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>, WorkbenchError> {
        Ok(self.gateway.load_all_summaries()?)
    }

    /// Delete a stored project. The open project is closed first if it is
    /// the one being deleted.
    pub async fn delete_project(&mut self, id: ProjectId) -> Result<(), WorkbenchError> {
        let is_open = self
            .store
            .lock()
            .expect("file tree store lock poisoned")
            .current()
            .is_some_and(|p| p.id == id);
        if is_open {
            self.close_project();
        }
        self.gateway.delete(id).await?;
        tracing::info!(project_id = %id, "Deleted project");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Load the project into the store and align the scheduler with its
    /// autosave setting.
    fn install(&mut self, project: Project) {
        self.store
            .lock()
            .expect("file tree store lock poisoned")
            .load(project);
        self.sync_autosave();
    }

    /// Start or stop the scheduler to match the loaded project's setting.
    /// Starting a new scheduler always stops the previous one first, so at
    /// most one timer runs per session.
    fn sync_autosave(&mut self) {
        let wanted = {
            let store = self.store.lock().expect("file tree store lock poisoned");
            store
                .current()
                .filter(|p| p.settings.autosave)
                .map(|p| p.id)
        };

        match (wanted, self.autosave.as_ref().map(|s| s.project_id())) {
            (Some(project_id), running) if running != Some(project_id) => {
                self.stop_autosave();
                self.autosave = Some(AutosaveScheduler::start(
                    Arc::clone(&self.store),
                    Arc::clone(&self.gateway),
                    Arc::clone(&self.flush_guard),
                    project_id,
                    self.autosave_period,
                ));
            }
            (Some(_), _) => {} // already running for this project
            (None, _) => self.stop_autosave(),
        }
    }

    fn stop_autosave(&mut self) {
        if let Some(scheduler) = self.autosave.take() {
            scheduler.stop();
        }
    }
}

impl Drop for Workbench {
    fn drop(&mut self) {
        self.stop_autosave();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::cache::LocalCache;

    use super::*;

    fn workbench() -> (tempfile::TempDir, Workbench) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::local(LocalCache::new(dir.path()));
        (dir, Workbench::new(gateway))
    }

    #[tokio::test]
    async fn test_create_project_is_cached_and_open() {
        let (_dir, mut wb) = workbench();
        let id = wb.create_project("demo").unwrap();

        let store = wb.store();
        let store = store.lock().unwrap();
        assert_eq!(store.current().unwrap().id, id);
        assert!(!store.is_dirty());
        drop(store);

        assert!(wb.gateway().cache().load(id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_refuses_to_clobber_unsaved_edits() {
        let (_dir, mut wb) = workbench();
        let first = wb.create_project("first").unwrap();
        let second = wb.create_project("second").unwrap();

        wb.open_project(first).await.unwrap();
        wb.store()
            .lock()
            .unwrap()
            .create_file("a.js", "", None)
            .unwrap();

        let result = wb.open_project(second).await;
        assert_matches!(
            result,
            Err(WorkbenchError::Load(LoadError::UnsavedChanges))
        );
        // The dirty project stays loaded.
        assert_eq!(wb.store().lock().unwrap().current().unwrap().id, first);
    }

    #[tokio::test]
    async fn test_save_then_open_another_project() {
        let (_dir, mut wb) = workbench();
        let first = wb.create_project("first").unwrap();
        let second = wb.create_project("second").unwrap();

        wb.open_project(first).await.unwrap();
        wb.store()
            .lock()
            .unwrap()
            .create_file("a.js", "", None)
            .unwrap();

        assert_eq!(wb.save().await.unwrap(), FlushOutcome::Saved);
        wb.open_project(second).await.unwrap();
        assert_eq!(wb.store().lock().unwrap().current().unwrap().id, second);

        // The first project's edit survived in the cache.
        let cached = wb.gateway().cache().load(first).unwrap().unwrap();
        assert_eq!(cached.files.len(), 4);
    }

    #[tokio::test]
    async fn test_explicit_save_works_with_autosave_disabled() {
        let (_dir, mut wb) = workbench();
        let id = wb.create_project("demo").unwrap();
        wb.update_settings(SettingsPatch {
            theme: None,
            autosave: Some(false),
        })
        .unwrap();

        wb.store()
            .lock()
            .unwrap()
            .create_file("manual.js", "", None)
            .unwrap();

        assert_eq!(wb.save().await.unwrap(), FlushOutcome::Saved);
        assert!(!wb.store().lock().unwrap().is_dirty());
        let cached = wb.gateway().cache().load(id).unwrap().unwrap();
        assert!(cached.files.iter().any(|f| f.name == "manual.js"));
    }

    #[tokio::test]
    async fn test_delete_open_project_closes_it() {
        let (_dir, mut wb) = workbench();
        let id = wb.create_project("demo").unwrap();

        wb.delete_project(id).await.unwrap();
        assert!(wb.store().lock().unwrap().current().is_none());
        assert!(wb.gateway().cache().load(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_projects_sorted_by_recency() {
        let (_dir, mut wb) = workbench();
        wb.create_project("first").unwrap();
        // Ensure a strictly later updated_at for the second project.
        tokio::time::sleep(Duration::from_millis(5)).await;
        wb.create_project("second").unwrap();

        let summaries = wb.list_projects().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "second");
    }
}
