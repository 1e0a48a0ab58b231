//! In-memory file-tree store for the currently open project.
//!
//! Single source of truth while a project is open: all tree mutations go
//! through this type. Every operation validates before it mutates, so a
//! failed call leaves the tree, the selection, and the dirty state exactly
//! as they were. Operations are synchronous and non-suspending; the session
//! layer shares the store with the autosave task behind a `Mutex`.

use atelier_core::error::CoreError;
use atelier_core::project::{validate_project_name, Project, SettingsPatch};
use atelier_core::tree::{self, FileNode, NodeKind};
use atelier_core::types::{NodeId, ProjectId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No project is loaded")]
    NoProject,

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// The current project plus selection and dirty state.
///
/// The dirty flag is paired with a mutation generation counter: a flush
/// snapshots the generation when it starts, and [`FileTreeStore::confirm_flushed`]
/// only clears the flag if no mutation happened in between and the same
/// project is still loaded.
#[derive(Debug, Default)]
pub struct FileTreeStore {
    current: Option<Project>,
    active_node: Option<NodeId>,
    dirty: bool,
    generation: u64,
}

impl FileTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the in-memory snapshot wholesale. Resets the selection to the
    /// first file in insertion order and starts clean.
    pub fn load(&mut self, project: Project) {
        self.active_node = project
            .files
            .iter()
            .find(|node| !node.is_folder())
            .map(|node| node.id);
        self.current = Some(project);
        self.dirty = false;
        self.generation += 1;
    }

    pub fn unload(&mut self) {
        self.current = None;
        self.active_node = None;
        self.dirty = false;
        self.generation += 1;
    }

    pub fn current(&self) -> Option<&Project> {
        self.current.as_ref()
    }

    pub fn active_node(&self) -> Option<NodeId> {
        self.active_node
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clone the current project together with the generation the snapshot
    /// was taken at. `None` when no project is loaded.
    pub fn snapshot_for_flush(&self) -> Option<(Project, u64)> {
        self.current
            .as_ref()
            .map(|project| (project.clone(), self.generation))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Create a file under `parent_id` (root level when `None`).
    pub fn create_file(
        &mut self,
        name: &str,
        content: &str,
        parent_id: Option<NodeId>,
    ) -> Result<NodeId, StoreError> {
        self.check_parent(parent_id)?;
        let node = FileNode::file(name, content, parent_id).map_err(CoreError::from)?;
        let id = node.id;
        self.project_mut()?.files.push(node);
        self.mark_dirty();
        Ok(id)
    }

    /// Create a folder under `parent_id` (root level when `None`).
    pub fn create_folder(
        &mut self,
        name: &str,
        parent_id: Option<NodeId>,
    ) -> Result<NodeId, StoreError> {
        self.check_parent(parent_id)?;
        let node = FileNode::folder(name, parent_id).map_err(CoreError::from)?;
        let id = node.id;
        self.project_mut()?.files.push(node);
        self.mark_dirty();
        Ok(id)
    }

    /// Replace a file's text content. Folders have no content to update.
    pub fn update_content(&mut self, id: NodeId, new_content: &str) -> Result<(), StoreError> {
        let project = self.project_mut()?;
        let node = project
            .files
            .iter_mut()
            .find(|n| n.id == id && !n.is_folder())
            .ok_or(CoreError::NotFound {
                entity: "File",
                id,
            })?;
        node.kind = NodeKind::File {
            content: new_content.to_owned(),
        };
        self.mark_dirty();
        Ok(())
    }

    /// Rename a node. Never moves it or touches its descendants.
    pub fn rename_node(&mut self, id: NodeId, new_name: &str) -> Result<(), StoreError> {
        let name = tree::validate_node_name(new_name).map_err(CoreError::from)?;
        let project = self.project_mut()?;
        let node = project
            .files
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(CoreError::NotFound { entity: "Node", id })?;
        node.name = name;
        self.mark_dirty();
        Ok(())
    }

    /// Move a node under a new parent (root level when `None`).
    ///
    /// Rejected when the target is missing, not a folder, or lies inside the
    /// moved node's own subtree (which would create a cycle).
    pub fn move_node(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<(), StoreError> {
        let project = self.project()?;
        if project.node(id).is_none() {
            return Err(CoreError::NotFound { entity: "Node", id }.into());
        }
        self.check_parent(new_parent)?;
        if let Some(parent_id) = new_parent {
            if parent_id == id || tree::descendants_of(&self.project()?.files, id).contains(&parent_id)
            {
                return Err(CoreError::InvalidParent(
                    "Cannot move a node into its own subtree".into(),
                )
                .into());
            }
        }

        let project = self.project_mut()?;
        let node = project
            .files
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(CoreError::NotFound { entity: "Node", id })?;
        node.parent_id = new_parent;
        self.mark_dirty();
        Ok(())
    }

    /// Delete a node. Deleting a folder removes its entire subtree as one
    /// logical mutation; a selection pointing into the subtree is cleared.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), StoreError> {
        let project = self.project()?;
        if project.node(id).is_none() {
            return Err(CoreError::NotFound { entity: "Node", id }.into());
        }
        let mut removed = tree::descendants_of(&project.files, id);
        removed.insert(id);

        let project = self.project_mut()?;
        project.files.retain(|node| !removed.contains(&node.id));
        if self
            .active_node
            .is_some_and(|active| removed.contains(&active))
        {
            self.active_node = None;
        }
        self.mark_dirty();
        Ok(())
    }

    /// Change the active selection. Pure selection state: never dirty.
    pub fn set_active(&mut self, id: Option<NodeId>) -> Result<(), StoreError> {
        if let Some(id) = id {
            if self.project()?.node(id).is_none() {
                return Err(CoreError::NotFound { entity: "Node", id }.into());
            }
        }
        self.active_node = id;
        Ok(())
    }

    /// Merge a partial settings update into the current project's settings.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<(), StoreError> {
        self.project_mut()?.settings.apply(patch);
        self.mark_dirty();
        Ok(())
    }

    pub fn rename_project(&mut self, name: &str) -> Result<(), StoreError> {
        let name = validate_project_name(name).map_err(CoreError::from)?;
        self.project_mut()?.name = name;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) -> Result<(), StoreError> {
        if let Some(description) = &description {
            atelier_core::project::validate_description(description).map_err(CoreError::from)?;
        }
        self.project_mut()?.description = description;
        self.mark_dirty();
        Ok(())
    }

    pub fn set_tags(&mut self, tags: &[String]) -> Result<(), StoreError> {
        let tags = atelier_core::project::normalize_tags(tags).map_err(CoreError::from)?;
        self.project_mut()?.tags = tags;
        self.mark_dirty();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Flush bookkeeping
    // -----------------------------------------------------------------------

    /// Record the outcome of a completed flush. Dirty clears only if the
    /// flushed project is still the loaded one and no mutation happened after
    /// the snapshot was taken. Returns whether the state transitioned.
    pub fn confirm_flushed(&mut self, project_id: ProjectId, generation: u64) -> bool {
        let applies = self
            .current
            .as_ref()
            .is_some_and(|p| p.id == project_id && self.generation == generation);
        if applies && self.dirty {
            self.dirty = false;
            return true;
        }
        false
    }

    /// Adopt the identity a completed remote sync reports: server-assigned
    /// id/owner on first sync, and the incremented revision on every sync.
    /// Ignored if the flushed project is no longer loaded.
    pub fn apply_sync_result(&mut self, flushed_id: ProjectId, synced: &Project) {
        if let Some(project) = self.current.as_mut() {
            if project.id == flushed_id {
                project.id = synced.id;
                project.owner_id = synced.owner_id;
                project.revision = synced.revision;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn project(&self) -> Result<&Project, StoreError> {
        self.current.as_ref().ok_or(StoreError::NoProject)
    }

    fn project_mut(&mut self) -> Result<&mut Project, StoreError> {
        self.current.as_mut().ok_or(StoreError::NoProject)
    }

    /// Resolve `parent_id` to an existing folder, or fail `InvalidParent`.
    fn check_parent(&self, parent_id: Option<NodeId>) -> Result<(), StoreError> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        match self.project()?.node(parent_id) {
            Some(node) if node.is_folder() => Ok(()),
            Some(_) => Err(CoreError::InvalidParent(format!(
                "Parent {parent_id} is not a folder"
            ))
            .into()),
            None => Err(CoreError::InvalidParent(format!(
                "Parent {parent_id} does not exist"
            ))
            .into()),
        }
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.generation += 1;
        if let Some(project) = self.current.as_mut() {
            project.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use atelier_core::project::Theme;
    use atelier_core::tree::validate_nodes;

    use super::*;

    fn loaded_store() -> FileTreeStore {
        let mut store = FileTreeStore::new();
        store.load(Project::new("demo").unwrap());
        store
    }

    #[test]
    fn test_operations_require_a_loaded_project() {
        let mut store = FileTreeStore::new();
        assert_matches!(
            store.create_file("a.js", "", None),
            Err(StoreError::NoProject)
        );
    }

    #[test]
    fn test_create_file_marks_dirty() {
        let mut store = loaded_store();
        assert!(!store.is_dirty());
        store.create_file("a.js", "let x = 1;", None).unwrap();
        assert!(store.is_dirty());
        assert_eq!(store.current().unwrap().files.len(), 1);
    }

    #[test]
    fn test_create_under_missing_parent_fails_without_mutating() {
        let mut store = loaded_store();
        let result = store.create_file("a.js", "", Some(NodeId::new_v4()));
        assert_matches!(result, Err(StoreError::Core(CoreError::InvalidParent(_))));
        assert!(!store.is_dirty());
        assert!(store.current().unwrap().files.is_empty());
    }

    #[test]
    fn test_create_under_file_parent_fails() {
        let mut store = loaded_store();
        let file = store.create_file("a.js", "", None).unwrap();
        let result = store.create_folder("src", Some(file));
        assert_matches!(result, Err(StoreError::Core(CoreError::InvalidParent(_))));
    }

    #[test]
    fn test_update_content_replaces_payload() {
        let mut store = loaded_store();
        let id = store.create_file("a.js", "old", None).unwrap();
        store.update_content(id, "new").unwrap();
        assert_eq!(store.current().unwrap().node(id).unwrap().content(), Some("new"));
    }

    #[test]
    fn test_update_content_on_folder_is_not_found() {
        let mut store = loaded_store();
        let id = store.create_folder("src", None).unwrap();
        assert_matches!(
            store.update_content(id, "x"),
            Err(StoreError::Core(CoreError::NotFound { .. }))
        );
    }

    #[test]
    fn test_rename_keeps_parent_and_descendants() {
        let mut store = loaded_store();
        let src = store.create_folder("src", None).unwrap();
        let child = store.create_file("a.js", "", Some(src)).unwrap();
        store.rename_node(src, "lib").unwrap();

        let project = store.current().unwrap();
        assert_eq!(project.node(src).unwrap().name, "lib");
        assert_eq!(project.node(child).unwrap().parent_id, Some(src));
    }

    #[test]
    fn test_rename_rejects_empty_name() {
        let mut store = loaded_store();
        let id = store.create_file("a.js", "", None).unwrap();
        assert_matches!(
            store.rename_node(id, "   "),
            Err(StoreError::Core(CoreError::Validation(_)))
        );
        assert_eq!(store.current().unwrap().node(id).unwrap().name, "a.js");
    }

    #[test]
    fn test_delete_folder_cascades_and_clears_selection() {
        let mut store = loaded_store();
        let src = store.create_folder("src", None).unwrap();
        let nested = store.create_folder("nested", Some(src)).unwrap();
        let leaf = store.create_file("a.js", "", Some(nested)).unwrap();
        let kept = store.create_file("keep.js", "", None).unwrap();
        store.set_active(Some(leaf)).unwrap();

        store.delete_node(src).unwrap();

        let project = store.current().unwrap();
        assert_eq!(project.files.len(), 1);
        assert_eq!(project.files[0].id, kept);
        assert_eq!(store.active_node(), None);
        // No orphan may reference the deleted subtree.
        assert!(validate_nodes(&project.files).is_ok());
    }

    #[test]
    fn test_delete_keeps_unrelated_selection() {
        let mut store = loaded_store();
        let doomed = store.create_file("a.js", "", None).unwrap();
        let kept = store.create_file("b.js", "", None).unwrap();
        store.set_active(Some(kept)).unwrap();
        store.delete_node(doomed).unwrap();
        assert_eq!(store.active_node(), Some(kept));
    }

    #[test]
    fn test_move_node_reparents() {
        let mut store = loaded_store();
        let src = store.create_folder("src", None).unwrap();
        let file = store.create_file("a.js", "", None).unwrap();
        store.move_node(file, Some(src)).unwrap();
        assert_eq!(store.current().unwrap().node(file).unwrap().parent_id, Some(src));
        assert!(validate_nodes(&store.current().unwrap().files).is_ok());
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut store = loaded_store();
        let outer = store.create_folder("outer", None).unwrap();
        let inner = store.create_folder("inner", Some(outer)).unwrap();

        assert_matches!(
            store.move_node(outer, Some(inner)),
            Err(StoreError::Core(CoreError::InvalidParent(_)))
        );
        assert_matches!(
            store.move_node(outer, Some(outer)),
            Err(StoreError::Core(CoreError::InvalidParent(_)))
        );
        // Failed moves leave the structure intact.
        assert_eq!(store.current().unwrap().node(outer).unwrap().parent_id, None);
    }

    #[test]
    fn test_set_active_never_marks_dirty() {
        let mut store = loaded_store();
        let id = store.create_file("a.js", "", None).unwrap();
        let generation = store.generation();
        store.confirm_flushed(store.current().unwrap().id, generation);
        assert!(!store.is_dirty());

        store.set_active(Some(id)).unwrap();
        store.set_active(None).unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn test_set_active_rejects_unknown_id() {
        let mut store = loaded_store();
        assert_matches!(
            store.set_active(Some(NodeId::new_v4())),
            Err(StoreError::Core(CoreError::NotFound { .. }))
        );
    }

    #[test]
    fn test_load_selects_first_file_and_starts_clean() {
        let mut template = Project::new("demo").unwrap();
        let folder = FileNode::folder("src", None).unwrap();
        let file = FileNode::file("main.js", "", Some(folder.id)).unwrap();
        let first_file = file.id;
        template.files = vec![folder, file];

        let mut store = FileTreeStore::new();
        store.load(template);
        assert_eq!(store.active_node(), Some(first_file));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_update_settings_merges_and_marks_dirty() {
        let mut store = loaded_store();
        store
            .update_settings(SettingsPatch {
                theme: Some(Theme::Dark),
                autosave: None,
            })
            .unwrap();
        let settings = store.current().unwrap().settings;
        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.autosave);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_mutations_keep_updated_at_monotonic() {
        let mut store = loaded_store();
        let before = store.current().unwrap().updated_at;
        store.create_file("a.js", "", None).unwrap();
        assert!(store.current().unwrap().updated_at >= before);
    }

    #[test]
    fn test_confirm_flushed_clears_dirty() {
        let mut store = loaded_store();
        store.create_file("a.js", "", None).unwrap();
        let (snapshot, generation) = store.snapshot_for_flush().unwrap();

        assert!(store.confirm_flushed(snapshot.id, generation));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_confirm_flushed_ignores_stale_generation() {
        let mut store = loaded_store();
        store.create_file("a.js", "", None).unwrap();
        let (snapshot, generation) = store.snapshot_for_flush().unwrap();

        // A mutation lands while the flush is in flight.
        store.create_file("b.js", "", None).unwrap();

        assert!(!store.confirm_flushed(snapshot.id, generation));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_confirm_flushed_ignores_other_project() {
        let mut store = loaded_store();
        store.create_file("a.js", "", None).unwrap();
        let generation = store.generation();

        assert!(!store.confirm_flushed(ProjectId::new_v4(), generation));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_confirm_flushed_after_unload_is_discarded() {
        let mut store = loaded_store();
        store.create_file("a.js", "", None).unwrap();
        let (snapshot, generation) = store.snapshot_for_flush().unwrap();
        store.unload();

        assert!(!store.confirm_flushed(snapshot.id, generation));
    }

    #[test]
    fn test_apply_sync_result_adopts_identity() {
        let mut store = loaded_store();
        store.create_file("a.js", "", None).unwrap();
        let (snapshot, _) = store.snapshot_for_flush().unwrap();

        let mut synced = snapshot.clone();
        synced.id = ProjectId::new_v4();
        synced.owner_id = Some(uuid::Uuid::new_v4());
        synced.revision = 1;

        store.apply_sync_result(snapshot.id, &synced);
        let project = store.current().unwrap();
        assert_eq!(project.id, synced.id);
        assert_eq!(project.owner_id, synced.owner_id);
        assert_eq!(project.revision, 1);
    }

    #[test]
    fn test_sequences_of_operations_keep_tree_valid() {
        let mut store = loaded_store();
        let src = store.create_folder("src", None).unwrap();
        let lib = store.create_folder("lib", Some(src)).unwrap();
        let a = store.create_file("a.js", "a", Some(lib)).unwrap();
        store.create_file("b.js", "b", Some(src)).unwrap();
        store.rename_node(lib, "util").unwrap();
        store.move_node(a, Some(src)).unwrap();
        store.update_content(a, "a2").unwrap();
        store.delete_node(lib).unwrap();

        assert!(validate_nodes(&store.current().unwrap().files).is_ok());
    }
}
