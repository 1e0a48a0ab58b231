//! Project aggregate: metadata, settings, and the embedded node collection.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::tree::{self, FileNode};
use crate::types::{NodeId, ProjectId, Timestamp, UserId};

/// Maximum length of a project name, in characters.
pub const MAX_PROJECT_NAME_CHARS: usize = 100;

/// Maximum length of a project description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Maximum length of a single tag, in characters.
pub const MAX_TAG_CHARS: usize = 20;

/// Editor color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// Per-project editor settings, replaced wholesale on load and merged
/// field-by-field on partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    pub theme: Theme,
    pub autosave: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            autosave: true,
        }
    }
}

/// Partial settings update. Unspecified fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub autosave: Option<bool>,
}

impl ProjectSettings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(autosave) = patch.autosave {
            self.autosave = autosave;
        }
    }
}

/// A user's coding project: metadata plus the flat file-tree collection.
///
/// Serializes to the self-describing document shape used by the durable
/// cache, the export format, and the remote store (camelCase, flat `files`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Required and immutable once the project exists in the remote store;
    /// `None` only for local projects that have never been synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub files: Vec<FileNode>,
    /// Server-incremented write counter used as an optimistic-concurrency
    /// precondition. Zero for never-synced projects.
    #[serde(default)]
    pub revision: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// Create an empty project with a fresh id.
    pub fn new(name: &str) -> Result<Self, CoreError> {
        let now = chrono::Utc::now();
        Ok(Self {
            id: ProjectId::new_v4(),
            name: validate_project_name(name)?,
            description: None,
            tags: Vec::new(),
            owner_id: None,
            is_public: false,
            settings: ProjectSettings::default(),
            files: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Refresh `updated_at`, keeping it monotonically non-decreasing even if
    /// the wall clock stepped backwards.
    pub fn touch(&mut self) {
        let now = chrono::Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&FileNode> {
        tree::find_node(&self.files, id)
    }

    /// Validate the aggregate: metadata limits plus the structural
    /// invariants of the node collection. Used on import and by the server
    /// before persisting an incoming document.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_project_name(&self.name)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        for tag in &self.tags {
            validate_tag(tag)?;
        }
        tree::validate_nodes(&self.files)
    }
}

/// Validate and normalize a project name: trimmed, non-empty, length-capped.
pub fn validate_project_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Project name is required".into()));
    }
    if trimmed.chars().count() > MAX_PROJECT_NAME_CHARS {
        return Err(CoreError::Validation(format!(
            "Project name cannot exceed {MAX_PROJECT_NAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

pub fn validate_description(description: &str) -> Result<(), CoreError> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(CoreError::Validation(format!(
            "Description cannot exceed {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_tag(tag: &str) -> Result<(), CoreError> {
    if tag.trim().is_empty() {
        return Err(CoreError::Validation("Tag must not be empty".into()));
    }
    if tag.chars().count() > MAX_TAG_CHARS {
        return Err(CoreError::Validation(format!(
            "Tag cannot exceed {MAX_TAG_CHARS} characters"
        )));
    }
    Ok(())
}

/// Name for a duplicated project: `"<name> (Copy)"`, truncated to the name
/// cap when the suffix would overflow it.
pub fn duplicate_name(name: &str) -> String {
    const SUFFIX: &str = " (Copy)";
    let budget = MAX_PROJECT_NAME_CHARS - SUFFIX.chars().count();
    let mut base: String = name.chars().take(budget).collect();
    base.push_str(SUFFIX);
    base
}

/// Trim, drop empties, validate, and deduplicate tags preserving first
/// occurrence order (tags behave as a set).
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, CoreError> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        validate_tag(trimmed)?;
        if !out.iter().any(|t| t == trimmed) {
            out.push(trimmed.to_owned());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_new_project_defaults() {
        let project = Project::new("demo").unwrap();
        assert_eq!(project.settings.theme, Theme::Light);
        assert!(project.settings.autosave);
        assert!(!project.is_public);
        assert!(project.files.is_empty());
        assert_eq!(project.revision, 0);
        assert_eq!(project.created_at, project.updated_at);
    }

    #[test]
    fn test_project_name_required() {
        assert_matches!(Project::new("  "), Err(CoreError::Validation(_)));
    }

    #[test]
    fn test_settings_patch_merges_field_by_field() {
        let mut settings = ProjectSettings::default();
        settings.apply(SettingsPatch {
            theme: Some(Theme::Dark),
            autosave: None,
        });
        assert_eq!(settings.theme, Theme::Dark);
        // Unspecified fields must survive the merge.
        assert!(settings.autosave);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut project = Project::new("demo").unwrap();
        let future = chrono::Utc::now() + chrono::Duration::hours(1);
        project.updated_at = future;
        project.touch();
        assert_eq!(project.updated_at, future);
    }

    #[test]
    fn test_duplicate_name_suffix_and_cap() {
        assert_eq!(duplicate_name("demo"), "demo (Copy)");
        let long = "x".repeat(MAX_PROJECT_NAME_CHARS);
        let copy = duplicate_name(&long);
        assert!(copy.ends_with(" (Copy)"));
        assert_eq!(copy.chars().count(), MAX_PROJECT_NAME_CHARS);
    }

    #[test]
    fn test_normalize_tags_dedups_and_trims() {
        let tags = vec![
            " rust ".to_owned(),
            "web".to_owned(),
            "rust".to_owned(),
            "".to_owned(),
        ];
        let normalized = normalize_tags(&tags).unwrap();
        assert_eq!(normalized, vec!["rust", "web"]);
    }

    #[test]
    fn test_normalize_tags_rejects_overlong() {
        let tags = vec!["x".repeat(MAX_TAG_CHARS + 1)];
        assert_matches!(normalize_tags(&tags), Err(CoreError::Validation(_)));
    }

    #[test]
    fn test_validate_covers_embedded_tree() {
        let mut project = Project::new("demo").unwrap();
        let mut node = FileNode::file("a.js", "", None).unwrap();
        node.parent_id = Some(NodeId::new_v4());
        project.files.push(node);
        assert_matches!(project.validate(), Err(CoreError::InvalidParent(_)));
    }

    #[test]
    fn test_document_roundtrip_preserves_structure() {
        let mut project = Project::new("demo").unwrap();
        let folder = FileNode::folder("src", None).unwrap();
        let file = FileNode::file("main.js", "let x = 1;", Some(folder.id)).unwrap();
        project.files = vec![folder, file];
        project.description = Some("a demo".to_owned());
        project.tags = vec!["demo".to_owned()];

        let json = serde_json::to_string(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back, project);
    }
}
