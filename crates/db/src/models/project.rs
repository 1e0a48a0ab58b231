//! Project document model and DTOs.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use atelier_core::project::{Project, ProjectSettings};
use atelier_core::tree::FileNode;
use atelier_core::types::{ProjectId, Timestamp, UserId};

/// A full project row from the `projects` table, file tree included.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: UserId,
    pub is_public: bool,
    pub settings: Json<ProjectSettings>,
    pub files: Json<Vec<FileNode>>,
    pub revision: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            tags: row.tags,
            owner_id: Some(row.owner_id),
            is_public: row.is_public,
            settings: row.settings.0,
            files: row.files.0,
            revision: row.revision,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Listing row: project metadata without the file tree payload.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryRow {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: UserId,
    pub is_public: bool,
    pub revision: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for inserting a new project. The caller has already validated the
/// aggregate (name/description/tag limits, tree invariants).
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: UserId,
    pub is_public: bool,
    pub settings: ProjectSettings,
    pub files: Vec<FileNode>,
}

/// Input for a partial project update. `None` fields are left unchanged;
/// `settings` is the already-merged full settings value.
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub settings: Option<ProjectSettings>,
    pub files: Option<Vec<FileNode>>,
}

/// Filter and pagination input for project listing.
#[derive(Debug, Clone, Default)]
pub struct ProjectListFilter {
    /// Authenticated requester, or `None` for anonymous (public-only).
    pub requester: Option<UserId>,
    /// Case-insensitive substring match on name or description.
    pub search: Option<String>,
    /// Keep projects sharing at least one of these tags.
    pub tags: Option<Vec<String>>,
    /// Explicit visibility filter on top of the access filter.
    pub is_public: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
