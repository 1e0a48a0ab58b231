//! Repository for the `projects` table.

use sqlx::types::Json;
use sqlx::PgPool;

use atelier_core::listing::{clamp_limit, clamp_page, escape_like};
use atelier_core::types::{ProjectId, UserId};

use crate::models::project::{
    CreateProject, ProjectListFilter, ProjectRow, ProjectSummaryRow, UpdateProject,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, tags, owner_id, is_public, settings, files, \
                       revision, created_at, updated_at";

/// Summary column list for listing queries (no file tree payload).
const SUMMARY_COLUMNS: &str =
    "id, name, description, tags, owner_id, is_public, revision, created_at, updated_at";

/// Visibility + search + tag filter shared by `list` and `count`.
///
/// - `$1`: requester id, or NULL for anonymous (public-only).
/// - `$2`: escaped ILIKE pattern, or NULL to skip the search filter.
/// - `$3`: tag array, or NULL to skip; `&&` keeps any overlap.
/// - `$4`: explicit visibility filter, or NULL to skip.
const FILTER: &str = "(CASE WHEN $1::UUID IS NULL THEN is_public \
                            ELSE (owner_id = $1 OR is_public) END) \
                      AND ($2::TEXT IS NULL OR name ILIKE $2 OR description ILIKE $2) \
                      AND ($3::TEXT[] IS NULL OR tags && $3) \
                      AND ($4::BOOLEAN IS NULL OR is_public = $4)";

/// Provides CRUD and listing operations for project documents.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<ProjectRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name, description, tags, owner_id, is_public, settings, files)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.tags)
            .bind(input.owner_id)
            .bind(input.is_public)
            .bind(Json(&input.settings))
            .bind(Json(&input.files))
            .fetch_one(pool)
            .await
    }

    /// Find a project by its id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: ProjectId,
    ) -> Result<Option<ProjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List projects visible to the requester, newest update first.
    pub async fn list(
        pool: &PgPool,
        filter: &ProjectListFilter,
    ) -> Result<Vec<ProjectSummaryRow>, sqlx::Error> {
        let page = clamp_page(filter.page);
        let limit = clamp_limit(filter.limit);
        let offset = (page - 1) * limit;

        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM projects
             WHERE {FILTER}
             ORDER BY updated_at DESC
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, ProjectSummaryRow>(&query)
            .bind(filter.requester)
            .bind(search_pattern(filter))
            .bind(&filter.tags)
            .bind(filter.is_public)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Total number of projects matching the same filter as [`Self::list`].
    pub async fn count(pool: &PgPool, filter: &ProjectListFilter) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM projects WHERE {FILTER}");
        sqlx::query_scalar::<_, i64>(&query)
            .bind(filter.requester)
            .bind(search_pattern(filter))
            .bind(&filter.tags)
            .bind(filter.is_public)
            .fetch_one(pool)
            .await
    }

    /// Apply a partial update. Only non-`None` fields are written; the
    /// revision counter is incremented and `updated_at` refreshed
    /// monotonically.
    ///
    /// When `expected_revision` is supplied the update only applies if the
    /// stored revision still matches; a stale precondition yields `None`
    /// (the caller has already established that the row exists).
    pub async fn update(
        pool: &PgPool,
        id: ProjectId,
        input: &UpdateProject,
        expected_revision: Option<i64>,
    ) -> Result<Option<ProjectRow>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                tags = COALESCE($4, tags),
                is_public = COALESCE($5, is_public),
                settings = COALESCE($6, settings),
                files = COALESCE($7, files),
                revision = revision + 1,
                updated_at = GREATEST(updated_at, NOW())
             WHERE id = $1 AND ($8::BIGINT IS NULL OR revision = $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.tags)
            .bind(input.is_public)
            .bind(input.settings.as_ref().map(Json))
            .bind(input.files.as_ref().map(Json))
            .bind(expected_revision)
            .fetch_optional(pool)
            .await
    }

    /// Delete a project (the embedded node collection goes with the row).
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: ProjectId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Copy a project into a fresh private document owned by `new_owner`.
    pub async fn duplicate(
        pool: &PgPool,
        id: ProjectId,
        new_name: &str,
        new_owner: UserId,
    ) -> Result<Option<ProjectRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name, description, tags, owner_id, is_public, settings, files)
             SELECT $2, description, tags, $3, FALSE, settings, files
             FROM projects WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .bind(new_name)
            .bind(new_owner)
            .fetch_optional(pool)
            .await
    }
}

/// Build the escaped `%term%` ILIKE pattern, or `None` when no search term.
fn search_pattern(filter: &ProjectListFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)))
}
