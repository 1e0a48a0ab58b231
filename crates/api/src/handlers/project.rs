//! Handlers for the `/projects` resource.
//!
//! Handlers stay thin: extract the requester, apply the core access rules,
//! validate incoming documents, and delegate storage to [`ProjectRepo`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use atelier_core::access::{authorize_read, authorize_write};
use atelier_core::error::CoreError;
use atelier_core::listing::{clamp_limit, clamp_page, page_count};
use atelier_core::project::{
    self, duplicate_name, normalize_tags, Project, ProjectSettings, SettingsPatch,
};
use atelier_core::tree::{validate_nodes, FileNode};
use atelier_core::types::ProjectId;
use atelier_db::models::project::{
    CreateProject, ProjectListFilter, ProjectSummaryRow, UpdateProject,
};
use atelier_db::repositories::ProjectRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, MaybeAuthUser};
use crate::response::{DataResponse, ListResponse, Pagination};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/projects`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<FileNode>,
    pub settings: Option<ProjectSettings>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for `PUT /api/projects/{id}`. All fields are optional;
/// `settings` merges field-by-field into the stored settings. When
/// `revision` is supplied the update is preconditioned on it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub files: Option<Vec<FileNode>>,
    pub settings: Option<SettingsPatch>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub revision: Option<i64>,
}

/// Query parameters for `GET /api/projects`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProjectsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    /// Comma-separated tag list; projects sharing any tag match.
    pub tags: Option<String>,
    pub is_public: Option<bool>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/projects
pub async fn create(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    let name = project::validate_project_name(&input.name)?;
    if let Some(description) = &input.description {
        project::validate_description(description)?;
    }
    let tags = normalize_tags(&input.tags)?;
    validate_nodes(&input.files)?;

    let row = ProjectRepo::create(
        &state.pool,
        &CreateProject {
            name,
            description: input.description,
            tags,
            owner_id: auth_user.user_id,
            is_public: input.is_public,
            settings: input.settings.unwrap_or_default(),
            files: input.files,
        },
    )
    .await?;

    tracing::info!(project_id = %row.id, owner_id = %auth_user.user_id, "Project created");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: Project::from(row),
        }),
    ))
}

/// GET /api/projects
pub async fn list(
    State(state): State<AppState>,
    maybe_user: MaybeAuthUser,
    Query(query): Query<ListProjectsQuery>,
) -> AppResult<Json<ListResponse<ProjectSummaryRow>>> {
    let filter = ProjectListFilter {
        requester: maybe_user.0,
        search: query.search,
        tags: query.tags.map(|tags| {
            tags.split(',')
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty())
                .collect()
        }),
        is_public: query.is_public,
        page: query.page,
        limit: query.limit,
    };

    let rows = ProjectRepo::list(&state.pool, &filter).await?;
    let total = ProjectRepo::count(&state.pool, &filter).await?;

    let page = clamp_page(filter.page);
    let limit = clamp_limit(filter.limit);
    Ok(Json(ListResponse {
        data: rows,
        pagination: Pagination {
            page,
            limit,
            total,
            pages: page_count(total, limit),
        },
    }))
}

/// GET /api/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    maybe_user: MaybeAuthUser,
    Path(id): Path<ProjectId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let row = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;

    authorize_read(maybe_user.requester(), row.owner_id, row.is_public)?;
    Ok(Json(DataResponse {
        data: Project::from(row),
    }))
}

/// PUT /api/projects/{id}
pub async fn update(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ProjectId>,
    Json(input): Json<UpdateProjectRequest>,
) -> AppResult<Json<DataResponse<Project>>> {
    let row = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;
    authorize_write(auth_user.requester(), row.owner_id)?;

    let name = input
        .name
        .as_deref()
        .map(project::validate_project_name)
        .transpose()?;
    if let Some(description) = &input.description {
        project::validate_description(description)?;
    }
    let tags = input.tags.as_deref().map(normalize_tags).transpose()?;
    if let Some(files) = &input.files {
        validate_nodes(files)?;
    }
    // Settings merge field-by-field into the stored value.
    let settings = input.settings.map(|patch| {
        let mut merged = row.settings.0;
        merged.apply(patch);
        merged
    });

    let updated = ProjectRepo::update(
        &state.pool,
        id,
        &UpdateProject {
            name,
            description: input.description,
            tags,
            is_public: input.is_public,
            settings,
            files: input.files,
        },
        input.revision,
    )
    .await?
    .ok_or(AppError::Core(CoreError::Conflict(
        "Project was modified by another writer".into(),
    )))?;

    Ok(Json(DataResponse {
        data: Project::from(updated),
    }))
}

/// DELETE /api/projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ProjectId>,
) -> AppResult<Json<DataResponse<serde_json::Value>>> {
    let row = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;
    authorize_write(auth_user.requester(), row.owner_id)?;

    ProjectRepo::delete(&state.pool, id).await?;
    tracing::info!(project_id = %id, "Project deleted");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "deleted": true }),
    }))
}

/// POST /api/projects/{id}/duplicate
pub async fn duplicate(
    State(state): State<AppState>,
    maybe_user: MaybeAuthUser,
    Path(id): Path<ProjectId>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    let row = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;
    authorize_read(maybe_user.requester(), row.owner_id, row.is_public)?;

    // The copy belongs to the requester when authenticated, else it stays
    // with the original owner.
    let new_owner = maybe_user.0.unwrap_or(row.owner_id);
    let copy = ProjectRepo::duplicate(&state.pool, id, &duplicate_name(&row.name), new_owner)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;

    tracing::info!(source_id = %id, project_id = %copy.id, "Project duplicated");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: Project::from(copy),
        }),
    ))
}
