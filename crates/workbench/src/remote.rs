//! HTTP client for the remote project store.
//!
//! Thin reqwest wrapper over the `/api/projects` surface. Transport failures
//! are kept distinct from HTTP-level rejections so the gateway can fall back
//! to the local cache when the remote is merely unreachable.

use serde::{Deserialize, Serialize};

use atelier_core::project::{Project, ProjectSettings};
use atelier_core::tree::FileNode;
use atelier_core::types::ProjectId;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Project not found on remote")]
    NotFound,

    #[error("Access denied by remote")]
    Forbidden,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Remote revision is newer than ours")]
    Conflict,

    #[error("Remote rejected the request: {0}")]
    Rejected(String),

    #[error("Unexpected remote status: {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl RemoteError {
    /// Whether the failure means the remote could not be reached at all, as
    /// opposed to a definite HTTP-level answer.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// `{ "data": ... }` envelope used by every successful response.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// `{ "error": ..., "code": ... }` body used by every error response.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// Outgoing project payload for create and update calls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPayload<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    tags: &'a [String],
    is_public: bool,
    settings: &'a ProjectSettings,
    files: &'a [FileNode],
    /// Optimistic-concurrency precondition; only sent on updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<i64>,
}

impl<'a> ProjectPayload<'a> {
    fn from_project(project: &'a Project, revision: Option<i64>) -> Self {
        Self {
            name: &project.name,
            description: project.description.as_deref(),
            tags: &project.tags,
            is_public: project.is_public,
            settings: &project.settings,
            files: &project.files,
            revision,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            http: reqwest::Client::new(),
        }
    }

    /// Attach the bearer token used for authenticated calls.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Create the project remotely. The server assigns the canonical id,
    /// owner, and revision; callers adopt them from the returned document.
    pub async fn create(&self, project: &Project) -> Result<Project, RemoteError> {
        let response = self
            .request(reqwest::Method::POST, "/api/projects")
            .json(&ProjectPayload::from_project(project, None))
            .send()
            .await?;
        decode(response).await
    }

    /// Push the full snapshot as an update, preconditioned on the revision
    /// we last synced at.
    pub async fn push(&self, project: &Project) -> Result<Project, RemoteError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/api/projects/{}", project.id))
            .json(&ProjectPayload::from_project(project, Some(project.revision)))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn fetch(&self, id: ProjectId) -> Result<Project, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/api/projects/{id}"))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete(&self, id: ProjectId) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/api/projects/{id}"))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(error_for_status(status, response).await)
        }
    }
}

/// Decode a `{data}` envelope, or map the error status.
async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RemoteError> {
    let status = response.status();
    if status.is_success() {
        let envelope: DataEnvelope<T> = response.json().await?;
        Ok(envelope.data)
    } else {
        Err(error_for_status(status, response).await)
    }
}

async fn error_for_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> RemoteError {
    use reqwest::StatusCode;
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::FORBIDDEN => RemoteError::Forbidden,
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
        StatusCode::CONFLICT => RemoteError::Conflict,
        StatusCode::BAD_REQUEST => match response.json::<ErrorEnvelope>().await {
            Ok(body) => RemoteError::Rejected(body.error),
            Err(_) => RemoteError::Rejected("Bad request".into()),
        },
        other => RemoteError::Status(other),
    }
}
