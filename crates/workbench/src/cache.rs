//! Durable local project cache.
//!
//! One JSON document per project id under `<root>/projects/`, written
//! atomically (temp file + rename) so a crashed write never corrupts the
//! previous copy. The cache is the fallback of record when the remote store
//! is unreachable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use atelier_core::project::Project;
use atelier_core::types::{ProjectId, Timestamp, UserId};

/// Directory under the cache root holding the project documents.
const PROJECTS_DIR: &str = "projects";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("json error at {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Project metadata without the file tree payload, for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: Option<UserId>,
    pub is_public: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            description: project.description.clone(),
            tags: project.tags.clone(),
            owner_id: project.owner_id,
            is_public: project.is_public,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn projects_dir(&self) -> PathBuf {
        self.root.join(PROJECTS_DIR)
    }

    fn document_path(&self, id: ProjectId) -> PathBuf {
        self.projects_dir().join(format!("{id}.json"))
    }

    /// Write the full project document, atomically replacing any previous
    /// copy.
    pub fn save(&self, project: &Project) -> Result<(), CacheError> {
        let dir = self.projects_dir();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = self.document_path(project.id);
        let json = serde_json::to_string_pretty(project).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;

        write_atomic(&path, format!("{json}\n").as_bytes())
            .map_err(|source| CacheError::Io { path, source })
    }

    /// Load a project document, or `None` when no copy is cached.
    pub fn load(&self, id: ProjectId) -> Result<Option<Project>, CacheError> {
        let path = self.document_path(id);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let project =
            serde_json::from_str(&json).map_err(|source| CacheError::Json { path, source })?;
        Ok(Some(project))
    }

    /// Remove a cached document. Missing documents are not an error.
    pub fn remove(&self, id: ProjectId) -> Result<(), CacheError> {
        let path = self.document_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Summaries of every cached project, most recently updated first.
    ///
    /// Unreadable documents are skipped with a warning rather than failing
    /// the whole listing.
    pub fn load_summaries(&self) -> Result<Vec<ProjectSummary>, CacheError> {
        let dir = self.projects_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(CacheError::Io { path: dir, source }),
        };

        let mut summaries = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let json = match fs::read_to_string(&path) {
                Ok(json) => json,
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Skipping unreadable cache entry");
                    continue;
                }
            };
            match serde_json::from_str::<Project>(&json) {
                Ok(project) => summaries.push(ProjectSummary::from(&project)),
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Skipping malformed cache entry");
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

/// Write bytes to a temp file in the target directory, then rename into
/// place.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use atelier_core::template::project_from_template;
    use atelier_core::tree::FileNode;

    use super::*;

    fn cache() -> (tempfile::TempDir, LocalCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        (dir, cache)
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (_dir, cache) = cache();
        let project = project_from_template("demo").unwrap();

        cache.save(&project).unwrap();
        let loaded = cache.load(project.id).unwrap().unwrap();
        assert_eq!(loaded, project);
    }

    #[test]
    fn test_load_missing_is_none() {
        let (_dir, cache) = cache();
        assert!(cache.load(ProjectId::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_copy() {
        let (_dir, cache) = cache();
        let mut project = project_from_template("demo").unwrap();
        cache.save(&project).unwrap();

        project.files.push(FileNode::file("extra.js", "", None).unwrap());
        cache.save(&project).unwrap();

        let loaded = cache.load(project.id).unwrap().unwrap();
        assert_eq!(loaded.files.len(), 4);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_dir, cache) = cache();
        let project = project_from_template("demo").unwrap();
        cache.save(&project).unwrap();

        cache.remove(project.id).unwrap();
        cache.remove(project.id).unwrap();
        assert!(cache.load(project.id).unwrap().is_none());
    }

    #[test]
    fn test_summaries_sorted_by_updated_at_desc() {
        let (_dir, cache) = cache();
        let mut older = project_from_template("older").unwrap();
        let mut newer = project_from_template("newer").unwrap();
        older.updated_at = chrono::Utc::now() - chrono::Duration::hours(1);
        newer.updated_at = chrono::Utc::now();
        cache.save(&older).unwrap();
        cache.save(&newer).unwrap();

        let summaries = cache.load_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "newer");
        assert_eq!(summaries[1].name, "older");
    }

    #[test]
    fn test_summaries_empty_without_cache_dir() {
        let (_dir, cache) = cache();
        assert!(cache.load_summaries().unwrap().is_empty());
    }
}
