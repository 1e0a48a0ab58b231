//! Project file-tree model.
//!
//! A project's tree is stored as a *flat* collection of [`FileNode`] linked
//! only via `parent_id`. Any nested "children" view is derived read-only with
//! [`derive_children`]; the legacy document shape that embedded children on
//! folder nodes is accepted on deserialization and discarded (the flat
//! collection is the single source of truth).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::NodeId;

/// Maximum length of a file or folder name, in characters.
pub const MAX_NODE_NAME_CHARS: usize = 100;

/// What a node is. Folders carry no content; files carry no children view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File { content: String },
    Folder,
}

/// One file or folder in a project's flat node collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NodeRecord", into = "NodeRecord")]
pub struct FileNode {
    pub id: NodeId,
    pub name: String,
    /// The owning folder, or `None` for a root-level node. This reference is
    /// the canonical statement of tree structure.
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
}

impl FileNode {
    /// Build a file node with a fresh id. The name is validated and trimmed.
    pub fn file(
        name: &str,
        content: impl Into<String>,
        parent_id: Option<NodeId>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            id: NodeId::new_v4(),
            name: validate_node_name(name)?,
            parent_id,
            kind: NodeKind::File {
                content: content.into(),
            },
        })
    }

    /// Build a folder node with a fresh id. The name is validated and trimmed.
    pub fn folder(name: &str, parent_id: Option<NodeId>) -> Result<Self, CoreError> {
        Ok(Self {
            id: NodeId::new_v4(),
            name: validate_node_name(name)?,
            parent_id,
            kind: NodeKind::Folder,
        })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder)
    }

    /// The text payload for files, `None` for folders.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { content } => Some(content),
            NodeKind::Folder => None,
        }
    }
}

/// Validate and normalize a node name: trimmed, non-empty, length-capped.
pub fn validate_node_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Name must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_NODE_NAME_CHARS {
        return Err(CoreError::Validation(format!(
            "Name cannot exceed {MAX_NODE_NAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Validate a whole flat collection against the structural invariants:
/// unique ids, every `parent_id` resolves to an existing Folder, and the
/// parent relation is acyclic.
pub fn validate_nodes(nodes: &[FileNode]) -> Result<(), CoreError> {
    let mut by_id: HashMap<NodeId, &FileNode> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if by_id.insert(node.id, node).is_some() {
            return Err(CoreError::Validation(format!(
                "Duplicate node id {}",
                node.id
            )));
        }
    }

    for node in nodes {
        let Some(parent_id) = node.parent_id else {
            continue;
        };
        if parent_id == node.id {
            return Err(CoreError::InvalidParent(format!(
                "Node {} is its own parent",
                node.id
            )));
        }
        match by_id.get(&parent_id) {
            None => {
                return Err(CoreError::InvalidParent(format!(
                    "Node {} references missing parent {parent_id}",
                    node.id
                )));
            }
            Some(parent) if !parent.is_folder() => {
                return Err(CoreError::InvalidParent(format!(
                    "Node {} references non-folder parent {parent_id}",
                    node.id
                )));
            }
            Some(_) => {}
        }
    }

    // Walk each parent chain; revisiting a node within one walk is a cycle.
    let mut acyclic: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut current = node.id;
        loop {
            if acyclic.contains(&current) {
                break;
            }
            if !seen.insert(current) {
                return Err(CoreError::InvalidParent(format!(
                    "Cycle in parent chain at node {current}"
                )));
            }
            match by_id.get(&current).and_then(|n| n.parent_id) {
                Some(parent_id) => current = parent_id,
                None => break,
            }
        }
        acyclic.extend(seen);
    }

    Ok(())
}

/// Derive the nested view: a mapping from parent (or `None` for the root
/// level) to the ids of its direct children, in insertion order of the flat
/// collection. Read-only projection; never persisted.
pub fn derive_children(nodes: &[FileNode]) -> HashMap<Option<NodeId>, Vec<NodeId>> {
    let mut children: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
    for node in nodes {
        children.entry(node.parent_id).or_default().push(node.id);
    }
    children
}

/// All transitive descendants of `id` (not including `id` itself).
pub fn descendants_of(nodes: &[FileNode], id: NodeId) -> HashSet<NodeId> {
    let children = derive_children(nodes);
    let mut result = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if let Some(direct) = children.get(&Some(current)) {
            for &child in direct {
                if result.insert(child) {
                    stack.push(child);
                }
            }
        }
    }
    result
}

/// Look up a node by id.
pub fn find_node(nodes: &[FileNode], id: NodeId) -> Option<&FileNode> {
    nodes.iter().find(|n| n.id == id)
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum NodeKindTag {
    File,
    Folder,
}

/// Legacy document shape for one node.
///
/// Folders in old documents may carry a non-empty `content` and an embedded
/// `children` array; both are derived artifacts and are discarded on intake.
/// Serialization always emits the flat shape with `content` present (empty
/// for folders) and no `children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    id: NodeId,
    name: String,
    #[serde(default)]
    content: String,
    #[serde(rename = "type")]
    kind: NodeKindTag,
    #[serde(default)]
    parent_id: Option<NodeId>,
    #[serde(default, skip_serializing)]
    children: Option<serde_json::Value>,
}

impl From<FileNode> for NodeRecord {
    fn from(node: FileNode) -> Self {
        let (kind, content) = match node.kind {
            NodeKind::File { content } => (NodeKindTag::File, content),
            NodeKind::Folder => (NodeKindTag::Folder, String::new()),
        };
        Self {
            id: node.id,
            name: node.name,
            content,
            kind,
            parent_id: node.parent_id,
            children: None,
        }
    }
}

impl TryFrom<NodeRecord> for FileNode {
    type Error = CoreError;

    fn try_from(record: NodeRecord) -> Result<Self, CoreError> {
        let name = validate_node_name(&record.name)?;
        let kind = match record.kind {
            NodeKindTag::File => NodeKind::File {
                content: record.content,
            },
            NodeKindTag::Folder => NodeKind::Folder,
        };
        Ok(Self {
            id: record.id,
            name,
            parent_id: record.parent_id,
            kind,
        })
    }
}
