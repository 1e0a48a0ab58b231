//! Atelier domain core.
//!
//! Pure data types and validation for the project file-tree model: the flat
//! node collection, the project aggregate, access rules, and listing helpers.
//! This crate has no I/O and no internal dependencies so it can be shared by
//! the API/repository layer and the client-side workbench engine.

pub mod access;
pub mod error;
pub mod listing;
pub mod project;
pub mod template;
pub mod tree;
pub mod types;
