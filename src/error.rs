use thiserror::Error;

use crate::ast::NodeId;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Node {node_id} missing from cloned tree")]
    CloneIntegrity { node_id: NodeId },

    #[error("Replacement for node {node_id} has the wrong node family")]
    ReplacementMismatch { node_id: NodeId },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Reasons a tree cannot be turned back into parseable Python.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("empty body in {0}")]
    EmptyBody(&'static str),

    #[error("try statement without except or finally")]
    TryWithoutHandlers,

    #[error("try/else without an except clause")]
    ElseWithoutHandlers,

    #[error("slice used outside of a subscript")]
    MisplacedSlice,
}

pub type Result<T> = std::result::Result<T, MutationError>;
