//! Edge classification from the backend's human-readable titles.

use serde::{Deserialize, Serialize};

/// Relation type of an edge, inferred from its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    CreatedBy,
    ParentOf,
    DependsOn,
    /// Agent currently working on / assigned to a task.
    WorkingOn,
    /// Agent touched a file.
    FileAccess,
    /// Link to or from a context entry.
    ContextLink,
    Other,
}

impl EdgeKind {
    /// Classify a title such as "Created by", "Parent of", "Depends on".
    ///
    /// Matching is case-insensitive and substring based; the first rule
    /// that matches wins.
    pub fn classify(title: &str) -> Self {
        let t = title.trim().to_lowercase();
        if t.contains("created by") || t.starts_with("created") {
            EdgeKind::CreatedBy
        } else if t.contains("parent") || t.contains("subtask") || t.contains("child") {
            EdgeKind::ParentOf
        } else if t.contains("depend") || t.contains("blocks") {
            EdgeKind::DependsOn
        } else if t.contains("working on") || t.contains("assigned") {
            EdgeKind::WorkingOn
        } else if t.contains("modif") || t.contains("access") || t.contains("file") {
            EdgeKind::FileAccess
        } else if t.contains("context") || t.contains("related") || t.contains("memory") {
            EdgeKind::ContextLink
        } else {
            EdgeKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::CreatedBy => "created_by",
            EdgeKind::ParentOf => "parent_of",
            EdgeKind::DependsOn => "depends_on",
            EdgeKind::WorkingOn => "working_on",
            EdgeKind::FileAccess => "file_access",
            EdgeKind::ContextLink => "context_link",
            EdgeKind::Other => "other",
        }
    }
}
