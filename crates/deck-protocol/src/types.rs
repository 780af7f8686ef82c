use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::constants::{ATTACHED_TO_ATTR, OWNER_ATTRS};
use crate::decode::parse_string_list;
use crate::edge::EdgeKind;

/// Semantic category of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeGroup {
    /// The administrative root; there is normally exactly one.
    Admin,
    Agent,
    Task,
    /// A memory/context entry.
    Context,
    File,
    #[default]
    #[serde(other)]
    Other,
}

impl NodeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeGroup::Admin => "admin",
            NodeGroup::Agent => "agent",
            NodeGroup::Task => "task",
            NodeGroup::Context => "context",
            NodeGroup::File => "file",
            NodeGroup::Other => "other",
        }
    }
}

impl fmt::Display for NodeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    /// Created, not picked up yet
    Pending,
    /// An agent is working on it
    #[serde(alias = "in-progress", alias = "inprogress")]
    InProgress,
    Completed,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
    /// Anything the backend sends that this client does not know about
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Lenient parse used for the free-form `status` string on graph nodes.
    pub fn parse(raw: &str) -> Self {
        match normalize_status(raw).as_str() {
            "pending" => TaskStatus::Pending,
            "in_progress" | "inprogress" => TaskStatus::InProgress,
            "completed" | "done" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "cancelled" | "canceled" => TaskStatus::Cancelled,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Cancelled => "Cancelled",
            TaskStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Created,
    Active,
    Terminated,
    Failed,
    Completed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl AgentStatus {
    pub fn parse(raw: &str) -> Self {
        match normalize_status(raw).as_str() {
            "created" => AgentStatus::Created,
            "active" | "running" => AgentStatus::Active,
            "terminated" => AgentStatus::Terminated,
            "failed" => AgentStatus::Failed,
            "completed" => AgentStatus::Completed,
            _ => AgentStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgentStatus::Created => "Created",
            AgentStatus::Active => "Active",
            AgentStatus::Terminated => "Terminated",
            AgentStatus::Failed => "Failed",
            AgentStatus::Completed => "Completed",
            AgentStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize_status(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['-', ' '], "_")
}

/// A node in the backend's relationship graph.
///
/// Everything beyond the well-known fields lands in `attributes`, so two
/// nodes compare equal only if their whole serialized form matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub group: NodeGroup,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, group: NodeGroup) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            group,
            title: None,
            status: None,
            attributes: Map::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Agent this node belongs to, if the backend said so explicitly.
    pub fn owner(&self) -> Option<&str> {
        OWNER_ATTRS
            .iter()
            .find_map(|key| self.attr_str(key))
            .filter(|s| !s.is_empty())
    }

    /// Node this entry is attached to (used by context entries).
    pub fn attached_to(&self) -> Option<&str> {
        self.attr_str(ATTACHED_TO_ATTR)
    }

    pub fn task_status(&self) -> Option<TaskStatus> {
        match self.group {
            NodeGroup::Task => self.status.as_deref().map(TaskStatus::parse),
            _ => None,
        }
    }

    pub fn agent_status(&self) -> Option<AgentStatus> {
        match self.group {
            NodeGroup::Agent => self.status.as_deref().map(AgentStatus::parse),
            _ => None,
        }
    }

    /// Label for display, falling back to the id.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// A directed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "source")]
    pub from: String,
    #[serde(alias = "target")]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: to.into(),
            title: title.map(str::to_string),
            attributes: Map::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Stable diff key: the backend id when present, else derived from
    /// the endpoints and title.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!(
                "{}->{}:{}",
                self.from,
                self.to,
                self.title.as_deref().unwrap_or("")
            ),
        }
    }

    pub fn kind(&self) -> EdgeKind {
        self.title
            .as_deref()
            .map(EdgeKind::classify)
            .unwrap_or(EdgeKind::Other)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }

    /// The endpoint opposite `node_id`, if this edge touches it.
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.from == node_id {
            Some(&self.to)
        } else if self.to == node_id {
            Some(&self.from)
        } else {
            None
        }
    }
}

/// Point-in-time view of the backend's node/edge graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Drop edges whose endpoints are not both present. Returns how many
    /// were removed.
    pub fn retain_connected_edges(&mut self) -> usize {
        let ids: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let before = self.edges.len();
        self.edges
            .retain(|e| ids.contains(&e.from) && ids.contains(&e.to));
        before - self.edges.len()
    }

    /// Keep the first node per id and the first edge per key. Returns how
    /// many items were dropped.
    pub fn dedup(&mut self) -> usize {
        let before = self.nodes.len() + self.edges.len();
        let mut ids = HashSet::new();
        self.nodes.retain(|n| ids.insert(n.id.clone()));
        let mut keys = HashSet::new();
        self.edges.retain(|e| keys.insert(e.key()));
        before - self.nodes.len() - self.edges.len()
    }

    /// SHA-256 over the canonical JSON form, hex encoded.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Row in the agents table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(alias = "id")]
    pub agent_id: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Row in the tasks table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "id")]
    pub task_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub parent_task: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub depends_on_tasks: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A memory/context entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    #[serde(alias = "key")]
    pub context_key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl MemoryEntry {
    /// The stored value with one level of JSON-in-a-string unwrapped.
    /// Plain strings that are not JSON come back unchanged.
    pub fn decoded_value(&self) -> Value {
        match &self.value {
            Value::String(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            other => other.clone(),
        }
    }
}

/// Detail view of a single graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDetail {
    #[serde(alias = "id")]
    pub node_id: String,
    #[serde(default, alias = "type")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, alias = "actions")]
    pub relationships: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    pub agent_id: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task: Option<String>,
    #[serde(default)]
    pub depends_on_tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryWriteRequest {
    pub context_key: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Acknowledgement body returned by mutating endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationAck {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MutationAck {
    /// Backends that omit `success` are taken to mean it.
    pub fn succeeded(&self) -> bool {
        self.success.unwrap_or(true)
    }
}

fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    parse_string_list(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_group_decodes_as_other() {
        let node: GraphNode =
            serde_json::from_value(serde_json::json!({"id": "x", "group": "workflow"})).unwrap();
        assert_eq!(node.group, NodeGroup::Other);
    }

    #[test]
    fn extra_node_fields_are_kept_as_attributes() {
        let node: GraphNode = serde_json::from_value(serde_json::json!({
            "id": "task_1",
            "group": "task",
            "label": "Write docs",
            "status": "in_progress",
            "priority": "high",
            "assigned_to": "agent_a",
        }))
        .unwrap();
        assert_eq!(node.attr_str("priority"), Some("high"));
        assert_eq!(node.owner(), Some("agent_a"));
        assert_eq!(node.task_status(), Some(TaskStatus::InProgress));
    }

    #[test]
    fn edge_accepts_source_target_aliases() {
        let edge: GraphEdge = serde_json::from_value(serde_json::json!({
            "source": "a", "target": "b", "kind": "hierarchy"
        }))
        .unwrap();
        assert_eq!(edge.from, "a");
        assert_eq!(edge.to, "b");
        assert_eq!(edge.key(), "a->b:");
    }

    #[test]
    fn task_status_parse_is_lenient() {
        assert_eq!(TaskStatus::parse("In Progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse("in-progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse("canceled"), TaskStatus::Cancelled);
        assert_eq!(TaskStatus::parse("exploded"), TaskStatus::Unknown);
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn retain_connected_edges_drops_dangling() {
        let mut snap = GraphSnapshot::new(
            vec![GraphNode::new("a", NodeGroup::Agent)],
            vec![
                GraphEdge::new("a", "a", Some("self")),
                GraphEdge::new("a", "ghost", Some("Working on")),
            ],
        );
        assert_eq!(snap.retain_connected_edges(), 1);
        assert_eq!(snap.edges.len(), 1);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = GraphSnapshot::new(vec![GraphNode::new("a", NodeGroup::Agent)], vec![]);
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.nodes[0].status = Some("active".into());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn memory_value_unwraps_embedded_json() {
        let entry = MemoryEntry {
            context_key: "k".into(),
            value: Value::String("{\"a\":1}".into()),
            description: None,
            updated_by: None,
            last_updated: None,
        };
        assert_eq!(entry.decoded_value(), serde_json::json!({"a": 1}));
    }
}
