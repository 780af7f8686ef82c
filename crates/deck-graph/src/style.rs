//! Derived presentation attributes for nodes and edges.

use deck_protocol::{AgentStatus, EdgeKind, GraphEdge, GraphNode, NodeGroup, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

const GOLD: Rgb = Rgb(0xf5, 0xb7, 0x00);
const GREEN: Rgb = Rgb(0x22, 0xc5, 0x5e);
const BLUE: Rgb = Rgb(0x3b, 0x82, 0xf6);
const AMBER: Rgb = Rgb(0xf5, 0x9e, 0x0b);
const RED: Rgb = Rgb(0xef, 0x44, 0x44);
const GRAY: Rgb = Rgb(0x6b, 0x72, 0x80);
const PURPLE: Rgb = Rgb(0xa8, 0x55, 0xf7);
const TEAL: Rgb = Rgb(0x14, 0xb8, 0xa6);
const SLATE: Rgb = Rgb(0x94, 0xa3, 0xb8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeShape {
    Star,
    Dot,
    Square,
    Diamond,
    Triangle,
}

impl NodeShape {
    pub fn glyph(&self) -> char {
        match self {
            NodeShape::Star => '★',
            NodeShape::Dot => '●',
            NodeShape::Square => '■',
            NodeShape::Diamond => '◆',
            NodeShape::Triangle => '▲',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    pub color: Rgb,
    pub shape: NodeShape,
    pub size: f64,
}

impl NodeStyle {
    pub fn for_node(node: &GraphNode) -> Self {
        let (shape, base_size) = match node.group {
            NodeGroup::Admin => (NodeShape::Star, 30.0),
            NodeGroup::Agent => (NodeShape::Dot, 22.0),
            NodeGroup::Task => (NodeShape::Square, 14.0),
            NodeGroup::Context => (NodeShape::Diamond, 10.0),
            NodeGroup::File => (NodeShape::Triangle, 8.0),
            NodeGroup::Other => (NodeShape::Dot, 8.0),
        };
        let size = match node.attr_str("priority") {
            Some("high") => base_size + 4.0,
            Some("low") => base_size - 2.0,
            _ => base_size,
        };
        Self {
            color: node_color(node),
            shape,
            size,
        }
    }
}

fn node_color(node: &GraphNode) -> Rgb {
    match node.group {
        NodeGroup::Admin => GOLD,
        NodeGroup::Agent => match node.agent_status() {
            Some(AgentStatus::Active) | Some(AgentStatus::Created) => GREEN,
            Some(AgentStatus::Failed) => RED,
            Some(AgentStatus::Terminated) | Some(AgentStatus::Completed) => GRAY,
            _ => BLUE,
        },
        NodeGroup::Task => match node.task_status() {
            Some(TaskStatus::Pending) => AMBER,
            Some(TaskStatus::InProgress) => BLUE,
            Some(TaskStatus::Completed) => GREEN,
            Some(TaskStatus::Failed) => RED,
            Some(TaskStatus::Cancelled) => GRAY,
            _ => SLATE,
        },
        NodeGroup::Context => PURPLE,
        NodeGroup::File => TEAL,
        NodeGroup::Other => SLATE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub kind: EdgeKind,
    pub color: Rgb,
    pub width: f64,
    pub dashed: bool,
    /// Bezier roundness, 0.0 for a straight line.
    pub curvature: f64,
}

impl EdgeStyle {
    pub fn for_edge(edge: &GraphEdge) -> Self {
        let kind = edge.kind();
        let (color, width, dashed, curvature) = match kind {
            EdgeKind::CreatedBy => (GRAY, 1.0, true, 0.0),
            EdgeKind::ParentOf => (BLUE, 2.0, false, 0.0),
            EdgeKind::DependsOn => (AMBER, 2.0, true, 0.2),
            EdgeKind::WorkingOn => (GREEN, 3.0, false, 0.1),
            EdgeKind::FileAccess => (TEAL, 1.0, true, 0.0),
            EdgeKind::ContextLink => (PURPLE, 1.0, true, 0.15),
            EdgeKind::Other => (SLATE, 1.0, false, 0.0),
        };
        Self {
            kind,
            color,
            width,
            dashed,
            curvature,
        }
    }
}
