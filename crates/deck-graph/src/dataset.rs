use std::collections::BTreeMap;

use deck_protocol::{decode_snapshot, DecodeError, GraphEdge, GraphNode, GraphSnapshot, NodeGroup};
use serde_json::Value;

use crate::diff::{diff_collection, Diff};
use crate::layout::{LayoutAssigner, LayoutConfig, LayoutContext, Position, SLOT_EPSILON};
use crate::style::{EdgeStyle, NodeStyle};

/// More additions than this in one refresh re-fits the view.
pub const FIT_VIEW_ADD_THRESHOLD: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub node: GraphNode,
    pub style: NodeStyle,
    pub position: Position,
    /// Excluded from simulation forces.
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEdge {
    pub edge: GraphEdge,
    pub style: EdgeStyle,
}

/// What one refresh changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub nodes: Diff<GraphNode>,
    pub edges: Diff<GraphEdge>,
    /// Edges dropped because an endpoint was missing from the snapshot.
    pub dropped_edges: usize,
    pub fit_view: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[derive(Debug)]
pub enum ApplyOutcome {
    Applied(ChangeSet),
    /// The payload was unusable; the view was left untouched.
    Skipped(DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Grow by `pad` on each side, keeping a non-zero extent.
    pub fn padded(&self, pad: f64) -> Bounds {
        let pad = pad.max(1.0);
        Bounds {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Live render dataset plus the diff engine that keeps it current.
pub struct GraphView {
    nodes: BTreeMap<String, RenderedNode>,
    edges: BTreeMap<String, RenderedEdge>,
    layout: LayoutAssigner,
    populated: bool,
    fingerprint: Option<String>,
}

impl GraphView {
    pub fn new(config: LayoutConfig) -> Self {
        Self::with_assigner(LayoutAssigner::new(config))
    }

    pub fn with_assigner(layout: LayoutAssigner) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            layout,
            populated: false,
            fingerprint: None,
        }
    }

    /// Decode and apply a raw payload. A payload without `nodes` or
    /// `edges` is logged and skipped so the previous graph stays visible.
    pub fn apply_payload(&mut self, payload: &Value) -> ApplyOutcome {
        match decode_snapshot(payload) {
            Ok(decoded) => {
                for rejected in &decoded.rejected {
                    tracing::warn!(error = %rejected, "Dropping malformed graph item");
                }
                ApplyOutcome::Applied(self.apply(decoded.snapshot))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Graph payload unusable, keeping previous view");
                ApplyOutcome::Skipped(e)
            }
        }
    }

    /// Bring the dataset in line with `snapshot` using remove, update and
    /// add operations only.
    pub fn apply(&mut self, mut snapshot: GraphSnapshot) -> ChangeSet {
        let duplicates = snapshot.dedup();
        if duplicates > 0 {
            tracing::warn!(duplicates, "Ignoring repeated node ids and edge keys");
        }
        let dropped_edges = snapshot.retain_connected_edges();
        if dropped_edges > 0 {
            tracing::debug!(dropped = dropped_edges, "Dropped edges with missing endpoints");
        }

        let node_diff = diff_collection(
            self.nodes.iter().map(|(k, r)| (k.as_str(), &r.node)),
            &snapshot.nodes,
        );
        let edge_diff = diff_collection(
            self.edges.iter().map(|(k, r)| (k.as_str(), &r.edge)),
            &snapshot.edges,
        );

        for id in &edge_diff.removed {
            self.edges.remove(id);
        }
        for id in &node_diff.removed {
            self.nodes.remove(id);
        }

        for node in &node_diff.updated {
            if let Some(rendered) = self.nodes.get_mut(&node.id) {
                rendered.style = NodeStyle::for_node(node);
                rendered.node = node.clone();
            }
        }

        if !node_diff.added.is_empty() {
            let ctx = LayoutContext::build(&snapshot);
            let mut pending: Vec<&GraphNode> = node_diff.added.iter().collect();
            // Anchors first so rings can centre on them.
            pending.sort_by_key(|n| placement_rank(n.group));
            for node in pending {
                let placement = {
                    let nodes = &self.nodes;
                    let anchor = |id: &str| nodes.get(id).map(|r| r.position);
                    let occupied = |p: Position| {
                        nodes
                            .values()
                            .any(|r| r.position.distance_to(p) < SLOT_EPSILON)
                    };
                    self.layout.place(node, &ctx, &anchor, &occupied)
                };
                self.nodes.insert(
                    node.id.clone(),
                    RenderedNode {
                        node: node.clone(),
                        style: NodeStyle::for_node(node),
                        position: placement.position,
                        fixed: placement.fixed,
                    },
                );
            }
        }

        for edge in edge_diff.updated.iter().chain(edge_diff.added.iter()) {
            self.edges.insert(
                edge.key(),
                RenderedEdge {
                    edge: edge.clone(),
                    style: EdgeStyle::for_edge(edge),
                },
            );
        }

        let first_population = !self.populated && !self.nodes.is_empty();
        if first_population {
            self.populated = true;
        }
        let fit_view = first_population || node_diff.added.len() > FIT_VIEW_ADD_THRESHOLD;
        self.fingerprint = Some(snapshot.fingerprint());

        let changes = ChangeSet {
            nodes: node_diff,
            edges: edge_diff,
            dropped_edges,
            fit_view,
        };
        if !changes.is_empty() {
            tracing::debug!(
                nodes_added = changes.nodes.added.len(),
                nodes_updated = changes.nodes.updated.len(),
                nodes_removed = changes.nodes.removed.len(),
                edges_added = changes.edges.added.len(),
                edges_removed = changes.edges.removed.len(),
                fit_view,
                "Graph view updated"
            );
        }
        changes
    }

    /// Pin or move a node, e.g. after a user drag. Returns false for
    /// unknown ids.
    pub fn set_position(&mut self, id: &str, position: Position, fixed: bool) -> bool {
        match self.nodes.get_mut(id) {
            Some(rendered) => {
                rendered.position = position;
                rendered.fixed = fixed;
                true
            }
            None => false,
        }
    }

    pub fn node(&self, id: &str) -> Option<&RenderedNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RenderedNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &RenderedEdge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fingerprint of the last applied snapshot.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Bounding box of all rendered nodes.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut it = self.nodes.values().map(|r| r.position);
        let first = it.next()?;
        Some(it.fold(
            Bounds {
                min_x: first.x,
                min_y: first.y,
                max_x: first.x,
                max_y: first.y,
            },
            |b, p| Bounds {
                min_x: b.min_x.min(p.x),
                min_y: b.min_y.min(p.y),
                max_x: b.max_x.max(p.x),
                max_y: b.max_y.max(p.y),
            },
        ))
    }

    /// Forget everything, e.g. when switching servers.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.populated = false;
        self.fingerprint = None;
    }
}

fn placement_rank(group: NodeGroup) -> u8 {
    match group {
        NodeGroup::Admin => 0,
        NodeGroup::Context => 1,
        NodeGroup::Agent => 2,
        NodeGroup::Task => 3,
        NodeGroup::File => 4,
        NodeGroup::Other => 5,
    }
}
