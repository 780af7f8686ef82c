use std::collections::BTreeMap;

use deck_graph::*;
use deck_protocol::{GraphEdge, GraphNode, GraphSnapshot, NodeGroup};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

fn view() -> GraphView {
    GraphView::with_assigner(LayoutAssigner::with_seed(LayoutConfig::default(), 7))
}

fn agent(id: &str) -> GraphNode {
    GraphNode::new(id, NodeGroup::Agent).with_status("active")
}

fn task(id: &str) -> GraphNode {
    GraphNode::new(id, NodeGroup::Task)
        .with_status("pending")
        .with_attr("depends_on", json!([]))
}

fn ids(nodes: &[GraphNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.id.as_str()).collect()
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn test_first_fetch_adds_everything() {
    let mut v = view();
    let changes = v.apply(GraphSnapshot::new(
        vec![agent("agentA"), task("taskT1")],
        vec![GraphEdge::new("taskT1", "agentA", Some("Working on"))],
    ));
    assert_eq!(ids(&changes.nodes.added), vec!["agentA", "taskT1"]);
    assert_eq!(changes.edges.added.len(), 1);
    assert!(changes.nodes.updated.is_empty() && changes.nodes.removed.is_empty());
    assert!(changes.edges.updated.is_empty() && changes.edges.removed.is_empty());
    assert!(changes.fit_view, "first population must fit the view");
}

#[test]
fn test_repeated_edges_stay_idempotent() {
    let snapshot = || {
        GraphSnapshot::new(
            vec![agent("a"), task("t")],
            vec![
                GraphEdge::new("t", "a", Some("Working on")).with_attr("width", 1),
                GraphEdge::new("t", "a", Some("Working on")).with_attr("width", 4),
            ],
        )
    };
    let mut v = view();
    let first = v.apply(snapshot());
    assert_eq!(first.edges.added.len(), 1);
    assert_eq!(v.edge_count(), 1);

    let again = v.apply(snapshot());
    assert!(again.is_empty(), "resubmission changed: {again:?}");
    let kept = v.edges().next().unwrap();
    assert_eq!(kept.edge.attributes["width"], json!(1));

    // Same through the payload path.
    let payload = json!({
        "nodes": [{"id": "a", "group": "agent", "status": "active"}, {"id": "t", "group": "task"}],
        "edges": [
            {"from": "t", "to": "a", "title": "Working on", "width": 1},
            {"from": "t", "to": "a", "title": "Working on", "width": 4},
        ],
    });
    let mut v = view();
    assert!(matches!(v.apply_payload(&payload), ApplyOutcome::Applied(_)));
    match v.apply_payload(&payload) {
        ApplyOutcome::Applied(changes) => assert!(changes.is_empty()),
        ApplyOutcome::Skipped(e) => panic!("skipped: {e}"),
    }
}

#[test]
fn test_dropping_agent_removes_it_and_its_edges() {
    let mut v = view();
    v.apply(GraphSnapshot::new(
        vec![agent("agentA"), task("taskT1")],
        vec![GraphEdge::new("taskT1", "agentA", Some("Working on"))],
    ));

    // The backend still lists the edge even though agentA is gone.
    let changes = v.apply(GraphSnapshot::new(
        vec![task("taskT1")],
        vec![GraphEdge::new("taskT1", "agentA", Some("Working on"))],
    ));
    assert_eq!(changes.nodes.removed, vec!["agentA".to_string()]);
    assert_eq!(changes.dropped_edges, 1);
    assert_eq!(changes.edges.removed.len(), 1);
    assert_eq!(v.edge_count(), 0);
    assert!(v.node("agentA").is_none());
    assert!(!changes.fit_view);
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[test]
fn test_identical_snapshot_is_idempotent() {
    let snap = GraphSnapshot::new(
        vec![agent("a"), task("t")],
        vec![GraphEdge::new("t", "a", Some("Working on"))],
    );
    let mut v = view();
    v.apply(snap.clone());
    let changes = v.apply(snap);
    assert!(changes.is_empty());
    assert!(!changes.fit_view);
}

#[test]
fn test_no_rendered_edge_references_missing_node() {
    let mut v = view();
    v.apply(GraphSnapshot::new(
        vec![agent("a"), task("t"), task("u")],
        vec![
            GraphEdge::new("t", "a", Some("Working on")),
            GraphEdge::new("u", "ghost", Some("Depends on")),
            GraphEdge::new("phantom", "a", Some("Created by")),
        ],
    ));
    for rendered in v.edges() {
        assert!(v.node(&rendered.edge.from).is_some());
        assert!(v.node(&rendered.edge.to).is_some());
    }
    assert_eq!(v.edge_count(), 1);
}

#[test]
fn test_updates_keep_position() {
    let mut v = view();
    v.apply(GraphSnapshot::new(vec![agent("a")], vec![]));
    let before = v.node("a").unwrap().position;
    let changes = v.apply(GraphSnapshot::new(
        vec![GraphNode::new("a", NodeGroup::Agent).with_status("terminated")],
        vec![],
    ));
    assert_eq!(ids(&changes.nodes.updated), vec!["a"]);
    let after = v.node("a").unwrap();
    assert_eq!(after.position, before);
    assert_eq!(after.node.status.as_deref(), Some("terminated"));
}

#[test]
fn test_fit_view_only_on_large_additions() {
    let mut v = view();
    v.apply(GraphSnapshot::new(vec![agent("a")], vec![]));

    let few: Vec<GraphNode> = std::iter::once(agent("a"))
        .chain((0..FIT_VIEW_ADD_THRESHOLD).map(|i| task(&format!("t{i}"))))
        .collect();
    assert!(!v.apply(GraphSnapshot::new(few.clone(), vec![])).fit_view);

    let many: Vec<GraphNode> = few
        .into_iter()
        .chain((0..=FIT_VIEW_ADD_THRESHOLD).map(|i| task(&format!("x{i}"))))
        .collect();
    assert!(v.apply(GraphSnapshot::new(many, vec![])).fit_view);
}

#[test]
fn test_diff_reconstructs_next_collection() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut v = view();
    let mut previous: BTreeMap<String, GraphNode> = BTreeMap::new();

    for _round in 0..50 {
        let next: Vec<GraphNode> = (0..20)
            .filter_map(|i| {
                if !rng.gen_bool(0.6) {
                    return None;
                }
                let status = ["pending", "in_progress", "completed"][rng.gen_range(0..3)];
                Some(GraphNode::new(format!("n{i}"), NodeGroup::Task).with_status(status))
            })
            .collect();

        let changes = v.apply(GraphSnapshot::new(next.clone(), vec![]));

        let mut rebuilt = previous.clone();
        for id in &changes.nodes.removed {
            rebuilt.remove(id);
        }
        for node in changes.nodes.updated.iter().chain(changes.nodes.added.iter()) {
            rebuilt.insert(node.id.clone(), node.clone());
        }
        let expected: BTreeMap<String, GraphNode> =
            next.iter().map(|n| (n.id.clone(), n.clone())).collect();
        assert_eq!(rebuilt, expected);

        // Partition is disjoint.
        for added in &changes.nodes.added {
            assert!(!previous.contains_key(&added.id));
        }
        for removed in &changes.nodes.removed {
            assert!(!expected.contains_key(removed));
        }

        previous = expected;
    }
}

// ─── Layout ──────────────────────────────────────────────────────────────────

#[test]
fn test_admin_pinned_at_origin_regardless_of_order() {
    for order in [vec!["x", "admin", "y"], vec!["admin", "x", "y"], vec!["x", "y", "admin"]] {
        let nodes = order
            .iter()
            .map(|id| match *id {
                "admin" => GraphNode::new("admin", NodeGroup::Admin),
                other => agent(other),
            })
            .collect();
        let mut v = view();
        v.apply(GraphSnapshot::new(nodes, vec![]));
        let admin = v.node("admin").unwrap();
        assert_eq!(admin.position, Position::ORIGIN);
        assert!(admin.fixed);
    }
}

#[test]
fn test_crown_context_evenly_spaced() {
    let cfg = LayoutConfig::default();
    let mut nodes = vec![GraphNode::new("admin", NodeGroup::Admin)];
    let mut edges = Vec::new();
    for i in 0..4 {
        let id = format!("ctx{i}");
        nodes.push(GraphNode::new(id.clone(), NodeGroup::Context));
        edges.push(GraphEdge::new("admin", id, Some("Context")));
    }
    let mut v = view();
    v.apply(GraphSnapshot::new(nodes, edges));

    for (i, expected) in [0.0, 90.0, 180.0, 270.0].into_iter().enumerate() {
        let node = v.node(&format!("ctx{i}")).unwrap();
        assert!(node.fixed);
        assert!((node.position.distance_to(Position::ORIGIN) - cfg.crown_radius).abs() < 1e-6);
        let angle = node.position.angle_deg();
        let delta = (angle - expected).abs().min(360.0 - (angle - expected).abs());
        assert!(delta < 1e-6, "ctx{i} at {angle}°, expected {expected}°");
    }
}

fn assert_spread(v: &GraphView) {
    let placed: Vec<&RenderedNode> = v.nodes().collect();
    for (i, a) in placed.iter().enumerate() {
        for b in &placed[i + 1..] {
            assert!(
                a.position.distance_to(b.position) > 1.0,
                "{} and {} share {:?}",
                a.node.id,
                b.node.id,
                a.position
            );
        }
    }
}

#[test]
fn test_later_agent_does_not_stack_on_existing_one() {
    let mut v = view();
    v.apply(GraphSnapshot::new(vec![agent("a"), agent("b")], vec![]));
    let b_before = v.node("b").unwrap().position;

    // `c` takes index 1 in this snapshot, which is where `b` already sits.
    v.apply(GraphSnapshot::new(vec![agent("b"), agent("c")], vec![]));
    assert_eq!(v.node("b").unwrap().position, b_before);
    assert_spread(&v);
}

#[test]
fn test_crown_slot_freed_by_removal_is_reused() {
    let crown = |ids: &[&str]| {
        let mut nodes = vec![GraphNode::new("admin", NodeGroup::Admin)];
        nodes.extend(
            ids.iter()
                .map(|id| GraphNode::new(*id, NodeGroup::Context).with_attr("attached_to", "admin")),
        );
        GraphSnapshot::new(nodes, vec![])
    };
    let mut v = view();
    v.apply(crown(&["c0", "c1", "c2", "c3"]));
    let c1 = v.node("c1").unwrap().position;

    v.apply(crown(&["c0", "c2", "c3", "c4"]));
    assert_spread(&v);
    let c4 = v.node("c4").unwrap();
    assert!(c4.fixed);
    assert!(c4.position.distance_to(c1) < 1e-6, "c4 should take the free slot");
}

#[test]
fn test_crowded_crown_subdivides() {
    let mut v = view();
    let mut nodes = vec![GraphNode::new("admin", NodeGroup::Admin)];
    for id in ["c0", "c1"] {
        nodes.push(GraphNode::new(id, NodeGroup::Context).with_attr("attached_to", "admin"));
    }
    v.apply(GraphSnapshot::new(nodes.clone(), vec![]));
    nodes.push(GraphNode::new("c2", NodeGroup::Context).with_attr("attached_to", "admin"));
    nodes.push(GraphNode::new("c3", NodeGroup::Context).with_attr("attached_to", "admin"));
    v.apply(GraphSnapshot::new(nodes, vec![]));
    assert_spread(&v);
}

#[test]
fn test_later_tasks_do_not_stack_in_agent_ring() {
    let owned = |id: &str| task(id).with_attr("assigned_to", "a");
    let mut v = view();
    v.apply(GraphSnapshot::new(vec![agent("a"), owned("t0"), owned("t1")], vec![]));
    v.apply(GraphSnapshot::new(vec![agent("a"), owned("t1"), owned("t2")], vec![]));
    assert_spread(&v);
}

#[test]
fn test_context_attached_by_attribute_joins_crown() {
    let mut v = view();
    v.apply(GraphSnapshot::new(
        vec![
            GraphNode::new("admin", NodeGroup::Admin),
            GraphNode::new("ctx", NodeGroup::Context).with_attr("attached_to", "admin"),
            GraphNode::new("loose", NodeGroup::Context),
        ],
        vec![],
    ));
    assert!(v.node("ctx").unwrap().fixed);
    assert!(!v.node("loose").unwrap().fixed);
}

#[test]
fn test_agents_sit_outside_crown_and_tasks_ring_their_agent() {
    let cfg = LayoutConfig::default();
    let mut v = view();
    v.apply(GraphSnapshot::new(
        vec![
            GraphNode::new("admin", NodeGroup::Admin),
            agent("agent_a"),
            agent("agent_b"),
            task("t1").with_attr("assigned_to", "a"),
            task("t2"),
            GraphNode::new("f1", NodeGroup::File),
        ],
        vec![
            GraphEdge::new("t2", "agent_a", Some("Working on")),
            GraphEdge::new("agent_b", "f1", Some("Modified")),
        ],
    ));

    let a = v.node("agent_a").unwrap().position;
    let b = v.node("agent_b").unwrap().position;
    assert!(a.distance_to(Position::ORIGIN) > cfg.crown_radius);
    assert!(b.distance_to(Position::ORIGIN) > cfg.crown_radius);
    assert!(a.distance_to(b) > 1.0, "agents must not overlap");

    for t in ["t1", "t2"] {
        let p = v.node(t).unwrap().position;
        assert!((p.distance_to(a) - cfg.task_ring_radius).abs() < 1e-6);
    }
    let f = v.node("f1").unwrap().position;
    assert!((f.distance_to(b) - cfg.file_ring_radius).abs() < 1e-6);
}

#[test]
fn test_tasks_added_later_ring_existing_agent() {
    let cfg = LayoutConfig::default();
    let mut v = view();
    v.apply(GraphSnapshot::new(vec![agent("agent_a")], vec![]));
    v.set_position("agent_a", Position { x: 900.0, y: -40.0 }, false);
    v.apply(GraphSnapshot::new(
        vec![agent("agent_a"), task("t1").with_attr("agent_id", "agent_a")],
        vec![],
    ));
    let t = v.node("t1").unwrap().position;
    assert!((t.distance_to(Position { x: 900.0, y: -40.0 }) - cfg.task_ring_radius).abs() < 1e-6);
}

#[test]
fn test_unassigned_nodes_scatter_outside_crown() {
    let cfg = LayoutConfig::default();
    let mut v = view();
    let nodes: Vec<GraphNode> = (0..30).map(|i| task(&format!("orphan{i}"))).collect();
    v.apply(GraphSnapshot::new(nodes, vec![]));
    for rendered in v.nodes() {
        let r = rendered.position.distance_to(Position::ORIGIN);
        assert!(r >= cfg.crown_radius + cfg.exclusion_margin - 1e-9);
        assert!(r <= cfg.crown_radius + cfg.exclusion_margin + cfg.scatter_width + 1e-9);
        assert!(!rendered.fixed);
    }
}

// ─── Payload handling ────────────────────────────────────────────────────────

#[test]
fn test_payload_without_edges_is_skipped() {
    let mut v = view();
    v.apply(GraphSnapshot::new(vec![agent("a")], vec![]));
    let outcome = v.apply_payload(&json!({"nodes": []}));
    assert!(matches!(outcome, ApplyOutcome::Skipped(_)));
    assert_eq!(v.node_count(), 1, "previous state must remain visible");
}

#[test]
fn test_payload_applies_and_tracks_fingerprint() {
    let mut v = view();
    let payload = json!({
        "nodes": [{"id": "agentA", "group": "agent", "label": "A"}],
        "edges": [],
    });
    match v.apply_payload(&payload) {
        ApplyOutcome::Applied(changes) => assert_eq!(changes.nodes.added.len(), 1),
        ApplyOutcome::Skipped(e) => panic!("unexpected skip: {e}"),
    }
    assert!(v.fingerprint().is_some());
    assert!(v.bounds().is_some());
}
