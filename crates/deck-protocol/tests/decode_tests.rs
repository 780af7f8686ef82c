use deck_protocol::*;
use serde_json::json;

#[test]
fn test_snapshot_decodes_nodes_and_edges() {
    let payload = json!({
        "nodes": [
            {"id": "agent_a", "group": "agent", "label": "A", "status": "active"},
            {"id": "task_1", "group": "task", "label": "T1", "status": "pending", "depends_on": []},
        ],
        "edges": [
            {"from": "task_1", "to": "agent_a", "title": "Working on"},
        ],
    });
    let decoded = decode_snapshot(&payload).unwrap();
    assert!(decoded.rejected.is_empty());
    assert_eq!(decoded.snapshot.nodes.len(), 2);
    assert_eq!(decoded.snapshot.edges[0].kind(), EdgeKind::WorkingOn);
}

#[test]
fn test_snapshot_missing_nodes_is_an_error() {
    let err = decode_snapshot(&json!({"edges": []})).unwrap_err();
    assert!(matches!(err, DecodeError::MissingField("nodes")));
}

#[test]
fn test_snapshot_missing_edges_is_an_error() {
    let err = decode_snapshot(&json!({"nodes": []})).unwrap_err();
    assert!(matches!(err, DecodeError::MissingField("edges")));
}

#[test]
fn test_snapshot_wrong_container_type() {
    let err = decode_snapshot(&json!({"nodes": {}, "edges": []})).unwrap_err();
    assert!(matches!(err, DecodeError::WrongType { field: "nodes", .. }));
    assert!(matches!(decode_snapshot(&json!([])), Err(DecodeError::NotAnObject)));
}

#[test]
fn test_malformed_node_is_rejected_not_fatal() {
    let payload = json!({
        "nodes": [
            {"id": "agent_a", "group": "agent"},
            {"group": "task"},
            {"id": "agent_a", "group": "agent"},
        ],
        "edges": [],
    });
    let decoded = decode_snapshot(&payload).unwrap();
    assert_eq!(decoded.snapshot.nodes.len(), 1);
    assert_eq!(decoded.rejected.len(), 2);
    assert!(decoded
        .rejected
        .iter()
        .any(|e| matches!(e, DecodeError::DuplicateId(id) if id == "agent_a")));
}

#[test]
fn test_repeated_edge_keeps_first() {
    let payload = json!({
        "nodes": [{"id": "t", "group": "task"}, {"id": "a", "group": "agent"}],
        "edges": [
            {"from": "t", "to": "a", "title": "Working on", "width": 1},
            {"from": "t", "to": "a", "title": "Working on", "width": 4},
            {"id": "e9", "from": "t", "to": "a", "title": "Working on"},
        ],
    });
    let decoded = decode_snapshot(&payload).unwrap();
    assert_eq!(decoded.snapshot.edges.len(), 2);
    assert_eq!(decoded.snapshot.edges[0].attributes["width"], json!(1));
    assert_eq!(decoded.rejected.len(), 1);
    assert!(matches!(
        &decoded.rejected[0],
        DecodeError::DuplicateEdge(key) if key == "t->a:Working on"
    ));
}

#[test]
fn test_list_accepts_bare_array_and_wrapped_object() {
    let bare = json!([{"agent_id": "a", "status": "active"}]);
    let wrapped = json!({"agents": [{"agent_id": "a", "status": "active"}]});
    let a: Vec<Agent> = decode_list(&bare, "agents").unwrap();
    let b: Vec<Agent> = decode_list(&wrapped, "agents").unwrap();
    assert_eq!(a, b);
    assert_eq!(a[0].status, AgentStatus::Active);
}

#[test]
fn test_task_depends_on_as_json_string() {
    let tasks: Vec<Task> = decode_list(
        &json!([{
            "task_id": "t2",
            "title": "Second",
            "status": "in_progress",
            "depends_on_tasks": "[\"t1\", \"t0\"]",
        }]),
        "tasks",
    )
    .unwrap();
    assert_eq!(tasks[0].depends_on_tasks, vec!["t1", "t0"]);
    assert_eq!(tasks[0].status, TaskStatus::InProgress);
}

#[test]
fn test_task_with_broken_embedded_json_fails_decoding() {
    let result: Result<Vec<Task>, _> = decode_list(
        &json!([{"task_id": "t2", "depends_on_tasks": "[\"t1\""}]),
        "tasks",
    );
    assert!(matches!(
        result,
        Err(DecodeError::InvalidItem { field: "tasks", index: 0, .. })
    ));
}

#[test]
fn test_parse_string_list_variants() {
    assert!(parse_string_list(&json!(null)).unwrap().is_empty());
    assert!(parse_string_list(&json!("")).unwrap().is_empty());
    assert_eq!(parse_string_list(&json!("a, b,,c")).unwrap(), vec!["a", "b", "c"]);
    assert_eq!(parse_string_list(&json!(["x", 3])).unwrap(), vec!["x", "3"]);
    assert!(parse_string_list(&json!("[1, ")).is_err());
    assert!(parse_string_list(&json!({"a": 1})).is_err());
}

#[test]
fn test_unknown_task_status_is_preserved_as_unknown() {
    let tasks: Vec<Task> =
        decode_list(&json!([{"task_id": "t", "status": "paused"}]), "tasks").unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Unknown);
}

#[test]
fn test_dashboard_stats_counts() {
    let agents: Vec<Agent> = decode_list(
        &json!([
            {"agent_id": "a", "status": "active"},
            {"agent_id": "b", "status": "terminated"},
        ]),
        "agents",
    )
    .unwrap();
    let tasks: Vec<Task> = decode_list(
        &json!([
            {"task_id": "1", "status": "completed"},
            {"task_id": "2", "status": "pending"},
            {"task_id": "3", "status": "completed"},
            {"task_id": "4", "status": "failed"},
        ]),
        "tasks",
    )
    .unwrap();
    let stats = DashboardStats::from_lists(&agents, &tasks, &[]);
    assert_eq!(stats.total_agents, 2);
    assert_eq!(stats.active_agents, 1);
    assert_eq!(stats.completed_tasks, 2);
    assert_eq!(stats.pending_tasks, 1);
    assert_eq!(stats.failed_tasks, 1);
    assert!((stats.completion_ratio() - 0.5).abs() < f64::EPSILON);
}
