use clap::Parser;
use deck_console::cli::*;

#[test]
fn test_no_subcommand_means_console() {
    let cli = Cli::try_parse_from(["agentdeck"]).unwrap();
    assert!(cli.command.is_none());
    assert!(!cli.json);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["agentdeck", "agents", "list", "--json", "-s", "staging"]).unwrap();
    assert!(cli.json);
    assert_eq!(cli.server.as_deref(), Some("staging"));
    assert_eq!(cli.command, Some(Command::Agents(AgentsCommand::List)));
}

#[test]
fn test_create_agent_collects_capabilities() {
    let cli = Cli::try_parse_from([
        "agentdeck", "agents", "create", "worker-1", "-c", "rust", "--capability", "review",
        "--workdir", "/srv/repo",
    ])
    .unwrap();
    assert_eq!(
        cli.command,
        Some(Command::Agents(AgentsCommand::Create {
            agent_id: "worker-1".into(),
            capabilities: vec!["rust".into(), "review".into()],
            workdir: Some("/srv/repo".into()),
        }))
    );
}

#[test]
fn test_create_task_defaults() {
    let cli = Cli::try_parse_from(["agentdeck", "tasks", "create", "--title", "Ship it"]).unwrap();
    let Some(Command::Tasks(TasksCommand::Create(args))) = cli.command else {
        panic!("expected tasks create");
    };
    assert_eq!(args.title, "Ship it");
    assert_eq!(args.description, "");
    assert_eq!(args.priority, Priority::Medium);
    assert!(args.depends_on.is_empty());
}

#[test]
fn test_create_task_full() {
    let cli = Cli::try_parse_from([
        "agentdeck", "tasks", "create", "--title", "Fix", "--priority", "high", "--assign", "a1",
        "--parent", "t0", "--depends-on", "t1", "--depends-on", "t2",
    ])
    .unwrap();
    let Some(Command::Tasks(TasksCommand::Create(args))) = cli.command else {
        panic!("expected tasks create");
    };
    assert_eq!(args.priority.as_str(), "high");
    assert_eq!(args.assign.as_deref(), Some("a1"));
    assert_eq!(args.parent.as_deref(), Some("t0"));
    assert_eq!(args.depends_on, vec!["t1", "t2"]);
}

#[test]
fn test_unknown_priority_rejected() {
    assert!(Cli::try_parse_from(["agentdeck", "tasks", "create", "--title", "x", "--priority", "urgent"]).is_err());
}

#[test]
fn test_task_title_required() {
    assert!(Cli::try_parse_from(["agentdeck", "tasks", "create"]).is_err());
}

#[test]
fn test_graph_watch_interval() {
    let cli = Cli::try_parse_from(["agentdeck", "graph", "watch", "--interval", "12"]).unwrap();
    assert_eq!(
        cli.command,
        Some(Command::Graph(GraphCommand::Watch { interval: Some(12) }))
    );
}

#[test]
fn test_templates_render_vars() {
    let cli = Cli::try_parse_from([
        "agentdeck", "prefs", "templates", "--render", "review", "--var", "file=a.rs", "--var",
        "concern=perf",
    ])
    .unwrap();
    assert_eq!(
        cli.command,
        Some(Command::Prefs(PrefsCommand::Templates {
            render: Some("review".into()),
            vars: vec!["file=a.rs".into(), "concern=perf".into()],
        }))
    );
}

#[test]
fn test_config_path_flag() {
    let cli = Cli::try_parse_from(["agentdeck", "--config", "/tmp/deck.toml", "stats"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/deck.toml")));
    assert_eq!(cli.command, Some(Command::Stats));
}
