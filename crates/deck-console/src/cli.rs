use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Monitor and drive an agent orchestration backend.
#[derive(Parser, Debug)]
#[command(name = "agentdeck", version, about)]
pub struct Cli {
    /// Path to config.toml (default: <config dir>/agentdeck/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server id from the config (default: default_server or the first)
    #[arg(long, short, global = true)]
    pub server: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List, create or terminate agents
    #[command(subcommand)]
    Agents(AgentsCommand),
    /// List or create tasks
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Read and write shared memory entries
    #[command(subcommand)]
    Memory(MemoryCommand),
    /// Inspect the relationship graph
    #[command(subcommand)]
    Graph(GraphCommand),
    /// Show details for one graph node
    Node { id: String },
    /// Summary counts across agents, tasks and memory
    Stats,
    /// Local preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
    /// Live terminal console (default)
    Console,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AgentsCommand {
    List,
    Create {
        agent_id: String,
        #[arg(long = "capability", short = 'c')]
        capabilities: Vec<String>,
        #[arg(long)]
        workdir: Option<String>,
    },
    Terminate { agent_id: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TasksCommand {
    List {
        /// Only show tasks in this status
        #[arg(long)]
        status: Option<String>,
    },
    Create(CreateTaskArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct CreateTaskArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, value_enum, default_value_t = Priority::Medium)]
    pub priority: Priority,
    /// Agent to assign the task to
    #[arg(long)]
    pub assign: Option<String>,
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long = "depends-on")]
    pub depends_on: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MemoryCommand {
    List,
    /// Create an entry. VALUE is parsed as JSON, else stored as a string.
    Set {
        key: String,
        value: String,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        key: String,
        value: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete { key: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum GraphCommand {
    /// Fetch once and summarise
    Snapshot,
    /// Poll and print what changed on every refresh
    Watch {
        /// Seconds between refreshes (clamped to 5-30)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum PrefsCommand {
    /// Print one key, or everything
    Get { key: Option<String> },
    /// Store VALUE (JSON, else string) under KEY
    Set { key: String, value: String },
    /// List prompt templates, or render one
    Templates {
        #[arg(long)]
        render: Option<String>,
        /// name=value pairs substituted into the template
        #[arg(long = "var")]
        vars: Vec<String>,
    },
}
