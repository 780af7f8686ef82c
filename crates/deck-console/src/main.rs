use anyhow::Context;
use clap::Parser;
use deck_client::{shared_cache, ApiClient, DeckConfig};

use deck_console::cli::{Cli, Command};
use deck_console::commands::{self, CommandContext};
use deck_console::logging::{console_log_path, init_logging, LogTarget};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = DeckConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let command = cli.command.unwrap_or(Command::Console);
    // The console owns the terminal, so its logs go to a file.
    let target = match command {
        Command::Console => LogTarget::File(console_log_path(&config.log)),
        _ => LogTarget::Stderr,
    };
    init_logging(&config.log, target)?;

    let server = config.server(cli.server.as_deref())?.clone();
    let cache = shared_cache(config.cache.ttl());
    let client = ApiClient::new(&server, config.poll.request_timeout(), cache)
        .with_context(|| format!("preparing client for server '{}'", server.id))?;
    tracing::debug!(server = %server.id, url = %server.url, "Using server");

    let ctx = CommandContext {
        config,
        client,
        json: cli.json,
    };
    commands::run(command, &ctx).await
}
