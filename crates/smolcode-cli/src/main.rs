//! smolcode — an interactive coding assistant in the terminal.

mod commands;
mod reload;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use smolcode_agent::agent::{Agent, AgentExit};
use smolcode_agent::gemini::GeminiClient;
use smolcode_agent::snapshot;
use smolcode_agent::tools::{
    self, git::CreateCheckpointTool, git::ListChangesTool, memory::CreateMemoryTool,
    memory::ForgetMemoryTool, memory::RecallMemoryTool, plan::ManagePlanTool,
};
use smolcode_core::config::SmolcodeConfig;
use smolcode_history::{HistoryError, HistoryStore};
use smolcode_memory::MemoryStore;
use smolcode_mcp::{parse_server_spec, McpServer};
use smolcode_plan::Planner;

#[derive(Debug, Parser)]
#[command(name = "smolcode", version, about = "Interactive coding assistant")]
struct Cli {
    /// Resume the specified conversation.
    #[arg(long = "conversation-id", visible_alias = "cid", value_name = "ID")]
    conversation_id: Option<String>,

    /// Continue the latest (or the given) conversation; starts a new one
    /// when none exists.
    #[arg(
        short = 'c',
        long = "continue",
        value_name = "latest|ID",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "latest",
        conflicts_with = "conversation_id"
    )]
    continue_from: Option<String>,

    /// Model to use for this session.
    #[arg(short = 'm', long = "model", value_name = "NAME")]
    model: Option<String>,

    /// External tool server to launch as a subprocess (id:command).
    /// Repeatable.
    #[arg(long = "mcp", value_name = "ID:COMMAND")]
    mcp: Vec<String>,

    /// Config file path (defaults to .smolcode/smolcode.toml).
    #[arg(long = "config", value_name = "PATH")]
    config: Option<String>,

    /// Restore history from this snapshot file (written by /reload).
    #[arg(long = "snapshot", hide = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage persisted conversations.
    History {
        #[command(subcommand)]
        cmd: commands::history::HistoryCmd,
    },
    /// Manage the memory store.
    Memory {
        #[command(subcommand)]
        cmd: commands::memory::MemoryCmd,
    },
    /// Manage plans.
    Plan {
        #[command(subcommand)]
        cmd: commands::plan::PlanCmd,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smolcode=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are normal exits; bad flags are not.
            if e.use_stderr() {
                eprintln!("{e}");
                std::process::exit(1);
            }
            print!("{e}");
            return;
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = SmolcodeConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }

    match cli.command {
        Some(Commands::History { cmd }) => {
            let store = HistoryStore::open(&config.history_db)?;
            commands::history::run(cmd, &store)
        }
        Some(Commands::Memory { cmd }) => {
            let store = MemoryStore::open(&config.memory_db)?;
            commands::memory::run(cmd, &store)
        }
        Some(Commands::Plan { cmd }) => {
            let planner = Planner::open(&config.plans_dir)?;
            commands::plan::run(cmd, &planner)
        }
        None => tokio::runtime::Runtime::new()?.block_on(interactive(cli, config)),
    }
}

async fn interactive(cli: Cli, config: SmolcodeConfig) -> anyhow::Result<()> {
    let api_key = std::env::var("GEMINI_API_KEY")
        .context("GEMINI_API_KEY is not set; export it to talk to the model")?;
    let user_shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());

    let store = HistoryStore::open(&config.history_db)?;
    let conversation = resolve_conversation(&cli, &store)?;

    let memory = Arc::new(MemoryStore::open(&config.memory_db)?);
    let planner = Arc::new(Planner::open(&config.plans_dir)?);

    let mut registry = tools::ToolRegistry::new();
    registry.add(Arc::new(tools::read_file::ReadFileTool));
    registry.add(Arc::new(tools::write_file::WriteFileTool));
    registry.add(Arc::new(tools::edit_file::EditFileTool));
    registry.add(Arc::new(tools::list_files::ListFilesTool));
    registry.add(Arc::new(tools::run_command::RunCommandTool::new(user_shell)));
    registry.add(Arc::new(tools::search_code::SearchCodeTool));
    registry.add(Arc::new(CreateCheckpointTool));
    registry.add(Arc::new(ListChangesTool));
    registry.add(Arc::new(CreateMemoryTool::new(memory.clone())));
    registry.add(Arc::new(RecallMemoryTool::new(memory.clone())));
    registry.add(Arc::new(ForgetMemoryTool::new(memory)));
    registry.add(Arc::new(ManagePlanTool::new(planner)));

    // Failed servers are reported and their tools omitted; the session
    // still starts.
    let mut servers = Vec::new();
    for spec in &cli.mcp {
        let (id, command) = parse_server_spec(spec)?;
        match McpServer::connect(&id, &command).await {
            Ok(server) => {
                for tool in server.tools() {
                    registry.add(tool);
                }
                servers.push(server);
            }
            Err(e) => warn!(server = %id, error = %e, "skipping MCP server"),
        }
    }

    let model = GeminiClient::new(api_key, None);
    let mut agent = Agent::new(
        Box::new(model),
        config.model.clone(),
        config.max_output_tokens,
        Arc::new(registry),
        store,
        conversation,
        config.snapshot_prefix.clone(),
    );

    if let Some(path) = &cli.snapshot {
        match snapshot::consume(path) {
            Ok(contents) => agent.restore_history(contents),
            Err(e) => warn!(path = %path.display(), error = %e, "could not restore snapshot"),
        }
    }

    eprintln!(
        "smolcode — conversation {} — {} (ctrl-d to quit, /help for commands)",
        agent.conversation_id(),
        config.model
    );

    let mut input = shell::StdinInput::new();
    let mut ui = shell::TerminalUi;
    let exit = agent.run(&mut input, &mut ui).await;

    for server in &servers {
        server.shutdown().await;
    }

    match exit? {
        AgentExit::Quit { .. } => Ok(()),
        AgentExit::Restart { snapshot } => reload::restart(snapshot),
    }
}

fn resolve_conversation(
    cli: &Cli,
    store: &HistoryStore,
) -> anyhow::Result<smolcode_history::Conversation> {
    if let Some(id) = &cli.conversation_id {
        return Ok(store.load(id)?);
    }
    if let Some(target) = &cli.continue_from {
        let id = if target == "latest" {
            match store.latest_id() {
                Ok(id) => id,
                Err(HistoryError::NotFound { .. }) => return Ok(store.new_conversation()),
                Err(e) => return Err(e.into()),
            }
        } else {
            target.clone()
        };
        return match store.load(&id) {
            Ok(conversation) => Ok(conversation),
            Err(HistoryError::NotFound { .. }) => Ok(store.new_conversation()),
            Err(e) => Err(e.into()),
        };
    }
    Ok(store.new_conversation())
}
