//! parley - talk to streaming agents from the terminal

mod commands;
mod config;
mod prompt;
mod utils;

use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parley_session::{
    ConversationList, HttpConversationStore, HttpTransport, MutationManager, SessionContext,
    SessionEngine, UserTurn,
};
use parley_wire::{AgentClient, AgentEvent, ClientConfig, progress_label};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::prompt::Prompter;

/// parley - plan, negotiate and run tasks with remote agents
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Orchestrator base URL (default: http://localhost:3001)
    #[arg(short, long)]
    orchestrator: Option<String>,

    /// Conversation backend base URL (defaults to the orchestrator)
    #[arg(long)]
    backend: Option<String>,

    /// Agent endpoint to talk to
    #[arg(short, long)]
    agent_url: Option<String>,

    /// Agent identifier
    #[arg(long)]
    agent_id: Option<String>,

    /// Resume an existing agent session
    #[arg(long)]
    session_id: Option<String>,

    /// Start turns in plan mode
    #[arg(short, long)]
    plan: bool,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long = "command")]
    prompt: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe an agent's health endpoint
    Health {
        /// Agent URL (defaults to --agent-url or the config)
        url: Option<String>,
    },
    /// List conversations
    List,
    /// Rename a conversation
    Rename { id: String, title: String },
    /// Delete a conversation
    Delete { id: String },
    /// Make a conversation public
    Publish { id: String },
    /// Make a conversation private
    Unpublish { id: String },
    /// Hide a conversation from the list
    Hide { id: String },
    /// Show a hidden conversation again
    Unhide { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("parley=debug")
            .with_writer(io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file
    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let orchestrator = args
        .orchestrator
        .or(cfg.orchestrator_url.clone())
        .unwrap_or_else(|| config::DEFAULT_ORCHESTRATOR.to_string());
    let backend = args
        .backend
        .or(cfg.backend_url.clone())
        .unwrap_or_else(|| orchestrator.clone());
    let agent_url = args.agent_url.or(cfg.agent_url.clone());
    let agent_id = args.agent_id.or(cfg.agent_id.clone());
    let plan_mode = args.plan || cfg.plan_mode.unwrap_or(false);

    if let Some(command) = args.command {
        return run_subcommand(command, &orchestrator, &backend, agent_url).await;
    }

    let mut context = SessionContext::new();
    if let Some(url) = agent_url {
        context = context.with_agent_url(url);
    }
    if let Some(id) = agent_id {
        context = context.with_agent_id(id);
    }
    if let Some(id) = args.session_id {
        context = context.with_session_id(id);
    }

    let client = AgentClient::new(ClientConfig::new(&orchestrator))?;
    let transport =
        Arc::new(HttpTransport::new(client).with_retry_config(cfg.retry.to_retry_config()));
    let mut engine = SessionEngine::new(transport, context);

    // Ctrl-C stops the current stream; a second press with nothing streaming exits
    let handle = engine.handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_streaming() {
                handle.abort();
            } else {
                std::process::exit(130);
            }
        }
    });

    let printer = tokio::spawn(print_events(engine.subscribe()));

    let result = match args.prompt {
        Some(prompt) => run_command(&mut engine, &prompt, plan_mode).await,
        None => run_interactive(&mut engine, plan_mode).await,
    };

    // Wait a bit for final events
    settle().await;
    printer.abort();

    result
}

async fn run_subcommand(
    command: Command,
    orchestrator: &str,
    backend: &str,
    agent_url: Option<String>,
) -> anyhow::Result<()> {
    if let Command::Health { url } = command {
        let target = url.or(agent_url).ok_or_else(|| {
            anyhow::anyhow!("No agent URL given. Pass one or set agent_url in the config.")
        })?;
        let client = AgentClient::new(ClientConfig::new(orchestrator))?;
        let status = client.health(&target).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let manager = MutationManager::new(
        Arc::new(HttpConversationStore::new(backend)),
        ConversationList::new(Vec::new()),
    );
    manager.refresh().await?;

    match command {
        Command::Health { .. } => {}
        Command::List => {
            let conversations = manager.list().snapshot();
            let visible: Vec<_> = conversations.iter().filter(|c| !c.is_deleted).collect();
            if visible.is_empty() {
                println!("No conversations.");
            }
            for c in visible {
                let mut flags = String::new();
                if c.is_public {
                    flags.push_str(" [public]");
                }
                if c.is_hidden {
                    flags.push_str(" [hidden]");
                }
                let title = if c.title.is_empty() {
                    "(untitled)"
                } else {
                    &c.title
                };
                println!("{}  {}{}", c.id, utils::truncate_chars(title, 60), flags);
            }
        }
        Command::Rename { id, title } => {
            manager.rename(&id, &title).await?;
            println!("Renamed {} to \"{}\"", id, title);
        }
        Command::Delete { id } => {
            manager.soft_delete(&id).await?;
            println!("Deleted {}", id);
        }
        Command::Publish { id } => {
            manager.set_visibility(&id, true).await?;
            println!("{} is now public", id);
        }
        Command::Unpublish { id } => {
            manager.set_visibility(&id, false).await?;
            println!("{} is now private", id);
        }
        Command::Hide { id } => {
            manager.set_hidden(&id, true).await?;
            println!("Hid {}", id);
        }
        Command::Unhide { id } => {
            manager.set_hidden(&id, false).await?;
            println!("Unhid {}", id);
        }
    }
    Ok(())
}

async fn run_command(engine: &mut SessionEngine, prompt: &str, plan_mode: bool) -> anyhow::Result<()> {
    println!("parley> {}", prompt);
    println!();

    send(engine, prompt, plan_mode).await?;
    resolve_pending(engine).await
}

async fn run_interactive(engine: &mut SessionEngine, mut plan_mode: bool) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if io::IsTerminal::is_terminal(&io::stderr()) {
        let session = &engine.state().session;
        eprintln!(
            "parley ({}) session: {}",
            session.agent_url.as_deref().unwrap_or("orchestrator"),
            session.session_id.chars().take(8).collect::<String>()
        );
        eprintln!();
    }

    loop {
        print!("{}", if plan_mode { "plan> " } else { "> " });
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if let Some(result) = commands::execute_command(input, engine.state(), plan_mode) {
            match result {
                commands::CommandResult::Reset => {
                    engine.reset();
                    println!("Started a new conversation.");
                }
                commands::CommandResult::SetPlanMode(enabled) => {
                    plan_mode = enabled;
                    println!("Plan mode {}.", if enabled { "on" } else { "off" });
                }
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            continue;
        }

        send(engine, input, plan_mode).await?;
        resolve_pending(engine).await?;
        println!();
    }

    Ok(())
}

async fn send(engine: &mut SessionEngine, content: &str, plan_mode: bool) -> anyhow::Result<()> {
    let turn = UserTurn::new(content);
    let turn = if plan_mode { turn.plan_mode() } else { turn };
    engine.send_turn(turn).await?;
    Ok(())
}

/// Answer whatever the agent is waiting for until it stops asking
async fn resolve_pending(engine: &mut SessionEngine) -> anyhow::Result<()> {
    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());

    loop {
        settle().await;
        let pending = &engine.state().pending;

        let result = if let Some(request) = pending.clarification.as_ref().map(|p| p.request.clone()) {
            let Some(answers) = prompter.answer_clarification(&request)? else {
                return Ok(());
            };
            engine.respond_to_clarification(answers).await
        } else if let Some(request) = pending.selection.as_ref().map(|p| p.request.clone()) {
            let Some(ids) = prompter.choose_items(&request)? else {
                return Ok(());
            };
            engine.respond_to_selection(ids).await
        } else if let Some(request) = pending.preview.as_ref().map(|p| p.request.clone()) {
            let Some((approved, _)) = prompter.review_plan(&request, false)? else {
                return Ok(());
            };
            engine.respond_to_preview(approved, None).await
        } else if let Some(request) = pending.plan.as_ref().map(|p| p.request.clone()) {
            let Some((approved, feedback)) = prompter.review_plan(&request, true)? else {
                return Ok(());
            };
            engine.respond_to_plan(approved, feedback).await
        } else {
            return Ok(());
        };

        match result {
            Ok(()) => {}
            // Ask again
            Err(parley_session::Error::InvalidSelection(reason)) => {
                eprintln!("Invalid selection: {}", reason);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(());
            }
        }
    }
}

/// Print agent events as they arrive
async fn print_events(mut receiver: broadcast::Receiver<AgentEvent>) {
    loop {
        let event = match receiver.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event printer fell behind, skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            AgentEvent::Thinking {
                step,
                content,
                is_complete,
                ..
            } => {
                if !is_complete && !content.is_empty() {
                    eprintln!("[{}: {}]", step, utils::truncate_chars(&content, 120));
                }
            }
            AgentEvent::Content { delta, .. } => {
                print!("{}", delta);
                let _ = io::stdout().flush();
            }
            AgentEvent::Complete { .. } => {
                println!();
            }
            AgentEvent::Progress {
                message,
                step,
                total,
                ..
            } => {
                eprintln!("[{}]", progress_label(step, total, message.as_deref()));
            }
            AgentEvent::FileCreated { path, summary, .. } => match summary {
                Some(summary) => println!("[Wrote {}: {}]", path, utils::truncate_chars(&summary, 80)),
                None => println!("[Wrote {}]", path),
            },
            AgentEvent::DiscoveryResult(result) => {
                println!("[Discovered {} items]", result.items.len());
            }
            AgentEvent::Error { message, code } => match code {
                Some(code) => eprintln!("Error ({}): {}", code, message),
                None => eprintln!("Error: {}", message),
            },
            AgentEvent::Done {
                message: Some(message),
                ..
            } => {
                println!("{}", message);
            }
            _ => {}
        }
    }
}

async fn settle() {
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
}
