//! Slash commands for interactive mode

mod plan;
mod status;

pub use plan::PlanCommand;
pub use status::StatusCommand;

use parley_session::SessionState;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Start a fresh conversation on the same agent session
    Reset,
    /// Turn plan mode on or off for following turns
    SetPlanMode(bool),
    /// Show a message to the user (not sent to agent)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    state: &SessionState,
    plan_mode: bool,
) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "reset" | "clear" | "c" => CommandResult::Reset,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "plan" | "p" => PlanCommand::execute(args, plan_mode),

        "status" | "s" => StatusCommand::execute(state, plan_mode),

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /plan, /p [on|off]   Show or toggle plan mode for new turns
  /status, /s          Show phase, pending requests and agent session
  /reset, /clear, /c   Start a fresh conversation
  /quit, /exit, /q     Exit parley

Examples:
  /plan on             Negotiate a plan before the agent executes
  /status              See what the agent is waiting for"#
        .to_string()
}
