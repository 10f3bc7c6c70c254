//! /status command - show phase, pending requests and routing

use super::CommandResult;
use parley_session::SessionState;
use parley_wire::Role;

pub struct StatusCommand;

impl StatusCommand {
    pub fn execute(state: &SessionState, plan_mode: bool) -> CommandResult {
        let mut output = String::from("Session Status\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!("Conversation: {}\n", state.conversation_id));
        output.push_str(&format!("Phase:        {}\n", state.phase));
        match state.plan_phase() {
            Some(phase) => output.push_str(&format!("Plan phase:   {:?}\n", phase)),
            None => output.push_str(&format!(
                "Plan mode:    {}\n",
                if plan_mode { "on (next turn)" } else { "off" }
            )),
        }
        output.push('\n');

        let session = &state.session;
        output.push_str(&format!(
            "Agent:        {}\n",
            session.agent_url.as_deref().unwrap_or("(not yet known)")
        ));
        if let Some(id) = &session.agent_id {
            output.push_str(&format!("Agent id:     {}\n", id));
        }
        output.push_str(&format!("Session:      {}\n", session.session_id));
        output.push('\n');

        let messages = state.messages();
        let user_msgs = messages.iter().filter(|m| m.role == Role::User).count();
        output.push_str(&format!(
            "Messages:     {} total ({} user, {} assistant)\n",
            messages.len(),
            user_msgs,
            messages.len() - user_msgs
        ));

        let pending = state.pending.kinds();
        if pending.is_empty() {
            output.push_str("Waiting on:   nothing\n");
        } else {
            let names: Vec<String> = pending.iter().map(|k| k.to_string()).collect();
            output.push_str(&format!("Waiting on:   {}\n", names.join(", ")));
        }
        if let Some(error) = &state.error {
            output.push_str(&format!("Last error:   {}\n", error));
        }

        CommandResult::Message(output)
    }
}
