//! /plan command - show and toggle plan mode

use super::CommandResult;

pub struct PlanCommand;

impl PlanCommand {
    pub fn execute(args: &str, current: bool) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(format!(
                "Plan mode is {}\nSet with: /plan on|off",
                if current { "on" } else { "off" }
            ));
        }
        match parse_toggle(args) {
            Some(enabled) => CommandResult::SetPlanMode(enabled),
            None => CommandResult::Message(format!(
                "Unknown value: '{}'\nValid values: on, off",
                args
            )),
        }
    }
}

fn parse_toggle(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
