//! Line-based prompts for answering the agent's plan-mode requests

use std::io::{self, BufRead, Write};

use parley_wire::events::{ClarificationRequest, PlanProposal, SelectionRequest};
use parley_wire::{ClarificationQuestion, DiscoveredItem, QuestionType};
use serde_json::Value;

use crate::utils::truncate_chars;

/// Asks questions on `output` and reads answers from `input`.
///
/// Every method returns `Ok(None)` when input hits EOF.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    /// Ask each question in turn and collect answers keyed by question id
    pub fn answer_clarification(
        &mut self,
        request: &ClarificationRequest,
    ) -> io::Result<Option<serde_json::Map<String, Value>>> {
        if let Some(message) = &request.message {
            self.say(message)?;
        }
        let mut answers = serde_json::Map::new();
        for question in &request.questions {
            if let Some(header) = &question.header {
                self.say(&format!("[{}]", header))?;
            }
            self.say(&question.question)?;
            for (i, option) in question.options.iter().enumerate() {
                let line = match &option.description {
                    Some(d) => format!("  {}. {} - {}", i + 1, option.label, d),
                    None => format!("  {}. {}", i + 1, option.label),
                };
                self.say(&line)?;
            }

            let answer = loop {
                let Some(line) = self.ask(hint_for(&question.question_type))? else {
                    return Ok(None);
                };
                match parse_answer(question, &line) {
                    Some(value) => break value,
                    None => self.say("Could not read that answer, try again.")?,
                }
            };
            answers.insert(question.question_id.clone(), answer);
        }
        Ok(Some(answers))
    }

    /// List the offered items and read the chosen ones
    pub fn choose_items(&mut self, request: &SelectionRequest) -> io::Result<Option<Vec<String>>> {
        if let Some(message) = &request.message {
            self.say(message)?;
        }
        for (i, item) in request.items.iter().enumerate() {
            self.say(&format!("  {}. {}", i + 1, describe_item(item)))?;
        }
        let bounds = match (request.min_select, request.max_select) {
            (Some(min), Some(max)) => format!(" ({}-{})", min, max),
            (Some(min), None) => format!(" (at least {})", min),
            (None, Some(max)) => format!(" (up to {})", max),
            (None, None) => String::new(),
        };
        let Some(line) = self.ask(&format!("Select items{}, comma separated: ", bounds))? else {
            return Ok(None);
        };
        Ok(Some(parse_selection(&line, &request.items)))
    }

    /// Show a proposed plan and ask for a decision, plus feedback on
    /// rejection when `ask_feedback` is set
    pub fn review_plan(
        &mut self,
        plan: &PlanProposal,
        ask_feedback: bool,
    ) -> io::Result<Option<(bool, Option<String>)>> {
        if let Some(title) = &plan.title {
            self.say(title)?;
        }
        if let Some(summary) = &plan.summary {
            self.say(summary)?;
        }
        for (i, step) in plan.steps.iter().enumerate() {
            self.say(&format!("  {}. {} [{}]", i + 1, step.description, step.status))?;
        }
        if !plan.search_keywords.is_empty() {
            self.say(&format!("Keywords: {}", plan.search_keywords.join(", ")))?;
        }

        let approved = loop {
            let Some(line) = self.ask("Approve this plan? [y/n] ")? else {
                return Ok(None);
            };
            match parse_yes_no(&line) {
                Some(b) => break b,
                None => self.say("Please answer y or n.")?,
            }
        };
        if approved || !ask_feedback {
            return Ok(Some((approved, None)));
        }
        let Some(feedback) = self.ask("What should change? (empty to skip) ")? else {
            return Ok(None);
        };
        let feedback = (!feedback.is_empty()).then_some(feedback);
        Ok(Some((false, feedback)))
    }
}

fn hint_for(kind: &QuestionType) -> &'static str {
    match kind {
        QuestionType::SingleChoice => "Choose one: ",
        QuestionType::MultipleChoice => "Choose any, comma separated: ",
        QuestionType::YesNo => "[y/n] ",
        QuestionType::NumericRange => "Number: ",
        QuestionType::FreeText | QuestionType::Other(_) => "> ",
    }
}

fn describe_item(item: &DiscoveredItem) -> String {
    let mut text = if item.name.is_empty() {
        item.id.clone()
    } else {
        item.name.clone()
    };
    if let Some(count) = item.member_count {
        text.push_str(&format!(" ({} members)", count));
    }
    if let Some(description) = &item.description {
        text.push_str(" - ");
        text.push_str(&truncate_chars(description, 80));
    }
    text
}

pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" => Some(true),
        "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

/// Resolve one token to an option id: a 1-based index or the id itself
fn resolve_option(token: &str, question: &ClarificationQuestion) -> Option<String> {
    let token = token.trim();
    if let Ok(index) = token.parse::<usize>() {
        return question
            .options
            .get(index.checked_sub(1)?)
            .map(|o| o.id.clone());
    }
    question
        .options
        .iter()
        .find(|o| o.id == token || o.label.eq_ignore_ascii_case(token))
        .map(|o| o.id.clone())
}

/// Convert a typed line into the JSON answer for a question
pub fn parse_answer(question: &ClarificationQuestion, input: &str) -> Option<Value> {
    let input = input.trim();
    match &question.question_type {
        QuestionType::SingleChoice if !question.options.is_empty() => {
            resolve_option(input, question).map(Value::String)
        }
        QuestionType::MultipleChoice if !question.options.is_empty() => {
            let ids: Option<Vec<Value>> = input
                .split(',')
                .filter(|t| !t.trim().is_empty())
                .map(|t| resolve_option(t, question).map(Value::String))
                .collect();
            ids.filter(|ids| !ids.is_empty()).map(Value::Array)
        }
        QuestionType::YesNo => parse_yes_no(input).map(Value::Bool),
        QuestionType::NumericRange => input
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        _ if input.is_empty() => None,
        _ => Some(Value::String(input.to_string())),
    }
}

/// Turn "1, 3" or "id-a,id-b" into item ids. Tokens that match nothing are
/// passed through so the engine can reject them.
pub fn parse_selection(input: &str, items: &[DiscoveredItem]) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| match token.parse::<usize>() {
            Ok(index) if index >= 1 && index <= items.len() => items[index - 1].id.clone(),
            _ => token.to_string(),
        })
        .collect()
}
