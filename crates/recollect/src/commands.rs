//! Slash commands accepted by the chat prompt.

use recollect_memory::{ChatSession, SearchResult, render_history};
use recollect_protocol::CallStatus;

/// Commands that inspect memory instead of talking to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlashCommand {
    Search(String),
    Summary,
    History,
    Profile,
    Consolidate,
    Help,
    Quit,
}

pub(crate) const HELP: &str = "commands:
  /search <term>   search stored conversations
  /summary         latest conversation summary
  /history         current rolling window
  /profile         stored user profile and remembered facts
  /consolidate     consolidate working memories now
  /quit            end the session";

/// Parse a slash command from the input line.
pub(crate) fn parse_slash_command(input: &str) -> Result<Option<SlashCommand>, String> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Ok(None);
    }
    let rest = trimmed.trim_start_matches('/');
    let (command, argument) = match rest.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (rest, ""),
    };
    if command.is_empty() {
        return Ok(None);
    }
    match command.to_lowercase().as_str() {
        "search" => {
            if argument.is_empty() {
                return Err("usage: /search <term>".to_string());
            }
            Ok(Some(SlashCommand::Search(argument.to_string())))
        }
        "summary" => Ok(Some(SlashCommand::Summary)),
        "history" => Ok(Some(SlashCommand::History)),
        "profile" => Ok(Some(SlashCommand::Profile)),
        "consolidate" => Ok(Some(SlashCommand::Consolidate)),
        "help" => Ok(Some(SlashCommand::Help)),
        "quit" | "exit" => Ok(Some(SlashCommand::Quit)),
        _ => Err(format!("unknown command: {command}")),
    }
}

/// Run a command against the session and render its output.
pub(crate) fn run_slash_command(session: &mut ChatSession, command: &SlashCommand) -> String {
    match command {
        SlashCommand::Search(term) => {
            let outcome = session.search(term);
            let body = match outcome.result {
                SearchResult::Hits(hits) => hits
                    .iter()
                    .map(|hit| {
                        format!(
                            "[{}]\nUser: {}\nAssistant: {}",
                            hit.timestamp, hit.question, hit.answer
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                SearchResult::Summary(text) | SearchResult::Message(text) => text,
            };
            match outcome.status {
                CallStatus::Successful => body,
                CallStatus::Failed => format!("search failed: {body}"),
            }
        }
        SlashCommand::Summary => session
            .tracker()
            .latest_summary()
            .unwrap_or_else(|| "no summary yet".to_string()),
        SlashCommand::History => {
            let history = session.tracker().rolling_history();
            if history.is_empty() {
                "no messages yet".to_string()
            } else {
                format!(
                    "{}\n(tokens={})",
                    render_history(history),
                    session.tracker().token_count()
                )
            }
        }
        SlashCommand::Profile => {
            let stored = match session.users().user_info() {
                Ok(Some(user)) => user.describe(),
                Ok(None) => "no user row".to_string(),
                Err(err) => format!("failed to load profile: {err}"),
            };
            match session.user_profile() {
                Some(profile) => {
                    let remembered = serde_json::to_string_pretty(&profile)
                        .unwrap_or_else(|err| format!("unrenderable profile: {err}"));
                    format!("{stored}\n\nremembered:\n{remembered}")
                }
                None => stored,
            }
        }
        SlashCommand::Consolidate => match session.end_session() {
            Some(report) => format!(
                "consolidated {} memories, created {}",
                report.consolidated,
                report.created.len()
            ),
            None => "long-term memory is disabled".to_string(),
        },
        SlashCommand::Help => HELP.to_string(),
        SlashCommand::Quit => String::new(),
    }
}
