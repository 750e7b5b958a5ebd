//! REPL Commands
//!
//! Lines starting with `/` are commands; everything else is a prompt.
//!
//! ## Available Commands
//!
//! - `/new` - Start a new chat (clears history)
//! - `/models` - List known models, marking the selected ones
//! - `/model ID` - Select or deselect a model for the next turns
//! - `/export [FILE]` - Write the history as JSON
//! - `/export-html [FILE]` - Write the rendered transcript as HTML
//! - `/help` - Show this list
//! - `/quit` - Exit

use std::path::PathBuf;

use thiserror::Error;

/// One parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Text to send to the selected models
    Prompt(String),
    /// A slash command
    Command(Command),
    /// Blank line
    Empty,
}

/// REPL command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    New,
    Models,
    Toggle(String),
    Export(Option<PathBuf>),
    ExportHtml(Option<PathBuf>),
    Help,
    Quit,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),

    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
}

pub const HELP: &str = "\
/new                 start a new chat
/models              list models (* = selected)
/model ID            select or deselect a model
/export [FILE]       write history as JSON
/export-html [FILE]  write transcript as HTML
/quit                exit
Ctrl-C while streaming stops the current turn.";

/// Classify one line of input
pub fn parse(line: &str) -> Result<Input, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Input::Empty);
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Input::Prompt(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    let command = match name {
        "new" => Command::New,
        "models" => Command::Models,
        "model" => Command::Toggle(arg.ok_or(CommandError::MissingArgument("model"))?.to_string()),
        "export" => Command::Export(arg.map(PathBuf::from)),
        "export-html" => Command::ExportHtml(arg.map(PathBuf::from)),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Input::Command(command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prompts_and_blank_lines() {
        assert_eq!(parse("   \n"), Ok(Input::Empty));
        assert_eq!(
            parse("  what is 2+2?\n"),
            Ok(Input::Prompt("  what is 2+2?".to_string()))
        );
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse("/new"), Ok(Input::Command(Command::New)));
        assert_eq!(parse("/quit\n"), Ok(Input::Command(Command::Quit)));
        assert_eq!(
            parse("/model deepseek-r1"),
            Ok(Input::Command(Command::Toggle("deepseek-r1".to_string())))
        );
        assert_eq!(parse("/export"), Ok(Input::Command(Command::Export(None))));
        assert_eq!(
            parse("/export-html  out/chat.html "),
            Ok(Input::Command(Command::ExportHtml(Some(PathBuf::from(
                "out/chat.html"
            )))))
        );
    }

    #[test]
    fn test_command_errors() {
        assert_eq!(parse("/model"), Err(CommandError::MissingArgument("model")));
        assert_eq!(
            parse("/frobnicate now"),
            Err(CommandError::Unknown("frobnicate".to_string()))
        );
    }
}
