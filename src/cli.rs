//! Line-oriented host commands for driving a signup session from a terminal.
//!
//! ```text
//! set email=jane@example.com      text field
//! flag acceptTerms=true           checkbox
//! list allergies=penicillin,latex list field
//! next | back | skip | jump 2
//! send | resend | submit | quit
//! ```

use thiserror::Error;

use crate::core::signup::{FieldMap, FieldValue, SessionCommand};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("expected key=value, got: {0}")]
    MissingAssignment(String),

    #[error("invalid step number: {0}")]
    InvalidStep(String),

    #[error("invalid flag value (expected true/false): {0}")]
    InvalidFlag(String),
}

/// Parse one input line into a session command.
pub fn parse_command(line: &str) -> Result<SessionCommand, ParseError> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        "" => Err(ParseError::Empty),
        "set" => {
            let (key, value) = assignment(rest)?;
            Ok(update(key, FieldValue::Text(value.to_string())))
        }
        "flag" => {
            let (key, value) = assignment(rest)?;
            let flag = match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => return Err(ParseError::InvalidFlag(value.to_string())),
            };
            Ok(update(key, FieldValue::Flag(flag)))
        }
        "list" => {
            let (key, value) = assignment(rest)?;
            let items = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
            Ok(update(key, FieldValue::List(items)))
        }
        "next" => Ok(SessionCommand::Next),
        "back" => Ok(SessionCommand::Back),
        "skip" => Ok(SessionCommand::Skip),
        "jump" => rest
            .parse::<usize>()
            .map(SessionCommand::JumpTo)
            .map_err(|_| ParseError::InvalidStep(rest.to_string())),
        "send" => Ok(SessionCommand::SendCode),
        "resend" => Ok(SessionCommand::ResendCode),
        "submit" => Ok(SessionCommand::Submit),
        "quit" | "exit" | "abandon" => Ok(SessionCommand::Abandon),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn assignment(rest: &str) -> Result<(&str, &str), ParseError> {
    match rest.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::MissingAssignment(rest.to_string())),
    }
}

fn update(key: &str, value: FieldValue) -> SessionCommand {
    let mut partial = FieldMap::new();
    partial.insert(key.to_string(), value);
    SessionCommand::Update(partial)
}
