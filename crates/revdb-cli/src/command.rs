//! REPL command types and parser

use revdb_core::{DocumentId, Properties, RevisionId, Value};
use thiserror::Error;

/// Parse errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Core(#[from] revdb_core::Error),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Which revision a write should be based on
#[derive(Debug, Clone, PartialEq)]
pub enum Parent {
    /// Whatever is current when the command runs
    Current,
    /// No parent: first write of a document, or a new root
    None,
    Revision(RevisionId),
}

/// A parsed REPL command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// PUT <id> [REV <rev>|NEW] <json-object>
    Put {
        id: DocumentId,
        parent: Parent,
        properties: Properties,
    },

    /// GET <id> [path]
    Get { id: DocumentId, path: Option<String> },

    /// REV <id> <rev>
    Revision { id: DocumentId, rev: RevisionId },

    /// HISTORY <id>
    History { id: DocumentId },

    /// LEAVES <id>
    Leaves { id: DocumentId },

    /// CONFLICTS <id>
    Conflicts { id: DocumentId },

    /// DELETE <id>
    Delete { id: DocumentId },

    /// PURGE <id>
    Purge { id: DocumentId },

    /// FORCE <id> <parent|ROOT> [DELETED] [json-object]
    Force {
        id: DocumentId,
        parent: Parent,
        deleted: bool,
        properties: Properties,
    },

    /// KEYS [pattern]
    Keys { pattern: Option<String> },

    /// INFO
    Info,

    /// HELP
    Help,

    /// QUIT
    Quit,
}

impl Command {
    /// Parse a single command line
    pub fn parse(line: &str) -> CommandResult<Command> {
        let line = line.trim();
        let mut tokens = Tokenizer::new(line);
        let cmd = tokens
            .next()
            .ok_or_else(|| CommandError::InvalidCommand("Empty command".into()))?
            .to_uppercase();

        match cmd.as_str() {
            "PUT" => Self::parse_put(&mut tokens),
            "GET" => {
                let id = document_id(&mut tokens)?;
                let path = tokens.next().map(str::to_string);
                Ok(Command::Get { id, path })
            }
            "REV" | "REVISION" => {
                let id = document_id(&mut tokens)?;
                let rev = revision_id(&mut tokens)?;
                Ok(Command::Revision { id, rev })
            }
            "HISTORY" => Ok(Command::History {
                id: document_id(&mut tokens)?,
            }),
            "LEAVES" => Ok(Command::Leaves {
                id: document_id(&mut tokens)?,
            }),
            "CONFLICTS" => Ok(Command::Conflicts {
                id: document_id(&mut tokens)?,
            }),
            "DEL" | "DELETE" => Ok(Command::Delete {
                id: document_id(&mut tokens)?,
            }),
            "PURGE" => Ok(Command::Purge {
                id: document_id(&mut tokens)?,
            }),
            "FORCE" => Self::parse_force(&mut tokens),
            "KEYS" => Ok(Command::Keys {
                pattern: tokens.next().map(str::to_string),
            }),
            "INFO" => Ok(Command::Info),
            "HELP" => Ok(Command::Help),
            "QUIT" | "EXIT" => Ok(Command::Quit),
            _ => Err(CommandError::InvalidCommand(format!("Unknown command: {}", cmd))),
        }
    }

    fn parse_put(tokens: &mut Tokenizer) -> CommandResult<Command> {
        let id = document_id(tokens)?;

        let mut parent = Parent::Current;
        if let Some(opt) = tokens.peek() {
            match opt.to_uppercase().as_str() {
                "REV" => {
                    tokens.next();
                    parent = Parent::Revision(revision_id(tokens)?);
                }
                "NEW" => {
                    tokens.next();
                    parent = Parent::None;
                }
                _ => {}
            }
        }

        let body = tokens
            .rest()
            .ok_or_else(|| CommandError::MissingArgument("properties".into()))?;

        Ok(Command::Put {
            id,
            parent,
            properties: parse_properties(&body)?,
        })
    }

    fn parse_force(tokens: &mut Tokenizer) -> CommandResult<Command> {
        let id = document_id(tokens)?;

        let parent_str = tokens
            .next()
            .ok_or_else(|| CommandError::MissingArgument("parent revision or ROOT".into()))?;
        let parent = if parent_str.eq_ignore_ascii_case("ROOT") {
            Parent::None
        } else {
            Parent::Revision(parent_str.parse()?)
        };

        let mut deleted = false;
        if tokens.peek().is_some_and(|t| t.eq_ignore_ascii_case("DELETED")) {
            tokens.next();
            deleted = true;
        }

        let properties = match tokens.rest() {
            Some(body) => parse_properties(&body)?,
            None if deleted => Properties::new(),
            None => return Err(CommandError::MissingArgument("properties".into())),
        };

        Ok(Command::Force {
            id,
            parent,
            deleted,
            properties,
        })
    }
}

fn document_id(tokens: &mut Tokenizer) -> CommandResult<DocumentId> {
    let id = tokens
        .next()
        .ok_or_else(|| CommandError::MissingArgument("document_id".into()))?;
    Ok(DocumentId::new(id)?)
}

fn revision_id(tokens: &mut Tokenizer) -> CommandResult<RevisionId> {
    let rev = tokens
        .next()
        .ok_or_else(|| CommandError::MissingArgument("revision_id".into()))?;
    Ok(rev.parse()?)
}

/// Parse a JSON object into a property map
fn parse_properties(s: &str) -> CommandResult<Properties> {
    let json: serde_json::Value =
        serde_json::from_str(s.trim()).map_err(|e| CommandError::InvalidJson(e.to_string()))?;

    match Value::from(json) {
        Value::Object(map) => Ok(map),
        _ => Err(CommandError::InvalidArgument(
            "properties must be a JSON object".into(),
        )),
    }
}

/// Simple tokenizer that handles quoted strings
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let remaining = &self.input[self.pos..];
        self.pos += remaining.len() - remaining.trim_start().len();
    }

    fn next(&mut self) -> Option<&'a str> {
        self.skip_whitespace();

        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.pos..];

        if let Some(quoted) = remaining.strip_prefix('"') {
            if let Some(end) = quoted.find('"') {
                self.pos += end + 2;
                return Some(&quoted[..end]);
            }
        }

        let end = remaining
            .find(char::is_whitespace)
            .unwrap_or(remaining.len());
        self.pos += end;

        Some(&remaining[..end])
    }

    fn peek(&mut self) -> Option<&'a str> {
        let saved = self.pos;
        let token = self.next();
        self.pos = saved;
        token
    }

    fn rest(&mut self) -> Option<String> {
        self.skip_whitespace();

        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = self.input[self.pos..].to_string();
        self.pos = self.input.len();
        Some(remaining)
    }
}
