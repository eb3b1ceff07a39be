//! Command parsing and dispatch for the Scorecast shell
//!
//! Each input line holds one command. Keywords are case-sensitive and
//! arguments are separated by whitespace; extra arguments are ignored.

use std::path::PathBuf;

use scorecast_runtime::{ClientError, Console, GameClient};
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------------

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login {
        address: String,
        username: String,
        password: String,
    },
    Join {
        topic: String,
    },
    Exit {
        topic: String,
    },
    Report {
        file: PathBuf,
    },
    Summary {
        topic: String,
        reporter: String,
        output: PathBuf,
    },
    Logout,
    /// Blank line
    Empty,
    /// Unrecognized keyword
    Unknown(String),
}

/// A known command with missing arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Usage: login {{host:port}} {{username}} {{password}}")]
    Login,

    #[error("Usage: join {{game_name}}")]
    Join,

    #[error("Usage: exit {{game_name}}")]
    Exit,

    #[error("Usage: report {{file}}")]
    Report,

    #[error("Usage: summary {{game_name}} {{user}} {{file}}")]
    Summary,
}

impl ShellCommand {
    /// Parse one input line
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            return Ok(ShellCommand::Empty);
        };
        let mut arg = |usage: UsageError| tokens.next().map(str::to_string).ok_or(usage);

        let command = match keyword {
            "login" => ShellCommand::Login {
                address: arg(UsageError::Login)?,
                username: arg(UsageError::Login)?,
                password: arg(UsageError::Login)?,
            },
            "join" => ShellCommand::Join {
                topic: arg(UsageError::Join)?,
            },
            "exit" => ShellCommand::Exit {
                topic: arg(UsageError::Exit)?,
            },
            "report" => ShellCommand::Report {
                file: arg(UsageError::Report)?.into(),
            },
            "summary" => ShellCommand::Summary {
                topic: arg(UsageError::Summary)?,
                reporter: arg(UsageError::Summary)?,
                output: arg(UsageError::Summary)?.into(),
            },
            "logout" => ShellCommand::Logout,
            other => ShellCommand::Unknown(other.to_string()),
        };
        Ok(command)
    }
}

// ----------------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------------

/// Runs shell commands against a client session
pub struct CommandDispatcher {
    client: GameClient,
}

impl CommandDispatcher {
    pub fn new(client: GameClient) -> Self {
        Self { client }
    }

    pub fn console(&self) -> &Console {
        self.client.console()
    }

    /// Parse and run one input line, printing any failure
    pub async fn execute_line(&mut self, line: &str) {
        match ShellCommand::parse(line) {
            Ok(command) => self.execute(command).await,
            Err(usage) => self.console().print_line(usage.to_string()),
        }
    }

    /// Run a parsed command, printing any failure
    pub async fn execute(&mut self, command: ShellCommand) {
        debug!("Executing {:?}", command);
        let result = match command {
            ShellCommand::Login {
                address,
                username,
                password,
            } => self.client.login(&address, &username, &password).await,
            ShellCommand::Join { topic } => self.client.join(&topic).await,
            ShellCommand::Exit { topic } => self.client.exit(&topic).await,
            ShellCommand::Report { file } => self.client.report(&file).await,
            ShellCommand::Summary {
                topic,
                reporter,
                output,
            } => self.client.summary(&topic, &reporter, &output).await,
            ShellCommand::Logout => self.client.logout().await,
            ShellCommand::Empty => Ok(()),
            ShellCommand::Unknown(keyword) => {
                debug!("Unknown command {:?}", keyword);
                self.console().print_line("Unknown command");
                Ok(())
            }
        };

        if let Err(e) = result {
            self.report_error(&e);
        }
    }

    /// Close the session without a logout handshake
    pub async fn shutdown(&mut self) {
        self.client.shutdown().await;
    }

    fn report_error(&self, error: &ClientError) {
        if let Some(source) = std::error::Error::source(error) {
            debug!("{}: {}", error, source);
        }
        if error.is_fatal() {
            warn!("Connection closed: {}", error);
        }
        self.console().print_line(error.to_string());
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
