//! Client operation errors
//!
//! The display text of each variant is the message shown to the user.
//! Only transport failures end the connection; everything else leaves the
//! session as it was.

use std::io;
use std::path::PathBuf;

use scorecast_core::{EventFileError, SummaryError};

use crate::transport::TransportError;

/// Failures of a client command
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Please login first")]
    NotLoggedIn,

    #[error("The client is already logged in, log out before trying again")]
    AlreadyLoggedIn,

    #[error("Not subscribed to channel {0}")]
    NotSubscribed(String),

    #[error("Logout already in progress")]
    LogoutInProgress,

    #[error("Could not connect to server")]
    Connect(#[source] TransportError),

    #[error("Lost connection to server")]
    Transport(#[source] TransportError),

    #[error(transparent)]
    EventFile(#[from] EventFileError),

    #[error(transparent)]
    NotFound(#[from] SummaryError),

    #[error("Failed to open summary file")]
    SummaryWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ClientError {
    /// Whether the error tore the connection down
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Connect(_) | ClientError::Transport(_))
    }
}
