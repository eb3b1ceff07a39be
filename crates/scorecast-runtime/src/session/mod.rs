//! Session lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> AwaitingLogin -> LoggedIn -> LoggingOut -> Disconnected
//!                                     \              \            \
//!                                      +--------------+------------+--> Disconnected (error / stream end)
//! ```
//!
//! The command loop drives transitions through [`GameClient`]; the frame
//! reader task completes them when the broker answers. Both share one
//! mutex-guarded [`state::SessionState`], and neither holds the lock across
//! a send or a receive.

mod client;
mod reader;
mod state;

pub use client::GameClient;
pub use reader::describe_error;
pub use state::{PendingAction, Phase};
