//! Scorecast Runtime
//!
//! Connects the core protocol types to a broker: the byte-stream transport,
//! the session state machine with its receipt correlation table, and the
//! background task that reads frames and feeds the session and the
//! aggregation store.

pub mod config;
pub mod console;
pub mod error;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use console::Console;
pub use error::ClientError;
pub use session::{GameClient, PendingAction, Phase};
pub use transport::{Connector, StreamTransport, TcpConnector, Transport, TransportError};
