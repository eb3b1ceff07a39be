//! Scorecast Core
//!
//! Protocol building blocks for the Scorecast game-reporting client: the
//! text frame codec, the game report sub-protocol carried inside frame
//! bodies, the per-topic per-reporter aggregation store, and the loader for
//! locally authored event files.
//!
//! Nothing in this crate performs network I/O; the runtime crate drives
//! these types from the session and the background frame reader.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod aggregation;
pub mod errors;
pub mod events;
pub mod protocol;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use aggregation::{AggregateRecord, AggregationStore, StoredEvent};
pub use errors::{EventFileError, SummaryError};
pub use events::{EventFile, LocalEvent};
pub use protocol::frame::{Command, Frame};
pub use protocol::report::{topic_for, GameReport, UpdateMap};
