//! Wire protocol
//!
//! Two layers: [`frame`] is the STOMP-style text frame (command, headers,
//! body), and [`report`] is the line-oriented game report carried inside the
//! body of SEND and MESSAGE frames.

pub mod frame;
pub mod report;

pub use frame::{headers, Command, Frame};
pub use report::{GameReport, UpdateMap};
