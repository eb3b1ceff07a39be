//! Locally authored event files
//!
//! The `report` command reads a JSON file describing one game and the events
//! the user wants to publish for it:
//!
//! ```json
//! {
//!   "team a": "Germany",
//!   "team b": "Japan",
//!   "events": [
//!     {
//!       "event name": "kickoff",
//!       "time": 0,
//!       "game updates": { "active": true, "before halftime": true },
//!       "team a updates": { "goals": "0" },
//!       "team b updates": { "goals": "0" },
//!       "description": "And we're off!"
//!     }
//!   ]
//! }
//! ```
//!
//! Update values that are not JSON strings are kept in their JSON text form.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::EventFileError;
use crate::protocol::report::{topic_for, GameReport, UpdateMap};

// ----------------------------------------------------------------------------
// File Layout
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawEventFile {
    #[serde(rename = "team a")]
    team_a: String,
    #[serde(rename = "team b")]
    team_b: String,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "event name")]
    name: String,
    #[serde(default)]
    time: i64,
    #[serde(rename = "game updates", default)]
    game_updates: Map<String, Value>,
    #[serde(rename = "team a updates", default)]
    team_a_updates: Map<String, Value>,
    #[serde(rename = "team b updates", default)]
    team_b_updates: Map<String, Value>,
    #[serde(default)]
    description: String,
}

// ----------------------------------------------------------------------------
// Public Types
// ----------------------------------------------------------------------------

/// A game and the events a user authored for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFile {
    pub team_a: String,
    pub team_b: String,
    /// Events in file order
    pub events: Vec<LocalEvent>,
}

/// One locally authored event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEvent {
    pub team_a: String,
    pub team_b: String,
    pub name: String,
    pub time: i64,
    pub general_updates: UpdateMap,
    pub team_a_updates: UpdateMap,
    pub team_b_updates: UpdateMap,
    pub description: String,
}

impl EventFile {
    /// Read and parse an event file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EventFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EventFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_file(path, &text)
    }

    /// Parse the contents of the event file at `path`
    pub fn parse_file(path: &Path, text: &str) -> Result<Self, EventFileError> {
        Self::from_json(text).map_err(|source| EventFileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse event file contents
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawEventFile = serde_json::from_str(text)?;
        let events = raw
            .events
            .into_iter()
            .map(|event| LocalEvent {
                team_a: raw.team_a.clone(),
                team_b: raw.team_b.clone(),
                name: event.name,
                time: event.time,
                general_updates: to_update_map(event.game_updates),
                team_a_updates: to_update_map(event.team_a_updates),
                team_b_updates: to_update_map(event.team_b_updates),
                description: event.description,
            })
            .collect();

        Ok(Self {
            team_a: raw.team_a,
            team_b: raw.team_b,
            events,
        })
    }

    /// Topic the events are published on
    pub fn topic(&self) -> String {
        topic_for(&self.team_a, &self.team_b)
    }
}

impl LocalEvent {
    /// Attribute the event to a reporter
    pub fn to_report(&self, user: &str) -> GameReport {
        GameReport {
            user: user.to_string(),
            team_a: self.team_a.clone(),
            team_b: self.team_b.clone(),
            event_name: self.name.clone(),
            time: self.time,
            general_updates: self.general_updates.clone(),
            team_a_updates: self.team_a_updates.clone(),
            team_b_updates: self.team_b_updates.clone(),
            description: self.description.clone(),
        }
    }
}

fn to_update_map(updates: Map<String, Value>) -> UpdateMap {
    updates
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
