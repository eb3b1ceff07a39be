//! Game report body format
//!
//! A report travels as the body of a SEND/MESSAGE frame in a fixed,
//! line-oriented layout shared with the other clients on the broker:
//!
//! ```text
//! user: <reporter>
//! team a: <name>
//! team b: <name>
//! event name: <name>
//! time: <integer>
//! general game updates:
//! <key>: <value>
//! team a updates:
//! <key>: <value>
//! team b updates:
//! <key>: <value>
//! description:
//! <free text, may span lines>
//! ```
//!
//! The scanner is tolerant. Lines with an unknown key outside an update
//! section are dropped, a malformed `time` reads as 0, and an update key that
//! collides with one of the keywords above is read as that keyword. The
//! description runs to the end of the body, blank lines included.

use std::collections::BTreeMap;

use tracing::trace;

/// Statistic updates keyed by statistic name
pub type UpdateMap = BTreeMap<String, String>;

// ----------------------------------------------------------------------------
// Field Names
// ----------------------------------------------------------------------------

const USER: &str = "user";
const TEAM_A: &str = "team a";
const TEAM_B: &str = "team b";
const EVENT_NAME: &str = "event name";
const TIME: &str = "time";
const GENERAL_UPDATES: &str = "general game updates";
const TEAM_A_UPDATES: &str = "team a updates";
const TEAM_B_UPDATES: &str = "team b updates";
const DESCRIPTION: &str = "description";

// ----------------------------------------------------------------------------
// Game Report
// ----------------------------------------------------------------------------

/// One reporter's description of one game event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameReport {
    /// Username the report is attributed to
    pub user: String,
    pub team_a: String,
    pub team_b: String,
    pub event_name: String,
    /// Game clock time of the event
    pub time: i64,
    pub general_updates: UpdateMap,
    pub team_a_updates: UpdateMap,
    pub team_b_updates: UpdateMap,
    pub description: String,
}

/// Scanner position inside a report body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    General,
    TeamA,
    TeamB,
    Description,
}

impl GameReport {
    /// Render the report as a frame body
    pub fn to_body(&self) -> String {
        let mut body = String::new();
        push_field(&mut body, USER, &self.user);
        push_field(&mut body, TEAM_A, &self.team_a);
        push_field(&mut body, TEAM_B, &self.team_b);
        push_field(&mut body, EVENT_NAME, &self.event_name);
        push_field(&mut body, TIME, &self.time.to_string());

        push_section(&mut body, GENERAL_UPDATES, &self.general_updates);
        push_section(&mut body, TEAM_A_UPDATES, &self.team_a_updates);
        push_section(&mut body, TEAM_B_UPDATES, &self.team_b_updates);

        body.push_str(DESCRIPTION);
        body.push_str(":\n");
        body.push_str(&self.description);
        body
    }

    /// Scan a frame body into a report
    pub fn from_body(body: &str) -> Self {
        let mut report = GameReport::default();
        let mut section = Section::None;
        let mut description: Option<Vec<&str>> = None;

        for line in body.split('\n') {
            if section == Section::Description {
                description.get_or_insert_with(Vec::new).push(line);
                continue;
            }
            if line.is_empty() {
                continue;
            }

            let (key, value) = split_field(line);
            match key {
                USER => {
                    report.user = value.to_string();
                    section = Section::None;
                }
                TEAM_A => {
                    report.team_a = value.to_string();
                    section = Section::None;
                }
                TEAM_B => {
                    report.team_b = value.to_string();
                    section = Section::None;
                }
                EVENT_NAME => {
                    report.event_name = value.to_string();
                    section = Section::None;
                }
                TIME => {
                    report.time = value.trim().parse().unwrap_or(0);
                    section = Section::None;
                }
                GENERAL_UPDATES => section = Section::General,
                TEAM_A_UPDATES => section = Section::TeamA,
                TEAM_B_UPDATES => section = Section::TeamB,
                DESCRIPTION => section = Section::Description,
                _ => {
                    let target = match section {
                        Section::General => &mut report.general_updates,
                        Section::TeamA => &mut report.team_a_updates,
                        Section::TeamB => &mut report.team_b_updates,
                        // Unknown top-level keys are ignored
                        Section::None | Section::Description => {
                            trace!("Dropping report field {:?}", key);
                            continue;
                        }
                    };
                    target.insert(key.to_string(), value.to_string());
                }
            }
        }

        if let Some(lines) = description {
            report.description = lines.join("\n");
        }
        report
    }

    /// Destination topic for a game between two teams
    pub fn topic(&self) -> String {
        topic_for(&self.team_a, &self.team_b)
    }
}

/// Topic name for a game: the two team names joined by an underscore
pub fn topic_for(team_a: &str, team_b: &str) -> String {
    format!("{}_{}", team_a, team_b)
}

fn push_field(body: &mut String, key: &str, value: &str) {
    body.push_str(key);
    body.push_str(": ");
    body.push_str(value);
    body.push('\n');
}

fn push_section(body: &mut String, title: &str, updates: &UpdateMap) {
    body.push_str(title);
    body.push_str(":\n");
    for (key, value) in updates {
        push_field(body, key, value);
    }
}

/// Split on the first colon and drop the single space the writer puts after it
fn split_field(line: &str) -> (&str, &str) {
    let (key, value) = line.split_once(':').unwrap_or((line, ""));
    (key, value.strip_prefix(' ').unwrap_or(value))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
