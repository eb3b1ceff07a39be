//! Report aggregation
//!
//! Reports are folded into one [`AggregateRecord`] per (topic, reporter)
//! pair. A record accumulates the latest value of every statistic the
//! reporter mentioned and keeps an append-only log of events, which the
//! summary orders by half, then game time, then arrival.

use core::fmt;
use std::collections::HashMap;

use tracing::debug;

use crate::errors::SummaryError;
use crate::protocol::report::{GameReport, UpdateMap};

/// General update key that tracks which half of the game is being played
pub const BEFORE_HALFTIME: &str = "before halftime";

// ----------------------------------------------------------------------------
// Stored Event
// ----------------------------------------------------------------------------

/// One event kept in a record's log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub time: i64,
    pub name: String,
    pub description: String,
    /// 0 before the halftime transition, 1 after
    pub half: u8,
    /// Arrival order within the record, starting at 0
    pub sequence: u64,
}

impl StoredEvent {
    fn sort_key(&self) -> (u8, i64, u64) {
        (self.half, self.time, self.sequence)
    }
}

// ----------------------------------------------------------------------------
// Aggregate Record
// ----------------------------------------------------------------------------

/// Everything one reporter has said about one game
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateRecord {
    team_a: String,
    team_b: String,
    general_stats: UpdateMap,
    team_a_stats: UpdateMap,
    team_b_stats: UpdateMap,
    halftime_occurred: bool,
    events: Vec<StoredEvent>,
    next_sequence: u64,
}

impl AggregateRecord {
    /// Fold a report into the record
    ///
    /// Team names are adopted only while unset. The event's half is read from
    /// the halftime flag after this report's own `before halftime` update has
    /// been applied, so a report that flips the flag is tagged with the new half.
    pub fn apply(&mut self, report: &GameReport) {
        if self.team_a.is_empty() {
            self.team_a = report.team_a.clone();
        }
        if self.team_b.is_empty() {
            self.team_b = report.team_b.clone();
        }

        for (key, value) in &report.general_updates {
            self.general_stats.insert(key.clone(), value.clone());
        }
        for (key, value) in &report.team_a_updates {
            self.team_a_stats.insert(key.clone(), value.clone());
        }
        for (key, value) in &report.team_b_updates {
            self.team_b_stats.insert(key.clone(), value.clone());
        }

        if let Some(value) = report.general_updates.get(BEFORE_HALFTIME) {
            match value.to_ascii_lowercase().as_str() {
                "false" | "0" => self.halftime_occurred = true,
                "true" | "1" => self.halftime_occurred = false,
                other => debug!("Ignoring {} value {:?}", BEFORE_HALFTIME, other),
            }
        }

        let half = u8::from(self.halftime_occurred);
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.events.push(StoredEvent {
            time: report.time,
            name: report.event_name.clone(),
            description: report.description.clone(),
            half,
            sequence,
        });
    }

    pub fn team_a(&self) -> &str {
        &self.team_a
    }

    pub fn team_b(&self) -> &str {
        &self.team_b
    }

    pub fn general_stats(&self) -> &UpdateMap {
        &self.general_stats
    }

    pub fn team_a_stats(&self) -> &UpdateMap {
        &self.team_a_stats
    }

    pub fn team_b_stats(&self) -> &UpdateMap {
        &self.team_b_stats
    }

    pub fn halftime_occurred(&self) -> bool {
        self.halftime_occurred
    }

    /// Events in arrival order
    pub fn events(&self) -> &[StoredEvent] {
        &self.events
    }

    /// Events ordered by (half, time, sequence)
    pub fn sorted_events(&self) -> Vec<StoredEvent> {
        let mut events = self.events.clone();
        events.sort_by_key(StoredEvent::sort_key);
        events
    }
}

/// Renders the game summary written by the `summary` command
impl fmt::Display for AggregateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} vs {}", self.team_a, self.team_b)?;
        writeln!(f, "Game stats:")?;
        writeln!(f, "General stats:")?;
        write_stats(f, &self.general_stats)?;
        writeln!(f, "{} stats:", self.team_a)?;
        write_stats(f, &self.team_a_stats)?;
        writeln!(f, "{} stats:", self.team_b)?;
        write_stats(f, &self.team_b_stats)?;
        writeln!(f, "Game event reports:")?;
        for event in self.sorted_events() {
            writeln!(f, "{} - {}:", event.time, event.name)?;
            writeln!(f, "{}", event.description)?;
        }
        Ok(())
    }
}

fn write_stats(f: &mut fmt::Formatter<'_>, stats: &UpdateMap) -> fmt::Result {
    for (key, value) in stats {
        writeln!(f, "{}: {}", key, value)?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Aggregation Store
// ----------------------------------------------------------------------------

/// Records keyed by topic, then by reporter
///
/// Records are created on the first report for a pair and never removed.
#[derive(Debug, Clone, Default)]
pub struct AggregationStore {
    games: HashMap<String, HashMap<String, AggregateRecord>>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a report into the record for (topic, report.user)
    pub fn apply_report(&mut self, topic: &str, report: &GameReport) {
        self.games
            .entry(topic.to_string())
            .or_default()
            .entry(report.user.clone())
            .or_default()
            .apply(report);
    }

    pub fn record(&self, topic: &str, reporter: &str) -> Option<&AggregateRecord> {
        self.games.get(topic)?.get(reporter)
    }

    /// Copy of a record, for rendering outside a lock
    pub fn snapshot(&self, topic: &str, reporter: &str) -> Result<AggregateRecord, SummaryError> {
        self.record(topic, reporter)
            .cloned()
            .ok_or_else(|| SummaryError::NotFound {
                topic: topic.to_string(),
                reporter: reporter.to_string(),
            })
    }

    /// Render the summary for (topic, reporter)
    pub fn render_summary(&self, topic: &str, reporter: &str) -> Result<String, SummaryError> {
        self.snapshot(topic, reporter).map(|record| record.to_string())
    }

    /// Reporters with a record under a topic, sorted
    pub fn reporters(&self, topic: &str) -> Vec<&str> {
        let mut reporters: Vec<&str> = self
            .games
            .get(topic)
            .map(|users| users.keys().map(String::as_str).collect())
            .unwrap_or_default();
        reporters.sort_unstable();
        reporters
    }

    /// Number of (topic, reporter) records
    pub fn len(&self) -> usize {
        self.games.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
