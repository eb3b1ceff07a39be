//! Serialized output sink for user-facing messages
//!
//! Both the command loop and the frame reader print through the same
//! [`Console`]. Every line is written while holding one lock, so messages
//! from the two tasks never interleave mid-line.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
enum Sink {
    Stdout,
    Captured(Vec<String>),
}

/// Line-oriented message sink shared by all tasks
#[derive(Debug, Clone)]
pub struct Console {
    sink: Arc<Mutex<Sink>>,
}

impl Console {
    /// Console writing to standard output
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Stdout)),
        }
    }

    /// Console that keeps lines in memory
    pub fn captured() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Captured(Vec::new()))),
        }
    }

    /// Write one complete line
    pub fn print_line(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        match &mut *self.lock() {
            Sink::Stdout => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{}", line).and_then(|()| out.flush()) {
                    tracing::warn!("Failed to write to stdout: {}", e);
                }
            }
            Sink::Captured(lines) => lines.push(line.to_string()),
        }
    }

    /// Write a prompt without a line break; captured consoles drop it
    pub fn print_prompt(&self, prompt: &str) {
        if let Sink::Stdout = &*self.lock() {
            let mut out = std::io::stdout().lock();
            if let Err(e) = write!(out, "{}", prompt).and_then(|()| out.flush()) {
                tracing::warn!("Failed to write to stdout: {}", e);
            }
        }
    }

    /// Lines printed so far; always empty for stdout
    pub fn lines(&self) -> Vec<String> {
        match &*self.lock() {
            Sink::Stdout => Vec::new(),
            Sink::Captured(lines) => lines.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
