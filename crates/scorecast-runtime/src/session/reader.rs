//! Background frame reader
//!
//! One reader runs per connection. It blocks on the transport, parses each
//! frame and dispatches on its command. It exits after the logout receipt,
//! after an ERROR frame, or when the transport fails or is closed.

use std::sync::Arc;

use scorecast_core::protocol::headers;
use scorecast_core::{Command, Frame, GameReport};
use tracing::{debug, info, warn};

use super::state::{PendingAction, Phase, Shared};
use crate::transport::Transport;

/// Whether the reader keeps going after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Read and dispatch frames until the connection ends
pub(crate) async fn run(shared: Arc<Shared>, transport: Arc<dyn Transport>, generation: u64) {
    info!("Frame reader started for connection {}", generation);

    loop {
        let keep_running = {
            let state = shared.lock();
            state.running && state.generation == generation
        };
        if !keep_running {
            break;
        }

        let text = match transport.receive_frame().await {
            Ok(text) => text,
            Err(e) => {
                debug!("Reader stopping: {}", e);
                shared.teardown(generation).await;
                break;
            }
        };

        let frame = Frame::parse(&text);
        debug!("Received {} frame", frame.command());

        if dispatch(&shared, generation, &frame).await == Flow::Stop {
            break;
        }
    }

    info!("Frame reader stopped for connection {}", generation);
}

async fn dispatch(shared: &Shared, generation: u64, frame: &Frame) -> Flow {
    match frame.command() {
        Command::Connected => {
            handle_connected(shared, generation);
            Flow::Continue
        }
        Command::Message => {
            handle_message(shared, frame);
            Flow::Continue
        }
        Command::Receipt => handle_receipt(shared, generation, frame).await,
        Command::Error => {
            let message = frame.header(headers::MESSAGE).unwrap_or_default();
            shared.console.print_line(describe_error(message));
            shared.teardown(generation).await;
            Flow::Stop
        }
        other => {
            warn!("Ignoring unexpected {} frame", other);
            Flow::Continue
        }
    }
}

fn handle_connected(shared: &Shared, generation: u64) {
    {
        let mut state = shared.lock();
        if state.generation != generation || state.phase != Phase::AwaitingLogin {
            warn!("CONNECTED received in phase {:?}", state.phase);
            return;
        }
        state.phase = Phase::LoggedIn;
    }
    shared.console.print_line("Login successful");
}

fn handle_message(shared: &Shared, frame: &Frame) {
    let Some(topic) = frame.header(headers::DESTINATION) else {
        warn!("MESSAGE frame without destination dropped");
        return;
    };

    let report = GameReport::from_body(frame.body());
    if report.user.is_empty() {
        debug!("Report on {} without a reporter dropped", topic);
        return;
    }

    debug!("Applying report from {} on {}", report.user, topic);
    shared.lock().store.apply_report(topic, &report);
}

async fn handle_receipt(shared: &Shared, generation: u64, frame: &Frame) -> Flow {
    let Some(receipt_id) = frame.header(headers::RECEIPT_ID) else {
        warn!("RECEIPT frame without receipt-id");
        return Flow::Continue;
    };
    let Ok(receipt_id) = receipt_id.trim().parse::<u64>() else {
        warn!("Malformed receipt-id {:?}", receipt_id);
        return Flow::Continue;
    };

    let action = shared.lock().take_pending(receipt_id);
    let Some(action) = action else {
        warn!("No pending action for receipt {}", receipt_id);
        return Flow::Continue;
    };
    debug!("Receipt {} confirms {:?}", receipt_id, action);

    match action {
        PendingAction::Join(topic) => {
            shared.console.print_line(format!("Joined channel {}", topic));
            Flow::Continue
        }
        PendingAction::Exit(topic) => {
            shared.console.print_line(format!("Exited channel {}", topic));
            Flow::Continue
        }
        PendingAction::Logout => {
            shared.teardown(generation).await;
            Flow::Stop
        }
    }
}

/// User-facing text for a broker ERROR `message` header
pub fn describe_error(message: &str) -> String {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("already logged in") {
        "User already logged in".to_string()
    } else if lowered.contains("wrong password") {
        "Wrong password".to_string()
    } else if !message.is_empty() {
        message.to_string()
    } else {
        "Error received from server".to_string()
    }
}
