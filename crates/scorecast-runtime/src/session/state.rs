//! Shared session state

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scorecast_core::AggregationStore;
use tokio::sync::Notify;
use tracing::debug;

use crate::config::ClientConfig;
use crate::console::Console;
use crate::transport::Transport;

// ----------------------------------------------------------------------------
// Phase and Pending Actions
// ----------------------------------------------------------------------------

/// Top-level connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No transport
    Disconnected,
    /// Transport being opened
    Connecting,
    /// CONNECT sent, waiting for CONNECTED
    AwaitingLogin,
    /// Broker accepted the credentials
    LoggedIn,
    /// DISCONNECT sent, waiting for its receipt
    LoggingOut,
}

impl Phase {
    /// A transport is open
    pub fn is_connected(self) -> bool {
        matches!(self, Phase::AwaitingLogin | Phase::LoggedIn | Phase::LoggingOut)
    }

    pub fn is_logged_in(self) -> bool {
        matches!(self, Phase::LoggedIn | Phase::LoggingOut)
    }
}

/// What to do when the receipt for a request arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Join(String),
    Exit(String),
    Logout,
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Mutable session fields, guarded by [`Shared::lock`]
pub(crate) struct SessionState {
    pub transport: Option<Arc<dyn Transport>>,
    pub phase: Phase,
    /// Cleared to stop the reader
    pub running: bool,
    /// Incremented on every login so a retiring reader cannot touch a newer connection
    pub generation: u64,
    pub username: String,
    next_subscription_id: u64,
    next_receipt_id: u64,
    /// Topic to active subscription id
    pub subscriptions: HashMap<String, u64>,
    /// Receipt id to the action it confirms
    pub pending: HashMap<u64, PendingAction>,
    /// Lives for the whole run, across logins
    pub store: AggregationStore,
}

impl SessionState {
    fn new() -> Self {
        Self {
            transport: None,
            phase: Phase::Disconnected,
            running: false,
            generation: 0,
            username: String::new(),
            next_subscription_id: 1,
            next_receipt_id: 1,
            subscriptions: HashMap::new(),
            pending: HashMap::new(),
            store: AggregationStore::new(),
        }
    }

    /// Transport and generation of the live connection
    pub fn connection(&self) -> Option<(Arc<dyn Transport>, u64)> {
        self.transport
            .as_ref()
            .map(|transport| (Arc::clone(transport), self.generation))
    }

    pub fn allocate_subscription_id(&mut self) -> u64 {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        id
    }

    /// Allocate a receipt id and record the action it will confirm
    pub fn register_receipt(&mut self, action: PendingAction) -> u64 {
        let id = self.next_receipt_id;
        self.next_receipt_id += 1;
        self.pending.insert(id, action);
        id
    }

    /// Remove the action for a receipt; a second call for the same id yields nothing
    pub fn take_pending(&mut self, receipt_id: u64) -> Option<PendingAction> {
        self.pending.remove(&receipt_id)
    }

    /// Drop all connection-scoped state and hand back the transport to close
    ///
    /// Id counters and the aggregation store are kept.
    pub fn reset(&mut self) -> Option<Arc<dyn Transport>> {
        self.phase = Phase::Disconnected;
        self.running = false;
        self.subscriptions.clear();
        self.pending.clear();
        self.transport.take()
    }
}

// ----------------------------------------------------------------------------
// Shared Handle
// ----------------------------------------------------------------------------

/// State shared between the command loop and the frame reader
pub(crate) struct Shared {
    state: Mutex<SessionState>,
    /// Signalled whenever a connection is torn down
    pub disconnected: Notify,
    pub console: Console,
    pub config: ClientConfig,
}

impl Shared {
    pub fn new(config: ClientConfig, console: Console) -> Self {
        Self {
            state: Mutex::new(SessionState::new()),
            disconnected: Notify::new(),
            console,
            config,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tear down the connection of `generation`, if it is still the current one
    ///
    /// Resets the session, closes the transport outside the lock and wakes
    /// anyone waiting for the disconnect.
    pub async fn teardown(&self, generation: u64) {
        let transport = {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.reset()
        };

        if let Some(transport) = transport {
            debug!("Closing transport of connection {}", generation);
            transport.close().await;
        }
        self.disconnected.notify_waiters();
    }

    /// Wait until the phase is no longer `LoggingOut`
    pub async fn wait_logout_complete(&self) {
        loop {
            let notified = self.disconnected.notified();
            let logging_out = self.lock().phase == Phase::LoggingOut;
            if !logging_out {
                return;
            }
            notified.await;
        }
    }
}
