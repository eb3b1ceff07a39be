//! Foreground side of the session

use std::path::Path;
use std::sync::Arc;

use scorecast_core::protocol::headers;
use scorecast_core::{AggregateRecord, EventFile, EventFileError, Frame, LocalEvent};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::reader;
use super::state::{PendingAction, Phase, Shared};
use crate::config::ClientConfig;
use crate::console::Console;
use crate::error::ClientError;
use crate::transport::{Connector, TransportError};

/// Client session driven by the command loop
///
/// Commands validate against the current [`Phase`], update the shared state
/// under its lock and send frames with the lock released. Confirmations
/// arrive later on the frame reader and are printed there.
pub struct GameClient {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    reader: Option<JoinHandle<()>>,
}

impl GameClient {
    pub fn new(connector: Arc<dyn Connector>, config: ClientConfig, console: Console) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, console)),
            connector,
            reader: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    pub fn console(&self) -> &Console {
        &self.shared.console
    }

    // ------------------------------------------------------------------------
    // Connection Lifecycle
    // ------------------------------------------------------------------------

    /// Open a connection and send CONNECT
    ///
    /// Returns once the frame is sent; `Login successful` or the broker's
    /// error is printed by the reader when the answer arrives.
    pub async fn login(
        &mut self,
        address: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        {
            let mut state = self.shared.lock();
            if state.phase != Phase::Disconnected {
                return Err(ClientError::AlreadyLoggedIn);
            }
            state.phase = Phase::Connecting;
        }
        self.retire_reader().await;

        let transport = match self.connector.connect(address).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Connection to {} failed: {}", address, e);
                self.shared.lock().phase = Phase::Disconnected;
                return Err(ClientError::Connect(e));
            }
        };
        info!("Connected to {}", address);

        let generation = {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.transport = Some(Arc::clone(&transport));
            state.phase = Phase::AwaitingLogin;
            state.running = true;
            state.username = username.to_string();
            state.generation
        };

        self.reader = Some(tokio::spawn(reader::run(
            Arc::clone(&self.shared),
            transport,
            generation,
        )));

        let config = &self.shared.config;
        let connect = Frame::connect(&config.accept_version, &config.virtual_host, username, password);
        self.send(connect).await.map_err(ClientError::Connect)
    }

    /// Send DISCONNECT and wait until the session is fully torn down
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let receipt = {
            let mut state = self.shared.lock();
            match state.phase {
                Phase::LoggedIn => {}
                Phase::LoggingOut => return Err(ClientError::LogoutInProgress),
                _ => return Err(ClientError::NotLoggedIn),
            }
            state.phase = Phase::LoggingOut;
            state.register_receipt(PendingAction::Logout)
        };

        self.send(Frame::disconnect(receipt))
            .await
            .map_err(ClientError::Transport)?;

        self.shared.wait_logout_complete().await;
        self.retire_reader().await;
        info!("Logged out");
        Ok(())
    }

    /// Stop the reader and close the transport without a DISCONNECT
    pub async fn shutdown(&mut self) {
        let generation = {
            let state = self.shared.lock();
            state.transport.as_ref().map(|_| state.generation)
        };
        if let Some(generation) = generation {
            debug!("Shutting down connection {}", generation);
            self.shared.teardown(generation).await;
        }
        self.retire_reader().await;
    }

    async fn retire_reader(&mut self) {
        if let Some(handle) = self.reader.take() {
            if let Err(e) = handle.await {
                warn!("Frame reader ended abnormally: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Subscribe to a topic; nothing happens if already subscribed
    pub async fn join(&self, topic: &str) -> Result<(), ClientError> {
        let frame = {
            let mut state = self.shared.lock();
            if state.phase != Phase::LoggedIn {
                return Err(ClientError::NotLoggedIn);
            }
            if state.subscriptions.contains_key(topic) {
                debug!("Already subscribed to {}", topic);
                return Ok(());
            }
            let subscription_id = state.allocate_subscription_id();
            let receipt = state.register_receipt(PendingAction::Join(topic.to_string()));
            state.subscriptions.insert(topic.to_string(), subscription_id);
            Frame::subscribe(topic, subscription_id, receipt)
        };

        self.send(frame).await.map_err(ClientError::Transport)
    }

    /// Unsubscribe from a topic
    ///
    /// The subscription is forgotten immediately, before the broker confirms.
    pub async fn exit(&self, topic: &str) -> Result<(), ClientError> {
        let frame = {
            let mut state = self.shared.lock();
            if state.phase != Phase::LoggedIn {
                return Err(ClientError::NotLoggedIn);
            }
            let Some(subscription_id) = state.subscriptions.remove(topic) else {
                return Err(ClientError::NotSubscribed(topic.to_string()));
            };
            let receipt = state.register_receipt(PendingAction::Exit(topic.to_string()));
            Frame::unsubscribe(subscription_id, receipt)
        };

        self.send(frame).await.map_err(ClientError::Transport)
    }

    // ------------------------------------------------------------------------
    // Reports and Summaries
    // ------------------------------------------------------------------------

    /// Publish every event of an event file on its game topic
    pub async fn report(&self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref();
        self.ensure_logged_in()?;

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EventFileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file = EventFile::parse_file(path, &text)?;
        let topic = file.topic();
        let source = path.to_string_lossy();
        self.report_events(&topic, &file.events, Some(source.as_ref()))
            .await
    }

    /// Publish events as the local user and apply each one to the local store
    pub async fn report_events(
        &self,
        topic: &str,
        events: &[LocalEvent],
        source: Option<&str>,
    ) -> Result<(), ClientError> {
        let username = {
            let state = self.shared.lock();
            if state.phase != Phase::LoggedIn {
                return Err(ClientError::NotLoggedIn);
            }
            if !state.subscriptions.contains_key(topic) {
                return Err(ClientError::NotSubscribed(topic.to_string()));
            }
            state.username.clone()
        };

        for event in events {
            let report = event.to_report(&username);
            let mut frame = Frame::send(topic, report.to_body());
            if self.shared.config.attach_file_header {
                if let Some(source) = source {
                    frame.set_header(headers::FILE, source);
                }
            }

            self.send(frame).await.map_err(ClientError::Transport)?;
            self.shared.lock().store.apply_report(topic, &report);
            debug!("Reported {} on {}", report.event_name, topic);
        }
        Ok(())
    }

    /// Write the summary of one reporter's view of a game, replacing the file
    pub async fn summary(
        &self,
        topic: &str,
        reporter: &str,
        output: impl AsRef<Path>,
    ) -> Result<(), ClientError> {
        let output = output.as_ref();
        let record = {
            let state = self.shared.lock();
            if state.phase != Phase::LoggedIn {
                return Err(ClientError::NotLoggedIn);
            }
            state.store.snapshot(topic, reporter)?
        };

        tokio::fs::write(output, record.to_string())
            .await
            .map_err(|source| ClientError::SummaryWrite {
                path: output.to_path_buf(),
                source,
            })?;
        debug!("Summary of {}/{} written to {}", topic, reporter, output.display());
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn username(&self) -> Option<String> {
        let state = self.shared.lock();
        state.phase.is_connected().then(|| state.username.clone())
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.shared.lock().subscriptions.contains_key(topic)
    }

    pub fn subscription_id(&self, topic: &str) -> Option<u64> {
        self.shared.lock().subscriptions.get(topic).copied()
    }

    /// Number of requests still waiting for a receipt
    pub fn pending_receipts(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Copy of the aggregate for a topic and reporter
    pub fn snapshot(&self, topic: &str, reporter: &str) -> Option<AggregateRecord> {
        self.shared.lock().store.record(topic, reporter).cloned()
    }

    fn ensure_logged_in(&self) -> Result<(), ClientError> {
        if self.shared.lock().phase == Phase::LoggedIn {
            Ok(())
        } else {
            Err(ClientError::NotLoggedIn)
        }
    }

    /// Send on the live connection, tearing it down if the send fails
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let connection = self.shared.lock().connection();
        let Some((transport, generation)) = connection else {
            return Err(TransportError::Closed);
        };

        debug!("Sending {} frame", frame.command());
        if let Err(e) = transport.send_frame(&frame.serialize()).await {
            warn!("Send failed, closing connection: {}", e);
            self.shared.teardown(generation).await;
            return Err(e);
        }
        Ok(())
    }
}
