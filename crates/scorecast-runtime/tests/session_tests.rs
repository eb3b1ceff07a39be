//! Session tests against an in-memory broker
//!
//! Each client transport is one end of a `tokio::io::duplex` pipe; the test
//! plays the broker on the other end, speaking NUL-terminated frames.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scorecast_core::protocol::headers;
use scorecast_core::{Command, Frame, GameReport};
use scorecast_runtime::{
    ClientConfig, ClientError, Connector, Console, GameClient, Phase, StreamTransport, Transport,
    TransportError,
};
use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};

const TOPIC: &str = "Germany_Japan";

const EVENT_FILE: &str = r#"{
    "team a": "Germany",
    "team b": "Japan",
    "events": [
        {
            "event name": "kickoff",
            "time": 0,
            "game updates": { "active": true, "before halftime": true },
            "team a updates": { "goals": "0" },
            "team b updates": { "goals": "0" },
            "description": "And we're off!"
        },
        {
            "event name": "goal!!!!",
            "time": 1980,
            "game updates": {},
            "team a updates": { "goals": "1" },
            "team b updates": {},
            "description": "GOOOAAALLL!!!\nGermany lead"
        }
    ]
}"#;

// ----------------------------------------------------------------------------
// Test Broker
// ----------------------------------------------------------------------------

type DuplexTransport = StreamTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

struct Broker {
    transport: DuplexTransport,
}

impl Broker {
    async fn next_frame(&self) -> Frame {
        let text = tokio::time::timeout(Duration::from_secs(2), self.transport.receive_frame())
            .await
            .expect("broker timed out waiting for a frame")
            .expect("broker transport failed");
        Frame::parse(&text)
    }

    async fn expect(&self, command: Command) -> Frame {
        let frame = self.next_frame().await;
        assert_eq!(frame.command(), &command);
        frame
    }

    /// Nothing arrives within a short window
    async fn expect_silence(&self) {
        let result =
            tokio::time::timeout(Duration::from_millis(100), self.transport.receive_frame()).await;
        assert!(result.is_err(), "unexpected frame: {:?}", result);
    }

    /// The client closed its side of the stream
    async fn expect_closed(&self) {
        let result = tokio::time::timeout(Duration::from_secs(2), self.transport.receive_frame())
            .await
            .expect("broker timed out waiting for close");
        assert!(matches!(result, Err(TransportError::StreamEnded)), "got {:?}", result);
    }

    async fn reply(&self, frame: Frame) {
        self.transport
            .send_frame(&frame.serialize())
            .await
            .expect("broker send failed");
    }

    async fn receipt(&self, request: &Frame) {
        let receipt = request.header(headers::RECEIPT).expect("request carries a receipt");
        self.reply(Frame::new(Command::Receipt).with_header(headers::RECEIPT_ID, receipt))
            .await;
    }

    async fn message(&self, report: &GameReport) {
        let frame = Frame::new(Command::Message)
            .with_header("subscription", 1)
            .with_header("message-id", 42)
            .with_header(headers::DESTINATION, TOPIC)
            .with_body(report.to_body());
        self.reply(frame).await;
    }
}

fn pipe() -> (Arc<dyn Transport>, Broker) {
    let (client, broker) = duplex(64 * 1024);
    let (cr, cw) = split(client);
    let (br, bw) = split(broker);
    let transport: Arc<dyn Transport> = Arc::new(StreamTransport::new(cr, cw));
    (
        transport,
        Broker {
            transport: StreamTransport::new(br, bw),
        },
    )
}

/// Hands out prepared transports in order, then refuses
struct ScriptedConnector {
    transports: Mutex<VecDeque<Arc<dyn Transport>>>,
}

impl ScriptedConnector {
    fn new(transports: Vec<Arc<dyn Transport>>) -> Arc<Self> {
        Arc::new(Self {
            transports: Mutex::new(transports.into()),
        })
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        self.transports
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Connect {
                address: address.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            })
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn client_with(transports: Vec<Arc<dyn Transport>>) -> (GameClient, Console) {
    let console = Console::captured();
    let client = GameClient::new(
        ScriptedConnector::new(transports),
        ClientConfig::default(),
        console.clone(),
    );
    (client, console)
}

async fn logged_in(user: &str) -> (GameClient, Broker, Console) {
    let (transport, broker) = pipe();
    let (mut client, console) = client_with(vec![transport]);

    client.login("127.0.0.1:7777", user, "secret").await.unwrap();
    broker.expect(Command::Connect).await;
    broker
        .reply(Frame::new(Command::Connected).with_header("version", "1.2"))
        .await;
    wait_until(|| client.phase() == Phase::LoggedIn).await;

    (client, broker, console)
}

async fn joined(user: &str) -> (GameClient, Broker, Console) {
    let (client, broker, console) = logged_in(user).await;
    client.join(TOPIC).await.unwrap();
    let subscribe = broker.expect(Command::Subscribe).await;
    broker.receipt(&subscribe).await;
    wait_until(|| console.lines().iter().any(|l| l == "Joined channel Germany_Japan")).await;
    (client, broker, console)
}

fn write_event_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("germany_japan.json");
    std::fs::write(&path, EVENT_FILE).unwrap();
    path
}

fn count(console: &Console, line: &str) -> usize {
    console.lines().iter().filter(|l| *l == line).count()
}

// ----------------------------------------------------------------------------
// Login
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_login_sends_connect_headers() {
    let (transport, broker) = pipe();
    let (mut client, console) = client_with(vec![transport]);

    client.login("127.0.0.1:7777", "alice", "secret").await.unwrap();
    assert_eq!(client.phase(), Phase::AwaitingLogin);

    let connect = broker.expect(Command::Connect).await;
    assert_eq!(connect.header(headers::ACCEPT_VERSION), Some("1.2"));
    assert_eq!(connect.header(headers::HOST), Some("stomp.cs.bgu.ac.il"));
    assert_eq!(connect.header(headers::LOGIN), Some("alice"));
    assert_eq!(connect.header(headers::PASSCODE), Some("secret"));

    broker.reply(Frame::new(Command::Connected)).await;
    wait_until(|| client.phase() == Phase::LoggedIn).await;
    assert_eq!(console.lines(), vec!["Login successful"]);
    assert_eq!(client.username().as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_second_login_rejected() {
    let (mut client, _broker, _console) = logged_in("alice").await;
    let err = client.login("127.0.0.1:7777", "bob", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::AlreadyLoggedIn));
    assert_eq!(
        err.to_string(),
        "The client is already logged in, log out before trying again"
    );
    assert_eq!(client.phase(), Phase::LoggedIn);
}

#[tokio::test]
async fn test_wrong_password_then_login_again() {
    let (first, first_broker) = pipe();
    let (second, second_broker) = pipe();
    let (mut client, console) = client_with(vec![first, second]);

    client.login("127.0.0.1:7777", "alice", "bad").await.unwrap();
    first_broker.expect(Command::Connect).await;
    first_broker
        .reply(Frame::new(Command::Error).with_header(headers::MESSAGE, "Wrong password"))
        .await;

    wait_until(|| client.phase() == Phase::Disconnected).await;
    first_broker.expect_closed().await;
    assert_eq!(console.lines(), vec!["Wrong password"]);

    client.login("127.0.0.1:7777", "alice", "good").await.unwrap();
    let connect = second_broker.expect(Command::Connect).await;
    assert_eq!(connect.header(headers::PASSCODE), Some("good"));
    second_broker.reply(Frame::new(Command::Connected)).await;
    wait_until(|| client.phase() == Phase::LoggedIn).await;
}

#[tokio::test]
async fn test_error_message_translated() {
    let (client, broker, console) = logged_in("alice").await;
    broker
        .reply(Frame::new(Command::Error).with_header(headers::MESSAGE, "User already logged in"))
        .await;
    wait_until(|| client.phase() == Phase::Disconnected).await;
    assert_eq!(count(&console, "User already logged in"), 1);
}

#[tokio::test]
async fn test_connect_failure_stays_disconnected() {
    let (mut client, _console) = client_with(Vec::new());
    let err = client.login("127.0.0.1:7777", "alice", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::Connect(_)));
    assert_eq!(err.to_string(), "Could not connect to server");
    assert_eq!(client.phase(), Phase::Disconnected);
}

#[tokio::test]
async fn test_send_failure_during_login_tears_down() {
    let (transport, broker) = pipe();
    drop(broker);
    let (mut client, _console) = client_with(vec![transport]);

    assert!(client.login("127.0.0.1:7777", "alice", "pw").await.is_err());
    wait_until(|| client.phase() == Phase::Disconnected).await;
}

#[tokio::test]
async fn test_stream_end_tears_down_silently() {
    let (client, broker, console) = logged_in("alice").await;
    drop(broker);
    wait_until(|| client.phase() == Phase::Disconnected).await;
    assert_eq!(console.lines(), vec!["Login successful"]);
}

#[tokio::test]
async fn test_commands_require_login() {
    let (mut client, _console) = client_with(Vec::new());
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(client.join(TOPIC).await, Err(ClientError::NotLoggedIn)));
    assert!(matches!(client.exit(TOPIC).await, Err(ClientError::NotLoggedIn)));
    assert!(matches!(
        client.report(dir.path().join("missing.json")).await,
        Err(ClientError::NotLoggedIn)
    ));
    assert!(matches!(
        client.summary(TOPIC, "alice", dir.path().join("out.txt")).await,
        Err(ClientError::NotLoggedIn)
    ));
    let err = client.logout().await.unwrap_err();
    assert_eq!(err.to_string(), "Please login first");
}

// ----------------------------------------------------------------------------
// Subscriptions and Receipts
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_join_confirmed_on_receipt() {
    let (client, broker, console) = logged_in("alice").await;

    client.join(TOPIC).await.unwrap();
    let subscribe = broker.expect(Command::Subscribe).await;
    assert_eq!(subscribe.header(headers::DESTINATION), Some(TOPIC));
    assert_eq!(
        subscribe.header(headers::ID).map(str::to_string),
        client.subscription_id(TOPIC).map(|id| id.to_string())
    );
    assert_eq!(count(&console, "Joined channel Germany_Japan"), 0);

    // A second join is a no-op
    client.join(TOPIC).await.unwrap();
    broker.receipt(&subscribe).await;
    broker.expect_silence().await;

    assert_eq!(count(&console, "Joined channel Germany_Japan"), 1);
    assert_eq!(client.pending_receipts(), 0);
}

#[tokio::test]
async fn test_exit_twice_sends_one_unsubscribe() {
    let (client, broker, console) = joined("alice").await;
    let subscription_id = client.subscription_id(TOPIC).unwrap();

    client.exit(TOPIC).await.unwrap();
    assert!(!client.is_subscribed(TOPIC));
    let err = client.exit(TOPIC).await.unwrap_err();
    assert_eq!(err.to_string(), "Not subscribed to channel Germany_Japan");

    let unsubscribe = broker.expect(Command::Unsubscribe).await;
    assert_eq!(
        unsubscribe.header(headers::ID),
        Some(subscription_id.to_string().as_str())
    );
    broker.expect_silence().await;

    broker.receipt(&unsubscribe).await;
    wait_until(|| count(&console, "Exited channel Germany_Japan") == 1).await;
}

#[tokio::test]
async fn test_receipts_consumed_exactly_once() {
    let (client, broker, console) = logged_in("alice").await;
    let topics = ["a_b", "c_d", "e_f"];

    let mut requests = Vec::new();
    for topic in topics {
        client.join(topic).await.unwrap();
        requests.push(broker.expect(Command::Subscribe).await);
    }
    assert_eq!(client.pending_receipts(), 3);

    broker.receipt(&requests[0]).await;
    broker.receipt(&requests[1]).await;
    broker.receipt(&requests[0]).await;
    broker.receipt(&requests[2]).await;

    wait_until(|| count(&console, "Joined channel e_f") == 1).await;
    for topic in topics {
        assert_eq!(count(&console, &format!("Joined channel {}", topic)), 1);
    }
    assert_eq!(client.pending_receipts(), 0);
}

// ----------------------------------------------------------------------------
// Reports
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_report_applied_locally_before_echo() {
    let (client, broker, _console) = joined("alice").await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_event_file(&dir);

    client.report(&path).await.unwrap();

    let record = client.snapshot(TOPIC, "alice").expect("own report applied");
    assert_eq!(record.events().len(), 2);
    assert_eq!(record.team_a_stats().get("goals").map(String::as_str), Some("1"));

    let first = broker.expect(Command::Send).await;
    assert_eq!(first.header(headers::DESTINATION), Some(TOPIC));
    assert_eq!(
        first.header(headers::FILE),
        Some(path.to_string_lossy().as_ref())
    );
    let report = GameReport::from_body(first.body());
    assert_eq!(report.user, "alice");
    assert_eq!(report.event_name, "kickoff");
    assert_eq!(report.general_updates.get("active").map(String::as_str), Some("true"));

    let second = broker.expect(Command::Send).await;
    let report = GameReport::from_body(second.body());
    assert_eq!(report.time, 1980);
    assert_eq!(report.description, "GOOOAAALLL!!!\nGermany lead");
}

#[tokio::test]
async fn test_report_with_unreadable_event_file() {
    let (client, broker, _console) = joined("alice").await;
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.json");
    let err = client.report(&missing).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::EventFile(scorecast_core::EventFileError::Io { ref path, .. }) if *path == missing
    ));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ \"team a\": ").unwrap();
    let err = client.report(&broken).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::EventFile(scorecast_core::EventFileError::Json { .. })
    ));
    assert!(err.to_string().contains("broken.json"));

    broker.expect_silence().await;
    assert_eq!(client.phase(), Phase::LoggedIn);
}

#[tokio::test]
async fn test_report_requires_subscription() {
    let (client, broker, _console) = logged_in("alice").await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_event_file(&dir);

    let err = client.report(&path).await.unwrap_err();
    assert!(matches!(err, ClientError::NotSubscribed(ref topic) if topic == TOPIC));
    broker.expect_silence().await;
    assert!(client.snapshot(TOPIC, "alice").is_none());
}

#[tokio::test]
async fn test_incoming_reports_include_own_echo() {
    let (client, broker, _console) = joined("alice").await;
    let dir = tempfile::tempdir().unwrap();
    client.report(write_event_file(&dir)).await.unwrap();
    let echo = broker.expect(Command::Send).await;
    broker.expect(Command::Send).await;

    broker.message(&GameReport::from_body(echo.body())).await;
    let from_bob = GameReport {
        user: "bob".to_string(),
        team_a: "Germany".to_string(),
        team_b: "Japan".to_string(),
        event_name: "yellow card".to_string(),
        time: 600,
        description: "Booked".to_string(),
        ..GameReport::default()
    };
    broker.message(&from_bob).await;

    wait_until(|| client.snapshot(TOPIC, "bob").is_some()).await;
    let bob = client.snapshot(TOPIC, "bob").unwrap();
    assert_eq!(bob.events().len(), 1);
    assert_eq!(bob.team_a(), "Germany");

    // The echo of our own report is recorded like any other message
    let alice = client.snapshot(TOPIC, "alice").unwrap();
    assert_eq!(alice.events().len(), 3);
    let kickoffs = alice.events().iter().filter(|e| e.name == "kickoff").count();
    assert_eq!(kickoffs, 2);
}

#[tokio::test]
async fn test_summary_written_and_not_found() {
    let (client, broker, _console) = joined("alice").await;
    let dir = tempfile::tempdir().unwrap();
    client.report(write_event_file(&dir)).await.unwrap();
    broker.expect(Command::Send).await;
    broker.expect(Command::Send).await;

    let output = dir.path().join("summary.txt");
    std::fs::write(&output, "stale contents that are much longer than nothing\n".repeat(50)).unwrap();
    client.summary(TOPIC, "alice", &output).await.unwrap();

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("Germany vs Japan\nGame stats:\nGeneral stats:\n"));
    assert!(text.contains("0 - kickoff:\nAnd we're off!\n"));
    assert!(!text.contains("stale contents"));

    let err = client
        .summary(TOPIC, "carol", dir.path().join("none.txt"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No data for requested game/user");
    assert!(!dir.path().join("none.txt").exists());
}

// ----------------------------------------------------------------------------
// Logout and Shutdown
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_logout_waits_for_receipt() {
    let (mut client, broker, _console) = joined("alice").await;
    let receipt_sent = Arc::new(AtomicBool::new(false));

    let broker_task = {
        let receipt_sent = Arc::clone(&receipt_sent);
        tokio::spawn(async move {
            let disconnect = broker.expect(Command::Disconnect).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            receipt_sent.store(true, Ordering::SeqCst);
            broker.receipt(&disconnect).await;
            broker
        })
    };

    client.logout().await.unwrap();
    assert!(receipt_sent.load(Ordering::SeqCst));
    assert_eq!(client.phase(), Phase::Disconnected);
    assert!(!client.is_subscribed(TOPIC));
    assert_eq!(client.pending_receipts(), 0);

    let broker = broker_task.await.unwrap();
    broker.expect_closed().await;
}

#[tokio::test]
async fn test_store_survives_logout() {
    let (first, first_broker) = pipe();
    let (second, second_broker) = pipe();
    let (mut client, console) = client_with(vec![first, second]);

    client.login("127.0.0.1:7777", "alice", "pw").await.unwrap();
    first_broker.expect(Command::Connect).await;
    first_broker.reply(Frame::new(Command::Connected)).await;
    wait_until(|| client.phase() == Phase::LoggedIn).await;

    client.join(TOPIC).await.unwrap();
    let subscribe = first_broker.expect(Command::Subscribe).await;
    first_broker.receipt(&subscribe).await;
    let dir = tempfile::tempdir().unwrap();
    client.report(write_event_file(&dir)).await.unwrap();

    let logout = async {
        first_broker.expect(Command::Send).await;
        first_broker.expect(Command::Send).await;
        let disconnect = first_broker.expect(Command::Disconnect).await;
        first_broker.receipt(&disconnect).await;
    };
    let (result, ()) = tokio::join!(client.logout(), logout);
    result.unwrap();

    client.login("127.0.0.1:7777", "alice", "pw").await.unwrap();
    second_broker.expect(Command::Connect).await;
    second_broker.reply(Frame::new(Command::Connected)).await;
    wait_until(|| count(&console, "Login successful") == 2).await;

    assert!(!client.is_subscribed(TOPIC));
    assert_eq!(client.snapshot(TOPIC, "alice").unwrap().events().len(), 2);

    client.join(TOPIC).await.unwrap();
    let resubscribe = second_broker.expect(Command::Subscribe).await;
    let old: u64 = subscribe.header(headers::ID).unwrap().parse().unwrap();
    let new: u64 = resubscribe.header(headers::ID).unwrap().parse().unwrap();
    assert!(new > old);
}

#[tokio::test]
async fn test_shutdown_closes_transport() {
    let (mut client, broker, _console) = logged_in("alice").await;
    client.shutdown().await;
    assert_eq!(client.phase(), Phase::Disconnected);
    broker.expect_closed().await;

    // Shutting down twice is harmless
    client.shutdown().await;
}
