//! Text frame codec
//!
//! A frame is a command line, zero or more `key:value` header lines, a blank
//! line, and a body that runs to the end of the text. The NUL terminator that
//! delimits frames on the byte stream belongs to the transport and never
//! appears in the text handled here.
//!
//! Parsing never fails. Header lines without a colon are kept as a key with
//! an empty value, which is lossy: a broker that sends `key` and one that
//! sends `key:` are indistinguishable after parsing.

use core::fmt;

// ----------------------------------------------------------------------------
// Header Names
// ----------------------------------------------------------------------------

/// Header names used by the client and the broker
pub mod headers {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const HOST: &str = "host";
    pub const LOGIN: &str = "login";
    pub const PASSCODE: &str = "passcode";
    pub const DESTINATION: &str = "destination";
    pub const ID: &str = "id";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const MESSAGE: &str = "message";
    pub const FILE: &str = "file";
}

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Frame command token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    // Client frames
    Connect,
    Subscribe,
    Unsubscribe,
    Send,
    Disconnect,
    // Broker frames
    Connected,
    Message,
    Receipt,
    Error,
    /// Any token this client does not know
    Other(String),
}

impl Command {
    /// Map a command token to a command; unknown tokens are preserved
    pub fn parse(token: &str) -> Self {
        match token {
            "CONNECT" => Command::Connect,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => Command::Other(other.to_string()),
        }
    }

    /// Wire token for this command
    pub fn as_str(&self) -> &str {
        match self {
            Command::Connect => "CONNECT",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Other(token) => token,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One protocol message unit
///
/// Headers keep their insertion order for serialization. Keys are unique:
/// setting an existing key replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    headers: Vec<(String, String)>,
    body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Builder form of [`Frame::set_header`]
    pub fn with_header(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_header(key, value);
        self
    }

    /// Replace the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header; the last write for a key wins
    pub fn set_header(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.headers.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Look up a header value
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Headers in insertion order
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Encode to frame text, without the transport terminator
    pub fn serialize(&self) -> String {
        let header_len: usize = self
            .headers
            .iter()
            .map(|(k, v)| k.len() + v.len() + 2)
            .sum();
        let mut out =
            String::with_capacity(self.command.as_str().len() + header_len + self.body.len() + 2);

        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }

    /// Decode frame text received from the transport
    ///
    /// Leading end-of-line bytes (heart-beats) are skipped and a trailing
    /// `\r` on the command and header lines is dropped. The first empty line
    /// ends the header section; everything after it is the body, verbatim.
    /// Without a separator the header section runs to the end of the text
    /// and the body is empty.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_start_matches(['\r', '\n']);
        let (command_line, mut rest) = match text.split_once('\n') {
            Some((line, rest)) => (line, Some(rest)),
            None => (text, None),
        };

        let mut frame = Frame::new(Command::parse(strip_cr(command_line)));

        while let Some(section) = rest {
            let (line, remainder) = match section.split_once('\n') {
                Some((line, remainder)) => (line, Some(remainder)),
                None => (section, None),
            };
            let line = strip_cr(line);

            if line.is_empty() {
                if let Some(body) = remainder {
                    frame.body = body.to_string();
                }
                break;
            }

            let (key, value) = split_header(line);
            if !key.is_empty() {
                frame.set_header(key, value);
            }
            rest = remainder;
        }

        frame
    }

    // ------------------------------------------------------------------------
    // Client frame constructors
    // ------------------------------------------------------------------------

    /// CONNECT frame carrying credentials
    pub fn connect(accept_version: &str, host: &str, login: &str, passcode: &str) -> Self {
        Frame::new(Command::Connect)
            .with_header(headers::ACCEPT_VERSION, accept_version)
            .with_header(headers::HOST, host)
            .with_header(headers::LOGIN, login)
            .with_header(headers::PASSCODE, passcode)
    }

    /// SUBSCRIBE frame requesting a receipt
    pub fn subscribe(destination: &str, subscription_id: u64, receipt_id: u64) -> Self {
        Frame::new(Command::Subscribe)
            .with_header(headers::DESTINATION, destination)
            .with_header(headers::ID, subscription_id)
            .with_header(headers::RECEIPT, receipt_id)
    }

    /// UNSUBSCRIBE frame requesting a receipt
    pub fn unsubscribe(subscription_id: u64, receipt_id: u64) -> Self {
        Frame::new(Command::Unsubscribe)
            .with_header(headers::ID, subscription_id)
            .with_header(headers::RECEIPT, receipt_id)
    }

    /// DISCONNECT frame requesting a receipt
    pub fn disconnect(receipt_id: u64) -> Self {
        Frame::new(Command::Disconnect).with_header(headers::RECEIPT, receipt_id)
    }

    /// SEND frame publishing a body to a destination
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .with_header(headers::DESTINATION, destination)
            .with_body(body)
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split on the first colon; a line without one becomes a key with an empty value
fn split_header(line: &str) -> (&str, &str) {
    line.split_once(':').unwrap_or((line, ""))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
