//! Client protocol settings

use serde::{Deserialize, Serialize};

/// Settings that shape the frames the client sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Value of the CONNECT `accept-version` header
    pub accept_version: String,
    /// Value of the CONNECT `host` header
    pub virtual_host: String,
    /// Whether SEND frames name their source event file in a `file` header
    pub attach_file_header: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            accept_version: "1.2".to_string(),
            virtual_host: "stomp.cs.bgu.ac.il".to_string(),
            attach_file_header: true,
        }
    }
}
