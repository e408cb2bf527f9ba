use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Why a realtime session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server sent a close frame or the stream ended.
    Closed(Option<String>),
    SendFailed,
    HeartbeatTimeout,
    ConnectFailed(String),
    /// Explicit `stop()`; never followed by a reconnect.
    Stopped,
}

impl DisconnectReason {
    pub fn is_intentional(&self) -> bool {
        matches!(self, DisconnectReason::Stopped)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::Closed(Some(reason)) => write!(f, "closed: {reason}"),
            DisconnectReason::Closed(None) => f.write_str("closed"),
            DisconnectReason::SendFailed => f.write_str("send failed"),
            DisconnectReason::HeartbeatTimeout => f.write_str("heartbeat timeout"),
            DisconnectReason::ConnectFailed(err) => write!(f, "connect failed: {err}"),
            DisconnectReason::Stopped => f.write_str("stopped"),
        }
    }
}
