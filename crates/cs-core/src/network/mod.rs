//! Realtime channel wire protocol and connection state.
mod protocol;
mod state;

pub use protocol::{decode_inbound, InboundMessage, OutboundMessage, ProtocolError, PushEvent};
pub use state::{ChannelState, DisconnectReason};
