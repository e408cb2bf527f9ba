use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ids::DeviceId;

/// Frame surfaced by a transport to the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    Text(String),
    /// The socket is gone; carries the close reason if the peer sent one.
    Closed(Option<String>),
}

/// An open socket, as a pair of channels.
///
/// Dropping `outbound` closes the socket. A failed `outbound.send` means the
/// writer is gone and the connection must be treated as dead.
#[derive(Debug)]
pub struct RealtimeLink {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<TransportFrame>,
}

#[async_trait]
pub trait RealtimeTransportPort: Send + Sync {
    /// Open a socket to `{ws_base}/{token}/{device_id}`; resolves after the handshake.
    async fn connect(&self, token: &str, device_id: &DeviceId) -> anyhow::Result<RealtimeLink>;
}
