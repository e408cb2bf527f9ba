//! WebSocket transport for the realtime channel.
//!
//! Each connection is split into a writer task draining the outbound queue
//! and a reader task forwarding text frames. Heartbeats and reconnects live
//! in the channel, not here.
//!
//! 每个连接拆分为写任务与读任务；心跳与重连由上层通道负责。

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info_span, Instrument};

use cs_core::config::ServerConfig;
use cs_core::ports::{RealtimeLink, RealtimeTransportPort, TransportFrame};
use cs_core::DeviceId;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_BUFFER: usize = 32;
const INBOUND_BUFFER: usize = 256;

pub struct WsRealtimeTransport {
    ws_base_url: String,
    connect_timeout: Duration,
}

impl WsRealtimeTransport {
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.ws_base_url.clone())
            .with_connect_timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self, token: &str, device_id: &DeviceId) -> String {
        format!("{}/{}/{}", self.ws_base_url, token, device_id)
    }
}

#[async_trait]
impl RealtimeTransportPort for WsRealtimeTransport {
    async fn connect(&self, token: &str, device_id: &DeviceId) -> anyhow::Result<RealtimeLink> {
        let url = self.endpoint(token, device_id);
        let (socket, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .context("websocket connect timed out")?
            .context("websocket handshake failed")?;

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel::<TransportFrame>(INBOUND_BUFFER);
        let span = info_span!("ws_link", device_id = %device_id);

        tokio::spawn(
            async move {
                while let Some(text) = outbound_rx.recv().await {
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        debug!(error = %err, "Websocket write failed");
                        return;
                    }
                }
                // Outbound side dropped: close the socket politely.
                let _ = sink.close().await;
            }
            .instrument(span.clone()),
        );

        tokio::spawn(
            async move {
                let reason = loop {
                    match stream.next().await {
                        Some(Ok(Message::Text(text))) => {
                            let frame = TransportFrame::Text(text.as_str().to_owned());
                            if inbound_tx.send(frame).await.is_err() {
                                return;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break frame
                                .map(|f| f.reason.as_str().to_owned())
                                .filter(|reason| !reason.is_empty());
                        }
                        // Protocol-level ping/pong is answered by tungstenite.
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => break Some(err.to_string()),
                        None => break None,
                    }
                };
                debug!(reason = ?reason, "Websocket closed");
                let _ = inbound_tx.send(TransportFrame::Closed(reason)).await;
            }
            .instrument(span),
        );

        Ok(RealtimeLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    #[test]
    fn endpoint_puts_token_and_device_in_path() {
        let transport = WsRealtimeTransport::new("ws://host:8000/ws/");
        assert_eq!(
            transport.endpoint("tok", &DeviceId::from("dev")),
            "ws://host:8000/ws/tok/dev"
        );
    }

    #[tokio::test]
    async fn forwards_text_frames_and_close_reason() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (path_tx, path_rx) = oneshot::channel::<String>();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback =
                move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let _ = path_tx.send(req.uri().path().to_string());
                    Ok(resp)
                };
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();

            let first = ws.next().await.unwrap().unwrap();
            assert_eq!(first.to_text().unwrap(), r#"{"type":"ping"}"#);
            ws.send(Message::Text(r#"{"type":"pong"}"#.into()))
                .await
                .unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            }))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let transport = WsRealtimeTransport::new(format!("ws://{}/ws", addr));
        let mut link = transport
            .connect("tok", &DeviceId::from("dev-1"))
            .await
            .unwrap();
        assert_eq!(path_rx.await.unwrap(), "/ws/tok/dev-1");

        link.outbound
            .send(r#"{"type":"ping"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(
            link.inbound.recv().await,
            Some(TransportFrame::Text(r#"{"type":"pong"}"#.to_string()))
        );
        assert_eq!(
            link.inbound.recv().await,
            Some(TransportFrame::Closed(Some("bye".to_string())))
        );
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WsRealtimeTransport::new(format!("ws://{}", addr))
            .with_connect_timeout(Duration::from_secs(2));
        assert!(transport.connect("t", &DeviceId::from("d")).await.is_err());
    }
}
