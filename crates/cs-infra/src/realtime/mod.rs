mod ws_transport;

pub use ws_transport::WsRealtimeTransport;
