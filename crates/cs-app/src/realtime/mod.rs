//! Realtime sync channel over a persistent socket.
mod channel;

pub use channel::{ChannelConfig, RealtimeSyncChannel};
