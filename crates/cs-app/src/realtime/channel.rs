//! Realtime sync channel
//! 实时同步通道
//!
//! State machine {Disconnected, Connecting, Connected} with an application
//! level heartbeat and a fixed-delay reconnect supervisor.
//!
//! - A `ping` goes out every heartbeat interval; no `pong` within the pong
//!   timeout, a failed send or a close frame ends the session.
//! - After an unintentional disconnect exactly one reconnect timer is
//!   pending. `connect` and `stop` abort it.
//! - `pong` frames are consumed here and never forwarded.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use cs_core::config::SyncConfig;
use cs_core::network::decode_inbound;
use cs_core::ports::{RealtimeLink, RealtimeTransportPort, TransportFrame};
use cs_core::{ChannelState, DeviceId, DisconnectReason, InboundMessage, OutboundMessage, PushEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub heartbeat_interval: Duration,
    pub pong_timeout: Duration,
    pub reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for ChannelConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs.max(1)),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        }
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    token: String,
    device_id: DeviceId,
}

#[derive(Default)]
struct Control {
    credentials: Option<Credentials>,
    stopped: bool,
    /// Bumped by `connect` and `stop`; stale sessions and timers compare against it.
    generation: u64,
    session: CancellationToken,
    reconnect: Option<JoinHandle<()>>,
}

struct Shared {
    transport: Arc<dyn RealtimeTransportPort>,
    config: ChannelConfig,
    state: watch::Sender<ChannelState>,
    events: mpsc::UnboundedSender<PushEvent>,
    control: Mutex<Control>,
}

#[derive(Clone)]
pub struct RealtimeSyncChannel {
    shared: Arc<Shared>,
}

impl RealtimeSyncChannel {
    /// Returns the channel and the stream of business events it receives.
    pub fn new(
        transport: Arc<dyn RealtimeTransportPort>,
        config: ChannelConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PushEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let shared = Arc::new(Shared {
            transport,
            config,
            state,
            events,
            control: Mutex::new(Control::default()),
        });
        (Self { shared }, events_rx)
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Open the socket and start the heartbeat.
    ///
    /// On failure the reconnect timer is already scheduled when this returns.
    pub async fn connect(&self, token: &str, device_id: &DeviceId) -> Result<()> {
        let generation = {
            let mut control = self.shared.lock_control();
            control.credentials = Some(Credentials {
                token: token.to_string(),
                device_id: device_id.clone(),
            });
            control.stopped = false;
            if let Some(pending) = control.reconnect.take() {
                pending.abort();
            }
            control.session.cancel();
            control.session = CancellationToken::new();
            control.generation += 1;
            control.generation
        };

        Shared::open_session(&self.shared, generation).await
    }

    /// Reconnect with the last credentials right away.
    pub async fn reconnect_now(&self) -> Result<()> {
        let credentials = self.shared.lock_control().credentials.clone();
        match credentials {
            Some(credentials) => self.connect(&credentials.token, &credentials.device_id).await,
            None => anyhow::bail!("realtime channel was never connected"),
        }
    }

    /// Intentional disconnect. No reconnect follows.
    pub fn stop(&self) {
        {
            let mut control = self.shared.lock_control();
            control.stopped = true;
            control.generation += 1;
            control.session.cancel();
            if let Some(pending) = control.reconnect.take() {
                pending.abort();
            }
        }
        self.shared.set_state(ChannelState::Disconnected);
        info!("Realtime channel stopped");
    }
}

impl Shared {
    fn lock_control(&self) -> std::sync::MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: ChannelState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        let control = self.lock_control();
        control.generation == generation && !control.stopped
    }

    async fn open_session(shared: &Arc<Self>, generation: u64) -> Result<()> {
        let (credentials, session) = {
            let control = shared.lock_control();
            if control.generation != generation || control.stopped {
                return Ok(());
            }
            let credentials = control
                .credentials
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no credentials"))?;
            (credentials, control.session.clone())
        };

        shared.set_state(ChannelState::Connecting);
        debug!(device_id = %credentials.device_id, "Opening realtime connection");

        let link = match shared
            .transport
            .connect(&credentials.token, &credentials.device_id)
            .await
        {
            Ok(link) => link,
            Err(err) => {
                warn!(error = %err, "Realtime connect failed");
                Self::handle_disconnect(
                    shared,
                    generation,
                    DisconnectReason::ConnectFailed(err.to_string()),
                );
                return Err(err);
            }
        };

        if !shared.is_current(generation) {
            debug!("Connection superseded during handshake, dropping it");
            return Ok(());
        }

        shared.set_state(ChannelState::Connected);
        info!("Realtime channel connected");

        let span = info_span!("realtime.session", generation);
        let session_shared = Arc::clone(shared);
        tokio::spawn(
            async move {
                let reason = session_shared.run_session(link, session).await;
                Self::handle_disconnect(&session_shared, generation, reason);
            }
            .instrument(span),
        );
        Ok(())
    }

    async fn run_session(&self, mut link: RealtimeLink, cancel: CancellationToken) -> DisconnectReason {
        let heartbeat = self.config.heartbeat_interval;
        let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = pong_deadline;
            let pong_wait = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return DisconnectReason::Stopped,
                frame = link.inbound.recv() => match frame {
                    Some(TransportFrame::Text(text)) => {
                        if self.dispatch(&text) {
                            pong_deadline = None;
                        }
                    }
                    Some(TransportFrame::Closed(reason)) => return DisconnectReason::Closed(reason),
                    None => return DisconnectReason::Closed(None),
                },
                _ = pong_wait => return DisconnectReason::HeartbeatTimeout,
                _ = ticker.tick() => {
                    let ping = match OutboundMessage::Ping.to_json() {
                        Ok(ping) => ping,
                        Err(err) => {
                            warn!(error = %err, "Failed to encode ping");
                            continue;
                        }
                    };
                    if link.outbound.send(ping).await.is_err() {
                        return DisconnectReason::SendFailed;
                    }
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.config.pong_timeout);
                    }
                }
            }
        }
    }

    /// Decode one frame. Returns true for a pong.
    fn dispatch(&self, text: &str) -> bool {
        match decode_inbound(text) {
            Ok(InboundMessage::Pong) => true,
            Ok(InboundMessage::Event(PushEvent::Unknown(name))) => {
                warn!(event = %name, "Dropping unknown realtime event");
                false
            }
            Ok(InboundMessage::Event(event)) => {
                debug!(event = event.name(), "Realtime event received");
                if self.events.send(event).is_err() {
                    debug!("No realtime event subscriber");
                }
                false
            }
            Err(err) => {
                warn!(error = %err, "Dropping malformed realtime frame");
                false
            }
        }
    }

    fn handle_disconnect(shared: &Arc<Self>, generation: u64, reason: DisconnectReason) {
        let mut control = shared.lock_control();
        if control.generation != generation {
            // A newer connect or stop owns the state now.
            return;
        }

        shared.set_state(ChannelState::Disconnected);
        if reason.is_intentional() || control.stopped {
            return;
        }
        if control.reconnect.as_ref().is_some_and(|pending| !pending.is_finished()) {
            debug!("Reconnect already scheduled");
            return;
        }

        let delay = shared.config.reconnect_delay;
        warn!(%reason, delay_secs = delay.as_secs(), "Realtime channel disconnected, reconnecting");

        let timer_shared = Arc::clone(shared);
        control.reconnect = Some(tokio::spawn(async move {
            sleep(delay).await;
            timer_shared.lock_control().reconnect = None;
            // Failure reschedules through handle_disconnect.
            let _ = Self::open_session(&timer_shared, generation).await;
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Server side of one fake connection.
    struct ServerEnd {
        frames: mpsc::Sender<TransportFrame>,
        received: mpsc::Receiver<String>,
    }

    struct FakeTransport {
        connects: AtomicUsize,
        fail_first: AtomicUsize,
        servers: mpsc::UnboundedSender<ServerEnd>,
    }

    impl FakeTransport {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
            let (servers, servers_rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    connects: AtomicUsize::new(0),
                    fail_first: AtomicUsize::new(0),
                    servers,
                }),
                servers_rx,
            )
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RealtimeTransportPort for FakeTransport {
        async fn connect(&self, _token: &str, _device_id: &DeviceId) -> Result<RealtimeLink> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("connection refused");
            }
            let (outbound, received) = mpsc::channel(16);
            let (frames, inbound) = mpsc::channel(16);
            let _ = self.servers.send(ServerEnd { frames, received });
            Ok(RealtimeLink { outbound, inbound })
        }
    }

    fn config() -> ChannelConfig {
        ChannelConfig {
            heartbeat_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
        }
    }

    fn device() -> DeviceId {
        DeviceId::from("device-1")
    }

    fn assert_elapsed(started: Instant, secs: u64) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs) + Duration::from_millis(50),
            "expected ~{secs}s, got {elapsed:?}"
        );
    }

    async fn wait_for_state(channel: &RealtimeSyncChannel, wanted: ChannelState) {
        let mut state = channel.subscribe_state();
        state.wait_for(|state| *state == wanted).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_timeout_schedules_one_reconnect() {
        let (transport, mut servers) = FakeTransport::new();
        let (channel, _events) = RealtimeSyncChannel::new(transport.clone(), config());
        let started = Instant::now();

        channel.connect("token", &device()).await.unwrap();
        assert_eq!(channel.state(), ChannelState::Connected);
        let mut server = servers.recv().await.unwrap();

        let ping = server.received.recv().await.unwrap();
        assert_eq!(ping, r#"{"type":"ping"}"#);
        assert_elapsed(started, 30);

        wait_for_state(&channel, ChannelState::Disconnected).await;
        assert_elapsed(started, 40);

        let _second = servers.recv().await.unwrap();
        assert_elapsed(started, 45);
        assert_eq!(transport.connects(), 2);
        wait_for_state(&channel, ChannelState::Connected).await;

        // nothing else queued up behind the single timer
        sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.connects(), 2);
        drop(server);
    }

    #[tokio::test(start_paused = true)]
    async fn pong_keeps_session_alive() {
        let (transport, mut servers) = FakeTransport::new();
        let (channel, _events) = RealtimeSyncChannel::new(transport.clone(), config());
        channel.connect("token", &device()).await.unwrap();
        let mut server = servers.recv().await.unwrap();

        tokio::spawn(async move {
            while let Some(_ping) = server.received.recv().await {
                let pong = TransportFrame::Text(r#"{"type":"pong"}"#.to_string());
                if server.frames.send(pong).await.is_err() {
                    break;
                }
            }
        });

        sleep(Duration::from_secs(300)).await;
        assert_eq!(channel.state(), ChannelState::Connected);
        assert_eq!(transport.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_timer_fires_prevents_reconnect() {
        let (transport, mut servers) = FakeTransport::new();
        let (channel, _events) = RealtimeSyncChannel::new(transport.clone(), config());
        channel.connect("token", &device()).await.unwrap();
        let server = servers.recv().await.unwrap();

        server
            .frames
            .send(TransportFrame::Closed(Some("going away".into())))
            .await
            .unwrap();
        wait_for_state(&channel, ChannelState::Disconnected).await;

        channel.stop();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.connects(), 1);
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_retries_after_delay() {
        let (transport, mut servers) = FakeTransport::new();
        transport.fail_first.store(2, Ordering::SeqCst);
        let (channel, _events) = RealtimeSyncChannel::new(transport.clone(), config());
        let started = Instant::now();

        assert!(channel.connect("token", &device()).await.is_err());
        assert_eq!(channel.state(), ChannelState::Disconnected);

        let _server = servers.recv().await.unwrap();
        assert_elapsed(started, 10);
        assert_eq!(transport.connects(), 3);
        wait_for_state(&channel, ChannelState::Connected).await;
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_forwarded_and_pong_is_not() {
        let (transport, mut servers) = FakeTransport::new();
        let (channel, mut events) = RealtimeSyncChannel::new(transport.clone(), config());
        channel.connect("token", &device()).await.unwrap();
        let server = servers.recv().await.unwrap();

        for frame in [
            r#"{"type":"pong"}"#,
            r#"{"event":"mystery","data":{}}"#,
            "garbage",
            r#"{"event":"delete_item","data":{"id":3}}"#,
            r#"{"event":"sync"}"#,
        ] {
            server
                .frames
                .send(TransportFrame::Text(frame.to_string()))
                .await
                .unwrap();
        }

        match events.recv().await.unwrap() {
            PushEvent::DeleteItem(id) => assert_eq!(id.as_str(), "3"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(events.recv().await.unwrap(), PushEvent::Sync));
        assert!(events.try_recv().is_err());
        channel.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn manual_reconnect_replaces_pending_timer() {
        let (transport, mut servers) = FakeTransport::new();
        let (channel, _events) = RealtimeSyncChannel::new(transport.clone(), config());
        channel.connect("token", &device()).await.unwrap();
        let first = servers.recv().await.unwrap();
        drop(first);

        wait_for_state(&channel, ChannelState::Disconnected).await;

        channel.reconnect_now().await.unwrap();
        let _second = servers.recv().await.unwrap();
        assert_eq!(transport.connects(), 2);

        // the timer scheduled by the drop was aborted
        sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.connects(), 2);
        channel.stop();
    }
}
