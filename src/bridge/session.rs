use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::envelope::{translate_inbound, translate_outbound, UpstreamEvent};
use super::{Leg, LivenessMonitor};
use crate::config::Settings;
use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Why the bridge loop stopped driving its legs.
#[derive(Debug)]
enum Shutdown {
    /// The given leg closed, errored, or rejected a send.
    LegClosed(Leg),
    /// The upstream handshake never completed.
    UpstreamFailed(BridgeError),
}

/// One paired inbound/outbound connection.
pub struct Session {
    id: Uuid,
    state: SessionState,
    settings: Arc<Settings>,
    pending_outbound: VecDeque<Message>,
    config_sent: bool,
    monitor: LivenessMonitor,
}

impl Session {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            settings,
            pending_outbound: VecDeque::new(),
            config_sent: false,
            monitor: LivenessMonitor::idle(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending_outbound.len()
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.monitor
    }

    /// Holds an already translated frame until the upstream leg is active.
    pub fn queue_outbound(&mut self, msg: Message) {
        if self.state == SessionState::Connecting {
            self.pending_outbound.push_back(msg);
        }
    }

    /// The configuration message, exactly once per session.
    pub fn take_session_update(&mut self) -> Option<Message> {
        if self.config_sent {
            return None;
        }
        self.config_sent = true;
        Some(UpstreamEvent::session_update(&self.settings.realtime).into_message())
    }

    /// Connecting -> Active. Returns the frames queued while connecting, in
    /// arrival order, for the caller to send after the configuration message.
    pub fn activate(&mut self) -> Vec<Message> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        self.state = SessionState::Active;
        self.pending_outbound.drain(..).collect()
    }

    pub fn start_liveness(&mut self) {
        if self.state == SessionState::Active {
            self.monitor = LivenessMonitor::start(self.settings.bridge_ping_interval());
        }
    }

    /// Enters Closing on the first close signal and returns the leg that still
    /// has to be closed. Later signals return `None`.
    pub fn begin_closing(&mut self, closed: Leg) -> Option<Leg> {
        match self.state {
            SessionState::Connecting | SessionState::Active => {
                self.state = SessionState::Closing;
                self.pending_outbound.clear();
                Some(closed.peer())
            }
            SessionState::Closing | SessionState::Closed => None,
        }
    }

    /// Cancels both timers and enters Closed.
    pub fn finish(&mut self) {
        self.monitor.cancel_all();
        self.state = SessionState::Closed;
    }

    /// Drives the session until either leg goes away, then tears down the other.
    ///
    /// `connect` opens the outbound leg; frames arriving on `inbound` before it
    /// resolves are queued and flushed right after the configuration message.
    pub async fn run<I, O, C>(mut self, inbound: I, connect: C) -> SessionState
    where
        I: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
        O: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
        C: Future<Output = Result<O, BridgeError>>,
    {
        let id = self.id;
        let (mut in_tx, mut in_rx) = inbound.split::<Message>();
        tokio::pin!(connect);

        let connected = loop {
            tokio::select! {
                result = &mut connect => break result,
                frame = in_rx.next() => match frame {
                    Some(Ok(msg)) if !msg.is_close() => {
                        if let Some(msg) = self.inbound_frame(msg) {
                            debug!("Session {} queued frame while connecting", id);
                            self.queue_outbound(msg);
                        }
                    }
                    other => {
                        self.log_leg_end(Leg::Inbound, other);
                        // Dropping the pending handshake closes the upstream socket.
                        self.teardown(Shutdown::LegClosed(Leg::Inbound), None::<&mut O>, &mut in_tx)
                            .await;
                        return self.state;
                    }
                },
            }
        };

        let outbound = match connected {
            Ok(outbound) => outbound,
            Err(e) => {
                self.teardown(Shutdown::UpstreamFailed(e), None::<&mut O>, &mut in_tx).await;
                return self.state;
            }
        };
        let (mut out_tx, mut out_rx) = outbound.split::<Message>();

        let shutdown = match self.open_outbound(&mut out_tx).await {
            Ok(()) => {
                info!("Session {} active", id);
                self.relay(&mut in_tx, &mut in_rx, &mut out_tx, &mut out_rx).await
            }
            Err(e) => {
                warn!("Session {}: {}", id, e);
                Shutdown::LegClosed(Leg::Outbound)
            }
        };

        self.teardown(shutdown, Some(&mut out_tx), &mut in_tx).await;
        self.state
    }

    /// Sends the configuration message, activates, then flushes the queue.
    async fn open_outbound<S>(&mut self, out_tx: &mut S) -> Result<(), BridgeError>
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        if let Some(config) = self.take_session_update() {
            send(out_tx, Leg::Outbound, config).await?;
        }
        let pending = self.activate();
        if !pending.is_empty() {
            debug!("Session {} flushing {} queued frames", self.id, pending.len());
        }
        for msg in pending {
            send(out_tx, Leg::Outbound, msg).await?;
        }
        self.start_liveness();
        Ok(())
    }

    async fn relay<IT, IR, OT, OR>(
        &mut self,
        in_tx: &mut IT,
        in_rx: &mut IR,
        out_tx: &mut OT,
        out_rx: &mut OR,
    ) -> Shutdown
    where
        IT: Sink<Message, Error = WsError> + Unpin,
        IR: Stream<Item = Result<Message, WsError>> + Unpin,
        OT: Sink<Message, Error = WsError> + Unpin,
        OR: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        loop {
            tokio::select! {
                frame = in_rx.next() => match frame {
                    Some(Ok(msg)) if !msg.is_close() => {
                        if let Some(msg) = self.inbound_frame(msg) {
                            if let Err(e) = send(out_tx, Leg::Outbound, msg).await {
                                warn!("Session {}: {}", self.id, e);
                                return Shutdown::LegClosed(Leg::Outbound);
                            }
                        }
                    }
                    other => {
                        self.log_leg_end(Leg::Inbound, other);
                        return Shutdown::LegClosed(Leg::Inbound);
                    }
                },
                frame = out_rx.next() => match frame {
                    Some(Ok(msg)) if !msg.is_close() => {
                        if let Some(msg) = self.outbound_frame(msg) {
                            if let Err(e) = send(in_tx, Leg::Inbound, msg).await {
                                warn!("Session {}: {}", self.id, e);
                                return Shutdown::LegClosed(Leg::Inbound);
                            }
                        }
                    }
                    other => {
                        self.log_leg_end(Leg::Outbound, other);
                        return Shutdown::LegClosed(Leg::Outbound);
                    }
                },
                leg = self.monitor.next_due() => {
                    let result = match leg {
                        Leg::Inbound => in_tx.send(Message::Ping(Vec::new())).await,
                        Leg::Outbound => out_tx.send(Message::Ping(Vec::new())).await,
                    };
                    if let Err(e) = result {
                        debug!("Session {} ping on {} leg failed: {}", self.id, leg, e);
                    }
                }
            }
        }
    }

    fn inbound_frame(&self, msg: Message) -> Option<Message> {
        if let Message::Binary(samples) = &msg {
            debug!("Session {} inbound audio block of {} bytes", self.id, samples.len());
        }
        translate_inbound(msg)
    }

    fn outbound_frame(&self, msg: Message) -> Option<Message> {
        translate_outbound(msg)
    }

    fn log_leg_end(&self, leg: Leg, frame: Option<Result<Message, WsError>>) {
        match frame {
            Some(Ok(Message::Close(Some(close)))) => info!(
                "Session {} {} leg closed ({}: {})",
                self.id, leg, close.code, close.reason
            ),
            Some(Err(e)) => warn!("Session {} {} leg error: {}", self.id, leg, e),
            _ => info!("Session {} {} leg closed", self.id, leg),
        }
    }

    /// Closes whichever leg is still open and cancels the timers.
    async fn teardown<OT, IT>(
        &mut self,
        shutdown: Shutdown,
        mut out_tx: Option<&mut OT>,
        in_tx: &mut IT,
    ) where
        OT: Sink<Message, Error = WsError> + Unpin,
        IT: Sink<Message, Error = WsError> + Unpin,
    {
        let closed = match shutdown {
            Shutdown::LegClosed(leg) => leg,
            Shutdown::UpstreamFailed(e) => {
                error!("Session {}: {}", self.id, e);
                Leg::Outbound
            }
        };

        if let Some(peer) = self.begin_closing(closed) {
            // Peer first, then the leg that ended so its close handshake completes.
            for leg in [peer, closed] {
                match leg {
                    Leg::Inbound => self.close_quietly(in_tx, leg).await,
                    Leg::Outbound => {
                        if let Some(out_tx) = out_tx.as_deref_mut() {
                            self.close_quietly(out_tx, leg).await;
                        }
                    }
                }
            }
        }

        self.finish();
        info!("Session {} closed", self.id);
    }

    async fn close_quietly<S>(&self, sink: &mut S, leg: Leg)
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        if let Err(e) = sink.close().await {
            debug!("Session {} close of {} leg: {}", self.id, leg, e);
        }
    }
}

async fn send<S>(sink: &mut S, leg: Leg, msg: Message) -> Result<(), BridgeError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    sink.send(msg).await.map_err(|e| BridgeError::ForwardFailed {
        leg,
        reason: e.to_string(),
    })
}
