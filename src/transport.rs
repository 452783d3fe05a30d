//! Transport connector: the one streaming connection to the backend event channel
//!
//! A single background task owns the socket together with its keepalive and reconnect
//! timers:
//!
//! ```text
//! Connecting --dial ok--> Connected --close/error--> Disconnected --2s--> Connecting
//!      \--dial error----------------------------------/
//! ```
//!
//! Because the timers live inside that task they are dropped with it, whatever the exit
//! path. Sockets are reached through the [`Dialer`] / [`StreamLink`] seam so the
//! lifecycle can be driven without a network.

use crate::constants::transport::PING_FRAME;
use crate::types::{AppEvent, ConnectionState, StreamMessage};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};

/// One open text-frame connection
#[async_trait]
pub trait StreamLink: Send {
    async fn send_text(&mut self, text: &str) -> anyhow::Result<()>;
    /// Next text frame; `None` once the connection has closed or errored
    async fn recv_text(&mut self) -> Option<String>;
    async fn close(&mut self);
}

#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, url: &str) -> anyhow::Result<Box<dyn StreamLink>>;
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub url: String,
    pub keepalive: Duration,
    pub reconnect_delay: Duration,
}

pub struct TransportConnector {
    cfg: TransportConfig,
    dialer: Arc<dyn Dialer>,
    events: UnboundedSender<AppEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl TransportConnector {
    pub fn new(cfg: TransportConfig, dialer: Arc<dyn Dialer>, events: UnboundedSender<AppEvent>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            cfg,
            dialer,
            events,
            state: Arc::new(state),
            shutdown: None,
            task: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state changes without polling
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start the connection task. Returns false (and does nothing) while a task already
    /// owns the connection, so at most one socket and one reconnect timer ever exist.
    pub fn connect(&mut self) -> bool {
        if self.is_running() {
            log::debug!("[transport] connect ignored, already {:?}", self.state());
            return false;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let session = Session {
            cfg: self.cfg.clone(),
            dialer: self.dialer.clone(),
            events: self.events.clone(),
            state: self.state.clone(),
        };
        self.task = Some(tokio::spawn(session.run(stop_rx)));
        self.shutdown = Some(stop_tx);
        true
    }

    /// Cancel timers, close the live connection and wait for the task to finish
    pub async fn shutdown(&mut self) {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("[transport] task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for TransportConnector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Session {
    cfg: TransportConfig,
    dialer: Arc<dyn Dialer>,
    events: UnboundedSender<AppEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Session {
    fn publish(&self, s: ConnectionState) {
        self.state.send_replace(s);
        let _ = self.events.send(AppEvent::Connection(s));
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        log::info!("[transport] starting - {}", self.cfg.url);
        loop {
            self.publish(ConnectionState::Connecting);
            let dialed = tokio::select! {
                r = self.dialer.dial(&self.cfg.url) => r,
                _ = stop.changed() => break,
            };
            match dialed {
                Ok(mut link) => {
                    log::info!("[transport] connected");
                    self.publish(ConnectionState::Connected);
                    let stopped = self.pump(link.as_mut(), &mut stop).await;
                    if stopped {
                        link.close().await;
                        break;
                    }
                    log::warn!("[transport] connection closed");
                }
                Err(e) => log::warn!("[transport] connect failed: {e:#}"),
            }
            self.publish(ConnectionState::Disconnected);
            log::debug!("[transport] reconnecting in {:?}", self.cfg.reconnect_delay);
            tokio::select! {
                _ = sleep(self.cfg.reconnect_delay) => {}
                _ = stop.changed() => break,
            }
        }
        self.publish(ConnectionState::Disconnected);
        log::info!("[transport] stopped");
    }

    /// Forward frames until the link drops (false) or shutdown is requested (true)
    async fn pump(&self, link: &mut dyn StreamLink, stop: &mut watch::Receiver<bool>) -> bool {
        let period = self.cfg.keepalive;
        let mut keepalive = interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                frame = link.recv_text() => match frame {
                    Some(text) => self.dispatch(&text),
                    None => return false,
                },
                _ = keepalive.tick() => {
                    if let Err(e) = link.send_text(PING_FRAME).await {
                        log::debug!("[transport] keepalive skipped: {e}");
                    }
                }
                _ = stop.changed() => return true,
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match StreamMessage::parse(text) {
            Some(StreamMessage::Transaction(t)) => {
                let _ = self.events.send(AppEvent::Streamed(t));
            }
            Some(StreamMessage::Pong) | Some(StreamMessage::Ping) => {
                log::debug!("[transport] control frame");
            }
            None => log::debug!("[transport] dropping malformed frame ({} bytes)", text.len()),
        }
    }
}

#[cfg(feature = "native")]
pub use ws::WsDialer;

#[cfg(feature = "native")]
mod ws {
    use super::*;
    use anyhow::Context;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tungstenite::protocol::Message;

    /// tokio-tungstenite dialer
    pub struct WsDialer;

    struct WsLink {
        ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    }

    #[async_trait]
    impl Dialer for WsDialer {
        async fn dial(&self, url: &str) -> anyhow::Result<Box<dyn StreamLink>> {
            let (ws, _) = connect_async(url)
                .await
                .with_context(|| format!("connecting to {url}"))?;
            Ok(Box::new(WsLink { ws }))
        }
    }

    #[async_trait]
    impl StreamLink for WsLink {
        async fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
            self.ws.send(Message::Text(text.to_string())).await?;
            Ok(())
        }

        async fn recv_text(&mut self) -> Option<String> {
            loop {
                match self.ws.next().await? {
                    Ok(Message::Text(t)) => return Some(t),
                    Ok(Message::Close(_)) => return None,
                    Ok(_) => continue,
                    Err(e) => {
                        log::debug!("[transport] read error: {e}");
                        return None;
                    }
                }
            }
        }

        async fn close(&mut self) {
            let _ = self.ws.close(None).await;
        }
    }
}
