use futures_util::StreamExt;
use log::{info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::{
    select,
    sync::{mpsc, watch},
    task::{self, JoinHandle},
    time::{Instant, sleep_until, timeout},
};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Link health as observed by consumers. The channel itself only ever
/// publishes `Idle`, `Connecting`, `Good`, and `Fail`; `Warn` is folded in
/// by the aggregate when a transport error arrives on a live link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Good,
    Warn,
    Fail,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),
}

/// Inbound traffic, forwarded verbatim. Parsing is the consumer's job.
#[derive(Debug)]
pub enum ChannelEvent {
    Message(String),
    Error(ChannelError),
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    pub handshake_timeout: Duration,
    pub reconnect_delay: Duration,
    pub auto_restart: bool,
}

/// The push-protocol equivalent of an HTTP base URL, at the stream resource.
pub fn data_stream_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let swapped = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{swapped}/data_stream")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelCommand {
    Open,
    Close,
}

/// A single logical subscription to the controller's push endpoint.
///
/// Owns the only live connection attempt at any instant: `open()` while
/// already open or opening tears the prior attempt down first. A handshake
/// that does not complete within the watchdog interval is treated like a
/// transport failure. Unless closed explicitly, the channel reconnects
/// after a fixed delay and runs indefinitely.
#[derive(Debug)]
pub struct ReconnectingChannel {
    ctrl: mpsc::UnboundedSender<ChannelCommand>,
    status: watch::Receiver<ConnectionStatus>,
    join: JoinHandle<()>,
}

impl ReconnectingChannel {
    pub fn new(config: ChannelConfig, events: mpsc::Sender<ChannelEvent>) -> Self {
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Idle);
        let join = task::spawn(run_loop(config, ctrl_rx, status_tx, events));

        Self {
            ctrl: ctrl_tx,
            status: status_rx,
            join,
        }
    }

    pub fn open(&self) {
        let _ = self.ctrl.send(ChannelCommand::Open);
    }

    pub fn close(&self) {
        let _ = self.ctrl.send(ChannelCommand::Close);
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

impl Drop for ReconnectingChannel {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn run_loop(
    config: ChannelConfig,
    mut ctrl: mpsc::UnboundedReceiver<ChannelCommand>,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::Sender<ChannelEvent>,
) {
    // A pending deadline is the only record that a reconnect is scheduled;
    // an explicit close drops it, which cancels the reconnect.
    let mut reopen_at: Option<Instant> = None;

    loop {
        // State: closed. Wait for an open command or a scheduled reconnect.
        let reopen = reopen_at.take();
        select! {
            cmd = ctrl.recv() => match cmd {
                Some(ChannelCommand::Open) => {}
                Some(ChannelCommand::Close) => {
                    let _ = status.send(ConnectionStatus::Idle);
                    continue;
                }
                None => return,
            },
            _ = async { sleep_until(reopen.unwrap()).await }, if reopen.is_some() => {
                info!("Reconnecting to {}", config.url);
            }
        }

        // State: opening. The watchdog covers connect and handshake; the
        // attempt is dropped (and with it the socket) on any exit path that
        // does not yield a stream.
        let _ = status.send(ConnectionStatus::Connecting);
        info!("Opening channel to {}", config.url);
        let mut stream = select! {
            res = timeout(config.handshake_timeout, connect_async(config.url.as_str())) => match res {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => {
                    warn!("Connection to {} failed: {e}", config.url);
                    let _ = events.send(ChannelEvent::Error(e.into())).await;
                    let _ = status.send(ConnectionStatus::Fail);
                    if config.auto_restart {
                        reopen_at = Some(Instant::now() + config.reconnect_delay);
                    }
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Handshake with {} timed out after {:?}",
                        config.url, config.handshake_timeout
                    );
                    let _ = status.send(ConnectionStatus::Fail);
                    if config.auto_restart {
                        reopen_at = Some(Instant::now() + config.reconnect_delay);
                    }
                    continue;
                }
            },
            cmd = ctrl.recv() => match cmd {
                Some(ChannelCommand::Open) => {
                    reopen_at = Some(Instant::now());
                    continue;
                }
                Some(ChannelCommand::Close) => {
                    let _ = status.send(ConnectionStatus::Idle);
                    continue;
                }
                None => return,
            },
        };

        // State: open.
        info!("Channel to {} open", config.url);
        let _ = status.send(ConnectionStatus::Good);
        loop {
            select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(ChannelEvent::Message(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Channel to {} closed by remote: {frame:?}", config.url);
                        let _ = status.send(ConnectionStatus::Idle);
                        if config.auto_restart {
                            reopen_at = Some(Instant::now() + config.reconnect_delay);
                        }
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => {
                        warn!("Transport error on channel to {}: {e}", config.url);
                        let _ = events.send(ChannelEvent::Error(e.into())).await;
                        let _ = status.send(ConnectionStatus::Fail);
                        if config.auto_restart {
                            reopen_at = Some(Instant::now() + config.reconnect_delay);
                        }
                        break;
                    }
                    None => {
                        info!("Channel to {} disconnected", config.url);
                        let _ = status.send(ConnectionStatus::Idle);
                        if config.auto_restart {
                            reopen_at = Some(Instant::now() + config.reconnect_delay);
                        }
                        break;
                    }
                },
                cmd = ctrl.recv() => match cmd {
                    Some(ChannelCommand::Open) => {
                        // Idempotent restart: tear this connection down first
                        reopen_at = Some(Instant::now());
                        break;
                    }
                    Some(ChannelCommand::Close) => {
                        let _ = status.send(ConnectionStatus::Idle);
                        break;
                    }
                    None => return,
                },
            }
        }
        // Dropping the stream releases the underlying connection
    }
}
