//! Native WebSocket transport for [`crate::collaboration::RoomClient`].
//!
//! A background thread owns a blocking `tungstenite` connection. The caller
//! pushes text frames in with [`NativeSocket::send`] and drains whatever
//! arrived with [`NativeSocket::poll`], which never blocks.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tungstenite::{Message, connect};
use url::Url;

/// Read timeout used to interleave reads with outgoing commands.
const READ_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid WebSocket URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Not connected")]
    NotConnected,
    #[error("Connection thread has stopped")]
    ChannelClosed,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Events from the socket thread.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    /// A raw text frame from the server.
    Frame(String),
    /// The connection closed, including a server-side close after a
    /// rejected token.
    Disconnected,
    /// The handshake failed.
    Failed(String),
}

enum Command {
    Send(String),
    Close,
}

/// Build the gateway URL for a server base URL and a bearer token.
///
/// `ws://host:port` becomes `ws://host:port/ws?token=<token>`.
pub fn endpoint_url(base: &str, token: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(base)?;
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
    }
    url.set_path("/ws");
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}

/// WebSocket client for native platforms.
pub struct NativeSocket {
    state: ConnectionState,
    cmd_tx: Option<Sender<Command>>,
    event_rx: Option<Receiver<TransportEvent>>,
    thread: Option<JoinHandle<()>>,
}

impl Default for NativeSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeSocket {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            cmd_tx: None,
            event_rx: None,
            thread: None,
        }
    }

    /// Connect to `base` (e.g. `ws://localhost:8080`) authenticating with
    /// `token`. Returns once the thread is started; the outcome arrives as
    /// a [`TransportEvent`].
    pub fn connect(&mut self, base: &str, token: &str) -> Result<(), TransportError> {
        if self.cmd_tx.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let url = endpoint_url(base, token)?;

        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        self.state = ConnectionState::Connecting;
        self.thread = Some(thread::spawn(move || run(url, cmd_rx, event_tx)));
        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Close);
        }
        self.event_rx = None;
        self.thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Queue a text frame.
    pub fn send(&self, frame: impl Into<String>) -> Result<(), TransportError> {
        let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(Command::Send(frame.into()))
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Drain pending events (non-blocking).
    pub fn poll(&mut self) -> Vec<TransportEvent> {
        let Some(rx) = self.event_rx.as_ref() else {
            return Vec::new();
        };
        let events: Vec<_> = rx.try_iter().collect();
        for event in &events {
            match event {
                TransportEvent::Connected => self.state = ConnectionState::Connected,
                TransportEvent::Disconnected => self.state = ConnectionState::Disconnected,
                TransportEvent::Failed(_) => self.state = ConnectionState::Failed,
                TransportEvent::Frame(_) => {}
            }
        }
        events
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Drop for NativeSocket {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run(url: Url, commands: Receiver<Command>, events: Sender<TransportEvent>) {
    log::info!("Connecting to {}", url.host_str().unwrap_or_default());
    let mut socket = match connect(url.as_str()) {
        Ok((socket, response)) => {
            log::info!("WebSocket connected, status: {}", response.status());
            socket
        }
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            let _ = events.send(TransportEvent::Failed(e.to_string()));
            return;
        }
    };
    let _ = events.send(TransportEvent::Connected);

    if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
        let _ = tcp.set_read_timeout(Some(READ_POLL));
    }

    loop {
        match commands.try_recv() {
            Ok(Command::Send(frame)) => {
                if let Err(e) = socket.send(Message::Text(frame)) {
                    log::error!("WebSocket send error: {}", e);
                    break;
                }
            }
            Ok(Command::Close) | Err(TryRecvError::Disconnected) => {
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                if events.send(TransportEvent::Frame(text)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => {
                log::info!("WebSocket closed: {}", e);
                break;
            }
        }
    }

    let _ = events.send(TransportEvent::Disconnected);
}
