//! WebSocket transport to the relay.
//!
//! Thin wrapper around `tokio-tungstenite` providing type-isolated
//! reader/writer halves, and [`WsTransport`], the [`Transport`] the relay
//! client runs on in production.
//!
//! # Architecture
//!
//! ```text
//! WsTransport
//!     ├── WsWriter (behind a mutex, shared by send_text and pong replies)
//!     ├── read task: WsReader ──text──► frame queue ──► Dispatcher
//!     └── watch::Sender<ConnectionState>
//! ```
//!
//! The read task only forwards text frames; it never parses them. A closed
//! or failed socket moves the state to `Disconnected` / `Error` and the task
//! exits. There is no reconnection here.

// Rust guideline compliant 2026-02

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;

use crate::error::RelayError;
use crate::relay::transport::{ConnectionState, FrameReceiver, Transport};

/// Concrete WebSocket stream type (avoids repeating the 6-line generic everywhere).
type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Received WebSocket message.
#[derive(Debug)]
pub enum WsMessage {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Ping frame with payload.
    Ping(Vec<u8>),
    /// Pong frame with payload.
    Pong(Vec<u8>),
    /// Close frame with status code and reason.
    Close {
        /// WebSocket close code (1000 = normal, 1005 = no code).
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    /// Send a UTF-8 text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails (connection closed, I/O error).
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.into()))
            .await
            .context("WebSocket send_text failed")
    }

    /// Send a pong frame in response to a ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Pong(data.into()))
            .await
            .context("WebSocket send_pong failed")
    }

    /// Send a close frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn send_close(&mut self) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Close(None))
            .await
            .context("WebSocket send_close failed")
    }
}

/// Read half of a WebSocket connection.
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next message, returning `None` when the stream ends.
    ///
    /// Raw `Frame` variants are skipped internally.
    pub async fn recv(&mut self) -> Option<Result<WsMessage>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(WsMessage::Text(text.to_string())));
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    return Some(Ok(WsMessage::Binary(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Ping(data))) => {
                    return Some(Ok(WsMessage::Ping(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Pong(data))) => {
                    return Some(Ok(WsMessage::Pong(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Close(close_frame))) => {
                    let (code, reason) = close_frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    return Some(Ok(WsMessage::Close { code, reason }));
                }
                Some(Ok(tungstenite::Message::Frame(_))) => {
                    // Raw frames — skip
                    continue;
                }
                Some(Err(e)) => {
                    return Some(Err(anyhow::anyhow!("WebSocket read error: {e}")));
                }
                None => return None,
            }
        }
    }
}

/// Connect to a WebSocket URL with optional headers.
///
/// Builds an HTTP request from `url`, inserts each `(name, value)` header,
/// then performs the WebSocket handshake. Returns split (writer, reader)
/// halves for independent use.
///
/// # Errors
///
/// Returns an error if the URL is invalid, header values are malformed,
/// or the WebSocket handshake fails.
pub async fn connect(url: &str, headers: &[(String, String)]) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let mut request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    for (name, value) in headers {
        let header_name = tungstenite::http::HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name: {name}"))?;
        let header_value = tungstenite::http::HeaderValue::from_str(value)
            .with_context(|| format!("invalid header value for {name}"))?;
        request.headers_mut().insert(header_name, header_value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .context("WebSocket connect failed")?;

    let (sink, stream) = ws_stream.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Convert an HTTP(S) URL to WS(S) scheme.
///
/// Passes `ws://` and `wss://` through unchanged.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if url.starts_with("wss://") || url.starts_with("ws://") {
        url.to_string()
    } else {
        url.replace("https://", "wss://")
            .replace("http://", "ws://")
    }
}

/// Relay transport over a single WebSocket connection.
#[derive(Debug)]
pub struct WsTransport {
    url: String,
    headers: Vec<(String, String)>,
    writer: Arc<Mutex<Option<WsWriter>>>,
    frame_tx: mpsc::UnboundedSender<String>,
    frame_rx: StdMutex<Option<FrameReceiver>>,
    state: Arc<watch::Sender<ConnectionState>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Create a disconnected transport for `url`.
    ///
    /// `http(s)://` URLs are converted to `ws(s)://`. `headers` are sent on
    /// every handshake (e.g. `Authorization`).
    pub fn new(url: &str, headers: Vec<(String, String)>) -> Self {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: http_to_ws_scheme(url),
            headers,
            writer: Arc::new(Mutex::new(None)),
            frame_tx,
            frame_rx: StdMutex::new(Some(frame_rx)),
            state: Arc::new(state),
            reader: StdMutex::new(None),
        }
    }

    /// URL this transport connects to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn replace_reader(&self, handle: Option<JoinHandle<()>>) {
        let previous = std::mem::replace(
            &mut *self.reader.lock().unwrap_or_else(PoisonError::into_inner),
            handle,
        );
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Forward text frames until the socket closes or fails.
    async fn read_loop(
        mut reader: WsReader,
        frame_tx: mpsc::UnboundedSender<String>,
        writer: Arc<Mutex<Option<WsWriter>>>,
        state: Arc<watch::Sender<ConnectionState>>,
    ) {
        let final_state = loop {
            match reader.recv().await {
                Some(Ok(WsMessage::Text(text))) => {
                    if frame_tx.send(text).is_err() {
                        log::warn!("Frame queue closed, stopping WebSocket reader");
                        break ConnectionState::Disconnected;
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if let Some(w) = writer.lock().await.as_mut() {
                        if let Err(e) = w.send_pong(data).await {
                            log::warn!("Failed to send pong: {e:#}");
                        }
                    }
                }
                Some(Ok(WsMessage::Close { code, reason })) => {
                    log::info!("WebSocket closed by relay ({code}): {reason}");
                    break ConnectionState::Disconnected;
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    log::debug!("Ignoring {} byte binary frame", data.len());
                }
                Some(Ok(WsMessage::Pong(_))) => {}
                Some(Err(e)) => {
                    log::error!("{e:#}");
                    break ConnectionState::Error(e.to_string());
                }
                None => {
                    log::info!("WebSocket stream ended");
                    break ConnectionState::Disconnected;
                }
            }
        };

        writer.lock().await.take();
        state.send_replace(final_state);
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<(), RelayError> {
        // Claim the Connecting slot atomically so concurrent callers never
        // dial twice.
        let mut busy = None;
        let claimed = self.state.send_if_modified(|state| match state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                busy = Some(state.clone());
                false
            }
            _ => {
                *state = ConnectionState::Connecting;
                true
            }
        });
        if !claimed {
            return match busy {
                Some(ConnectionState::Connecting) => Err(RelayError::Transport(
                    "connect already in progress".to_string(),
                )),
                _ => Ok(()),
            };
        }
        log::debug!("Connecting to relay: {}", self.url);

        let (writer, reader) = match crate::ws::connect(&self.url, &self.headers).await {
            Ok(halves) => halves,
            Err(e) => {
                log::warn!("Failed to connect to {}: {e:#}", self.url);
                self.state
                    .send_replace(ConnectionState::Error(format!("{e:#}")));
                return Err(RelayError::Transport(format!("{e:#}")));
            }
        };

        *self.writer.lock().await = Some(writer);
        // Published before the reader starts: the reader's final state must
        // be the last word.
        self.state.send_replace(ConnectionState::Connected);
        log::info!("Connected to relay {}", self.url);

        let handle = tokio::spawn(Self::read_loop(
            reader,
            self.frame_tx.clone(),
            Arc::clone(&self.writer),
            Arc::clone(&self.state),
        ));
        self.replace_reader(Some(handle));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), RelayError> {
        self.replace_reader(None);
        let writer = self.writer.lock().await.take();
        let result = match writer {
            Some(mut w) => w
                .send_close()
                .await
                .map_err(|e| RelayError::Transport(format!("{e:#}"))),
            None => Ok(()),
        };
        self.state.send_replace(ConnectionState::Disconnected);
        log::info!("Disconnected from relay {}", self.url);
        result
    }

    async fn send_text(&self, text: String) -> Result<(), RelayError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(RelayError::Transport("not connected".to_string()));
        };
        writer
            .send_text(text)
            .await
            .map_err(|e| RelayError::Transport(format!("{e:#}")))
    }

    fn take_frames(&self) -> Option<FrameReceiver> {
        self.frame_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.replace_reader(None);
    }
}
