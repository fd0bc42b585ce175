//! Transport seam between the link client and the socket.
//!
//! DESIGN
//! ======
//! A [`Connector`] turns a URL into a [`TransportHandle`]: an outbound text
//! channel, an inbound event channel, and the I/O task driving the socket.
//! The client never touches the socket directly. It pushes frames into
//! `outbound` and consumes [`TransportEvent`]s from `events` in one dispatch
//! loop, so delivery order is preserved and nothing in the socket task can
//! observe client state.
//!
//! LIFECYCLE
//! =========
//! Dropping `outbound` is the close signal. The socket task sends a close
//! frame and exits without emitting [`TransportEvent::Closed`], because the
//! owner already knows. A close initiated by the remote side, or any socket
//! error, ends the task with exactly one `Closed` event.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::LinkError;

/// Event surfaced by an open transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete text frame, in arrival order.
    Frame(String),
    /// The transport is gone. Always the last event.
    Closed { reason: Option<String> },
}

/// An open transport, split into its channels.
#[derive(Debug)]
pub struct TransportHandle {
    pub outbound: mpsc::UnboundedSender<String>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    /// Socket task, awaited on close so the old transport is fully gone
    /// before a new one opens. `None` for in-memory transports.
    pub task: Option<JoinHandle<()>>,
}

/// Opens transports to a URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `url`. Resolves once the transport is open.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::TransportError`] if the transport fails before opening.
    async fn open(&self, url: &str) -> Result<TransportHandle, LinkError>;
}

/// Websocket connector backed by `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<TransportHandle, LinkError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| LinkError::TransportError(e.to_string()))?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(stream, outbound_rx, events_tx));

        Ok(TransportHandle {
            outbound,
            events,
            task: Some(task),
        })
    }
}

async fn run_socket(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut sink, mut source) = stream.split();

    let reason = loop {
        tokio::select! {
            out = outbound.recv() => {
                let Some(text) = out else {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "websocket close handshake failed");
                    }
                    return;
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    break Some(format!("send failed: {e}"));
                }
            }
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Frame(text.as_str().to_owned())).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| f.reason.as_str().to_owned());
                }
                Some(Ok(Message::Binary(bytes))) => {
                    debug!(len = bytes.len(), "ignoring binary websocket frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket receive failed");
                    break Some(e.to_string());
                }
                None => break None,
            }
        }
    };

    if events.send(TransportEvent::Closed { reason }).is_err() {
        debug!("transport closed after its owner went away");
    }
}
