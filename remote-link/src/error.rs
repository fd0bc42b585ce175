//! Error types for the remote link.

use rpc_frames::{CodecError, ResponseError, RpcError};
use serde_json::Value;

/// Failure of a link operation, returned to the caller of `connect` or `request`.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LinkError {
    /// The transport did not reach the open state within the connect timeout.
    #[error("timed out connecting to remote device")]
    ConnectionTimeout,
    /// The transport reported an error before it opened.
    #[error("transport error: {0}")]
    TransportError(String),
    /// No open connection exists. Nothing was sent.
    #[error("not connected to remote device")]
    NotConnected,
    /// No matching response arrived within the request timeout.
    #[error("request timed out")]
    RequestTimeout,
    /// The connection dropped while the request was pending.
    #[error("connection to remote device lost")]
    ConnectionLost,
    /// The link was disconnected locally while the operation was in flight.
    #[error("link disconnected")]
    Disconnected,
    /// The remote side answered with an error object.
    #[error(transparent)]
    Remote(#[from] RpcError),
    /// The remote side answered with an `error` member that is not a
    /// `{code, message}` object. Carried verbatim.
    #[error("remote error: {0}")]
    RemoteRaw(Value),
    /// An outbound frame could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl From<CodecError> for LinkError {
    fn from(err: CodecError) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<ResponseError> for LinkError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::Rpc(rpc) => Self::Remote(rpc),
            ResponseError::Raw(raw) => Self::RemoteRaw(raw),
        }
    }
}

/// Rejected endpoint input.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    /// Nothing but whitespace was supplied.
    #[error("remote address is empty")]
    Empty,
    /// The input is not a usable IPv4 address or host name.
    #[error("invalid remote address `{0}` (expected e.g. 192.168.1.1)")]
    InvalidAddress(String),
}
