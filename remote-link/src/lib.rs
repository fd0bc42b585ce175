//! Client for the remote launch service on a MiSTer-style device.
//!
//! The service speaks JSON-RPC 2.0 over a persistent websocket on
//! [`SERVICE_PORT`]. [`RemoteLinkClient`] keeps that connection alive,
//! correlates responses to requests, fans notifications out to subscribers,
//! and reconnects with linear backoff after an unexpected drop.
//!
//! ```no_run
//! use remote_link::{Endpoint, LinkConfig, RemoteLinkClient};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RemoteLinkClient::new(LinkConfig::default());
//! client.on_notification(|note| println!("{}", note.method));
//! client.connect(&Endpoint::parse("192.168.1.50")?).await?;
//! client.launch("SNES/Super Metroid.sfc").await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
mod handlers;
mod pending;
pub mod transport;

pub use client::{LinkState, RemoteLinkClient};
pub use config::LinkConfig;
pub use endpoint::{Endpoint, SERVICE_PORT, Scheme};
pub use error::{EndpointError, LinkError};
pub use handlers::{HandlerId, NotificationHandler};
pub use rpc_frames::{Notification, NotificationKind, ResponseError, RpcError};
pub use transport::{Connector, TransportEvent, TransportHandle, WsConnector};
