//! Named calls on top of [`RemoteLinkClient::request`].
//!
//! Thin wrappers only: method names and parameter shapes are the remote
//! service's wire contract.

use rpc_frames::method;
use serde_json::{Map, Value, json};

use super::RemoteLinkClient;
use crate::error::LinkError;

impl RemoteLinkClient {
    /// Launch the library item at `path`.
    ///
    /// # Errors
    ///
    /// Any [`LinkError`] from [`RemoteLinkClient::request`].
    pub async fn launch(&self, path: &str) -> Result<Value, LinkError> {
        self.request(method::LAUNCH, Some(json!({ "path": path })))
            .await
    }

    /// Stop the active item.
    ///
    /// # Errors
    ///
    /// Any [`LinkError`] from [`RemoteLinkClient::request`].
    pub async fn stop(&self) -> Result<Value, LinkError> {
        self.request(method::STOP, None).await
    }

    /// Search the media library, optionally limited to `systems`.
    ///
    /// # Errors
    ///
    /// Any [`LinkError`] from [`RemoteLinkClient::request`].
    pub async fn search_media(
        &self,
        query: &str,
        systems: Option<&[String]>,
    ) -> Result<Value, LinkError> {
        let mut params = Map::new();
        params.insert("query".to_owned(), Value::from(query));
        if let Some(systems) = systems {
            params.insert("systems".to_owned(), json!(systems));
        }
        self.request(method::MEDIA_SEARCH, Some(Value::Object(params)))
            .await
    }

    /// List the systems the device knows about.
    ///
    /// # Errors
    ///
    /// Any [`LinkError`] from [`RemoteLinkClient::request`].
    pub async fn systems(&self) -> Result<Value, LinkError> {
        self.request(method::SYSTEMS, None).await
    }

    /// Describe the media that is currently running.
    ///
    /// # Errors
    ///
    /// Any [`LinkError`] from [`RemoteLinkClient::request`].
    pub async fn active_media(&self) -> Result<Value, LinkError> {
        self.request(method::MEDIA_ACTIVE, None).await
    }
}
