use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{BackendError, LocationWrite, VendorBackend};
use crate::models::{PresenceStatus, VendorRecord};

/// Writes are fire-and-forget with no retry, so a hung request must not
/// outlive the throttle window that would re-attempt it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusWrite {
    status: PresenceStatus,
}

/// reqwest-backed implementation of the platform backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn put_json<T: Serialize>(&self, url: String, body: &T) -> Result<(), BackendError> {
        let response = self
            .request(self.client.put(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl VendorBackend for HttpBackend {
    async fn put_location(
        &self,
        vendor_id: &str,
        location: &LocationWrite,
    ) -> Result<(), BackendError> {
        self.put_json(self.url(&format!("vendors/{}/location", vendor_id)), location)
            .await
    }

    async fn put_status(
        &self,
        vendor_id: &str,
        status: PresenceStatus,
    ) -> Result<(), BackendError> {
        self.put_json(
            self.url(&format!("vendors/{}/profile", vendor_id)),
            &StatusWrite { status },
        )
        .await
    }

    async fn fetch_vendors(&self) -> Result<Vec<VendorRecord>, BackendError> {
        let url = self.url("vendors");
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        response
            .json::<Vec<VendorRecord>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}
