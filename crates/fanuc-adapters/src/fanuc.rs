//! HTTP client for the remote Fanuc control API.
//!
//! Routes live under `{base}/api/v1/machines` and every request carries the
//! service's key in the `X-API-Key` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use fanuc_models::{ConnectionRequest, FanucService, Machine, MachineId};

use crate::error::{AdapterError, Result};
use crate::traits::MachineControl;

/// Header carrying the service API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Parses a user-entered base URL, prefixing `http://` when no scheme is given.
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    Url::parse(&candidate)
        .map_err(|e| AdapterError::Unavailable(format!("invalid base url {:?}: {}", raw, e)))
}

#[derive(Serialize)]
struct PollingRequest {
    interval_ms: u64,
}

/// [`MachineControl`] over HTTP.
#[derive(Clone)]
pub struct FanucHttpClient {
    client: reqwest::Client,
}

impl FanucHttpClient {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self { client })
    }

    fn url(&self, service: &FanucService, segments: &[&str]) -> Result<Url> {
        let mut url = normalize_base_url(&service.base_url)?;
        url.path_segments_mut()
            .map_err(|_| {
                AdapterError::Unavailable(format!("base url {} cannot be a base", service.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "v1", "machines"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, service: &FanucService, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(service, segments)?;
        trace!(%method, %url, "Fanuc API request");
        Ok(self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &service.api_key))
    }

    async fn send(&self, op: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("{}: {}", op, e)))?;

        let status = response.status();
        debug!(op, status = %status, "Fanuc API response");
        if status == StatusCode::NOT_FOUND {
            return Err(AdapterError::NotFound(op.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Unavailable(format!(
                "{}: HTTP {} {}",
                op,
                status,
                body.trim()
            )));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, op: &str, request: RequestBuilder) -> Result<T> {
        self.send(op, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("{}: {}", op, e)))
    }
}

#[async_trait]
impl MachineControl for FanucHttpClient {
    async fn list_machines(&self, service: &FanucService) -> Result<Vec<Machine>> {
        let request = self.request(Method::GET, service, &[])?;
        self.json("list machines", request).await
    }

    async fn get_machine(&self, service: &FanucService, id: &MachineId) -> Result<Machine> {
        let request = self.request(Method::GET, service, &[id.as_str()])?;
        self.json(&format!("get machine {}", id), request).await
    }

    async fn create_machine(
        &self,
        service: &FanucService,
        request: &ConnectionRequest,
    ) -> Result<Machine> {
        let builder = self.request(Method::POST, service, &[])?.json(request);
        self.json(&format!("create machine {}", request.endpoint), builder)
            .await
    }

    async fn delete_machine(&self, service: &FanucService, id: &MachineId) -> Result<()> {
        let request = self.request(Method::DELETE, service, &[id.as_str()])?;
        self.send(&format!("delete machine {}", id), request).await?;
        Ok(())
    }

    async fn start_polling(
        &self,
        service: &FanucService,
        id: &MachineId,
        interval_ms: u64,
    ) -> Result<()> {
        let request = self
            .request(Method::POST, service, &[id.as_str(), "polling", "start"])?
            .json(&PollingRequest { interval_ms });
        self.send(&format!("start polling {}", id), request).await?;
        Ok(())
    }

    async fn stop_polling(&self, service: &FanucService, id: &MachineId) -> Result<()> {
        let request = self.request(Method::POST, service, &[id.as_str(), "polling", "stop"])?;
        self.send(&format!("stop polling {}", id), request).await?;
        Ok(())
    }

    async fn get_program_text(&self, service: &FanucService, id: &MachineId) -> Result<String> {
        let op = format!("get program {}", id);
        let request = self.request(Method::GET, service, &[id.as_str(), "program"])?;
        self.send(&op, request)
            .await?
            .text()
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("{}: {}", op, e)))
    }
}
