//! Shared HTTP plumbing for the REST-speaking backends

use std::time::Duration;

use backplane_core::{BackendError, BackendResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::ConfigError;

/// A base URL plus the client used to reach it.
///
/// Idle connections are not pooled: each probe or command stands on its own
/// connection, released when the call completes.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    base_url: Url,
}

impl HttpEndpoint {
    pub fn new(backend: &str, base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl {
            backend: backend.to_string(),
            message: e.to_string(),
        })?;
        // Paths are joined relative to the base, which must end in '/' to keep its prefix
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                backend: backend.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::BackendExecution(format!("Invalid path '{}': {}", path, e)))
    }

    /// GET `path`, requiring a 2xx answer
    pub async fn get(&self, path: &str) -> BackendResult<reqwest::Response> {
        let url = self.url(path)?;
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        check_status(response)
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let response = self.get(path).await?;
        decode(response).await
    }

    /// POST a JSON body to `path` and decode the JSON answer
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        debug!(url = %url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode(check_status(response)?).await
    }
}

fn check_status(response: reqwest::Response) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BackendError::BackendExecution(format!(
            "Status: {}",
            status.as_u16()
        )))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
    response
        .json()
        .await
        .map_err(|e| BackendError::BackendExecution(format!("Invalid response body: {}", e)))
}

/// Map transport-level failures onto the backend error taxonomy
pub fn map_reqwest_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::ConnectionTimeout(e.to_string())
    } else if e.is_connect() {
        BackendError::ConnectionRefused(e.to_string())
    } else {
        BackendError::BackendExecution(e.to_string())
    }
}
