// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use attohttpc::Session;
use std::time::Duration;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Parsed `Retry-After` header (seconds form only)
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            retry_after: None,
        }
    }
}

/// Single-attempt HTTP GET. Retries and backoff are layered on top by the
/// query service.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse>;
}

pub struct AttoHttpClient {
    session: Session,
}

impl AttoHttpClient {
    pub fn new(user_agent: &str) -> Self {
        let mut session = Session::new();
        session.header("User-Agent", user_agent);
        session.proxy_settings(attohttpc::ProxySettings::from_env());
        Self { session }
    }
}

impl HttpClient for AttoHttpClient {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        log::debug!("GET {url}");
        let response = self
            .session
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| SyncError::NetworkError(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .bytes()
            .map_err(|e| SyncError::NetworkError(format!("Failed to read body of {url}: {e}")))?;

        log::trace!("GET {url} -> {status} ({} bytes)", body.len());
        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}
