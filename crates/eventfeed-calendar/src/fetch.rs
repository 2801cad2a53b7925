//! Remote ICS fetcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventfeed_core::{NetworkError, ReqwestErrorExt};
use reqwest::{header, redirect::Policy, StatusCode};
use tracing::instrument;
use url::Url;

use crate::error::CalendarError;
use crate::guard::{GuardedResolver, SsrfGuard, SsrfPolicy};

const MAX_REDIRECTS: usize = 5;

/// Source of raw ICS text.
#[async_trait]
pub trait IcsFetcher: Send + Sync {
    /// Fetch the document at `url`. An empty body is an error.
    async fn fetch(&self, url: &str) -> Result<String, CalendarError>;
}

/// Fetches ICS documents over HTTP(S) behind the SSRF guard.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Arc<reqwest::Client>,
    guard: SsrfGuard,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration, policy: SsrfPolicy) -> Result<Self, CalendarError> {
        // Redirects are followed by hand so every hop gets the full guard.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .dns_resolver(Arc::new(GuardedResolver::new(policy)))
            .user_agent(concat!("eventfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CalendarError::Network(e.into_network_error()))?;

        Ok(Self {
            client: Arc::new(client),
            guard: SsrfGuard::new(policy),
        })
    }

    #[instrument(skip(self), level = "info")]
    async fn get_text(&self, url: &str) -> Result<String, CalendarError> {
        let mut url = self.guard.parse_and_validate_url(url).await?;
        let mut redirects = 0;

        let response = loop {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| e.into_network_error())?;

            if !is_redirect(response.status()) {
                break response;
            }
            if redirects >= MAX_REDIRECTS {
                return Err(NetworkError::InvalidResponse(format!(
                    "more than {} redirects",
                    MAX_REDIRECTS
                ))
                .into());
            }

            let next = redirect_target(&url, &response)?;
            self.guard.validate_url(&next).await?;
            tracing::debug!("Following redirect {} -> {}", url, next);
            url = next;
            redirects += 1;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: format!("calendar source answered {}", status),
            }
            .into());
        }

        let body = response.text().await.map_err(|e| e.into_network_error())?;
        if body.trim().is_empty() {
            return Err(CalendarError::EmptyBody);
        }

        tracing::debug!("Fetched {} bytes of ICS data", body.len());
        Ok(body)
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn redirect_target(current: &Url, response: &reqwest::Response) -> Result<Url, CalendarError> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            NetworkError::InvalidResponse(format!(
                "redirect {} without a usable Location header",
                response.status()
            ))
        })?;
    current.join(location).map_err(|e| {
        NetworkError::InvalidResponse(format!("bad redirect location '{}': {}", location, e)).into()
    })
}

#[async_trait]
impl IcsFetcher for RemoteFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CalendarError> {
        self.get_text(url).await
    }
}
