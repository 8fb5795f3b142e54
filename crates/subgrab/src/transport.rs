// Network retrieval seam shared by the segment resolver and the fetcher.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, info, trace};
use url::Url;

use crate::config::DownloaderConfig;
use crate::proxy::build_proxy_from_config;
use crate::SubgrabError;

/// One retrieval request: `retrieve(url, {method, headers, timeout})`.
#[derive(Debug, Clone)]
pub struct RetrieveRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

impl RetrieveRequest {
    pub fn get(timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RetrievedResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Asynchronous network retrieval capability.
///
/// Implementations return `Ok` for any HTTP response, including error statuses;
/// `Err` is reserved for failures that produced no response at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn retrieve(
        &self,
        url: &Url,
        request: &RetrieveRequest,
    ) -> Result<RetrievedResponse, SubgrabError>;
}

/// `Transport` backed by a `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
    params: Vec<(String, String)>,
}

impl ReqwestTransport {
    pub fn new(config: &DownloaderConfig) -> Result<Self, SubgrabError> {
        Ok(Self {
            client: create_client(config)?,
            params: config.params.clone(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn retrieve(
        &self,
        url: &Url,
        request: &RetrieveRequest,
    ) -> Result<RetrievedResponse, SubgrabError> {
        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        if !self.params.is_empty() {
            builder = builder.query(&self.params);
        }
        if !request.timeout.is_zero() {
            builder = builder.timeout(request.timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SubgrabError::timeout(url.as_str(), request.timeout)
            } else {
                SubgrabError::from(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        trace!(url = %url, status = %status, version = ?response.version(), "Response received");

        let body = response.bytes().await?;
        Ok(RetrievedResponse {
            status,
            headers,
            body,
        })
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, SubgrabError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        client_builder = client_builder.proxy(build_proxy_from_config(proxy_config)?);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy");
    } else if !config.use_system_proxy {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder.build().map_err(SubgrabError::from)
}
