use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::DispatchError;

/// A POST request on behalf of a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl DispatchRequest {
    pub fn post_json(url: Url, body: Vec<u8>) -> Self {
        Self {
            url,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    status: u16,
    body: Vec<u8>,
}

impl DispatchResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn read(&self) -> &[u8] {
        &self.body
    }
}

/// Network access granted to providers by the host.
///
/// Cookie, proxy and timeout policy live behind this trait so that every provider
/// request is treated the same way.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn urlopen(&self, request: DispatchRequest) -> Result<DispatchResponse, DispatchError>;

    /// Proxy applied to outgoing requests, if any.
    fn proxy(&self) -> Option<&Url> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub timeout: Duration,
    pub proxy: Option<Url>,
    pub user_agent: String,
    pub cookies: bool,
}

impl DispatchConfig {
    pub const TIMEOUT: Duration = Duration::from_secs(20);
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Self::TIMEOUT,
            proxy: None,
            user_agent: concat!("getpot/", env!("CARGO_PKG_VERSION")).to_string(),
            cookies: true,
        }
    }
}

/// [`Dispatcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    proxy: Option<Url>,
}

impl HttpDispatcher {
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .cookie_store(config.cookies);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        Ok(Self {
            client: builder.build()?,
            proxy: config.proxy,
        })
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn urlopen(&self, request: DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        tracing::debug!(url = %request.url, "Dispatching request");

        let mut builder = self.client.post(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.body(request.body);

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                url: request.url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(DispatchResponse::new(status.as_u16(), body.to_vec()))
    }

    fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }
}
