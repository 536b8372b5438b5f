//! Outbound search requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy as ReqwestProxy};

use crate::config::RequestConfig;
use crate::proxy::ProxyConfig;
use crate::{Query, TransportError};

/// Issues one search request through one proxy and returns the raw payload.
///
/// All request settings are fixed at construction time; `fetch` is a simple
/// query-and-proxy-in, payload-out interface.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the result page for `query` via `proxy`.
    async fn fetch(&self, query: &Query, proxy: &ProxyConfig) -> Result<String, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, query: &Query, proxy: &ProxyConfig) -> Result<String, TransportError> {
        (**self).fetch(query, proxy).await
    }
}

/// A transport that sends plain HTTP requests via reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: RequestConfig,
}

impl HttpTransport {
    /// Creates a transport with the given request settings.
    pub fn new(config: RequestConfig) -> Self {
        Self { config }
    }

    /// Returns the request settings.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Builds the search URL for `query`.
    pub fn search_url(&self, query: &Query) -> String {
        format!(
            "{}?q={}&num={}",
            self.config.search_url,
            urlencoding::encode(&query.text),
            self.config.results_per_page
        )
    }

    fn client_for(&self, proxy: &ProxyConfig) -> Result<Client, TransportError> {
        let proxy = ReqwestProxy::all(proxy.url())
            .map_err(|e| TransportError::Proxy(format!("{}: {}", proxy.key(), e)))?;

        Client::builder()
            .user_agent(&self.config.user_agent)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .proxy(proxy)
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to create HTTP client: {}", e)))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(RequestConfig::default())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, query: &Query, proxy: &ProxyConfig) -> Result<String, TransportError> {
        let client = self.client_for(proxy)?;
        let response = client.get(self.search_url(query)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_default() {
        let transport = HttpTransport::default();
        assert_eq!(transport.config().search_url, "https://www.google.com/search");
    }

    #[test]
    fn test_search_url_encodes_query() {
        let transport = HttpTransport::default();
        let query = Query::new(r#"site:pets "affiliate program""#, "pets", 0);
        assert_eq!(
            transport.search_url(&query),
            "https://www.google.com/search?q=site%3Apets%20%22affiliate%20program%22&num=10"
        );
    }

    #[test]
    fn test_client_for_proxy() {
        let transport = HttpTransport::default();
        assert!(transport.client_for(&ProxyConfig::new("127.0.0.1", 8080)).is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_through_dead_proxy_fails() {
        let transport = HttpTransport::new(RequestConfig {
            timeout_seconds: 2,
            ..RequestConfig::default()
        });
        let query = Query::new("rust", "rust", 0);
        let result = transport
            .fetch(&query, &ProxyConfig::new("127.0.0.1", 9))
            .await;
        assert!(result.is_err());
    }
}
