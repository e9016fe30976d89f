use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use super::types::Route;
use crate::error::ProbeError;

pub const USER_AGENT: &str = concat!("pingwatch/", env!("CARGO_PKG_VERSION"));

/// Network seam of the prober, replaced by a fake in tests.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single GET and return the response status code.
    async fn get(&self, url: &str, route: &Route) -> Result<u16, ProbeError>;

    /// Verify that the SOCKS proxy accepts TCP connections.
    async fn check_proxy(&self, proxy: &str, dial_timeout: Duration) -> Result<(), ProbeError>;
}

/// Timeouts applied to direct and proxied requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub direct: Duration,
    pub proxied: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { direct: Duration::from_secs(10), proxied: Duration::from_secs(60) }
    }
}

impl Timeouts {
    pub fn for_route(&self, route: &Route) -> Duration {
        match route {
            Route::Direct => self.direct,
            Route::Proxied { .. } => self.proxied,
        }
    }
}

/// HTTP/HTTPS transport built on reqwest.
///
/// Holds one client for direct requests and one that tunnels through
/// `socks5h://<proxy>`, so hidden-service names are resolved by the proxy.
pub struct HttpTransport {
    direct: reqwest::Client,
    proxied: reqwest::Client,
    proxy: String,
    timeouts: Timeouts,
}

impl HttpTransport {
    pub fn new(proxy: &str, timeouts: Timeouts) -> Result<Self, ProbeError> {
        let direct = reqwest::Client::builder()
            .timeout(timeouts.direct)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProbeError::ClientBuild(e.to_string()))?;

        let socks = reqwest::Proxy::all(format!("socks5h://{proxy}"))
            .map_err(|e| ProbeError::ClientBuild(format!("error creating SOCKS5 proxy: {e}")))?;

        // Tor circuits are slow to build, so the idle pool lives as long as a request may.
        let proxied = reqwest::Client::builder()
            .proxy(socks)
            .timeout(timeouts.proxied)
            .connect_timeout(timeouts.proxied / 2)
            .pool_idle_timeout(timeouts.proxied)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProbeError::ClientBuild(e.to_string()))?;

        Ok(Self { direct, proxied, proxy: proxy.to_string(), timeouts })
    }

    fn client_for(&self, route: &Route) -> Result<&reqwest::Client, ProbeError> {
        match route {
            Route::Direct => Ok(&self.direct),
            Route::Proxied { proxy } if *proxy == self.proxy => Ok(&self.proxied),
            Route::Proxied { proxy } => Err(ProbeError::ClientBuild(format!(
                "no client configured for proxy {proxy} (configured: {})",
                self.proxy
            ))),
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, route: &Route) -> Result<u16, ProbeError> {
        let client = self.client_for(route)?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.timeouts.for_route(route)))?;

        // Dropping the response releases the connection without reading the body.
        Ok(response.status().as_u16())
    }

    async fn check_proxy(&self, proxy: &str, dial_timeout: Duration) -> Result<(), ProbeError> {
        let unavailable = |reason: String| ProbeError::ProxyUnavailable {
            proxy: proxy.to_string(),
            reason,
        };

        timeout(dial_timeout, TcpStream::connect(proxy))
            .await
            .map_err(|_| unavailable(format!("dial timeout after {dial_timeout:?}")))?
            .map_err(|e| unavailable(e.to_string()))?;

        Ok(())
    }
}
