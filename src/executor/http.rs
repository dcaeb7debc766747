//! HTTPS request executor.

use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use crate::error::ExecutorError;
use crate::executor::RequestExecutor;
use crate::presets::{HttpMethod, ResolvedRequest};

/// Maximum response body size (5 MB).
///
/// Large enough for any quote/price API response, small enough that a
/// malicious or runaway server cannot balloon memory.
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024;

/// `RequestExecutor` backed by `reqwest`.
///
/// Only https URLs to public hosts are accepted; localhost, private ranges,
/// and link-local destinations (including hostnames that resolve to them)
/// are refused before any network activity.
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    /// Create an executor with a 30-second request timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create an executor with an explicit request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { client }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_url(url: &str) -> Result<reqwest::Url, ExecutorError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ExecutorError::Rejected {
        reason: format!("invalid URL: {}", e),
    })?;

    if parsed.scheme() != "https" {
        return Err(ExecutorError::Rejected {
            reason: "only https URLs are allowed".to_string(),
        });
    }

    let host = parsed.host_str().ok_or_else(|| ExecutorError::Rejected {
        reason: "URL missing host".to_string(),
    })?;

    let host_lower = host.to_lowercase();
    if host_lower == "localhost" || host_lower.ends_with(".localhost") {
        return Err(ExecutorError::Rejected {
            reason: "localhost is not allowed".to_string(),
        });
    }

    if let Ok(ip) = host.parse::<IpAddr>()
        && is_disallowed_ip(&ip)
    {
        return Err(ExecutorError::Rejected {
            reason: "private or local IPs are not allowed".to_string(),
        });
    }

    // Resolve the hostname and check every address against the blocklist,
    // closing off DNS-rebinding to private ranges.
    let port = parsed.port_or_known_default().unwrap_or(443);
    let socket_addr = format!("{}:{}", host, port);
    if let Ok(addrs) = socket_addr.to_socket_addrs() {
        for addr in addrs {
            if is_disallowed_ip(&addr.ip()) {
                return Err(ExecutorError::Rejected {
                    reason: format!("hostname '{}' resolves to disallowed IP {}", host, addr.ip()),
                });
            }
        }
    }

    Ok(parsed)
}

fn is_disallowed_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || *v4 == std::net::Ipv4Addr::new(169, 254, 169, 254)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || v6.is_multicast()
                || v6.is_unspecified()
        }
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: &ResolvedRequest) -> Result<serde_json::Value, ExecutorError> {
        let url = validate_url(&request.url)?;

        tracing::debug!(preset = %request.preset, method = %request.method, "executing request");

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ExecutorError::Request(e.to_string()))?;

        let status = response.status();

        // Stream the body with a hard size cap instead of trusting
        // Content-Length.
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ExecutorError::Request(e.to_string()))?;
            if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
                return Err(ExecutorError::Request(format!(
                    "response exceeded {} bytes",
                    MAX_RESPONSE_SIZE
                )));
            }
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            let excerpt = String::from_utf8_lossy(&body[..body.len().min(512)]).into_owned();
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ExecutorError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_http_scheme() {
        let err = validate_url("http://api.example/quote").unwrap_err();
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn rejects_localhost() {
        assert!(validate_url("https://localhost/x").is_err());
        assert!(validate_url("https://foo.localhost/x").is_err());
    }

    #[test]
    fn rejects_private_and_loopback_ips() {
        assert!(validate_url("https://127.0.0.1/x").is_err());
        assert!(validate_url("https://10.0.0.1/x").is_err());
        assert!(validate_url("https://192.168.1.1/x").is_err());
        assert!(validate_url("https://169.254.169.254/latest/meta-data").is_err());
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("https://").is_err());
    }

    #[test]
    fn disallowed_ip_table() {
        assert!(is_disallowed_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_disallowed_ip(&"::1".parse().unwrap()));
        assert!(is_disallowed_ip(&"0.0.0.0".parse().unwrap()));
        assert!(!is_disallowed_ip(&"1.1.1.1".parse().unwrap()));
        assert!(!is_disallowed_ip(&"8.8.8.8".parse().unwrap()));
    }
}
