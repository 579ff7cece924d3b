//! HTTP probe of the dashboard's health endpoint.

use reqwest::Client;

use super::ENDPOINT_PROBE_TIMEOUT;
use crate::error::Result;

/// Probes `http://127.0.0.1:<port><path>` on the published port.
///
/// The result is informational; the runtime's own health check decides
/// whether the instance is healthy.
pub struct EndpointProbe {
    client: Client,
    path: String,
}

impl EndpointProbe {
    pub fn new(path: &str) -> Result<Self> {
        let client = Client::builder().timeout(ENDPOINT_PROBE_TIMEOUT).build()?;
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Ok(Self { client, path })
    }

    pub fn url(&self, port: u16) -> String {
        format!("http://127.0.0.1:{}{}", port, self.path)
    }

    /// Check health endpoint
    pub async fn check(&self, port: u16) -> bool {
        let url = self.url(port);

        match self.client.get(&url).send().await {
            Ok(resp) => {
                log::debug!("Health endpoint {} answered {}", url, resp.status());
                resp.status().is_success()
            }
            Err(e) => {
                log::debug!("Health endpoint {} unreachable: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_path() {
        let probe = EndpointProbe::new("_stcore/health").unwrap();
        assert_eq!(probe.url(8501), "http://127.0.0.1:8501/_stcore/health");
    }

    #[tokio::test]
    async fn closed_port_is_not_responding() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let probe = EndpointProbe::new("/_stcore/health").unwrap();
        assert!(!probe.check(port).await);
    }
}
