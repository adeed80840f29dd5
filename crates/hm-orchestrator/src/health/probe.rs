//! Network reachability probes

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

/// Public IP discovery and local port probing
pub struct NetworkProbe {
    endpoints: Vec<String>,
    http_timeout: Duration,
    connect_timeout: Duration,
}

impl NetworkProbe {
    pub fn new(endpoints: Vec<String>, http_timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            endpoints,
            http_timeout,
            connect_timeout,
        }
    }

    /// Ask each endpoint in turn; the first body that is an IPv4 address wins
    pub async fn public_ip(&self) -> Option<Ipv4Addr> {
        let client = match reqwest::Client::builder().timeout(self.http_timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to create HTTP client: {}", e);
                return None;
            }
        };

        for endpoint in &self.endpoints {
            let body = match client.get(endpoint).send().await {
                Ok(resp) => match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::debug!("Reading {} failed: {}", endpoint, e);
                        continue;
                    }
                },
                Err(e) => {
                    tracing::debug!("Public IP lookup via {} failed: {}", endpoint, e);
                    continue;
                }
            };

            match parse_ipv4(&body) {
                Some(ip) => return Some(ip),
                None => tracing::debug!("{} returned no IPv4 address", endpoint),
            }
        }

        tracing::warn!("Could not determine public IP");
        None
    }

    /// Whether `127.0.0.1:port` accepts a TCP connection within the timeout
    pub async fn tcp_reachable(&self, port: u16) -> bool {
        matches!(
            timeout(
                self.connect_timeout,
                TcpStream::connect((Ipv4Addr::LOCALHOST, port))
            )
            .await,
            Ok(Ok(_))
        )
    }
}

fn parse_ipv4(body: &str) -> Option<Ipv4Addr> {
    body.trim().parse().ok()
}
