//! Hysteria2 configuration rendering
//!
//! Field names and value notation follow the binary's YAML schema exactly.
//! Durations are written as `10s`, bandwidth as `1 gbps`; anything else is
//! rejected or misread by the binary at startup.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use super::format_duration;

/// Server log written by the binary itself
const SERVER_LOG_FILE: &str = "/var/log/hysteria-server.log";

/// Site the server impersonates for non-Hysteria traffic
const MASQUERADE_URL: &str = "https://www.bing.com";

/// Outbound ports the server refuses to relay to (SMTP family)
const BLOCKED_PORTS: [u16; 3] = [25, 465, 587];

/// SNI presented by clients
const CLIENT_SNI: &str = "cloudflare.com";

/// DNS-over-HTTPS resolver used by clients
const CLIENT_RESOLVER: &str = "1.1.1.1:443";

/// A bandwidth cap in whole gigabits per second, written `1 gbps`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bandwidth {
    pub gbps: u32,
}

impl Bandwidth {
    pub const fn gbps(gbps: u32) -> Self {
        Self { gbps }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} gbps", self.gbps)
    }
}

/// The `quic:` block shared by server and client configs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuicTuning {
    pub init_stream_receive_window: u64,
    pub max_stream_receive_window: u64,
    pub init_conn_receive_window: u64,
    pub max_conn_receive_window: u64,
    /// Only clients set an idle timeout
    pub max_idle_timeout: Option<Duration>,
    pub max_incoming_streams: u32,
    pub disable_path_mtu_discovery: bool,
    pub keep_alive_period: Duration,
    pub handshake_idle_timeout: Duration,
    pub max_incoming_uni_streams: u32,
}

impl QuicTuning {
    /// 64 MiB stream / 128 MiB connection windows, 10s keepalive
    pub fn server() -> Self {
        Self {
            init_stream_receive_window: 67_108_864,
            max_stream_receive_window: 67_108_864,
            init_conn_receive_window: 134_217_728,
            max_conn_receive_window: 134_217_728,
            max_idle_timeout: None,
            max_incoming_streams: 4096,
            disable_path_mtu_discovery: false,
            keep_alive_period: Duration::from_secs(10),
            handshake_idle_timeout: Duration::from_secs(10),
            max_incoming_uni_streams: 4096,
        }
    }

    /// Server tuning plus a 120s idle timeout
    pub fn client() -> Self {
        Self {
            max_idle_timeout: Some(Duration::from_secs(120)),
            ..Self::server()
        }
    }

    fn render(&self) -> String {
        let mut block = String::from("quic:\n");
        let mut field = |name: &str, value: String| {
            block.push_str("  ");
            block.push_str(name);
            block.push_str(": ");
            block.push_str(&value);
            block.push('\n');
        };

        field("initStreamReceiveWindow", self.init_stream_receive_window.to_string());
        field("maxStreamReceiveWindow", self.max_stream_receive_window.to_string());
        field("initConnReceiveWindow", self.init_conn_receive_window.to_string());
        field("maxConnReceiveWindow", self.max_conn_receive_window.to_string());
        if let Some(idle) = self.max_idle_timeout {
            field("maxIdleTimeout", format_duration(idle));
        }
        field("maxIncomingStreams", self.max_incoming_streams.to_string());
        field("disablePathMTUDiscovery", self.disable_path_mtu_discovery.to_string());
        field("keepAlivePeriod", format_duration(self.keep_alive_period));
        field("handshakeIdleTimeout", format_duration(self.handshake_idle_timeout));
        field("maxIncomingUniStreams", self.max_incoming_uni_streams.to_string());
        block
    }
}

/// Render the server configuration
pub fn render_server_config(port: u16, password: &str, cert_path: &Path, key_path: &Path) -> String {
    let bandwidth = Bandwidth::gbps(1);
    let block_list: String = BLOCKED_PORTS
        .iter()
        .map(|p| format!("  - \"{}\"\n", p))
        .collect();

    format!(
        r#"# Hysteria2 Server Configuration
# Auto-generated server configuration

listen: :{port}
auth:
  type: password
  password: {password}

tls:
  cert: {cert}
  key: {key}

# QUIC optimizations
{quic}
# Advanced settings
bandwidth:
  up: {bandwidth}
  down: {bandwidth}

# Enable UDP relay
relay:
  disable: false

# Obfuscation - Salamander
obfs:
  type: salamander
  salamander:
    password: {password}

# Logging
log:
  level: warn
  file: {log_file}

# Block some common ports for security
blockList:
{block_list}
# Masquerade
masquerade:
  type: proxy
  proxy:
    url: {masquerade}
    rewriteHost: true
"#,
        port = port,
        password = password,
        cert = cert_path.display(),
        key = key_path.display(),
        quic = QuicTuning::server().render(),
        bandwidth = bandwidth,
        log_file = SERVER_LOG_FILE,
        block_list = block_list,
        masquerade = MASQUERADE_URL,
    )
}

/// `host:port`, with IPv6 literals bracketed
fn server_address(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Render a client configuration exposing SOCKS5 on `127.0.0.1:socks_port`
pub fn render_client_config(host: &str, port: u16, socks_port: u16, password: &str) -> String {
    let ten_secs = format_duration(Duration::from_secs(10));

    format!(
        r#"# Hysteria2 Client Configuration
# Auto-generated configuration
server: {server}
auth: {password}

# QUIC tuning
{quic}
# Connection behaviour
fastOpen: true
lazy: false

# Obfuscation - Salamander
obfs:
  type: salamander
  salamander:
    password: {password}

# Local SOCKS5 listener
socks5:
  listen: 127.0.0.1:{socks_port}
  disableUDP: false

# TLS
tls:
  sni: {sni}
  insecure: true
  serverName: {sni}

# Transport
transport:
  congestionControl: bbr

# TCP options
tcpKeepAlive: {ten_secs}
tcpNoDelay: true
tcpUserTimeout: {tcp_user_timeout}

# Buffers
socksOutboundBufferSize: 262144

# Resolver
resolver:
  type: https
  https:
    addr: {resolver}
    timeout: {ten_secs}

# Logging
log:
  level: warn
"#,
        server = server_address(host, port),
        password = password,
        quic = QuicTuning::client().render(),
        socks_port = socks_port,
        sni = CLIENT_SNI,
        ten_secs = ten_secs,
        tcp_user_timeout = format_duration(Duration::from_secs(30)),
        resolver = CLIENT_RESOLVER,
    )
}
