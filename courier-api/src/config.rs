//! HTTP boundary configuration

use serde::Deserialize;

/// Configuration for the HTTP server
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Enable or disable the HTTP server
    ///
    /// When disabled, notifications can only be queued by other means and
    /// the health probes are not served either.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address to bind the server to
    ///
    /// Common values:
    /// - `[::]:8080` (IPv6 any address, port 8080)
    /// - `0.0.0.0:8080` (IPv4 any address, port 8080)
    /// - `127.0.0.1:8080` (localhost only, port 8080)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Upper bound on the `size` of a listing page. Larger requests are
    /// clamped.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Requests running longer than this are answered with `408`
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}

const fn default_max_page_size() -> u32 {
    100
}

const fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
            max_page_size: default_max_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
