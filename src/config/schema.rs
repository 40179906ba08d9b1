//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to defaults so a config file is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the sync daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Key-value store settings (address, watched prefix).
    pub store: StoreConfig,

    /// Template and artifact locations.
    pub render: RenderConfig,

    /// Proxy admin settings used to load and activate revisions.
    pub reload: ReloadConfig,

    /// Watch stream reconnect policy.
    pub watch: WatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Key-value store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store address (e.g., "http://127.0.0.1:4001"). Mandatory.
    pub address: String,

    /// Key prefix to watch, including the leading slash.
    pub prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            prefix: "/varnish".to_string(),
        }
    }
}

impl StoreConfig {
    /// Key holding the hosts tree.
    pub fn hosts_key(&self) -> String {
        format!("{}/hosts", self.prefix.trim_end_matches('/'))
    }

    /// Key holding the upstreams tree.
    pub fn upstreams_key(&self) -> String {
        format!("{}/upstreams", self.prefix.trim_end_matches('/'))
    }
}

/// Template and output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directory holding `default.vcl` and `directors.vcl` templates.
    pub template_dir: PathBuf,

    /// Where the routing VCL is written.
    pub routing_out: PathBuf,

    /// Where the directors VCL is written.
    pub upstreams_out: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("./templates"),
            routing_out: PathBuf::from("/etc/varnish/default.vcl"),
            upstreams_out: PathBuf::from("/etc/varnish/directors.vcl"),
        }
    }
}

/// Proxy admin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Path to the varnishadm executable.
    pub admin_program: PathBuf,

    /// Admin endpoint, host:port.
    pub admin_address: String,

    /// Path to the shared secret file.
    pub secret_path: PathBuf,

    /// Discard the previously activated revision after a successful switch.
    pub discard_previous: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            admin_program: PathBuf::from("/usr/bin/varnishadm"),
            admin_address: "127.0.0.1:6082".to_string(),
            secret_path: PathBuf::from("/etc/varnish/secret"),
            discard_previous: false,
        }
    }
}

/// Watch stream reconnect policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Consecutive watch failures after which the stream is closed.
    pub max_consecutive_failures: u32,

    /// Pending notifications buffered for the reconcile loop.
    pub queue_depth: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_consecutive_failures: 10,
            queue_depth: 16,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [store]
            address = "http://10.1.1.1:4001"

            [reload]
            discard_previous = true
            "#,
        )
        .unwrap();

        assert_eq!(config.store.address, "http://10.1.1.1:4001");
        assert_eq!(config.store.prefix, "/varnish");
        assert!(config.reload.discard_previous);
        assert_eq!(config.reload.admin_address, "127.0.0.1:6082");
        assert_eq!(config.watch.max_consecutive_failures, 10);
    }

    #[test]
    fn test_tree_keys_follow_prefix() {
        let store = StoreConfig {
            prefix: "/edge/".to_string(),
            ..StoreConfig::default()
        };
        assert_eq!(store.hosts_key(), "/edge/hosts");
        assert_eq!(store.upstreams_key(), "/edge/upstreams");
    }
}
