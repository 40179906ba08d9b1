//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

use crate::config::loader::{read_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::SyncConfig;

#[derive(Debug, Parser)]
#[command(name = "vcl-sync")]
#[command(about = "Keeps Varnish VCL in sync with an etcd tree", long_about = None)]
pub struct Cli {
    /// Store address, e.g. http://127.0.0.1:4001
    pub store: Option<String>,

    /// Optional TOML config file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store key to watch. Include the leading slash
    #[arg(long)]
    pub key: Option<String>,

    /// Path to the VCL templates
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// The file to write the main VCL to
    #[arg(long)]
    pub vcl: Option<PathBuf>,

    /// The file to write the directors to
    #[arg(long)]
    pub directors: Option<PathBuf>,

    /// The secret file used when connecting to varnish
    #[arg(long)]
    pub secret: Option<PathBuf>,

    /// Varnish server to connect to, with admin port
    #[arg(long)]
    pub varnish: Option<String>,

    /// The varnishadm program
    #[arg(long)]
    pub varnishadm: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Sync once and exit instead of watching
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Overlay flags on top of `config`.
    pub fn apply(&self, config: &mut SyncConfig) {
        if let Some(store) = &self.store {
            config.store.address = store.clone();
        }
        if let Some(key) = &self.key {
            config.store.prefix = key.clone();
        }
        if let Some(dir) = &self.templates {
            config.render.template_dir = dir.clone();
        }
        if let Some(path) = &self.vcl {
            config.render.routing_out = path.clone();
        }
        if let Some(path) = &self.directors {
            config.render.upstreams_out = path.clone();
        }
        if let Some(path) = &self.secret {
            config.reload.secret_path = path.clone();
        }
        if let Some(addr) = &self.varnish {
            config.reload.admin_address = addr.clone();
        }
        if let Some(path) = &self.varnishadm {
            config.reload.admin_program = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }

    /// Config file (or defaults) with flags applied, validated.
    pub fn resolve(&self) -> Result<SyncConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => SyncConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::io::Write;

    #[test]
    fn test_defaults_with_store() {
        let cli = Cli::parse_from(["vcl-sync", "http://127.0.0.1:4001"]);
        let config = cli.resolve().unwrap();

        assert_eq!(config.store.address, "http://127.0.0.1:4001");
        assert_eq!(config.store.prefix, "/varnish");
        assert_eq!(config.render.routing_out, PathBuf::from("/etc/varnish/default.vcl"));
        assert!(!cli.once);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[store]\naddress = \"http://10.0.0.1:4001\"\nprefix = \"/file\"\n[reload]\nadmin_address = \"10.0.0.2:6082\""
        )
        .unwrap();

        let args: Vec<OsString> = vec![
            "vcl-sync".into(),
            "--config".into(),
            file.path().into(),
            "--key".into(),
            "/edge".into(),
        ];
        let cli = Cli::parse_from(args);
        let config = cli.resolve().unwrap();

        assert_eq!(config.store.address, "http://10.0.0.1:4001");
        assert_eq!(config.store.prefix, "/edge");
        assert_eq!(config.reload.admin_address, "10.0.0.2:6082");
    }

    #[test]
    fn test_missing_store_is_fatal() {
        let cli = Cli::parse_from(["vcl-sync"]);
        assert!(matches!(cli.resolve(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_store_without_host_is_fatal() {
        let cli = Cli::parse_from(["vcl-sync", "127.0.0.1:4001"]);
        assert!(matches!(cli.resolve(), Err(ConfigError::Validation(_))));
    }
}
