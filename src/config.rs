//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.mediadispatch.toml` files.

use crate::store::StatsPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = ".mediadispatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Analyzer invocation settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Callback ingestion settings.
    #[serde(default)]
    pub callbacks: CallbackConfig,

    /// Result store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Analyzer invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Analyzer endpoint URL. Dispatch is refused while unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Time budget of one blocking invocation, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connection timeout, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Concurrent blocking invocations per sync dispatch.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_timeout() -> u64 {
    900 // 15 min, the analyzer downloads whole media files
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_pool_size() -> usize {
    crate::dispatch::DEFAULT_POOL_SIZE
}

/// Callback ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Reject callbacks with no task id instead of generating one.
    #[serde(default)]
    pub reject_orphans: bool,

    /// Records returned by a task query (at most 10).
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            reject_orphans: false,
            query_limit: default_query_limit(),
        }
    }
}

fn default_query_limit() -> usize {
    crate::ingest::MAX_TASK_RESULTS
}

/// Result store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Jsonl,
}

/// Result store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// File used by the `jsonl` backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How batch statistics treat repeated callbacks for one task.
    #[serde(default)]
    pub stats_policy: StatsPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            stats_policy: StatsPolicy::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("callback_results.jsonl")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref endpoint) = args.analyzer_url {
            self.analyzer.endpoint = Some(endpoint.clone());
        }
        if let Some(timeout) = args.timeout {
            self.analyzer.timeout_seconds = timeout;
        }

        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Some(crate::cli::Command::Serve(serve)) => {
                if let Some(ref host) = serve.host {
                    self.server.host = host.clone();
                }
                if let Some(port) = serve.port {
                    self.server.port = port;
                }
                if let Some(backend) = serve.store {
                    self.store.backend = backend;
                }
                if let Some(ref path) = serve.store_path {
                    self.store.path = path.clone();
                }
                if let Some(policy) = serve.stats_policy {
                    self.store.stats_policy = policy;
                }
                if serve.reject_orphans {
                    self.callbacks.reject_orphans = true;
                }
            }
            Some(crate::cli::Command::Dispatch(dispatch)) => {
                if let Some(pool_size) = dispatch.pool_size {
                    self.analyzer.pool_size = pool_size;
                }
            }
            Some(crate::cli::Command::Query(query)) => {
                if let Some(ref path) = query.store_path {
                    self.store.path = path.clone();
                }
            }
            None => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
