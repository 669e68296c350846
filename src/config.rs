//! Service configuration: environment variables (prefixed `QC_`), an optional
//! TOML override file, and CLI flags, in ascending priority.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "qc-analyzer", about = "Multimedia quality-control analysis service")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to, e.g. 0.0.0.0:8080.
    #[arg(long)]
    pub bind: Option<String>,

    /// Path to the probe (ffprobe-compatible) binary.
    #[arg(long)]
    pub probe_path: Option<String>,

    /// Path to the renderer (ffmpeg-compatible) binary.
    #[arg(long)]
    pub renderer_path: Option<String>,

    /// Root directory for temporary downloads and filter output.
    #[arg(long)]
    pub temp_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    pub probe_path: String,
    pub renderer_path: String,
    pub temp_root: PathBuf,
    pub max_file_size_bytes: u64,
    pub max_batch_items: usize,
    pub max_concurrent_batch_workers: usize,
    pub allowed_cors_origins: Vec<String>,
    pub websocket_origin_allowlist: Vec<String>,
    pub ai_endpoint_url: Option<String>,
    pub ai_model_id: Option<String>,
    pub startup_probe_timeout: DurationSeconds,
    pub shutdown_grace_period: DurationSeconds,
    pub probe_timeout: DurationSeconds,
    pub ai_timeout: DurationSeconds,
    pub download_timeout: DurationSeconds,
    pub probe_output_capture_limit_bytes: usize,
    /// Bypasses the SSRF host-range check in the Input Guard. Never set this
    /// outside of tests against local fixtures.
    pub allow_private_network_targets: bool,
}

/// Thin `u64`-seconds newtype so the TOML/env representation stays a plain
/// integer while call sites work with [`Duration`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(transparent)]
pub struct DurationSeconds(pub u64);

impl DurationSeconds {
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            probe_path: "ffprobe".to_string(),
            renderer_path: "ffmpeg".to_string(),
            temp_root: std::env::temp_dir().join("qc-analyzer"),
            max_file_size_bytes: 5 * 1024 * 1024 * 1024,
            max_batch_items: 100,
            max_concurrent_batch_workers: 100,
            allowed_cors_origins: Vec::new(),
            websocket_origin_allowlist: Vec::new(),
            ai_endpoint_url: None,
            ai_model_id: None,
            startup_probe_timeout: DurationSeconds(30),
            shutdown_grace_period: DurationSeconds(30),
            probe_timeout: DurationSeconds(300),
            ai_timeout: DurationSeconds(120),
            download_timeout: DurationSeconds(300),
            probe_output_capture_limit_bytes: 100 * 1024 * 1024,
            allow_private_network_targets: false,
        }
    }
}

impl AppConfig {
    /// Loading order (lowest to highest priority): defaults, TOML file, `QC_*`
    /// environment variables, CLI flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = if let Some(path) = cli.config.as_ref() {
            Self::from_toml(path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    fn from_toml(path: &PathBuf) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text).context("failed to parse config file as TOML")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("QC_BIND") {
            self.bind = v;
        }
        if let Ok(v) = std::env::var("QC_PROBE_PATH") {
            self.probe_path = v;
        }
        if let Ok(v) = std::env::var("QC_RENDERER_PATH") {
            self.renderer_path = v;
        }
        if let Ok(v) = std::env::var("QC_TEMP_ROOT") {
            self.temp_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("QC_MAX_FILE_SIZE_BYTES")
            && let Ok(v) = v.parse()
        {
            self.max_file_size_bytes = v;
        }
        if let Ok(v) = std::env::var("QC_MAX_BATCH_ITEMS")
            && let Ok(v) = v.parse()
        {
            self.max_batch_items = v;
        }
        if let Ok(v) = std::env::var("QC_AI_ENDPOINT_URL") {
            self.ai_endpoint_url = Some(v);
        }
        if let Ok(v) = std::env::var("QC_AI_MODEL_ID") {
            self.ai_model_id = Some(v);
        }
        if let Ok(v) = std::env::var("QC_ALLOWED_CORS_ORIGINS") {
            self.allowed_cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("QC_ALLOW_PRIVATE_NETWORK_TARGETS") {
            self.allow_private_network_targets = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(v) = cli.bind.clone() {
            self.bind = v;
        }
        if let Some(v) = cli.probe_path.clone() {
            self.probe_path = v;
        }
        if let Some(v) = cli.renderer_path.clone() {
            self.renderer_path = v;
        }
        if let Some(v) = cli.temp_root.clone() {
            self.temp_root = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bind.parse::<std::net::SocketAddr>().is_err() {
            bail!("invalid bind address: {}", self.bind);
        }
        if self.max_file_size_bytes == 0 {
            bail!("max_file_size_bytes must be positive");
        }
        if self.max_batch_items == 0 || self.max_batch_items > 100 {
            bail!("max_batch_items must be in 1..=100");
        }
        if self.max_concurrent_batch_workers == 0 {
            bail!("max_concurrent_batch_workers must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        AppConfig::default().validate().expect("default config should validate");
    }

    #[test]
    fn rejects_bad_bind_address() {
        let mut config = AppConfig::default();
        config.bind = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_batch_items_over_cap() {
        let mut config = AppConfig::default();
        config.max_batch_items = 101;
        assert!(config.validate().is_err());
    }
}
