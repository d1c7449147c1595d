//! TOML configuration
//!
//! ```toml
//! header_scan_lines = 30
//! sheet_header_scan_rows = 10
//!
//! [dedup]
//! amount_epsilon = "0.01"
//! time_tolerance_hours = 48
//! platform_keywords = ["支付宝", "alipay", "蚂蚁"]
//! ```
//!
//! Every key is optional; a missing file means all defaults.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::dedup::DedupConfig;
use crate::importers::ParseOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub parsing: ParseOptions,
    pub dedup: DedupConfig,
}

/// `<config_home>/ledger-ingest/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir =
        dir_spec::config_home().ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("ledger-ingest").join("config.toml"))
}

/// Load `explicit` if given (it must exist), else the default location if present
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path()?;
            if !path.exists() {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            path
        }
    };

    let text =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config = parse_config(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<Config> {
    Ok(toml::from_str(text)?)
}
