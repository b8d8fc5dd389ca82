//! Configuration for the scriptable node
//!
//! Two groups of settings drive a node:
//! - [`ValidationSettings`] - the sample rate and block size used for the
//!   dry run every candidate script goes through before it can go live
//! - [`EngineLimits`] - safety limits applied to every Rhai interpreter a
//!   node creates
//!
//! Settings are stored as TOML. Every field has a default, so a partial file
//! (or no file at all) is valid.
//!
//! # Config Location
//!
//! The default config file lives in the platform config directory under
//! `scriptable-node/config.toml`:
//! - **Linux**: `~/.config/scriptable-node/config.toml`
//! - **macOS**: `~/Library/Application Support/scriptable-node/config.toml`
//! - **Windows**: `%APPDATA%\scriptable-node\config.toml`
//!
//! # Example
//!
//! ```toml
//! [validation]
//! sample_rate = 48000.0
//! block_size = 512
//!
//! [limits]
//! max_call_levels = 32
//! ```

use crate::error::{NodeError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
pub const APP_ID: &str = "scriptable-node";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Sample rate of the validation dry run
pub const DEFAULT_VALIDATION_SAMPLE_RATE: f64 = 44_100.0;

/// Block size of the validation dry run
pub const DEFAULT_VALIDATION_BLOCK_SIZE: usize = 1024;

/// Most ports a script may declare in one IO group or parameter direction
pub const DEFAULT_MAX_PORTS_PER_GROUP: usize = 256;

/// Top-level node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Dry-run parameters for script validation
    pub validation: ValidationSettings,
    /// Interpreter safety limits
    pub limits: EngineLimits,
}

/// Parameters of the synthetic render pass used to validate scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Sample rate handed to `node_prepare` during the dry run
    pub sample_rate: f64,
    /// Frames in the throwaway audio buffer
    pub block_size: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_VALIDATION_SAMPLE_RATE,
            block_size: DEFAULT_VALIDATION_BLOCK_SIZE,
        }
    }
}

/// Safety limits applied to each interpreter.
///
/// A value of 0 means unlimited where Rhai supports it. `max_operations`
/// bounds how much work a single hook call may do; it defaults to 0 so a
/// render hook is never interrupted. `max_ports_per_group` caps each IO
/// group and each parameter direction; a script declaring more is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    pub max_ports_per_group: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: 0,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
            max_ports_per_group: DEFAULT_MAX_PORTS_PER_GROUP,
        }
    }
}

impl NodeConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| NodeError::Config(format!("Invalid config: {}", e)))
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| NodeError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(NodeError::from)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&text)?;
        config.check()?;
        tracing::debug!("Loaded node config from {:?}", path);
        Ok(config)
    }

    /// Save to a config file, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(NodeError::from)
                    .context("Failed to create config directory")?;
            }
        }
        std::fs::write(path, self.to_toml_string()?)
            .map_err(NodeError::from)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Path of the per-user config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
    }

    /// Load the per-user config file, falling back to defaults
    pub fn load_or_default() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring config at {:?}: {}", path, e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Reject values the dry run cannot work with
    pub fn check(&self) -> Result<()> {
        if self.validation.block_size == 0 {
            return Err(NodeError::Config(
                "validation.block_size must be at least 1".to_string(),
            ));
        }
        if !(self.validation.sample_rate.is_finite() && self.validation.sample_rate > 0.0) {
            return Err(NodeError::Config(format!(
                "validation.sample_rate must be positive, got {}",
                self.validation.sample_rate
            )));
        }
        if self.limits.max_ports_per_group == 0 {
            return Err(NodeError::Config(
                "limits.max_ports_per_group must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
