// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;

/// Service configuration, typically loaded from a YAML file.
///
/// The registered discovery name is `"{service_name}.{device_id}"`, one
/// name per hardware device being served.
///
/// # Example
/// ```yaml
/// service_name: xeon_phi_dma
/// device_id: 0
/// reply:
///   warn_after_retries: 8
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub service_name: String,
    #[serde(default)]
    pub device_id: u32,
    #[serde(default)]
    pub reply: ReplyOptions,
}

impl BrokerConfig {
    /// The name registered with the discovery directory.
    pub fn registered_name(&self) -> String {
        format!("{}.{}", self.service_name, self.device_id)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            service_name: "xeon_phi_dma".to_string(),
            device_id: 0,
            reply: ReplyOptions::default(),
        }
    }
}

/// Options for the reply delivery engine.
///
/// # Fields
/// * `warn_after_retries` - escalate busy-retry logging to `warn!` once a
///   single reply has been retried this many times (optional)
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyOptions {
    pub warn_after_retries: Option<u32>,
}

impl Default for ReplyOptions {
    fn default() -> Self {
        Self {
            warn_after_retries: Some(8),
        }
    }
}

/// Load a config from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BrokerConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let cfg: BrokerConfig = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Validate a loaded config.
///
/// The directory cannot register empty names or names containing
/// whitespace, so both are rejected up front.
pub fn validate_config(cfg: &BrokerConfig) -> Result<(), ConfigError> {
    if cfg.service_name.is_empty() {
        return Err(ConfigError::EmptyServiceName);
    }
    if cfg.service_name.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidServiceName {
            name: cfg.service_name.clone(),
        });
    }
    Ok(())
}

/// Load and validate a config from a YAML file.
pub fn load_and_validate_config<P: AsRef<Path>>(
    path: P,
) -> Result<BrokerConfig, Box<dyn std::error::Error>> {
    let cfg = load_config(path)?;
    validate_config(&cfg)?;
    Ok(cfg)
}
