// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The service name is empty; the registered name would be unusable.
    #[error("service_name must not be empty")]
    EmptyServiceName,
    /// The service name contains characters the directory cannot accept.
    #[error("service_name '{name}' contains whitespace")]
    InvalidServiceName { name: String },
}
