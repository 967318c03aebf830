// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failures reported by the export / name-registration directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("export refused: {0}")]
    ExportRefused(String),
    #[error("name registration refused: {0}")]
    RegistrationRefused(String),
    /// The directory dropped its lifecycle channel before resolving.
    #[error("directory closed the lifecycle channel")]
    ChannelClosed,
}

/// Initialization failures. Either one aborts startup; the service never
/// reaches the running state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    #[error("service export failed: {0}")]
    ExportFailed(#[source] DirectoryError),
    /// Name registration failed after a successful export. The export is
    /// not rolled back; the endpoint stays claimed until process exit.
    #[error("name registration failed: {0}")]
    NameRegisterFailed(#[source] DirectoryError),
}
