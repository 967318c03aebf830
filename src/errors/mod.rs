// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod broker;
mod config;
mod reply;
mod startup;

pub use broker::BrokerError;
pub use config::ConfigError;
pub use reply::ReplyError;
pub use startup::{DirectoryError, StartupError};
