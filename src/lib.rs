// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // in-process collaborator implementations
pub mod broker;     // session handling + transfer dispatch
pub mod completion; // completion routing
pub mod config;     // config + validation
pub mod errors;     // error handling
pub mod lifecycle;  // startup state machine
pub mod observability;
pub mod protocol;   // client-facing message shapes
pub mod regions;    // per-session region tables
pub mod reply;      // reliable reply delivery
pub mod traits;     // collaborator contracts
