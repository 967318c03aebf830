// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Centralized message types for the broker's diagnostic and operational
//! logging. Each message is a struct implementing `Display` plus the
//! [`messages::StructuredLog`] trait, which keeps log strings out of the
//! hot paths and the field names consistent across subsystems.
//!
//! Messages are organized by subsystem:
//! * `messages::broker` - session and transfer dispatch events
//! * `messages::reply` - reply delivery and retry events
//! * `messages::lifecycle` - startup state machine events

pub mod messages;
