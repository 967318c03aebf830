// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process implementations of the collaborator contracts, used by the
//! demo binary and the test suite.

pub mod mock;

pub use mock::{LoopbackDirectory, MockDmaEngine, ScriptedTransport};
