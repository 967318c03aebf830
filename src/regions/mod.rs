// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-session memory region tables.
//!
//! Every connected session owns one [`RegionTable`] recording the memory
//! grants it has registered. Transfer validation consults only the calling
//! session's table, so a range registered by one session can never satisfy
//! a transfer requested by another, even if the byte ranges overlap.

use std::collections::HashMap;

use crate::errors::BrokerError;
use crate::protocol::{GrantHandle, RegionGrant, RegionId};

/// A range that passed verification. Grant bases and request addresses
/// share one physical address space, so the interval comes back as
/// requested, not translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysRange {
    pub start: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct MemoryRegion {
    id: RegionId,
    base: u64,
    bytes: u64,
}

impl MemoryRegion {
    /// Whole-interval containment. Partial overlap does not count.
    fn contains(&self, addr: u64, bytes: u64) -> bool {
        let Some(request_end) = addr.checked_add(bytes) else {
            return false;
        };
        let Some(region_end) = self.base.checked_add(self.bytes) else {
            return false;
        };
        addr >= self.base && request_end <= region_end
    }
}

/// The memory grants registered by one session.
#[derive(Debug, Default)]
pub struct RegionTable {
    regions: HashMap<GrantHandle, MemoryRegion>,
    next_region: u64,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant. Registering a handle that is already present is an
    /// error; the existing region is left untouched.
    pub fn register(&mut self, grant: RegionGrant) -> Result<RegionId, BrokerError> {
        if self.regions.contains_key(&grant.handle) {
            return Err(BrokerError::RegionInUse {
                handle: grant.handle,
            });
        }
        self.next_region += 1;
        let id = RegionId(self.next_region);
        self.regions.insert(
            grant.handle,
            MemoryRegion {
                id,
                base: grant.base,
                bytes: grant.bytes,
            },
        );
        Ok(id)
    }

    /// Remove a grant. Unknown or already-removed handles are a local
    /// error, not a crash.
    pub fn deregister(&mut self, handle: GrantHandle) -> Result<(), BrokerError> {
        match self.regions.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(BrokerError::RegionNotFound { handle }),
        }
    }

    /// Check `[addr, addr+bytes)` against the registered regions.
    ///
    /// Succeeds only if the entire interval lies within a single region of
    /// this table. Zero-length and overflowing requests never verify.
    pub fn verify(&self, addr: u64, bytes: u64) -> Option<PhysRange> {
        if bytes == 0 {
            return None;
        }
        self.regions
            .values()
            .find(|region| region.contains(addr, bytes))
            .map(|_| PhysRange { start: addr, bytes })
    }

    /// Region id for a handle, if registered.
    pub fn lookup(&self, handle: GrantHandle) -> Option<RegionId> {
        self.regions.get(&handle).map(|region| region.id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
