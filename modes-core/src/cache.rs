//! Recently-seen ICAO address cache.
//!
//! Addresses are recorded when they arrive in a DF11/17 frame whose checksum
//! passed without correction. For DF0/4/5/16/20/21 the address is only
//! recoverable as checksum XOR parity field, and noise produces plausible
//! fake addresses: a recovered address is trusted only if it sits in this
//! cache and is younger than the TTL.
//!
//! The table is fixed-size and lossy. Each address hashes to one slot and a
//! later `record` silently evicts whatever occupied it.

use crate::types::{icao_to_u32, Icao};

/// Number of slots. Must be a power of two.
pub const ICAO_CACHE_LEN: usize = 1024;

/// Default time-to-live of a cached address, seconds.
pub const ICAO_CACHE_TTL: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheEntry {
    addr: u32,
    seen: f64,
}

/// Fixed-slot cache of validated ICAO addresses.
#[derive(Debug, Clone)]
pub struct IcaoCache {
    ttl: f64,
    slots: Vec<Option<CacheEntry>>,
}

/// Slot index for a 24-bit address: two xorshift-multiply rounds and a
/// final fold, masked to the table size.
pub fn slot_for(addr: u32) -> usize {
    let mut a = addr;
    a = ((a >> 16) ^ a).wrapping_mul(0x45d9f3b);
    a = ((a >> 16) ^ a).wrapping_mul(0x45d9f3b);
    a = (a >> 16) ^ a;
    a as usize & (ICAO_CACHE_LEN - 1)
}

impl IcaoCache {
    pub fn new(ttl: f64) -> Self {
        IcaoCache {
            ttl,
            slots: vec![None; ICAO_CACHE_LEN],
        }
    }

    pub fn ttl(&self) -> f64 {
        self.ttl
    }

    /// Record `icao` as seen at `now`, overwriting its slot.
    pub fn record(&mut self, icao: Icao, now: f64) {
        let addr = icao_to_u32(&icao);
        self.slots[slot_for(addr)] = Some(CacheEntry { addr, seen: now });
    }

    /// True iff the slot for `icao` holds exactly that address and it was
    /// recorded no more than `ttl` seconds before `now`.
    pub fn was_recently_seen(&self, icao: &Icao, now: f64) -> bool {
        let addr = icao_to_u32(icao);
        match self.slots[slot_for(addr)] {
            Some(entry) => entry.addr == addr && now - entry.seen <= self.ttl,
            None => false,
        }
    }

    /// Occupied slots, expired or not.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }
}

impl Default for IcaoCache {
    fn default() -> Self {
        IcaoCache::new(ICAO_CACHE_TTL)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
