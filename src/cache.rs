//! County cache (§4.4): keeps a bounded number of county containers
//! resident, evicting the least-recently-used one (by monotonic access
//! counter) when a new county must be activated and the cache is full.
//!
//! Grounded in the cache bookkeeping of `editor_db_open`/`editor_db_activate`
//! in `editor_db.c`: a fixed-size slot table, an ever-incrementing access
//! counter per slot, and a "fips with no county" negative-cache entry so a
//! repeated lookup for a county with no map data doesn't reopen the
//! container. Adapted here to single ownership (§5): the cache holds the
//! containers directly rather than reference-counted handles, since only
//! one container is ever active at a time.

use crate::config::Config;
use crate::container::Container;

const NO_COUNTY: u32 = u32::MAX;

struct Slot {
    fips: u32,
    last_used: u32,
    container: Option<Container>,
}

/// Fixed-capacity, LRU-by-access-counter cache of open containers.
///
/// The access counter is a plain `u32` that increments on every touch; when
/// it would wrap, every slot's recency is reset to zero and the counter
/// restarts at one (mirrors the source's `cache_tick` overflow handling).
/// This does *not* close or forget any resident container — the active
/// container (and every other cached one) stays exactly as open and
/// attributed to its fips as before the wrap; only the relative ordering
/// the LRU victim search relies on is reset, so the next eviction decision
/// after a wrap starts from "everything is equally fresh" instead of
/// carrying over comparisons made against pre-wrap counter values.
pub struct CountyCache {
    slots: Vec<Slot>,
    tick: u32,
}

impl CountyCache {
    pub fn new(config: &Config) -> CountyCache {
        let capacity = config.cache_size() as usize;
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Slot { fips: NO_COUNTY, last_used: 0, container: None });
        }
        CountyCache { slots, tick: 0 }
    }

    fn next_tick(&mut self) -> u32 {
        if self.tick == u32::MAX {
            for slot in &mut self.slots {
                slot.last_used = 0;
            }
            self.tick = 0;
        }
        self.tick += 1;
        self.tick
    }

    /// Returns the open container for `fips`, if cached, touching its
    /// recency counter.
    pub fn get_mut(&mut self, fips: u32) -> Option<&mut Container> {
        let tick = self.next_tick();
        for slot in &mut self.slots {
            if slot.fips == fips && slot.container.is_some() {
                slot.last_used = tick;
                return slot.container.as_mut();
            }
        }
        None
    }

    /// True if `fips` is cached as having no county data (negative cache).
    pub fn is_no_county(&self, fips: u32) -> bool {
        self.slots.iter().any(|s| s.fips == fips && s.container.is_none())
    }

    /// Records that `fips` has no county data, evicting a slot if needed.
    pub fn mark_no_county(&mut self, fips: u32) {
        if self.is_no_county(fips) {
            return;
        }
        let tick = self.next_tick();
        let idx = self.victim_index();
        self.slots[idx] = Slot { fips, last_used: tick, container: None };
    }

    /// Inserts a freshly opened container, evicting the least-recently-used
    /// slot if the cache is full. Returns the evicted container, if any, so
    /// the caller can flush it before it's dropped.
    pub fn insert(&mut self, fips: u32, container: Container) -> Option<Container> {
        let tick = self.next_tick();
        let idx = self.victim_index();
        let evicted = self.slots[idx].container.take();
        self.slots[idx] = Slot { fips, last_used: tick, container: Some(container) };
        evicted
    }

    /// Evicts `fips` unconditionally (used after a failed growth, §9, so the
    /// next activation retries from a clean reopen).
    pub fn evict(&mut self, fips: u32) -> Option<Container> {
        for slot in &mut self.slots {
            if slot.fips == fips {
                slot.fips = NO_COUNTY;
                slot.last_used = 0;
                return slot.container.take();
            }
        }
        None
    }

    fn victim_index(&self) -> usize {
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.last_used)
            .map(|(i, _)| i)
            .expect("cache has at least one slot")
    }

    /// Drains all containers, for a clean shutdown (`editor_db_close_all`).
    pub fn drain(&mut self) -> Vec<Container> {
        self.slots
            .iter_mut()
            .filter_map(|s| {
                s.fips = NO_COUNTY;
                s.last_used = 0;
                s.container.take()
            })
            .collect()
    }
}
