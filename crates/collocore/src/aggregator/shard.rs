//! A shard's in-memory accumulator: a primitive open-addressing `u64 → u32`
//! hash map, with a side map absorbing the rare case where a single pair's
//! count would overflow `u32`.

use std::collections::HashMap;

const EMPTY: u64 = 0;

/// Open-addressing map from pair-key to count, linear-probed, backed by two
/// parallel arrays rather than a generic `HashMap<u64, u32>` so the shard's
/// memory footprint stays a tight `8 + 4` bytes per slot. A pair-key of
/// exactly `0` can never occur (it would require the self-pair
/// `head_id == coll_id == 0`, which is never emitted), so `0` safely
/// doubles as the empty-slot sentinel.
pub struct Shard {
    keys: Vec<u64>,
    counts: Vec<u32>,
    overflow: HashMap<u64, u64>,
    filled: usize,
}

impl Shard {
    pub fn new() -> Self {
        Shard::with_capacity(1024)
    }

    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(16);
        Shard { keys: vec![EMPTY; capacity], counts: vec![0; capacity], overflow: HashMap::new(), filled: 0 }
    }

    /// Number of distinct pairs currently held; this is what a configured
    /// spill threshold is measured against.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    fn probe(&self, key: u64) -> usize {
        let mask = self.keys.len() - 1;
        let mut idx = (key as usize) & mask;
        loop {
            if self.keys[idx] == EMPTY || self.keys[idx] == key {
                return idx;
            }
            idx = (idx + 1) & mask;
        }
    }

    fn maybe_grow(&mut self) {
        if self.filled * 10 < self.keys.len() * 7 {
            return;
        }
        let mut grown = Shard::with_capacity(self.keys.len() * 2);
        for (&key, &count) in self.keys.iter().zip(self.counts.iter()) {
            if key != EMPTY {
                grown.insert_raw(key, count);
            }
        }
        grown.overflow = std::mem::take(&mut self.overflow);
        *self = grown;
    }

    fn insert_raw(&mut self, key: u64, count: u32) {
        let idx = self.probe(key);
        if self.keys[idx] == EMPTY {
            self.keys[idx] = key;
            self.filled += 1;
        }
        self.counts[idx] = count;
    }

    /// Adds `amount` to `key`'s running count, inserting it at count 0 first
    /// if it is new to this shard.
    pub fn add(&mut self, key: u64, amount: u32) {
        self.maybe_grow();
        let idx = self.probe(key);
        if self.keys[idx] == EMPTY {
            self.keys[idx] = key;
            self.filled += 1;
        }
        match self.counts[idx].checked_add(amount) {
            Some(sum) => self.counts[idx] = sum,
            None => {
                let overflowed = (self.counts[idx] as u64 + amount as u64) - u32::MAX as u64;
                self.counts[idx] = u32::MAX;
                *self.overflow.entry(key).or_insert(0) += overflowed;
            }
        }
    }

    pub fn increment(&mut self, key: u64) {
        self.add(key, 1);
    }

    fn total(&self, idx: usize) -> u64 {
        let key = self.keys[idx];
        let base = self.counts[idx] as u64;
        base + self.overflow.get(&key).copied().unwrap_or(0)
    }

    /// Drains the shard, returning its entries sorted ascending by pair-key
    /// (the run-file sort order) and resetting the shard to empty.
    pub fn drain_sorted(&mut self) -> Vec<(u64, u64)> {
        let mut entries: Vec<(u64, u64)> = Vec::with_capacity(self.filled);
        for idx in 0..self.keys.len() {
            if self.keys[idx] != EMPTY {
                entries.push((self.keys[idx], self.total(idx)));
            }
        }
        entries.sort_unstable_by_key(|&(key, _)| key);
        *self = Shard::with_capacity(16);
        entries
    }
}

impl Default for Shard {
    fn default() -> Self {
        Shard::new()
    }
}
