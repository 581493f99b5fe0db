//! Result cache keyed by the complete [`SimConfig`].
//!
//! The simulator itself keeps no state between calls. Callers that recompute
//! on every configuration change (slider drags, repeated CLI queries) can
//! put this LRU in front of [`simulate`]. Because the key is the whole
//! configuration, any changed field is a miss.

use std::cell::Cell;
use std::collections::HashMap;

use crate::runtime::pipeline::{simulate, AttentionMaps, SimConfig};

/// Cache statistics.
#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// LRU cache entry.
struct CacheEntry {
    maps: AttentionMaps,
    last_access: Cell<u64>,
}

/// Memoizing front end for [`simulate`].
pub struct AttentionCache {
    /// Maximum number of stored configurations (at least 1).
    capacity: usize,

    entries: HashMap<SimConfig, CacheEntry>,

    /// Access counter for LRU.
    access_counter: u64,

    /// Stats.
    pub stats: CacheStats,
}

impl AttentionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            access_counter: 0,
            stats: CacheStats::default(),
        }
    }

    /// Stored result for `config`, computing it on a miss.
    ///
    /// The key is cloned only when a new entry is inserted.
    pub fn get_or_compute(&mut self, config: &SimConfig) -> &AttentionMaps {
        self.access_counter += 1;
        let tick = self.access_counter;

        if !self.entries.contains_key(config) {
            self.stats.misses += 1;
            tracing::debug!("attention cache miss (seed={})", config.seed);
            while self.entries.len() >= self.capacity && !self.entries.is_empty() {
                self.evict_lru();
            }
            let entry = self.entries.entry(config.clone()).or_insert(CacheEntry {
                maps: simulate(config),
                last_access: Cell::new(tick),
            });
            return &entry.maps;
        }

        self.stats.hits += 1;
        tracing::debug!("attention cache hit (seed={})", config.seed);
        let entry = &self.entries[config];
        entry.last_access.set(tick);
        &entry.maps
    }

    /// Whether `config` currently has a stored result.
    pub fn contains(&self, config: &SimConfig) -> bool {
        self.entries.contains_key(config)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every stored result. Stats are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Evict the least-recently-used entry.
    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access.get())
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            tracing::debug!("attention cache evicted (seed={})", key.seed);
        }
    }
}

impl Default for AttentionCache {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::TokenMode;

    fn cfg(seed: u32) -> SimConfig {
        SimConfig {
            text: "one two three".to_string(),
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_creation() {
        let cache = AttentionCache::default();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), crate::config::DEFAULT_CACHE_CAPACITY);
        assert_eq!(cache.stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = AttentionCache::new(0);
        assert_eq!(cache.capacity(), 1);
        let _ = cache.get_or_compute(&cfg(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hit_returns_same_result() {
        let mut cache = AttentionCache::new(4);
        let first = cache.get_or_compute(&cfg(1)).clone();
        let second = cache.get_or_compute(&cfg(1)).clone();
        assert_eq!(first, second);
        assert_eq!(first, simulate(&cfg(1)));
        assert_eq!(cache.stats.hits, 1);
        assert_eq!(cache.stats.misses, 1);
        assert!((cache.stats.hit_rate() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_any_field_change_misses() {
        let mut cache = AttentionCache::new(16);
        let base = cfg(7);
        let _ = cache.get_or_compute(&base);

        let variants = [
            SimConfig { text: "one two four".into(), ..base.clone() },
            SimConfig { token_mode: TokenMode::Char, ..base.clone() },
            SimConfig { d_model: 64, ..base.clone() },
            SimConfig { n_heads: 2, ..base.clone() },
            SimConfig { causal: !base.causal, ..base.clone() },
            SimConfig { seed: 8, ..base.clone() },
        ];
        for v in &variants {
            assert!(!cache.contains(v));
            let got = cache.get_or_compute(v).clone();
            assert_eq!(got, simulate(v));
        }
        assert_eq!(cache.stats.misses, 1 + variants.len() as u64);
        assert_eq!(cache.stats.hits, 0);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = AttentionCache::new(2);
        let _ = cache.get_or_compute(&cfg(1));
        let _ = cache.get_or_compute(&cfg(2));
        // touch 1 so 2 becomes the oldest
        let _ = cache.get_or_compute(&cfg(1));
        let _ = cache.get_or_compute(&cfg(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&cfg(1)));
        assert!(!cache.contains(&cfg(2)));
        assert!(cache.contains(&cfg(3)));
        assert_eq!(cache.stats.evictions, 1);
    }

    #[test]
    fn test_hit_serves_stored_entry() {
        let mut cache = AttentionCache::new(4);
        let first = cache.get_or_compute(&cfg(5)) as *const AttentionMaps;
        for _ in 0..3 {
            let again = cache.get_or_compute(&cfg(5)) as *const AttentionMaps;
            assert_eq!(first, again);
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats.hits, 3);
        assert_eq!(cache.stats.misses, 1);
    }

    #[test]
    fn test_hits_refresh_recency() {
        let mut cache = AttentionCache::new(3);
        for seed in 1..=3 {
            let _ = cache.get_or_compute(&cfg(seed));
        }
        // hits on 1 and 2 leave 3 as the oldest
        let _ = cache.get_or_compute(&cfg(1));
        let _ = cache.get_or_compute(&cfg(2));
        let _ = cache.get_or_compute(&cfg(4));
        assert!(!cache.contains(&cfg(3)));
        assert!(cache.contains(&cfg(1)) && cache.contains(&cfg(2)) && cache.contains(&cfg(4)));
    }

    #[test]
    fn test_clear_keeps_stats() {
        let mut cache = AttentionCache::new(2);
        let _ = cache.get_or_compute(&cfg(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats.misses, 1);
    }
}
