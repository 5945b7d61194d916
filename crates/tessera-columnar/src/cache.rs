#![forbid(unsafe_code)]

use lru::LruCache;
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
pub struct TileCacheConfig {
    /// Decoded tiles kept alive at once (default: 64).
    pub max_entries: usize,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self { max_entries: 64 }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Identifies one attribute for the lifetime of the cache that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TileKey {
    attribute: AttributeId,
    tile: usize,
}

type CachedTile = Arc<dyn Any + Send + Sync>;

struct CacheInner {
    entries: LruCache<TileKey, CachedTile>,
    stats: CacheStats,
}

/// Decoded tiles shared between readers, keyed by (attribute, tile).
///
/// Readers get reference-counted handles; an evicted tile stays alive for as
/// long as some reader still holds it.
pub struct TileCache {
    inner: Mutex<CacheInner>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(TileCacheConfig::default())
    }
}

impl TileCache {
    pub fn new(config: TileCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn allocate_id(&self) -> AttributeId {
        AttributeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the cached tile, decoding and inserting it on a miss.
    ///
    /// The lock is not held while decoding; two readers racing on the same
    /// miss both decode and the later insert wins.
    pub fn get_or_decode<T, F>(&self, attribute: AttributeId, tile: usize, decode: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let key = TileKey { attribute, tile };
        {
            let mut inner = self.inner.lock().expect("tile cache poisoned");
            if let Some(hit) = inner.entries.get(&key).cloned() {
                if let Ok(hit) = hit.downcast::<T>() {
                    inner.stats.hits += 1;
                    return hit;
                }
            }
            inner.stats.misses += 1;
        }

        log::debug!("tile cache miss: attribute {:?} tile {tile}", attribute);
        let decoded = Arc::new(decode());
        let erased: CachedTile = decoded.clone();

        let mut inner = self.inner.lock().expect("tile cache poisoned");
        if let Some((evicted, _)) = inner.entries.push(key, erased) {
            if evicted != key {
                inner.stats.evictions += 1;
                log::debug!(
                    "tile cache evicted attribute {:?} tile {}",
                    evicted.attribute,
                    evicted.tile
                );
            }
        }
        decoded
    }

    /// Drops every cached tile of `attribute`.
    pub fn invalidate(&self, attribute: AttributeId) {
        let mut inner = self.inner.lock().expect("tile cache poisoned");
        let keys: Vec<TileKey> = inner
            .entries
            .iter()
            .map(|(k, _)| *k)
            .filter(|k| k.attribute == attribute)
            .collect();
        for key in keys {
            inner.entries.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("tile cache poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().expect("tile cache poisoned").stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_read_is_a_hit() {
        let cache = TileCache::new(TileCacheConfig { max_entries: 2 });
        let id = cache.allocate_id();
        let a = cache.get_or_decode(id, 0, || vec![1u8, 2, 3]);
        let b = cache.get_or_decode(id, 0, || -> Vec<u8> { panic!("decoded twice") });
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                evictions: 0
            }
        );
    }

    #[test]
    fn least_recently_used_tile_is_evicted() {
        let cache = TileCache::new(TileCacheConfig { max_entries: 2 });
        let id = cache.allocate_id();
        cache.get_or_decode(id, 0, || 0u32);
        cache.get_or_decode(id, 1, || 1u32);
        cache.get_or_decode(id, 0, || 0u32);
        cache.get_or_decode(id, 2, || 2u32);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);

        // Tile 1 was the least recently used one.
        let mut decoded = false;
        cache.get_or_decode(id, 1, || {
            decoded = true;
            1u32
        });
        assert!(decoded);
    }

    #[test]
    fn invalidate_only_touches_one_attribute() {
        let cache = TileCache::default();
        let a = cache.allocate_id();
        let b = cache.allocate_id();
        cache.get_or_decode(a, 0, || 'a');
        cache.get_or_decode(b, 0, || 'b');
        cache.invalidate(a);
        assert_eq!(cache.len(), 1);
    }
}
