//! Byte-bounded LRU tile cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::key::TileKey;
use crate::tile::PixelTile;

struct Entry {
    tile: Arc<PixelTile>,
    stamp: u64,
}

/// LRU cache of rendered tiles capped at a total pixel byte count.
///
/// Recency is tracked with a monotonically increasing stamp per entry;
/// `order` maps stamps back to keys so the oldest entry is always first.
pub struct TileCache {
    entries: HashMap<TileKey, Entry>,
    order: BTreeMap<u64, TileKey>,
    clock: u64,
    bytes: usize,
    budget: usize,
}

impl TileCache {
    /// Creates an empty cache holding at most `budget` bytes of pixels.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
            bytes: 0,
            budget,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Looks up a tile and marks it most recently used.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<PixelTile>> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.stamp);
        entry.stamp = stamp;
        self.order.insert(stamp, *key);
        Some(Arc::clone(&entry.tile))
    }

    /// Looks up a tile without touching its recency.
    #[must_use]
    pub fn peek(&self, key: &TileKey) -> Option<Arc<PixelTile>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry.tile))
    }

    /// Returns true if `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts a tile, replacing any previous tile under the same key and
    /// evicting least recently used tiles until the budget is met.
    ///
    /// A tile larger than the whole budget is still kept, alone.
    pub fn insert(&mut self, key: TileKey, tile: Arc<PixelTile>) {
        self.remove(&key);
        let cost = tile.byte_len();
        while self.bytes + cost > self.budget {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.bytes = self.bytes.saturating_sub(evicted.tile.byte_len());
            }
        }
        let stamp = self.tick();
        self.bytes += cost;
        self.order.insert(stamp, key);
        self.entries.insert(key, Entry { tile, stamp });
    }

    /// Removes a tile.
    pub fn remove(&mut self, key: &TileKey) -> Option<Arc<PixelTile>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.stamp);
        self.bytes = self.bytes.saturating_sub(entry.tile.byte_len());
        Some(entry.tile)
    }

    /// Drops every tile.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.bytes = 0;
    }

    /// Number of cached tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes of pixels currently cached.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Byte budget.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.budget
    }
}
