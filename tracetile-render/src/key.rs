//! Tile identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracetile_core::SampleRange;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle distinguishing the tiles of one plot from another's.
///
/// Allocated from a process-wide counter; two schedulers never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocates a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

/// Identity of one rendered tile.
///
/// Tile `n` covers samples `[n * samples_per_tile, (n + 1) * samples_per_tile)`
/// rendered `width_px` columns wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Plot the tile belongs to.
    pub source: SourceId,
    /// Tile index along the sample axis.
    pub tile_index: u64,
    /// Samples covered by one tile.
    pub samples_per_tile: u64,
    /// Tile width in pixels.
    pub width_px: u32,
}

impl TileKey {
    /// Samples covered by this tile.
    #[must_use]
    pub fn sample_range(&self) -> SampleRange {
        let start = self.tile_index.saturating_mul(self.samples_per_tile);
        SampleRange::new(start, start.saturating_add(self.samples_per_tile))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}x{}@{}px",
            self.source, self.tile_index, self.samples_per_tile, self.width_px
        )
    }
}

/// A tile waiting for the debounce timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingJob {
    /// Tile index along the sample axis.
    pub tile_index: u64,
    /// Samples covered by one tile.
    pub samples_per_tile: u64,
    /// Tile width in pixels.
    pub width_px: u32,
}

impl PendingJob {
    /// Identity of the tile this job renders.
    #[must_use]
    pub fn key(&self, source: SourceId) -> TileKey {
        TileKey {
            source,
            tile_index: self.tile_index,
            samples_per_tile: self.samples_per_tile,
            width_px: self.width_px,
        }
    }
}

impl From<TileKey> for PendingJob {
    fn from(key: TileKey) -> Self {
        Self {
            tile_index: key.tile_index,
            samples_per_tile: key.samples_per_tile,
            width_px: key.width_px,
        }
    }
}
