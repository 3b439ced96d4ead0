//! tracetile-render: Tiled, demand-driven trace rendering.
//!
//! This crate turns sample sources into scrollable trace images:
//! - **Rasterizer** - decimates and normalizes a tile's samples into pixels
//! - **Tile cache** - byte-bounded LRU of rendered tiles
//! - **Scheduler** - debounced, deduplicated dispatch of tile jobs to a
//!   worker pool, dropping jobs the latest frame no longer wants
//! - **Trace plot** - lays tiles out across a viewport
//!
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod key;
mod plot;
pub mod raster;
mod scheduler;
mod surface;
mod tile;

pub use cache::TileCache;
pub use config::{SchedulerConfig, DEFAULT_DEBOUNCE, DEFAULT_TILE_HEIGHT, FALLBACK_CACHE_BYTES};
pub use error::{Error, Result};
pub use key::{PendingJob, SourceId, TileKey};
pub use plot::{composite, TileDraw, TracePlot};
pub use raster::rasterize;
pub use scheduler::{SchedulerStats, TileScheduler};
pub use surface::{NullSurface, RenderSurface};
pub use tile::PixelTile;
