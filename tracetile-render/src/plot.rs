//! Trace plot: lays visible tiles out across a viewport.
#![allow(clippy::cast_possible_truncation)]

use std::sync::Arc;

use image::{imageops, RgbaImage};
use tracetile_core::{AnySource, ComplexSource, RealSource, Viewport};
use tracetile_dsp::{DemodMode, FrequencyDemod};

use crate::config::SchedulerConfig;
use crate::scheduler::TileScheduler;
use crate::surface::RenderSurface;
use crate::tile::PixelTile;
use crate::Result;

/// One tile to draw: copy `width` columns of `tile` starting at `src_x` to
/// viewport column `dest_x`.
#[derive(Debug, Clone)]
pub struct TileDraw {
    /// Destination column in the viewport.
    pub dest_x: u32,
    /// Columns to copy.
    pub width: u32,
    /// First source column in the tile.
    pub src_x: u32,
    /// Tile image (a transparent placeholder while rendering).
    pub tile: Arc<PixelTile>,
    /// False while the tile is still a placeholder.
    pub ready: bool,
}

/// A time-domain trace plot of one source.
pub struct TracePlot {
    scheduler: TileScheduler,
    demod: Option<Arc<FrequencyDemod>>,
}

impl TracePlot {
    /// Creates a plot of `source`.
    ///
    /// # Errors
    /// Returns an error if the scheduler cannot be created.
    pub fn new(
        source: AnySource,
        surface: Arc<dyn RenderSurface>,
        config: &SchedulerConfig,
    ) -> Result<Self> {
        Ok(Self {
            scheduler: TileScheduler::new(source, surface, config)?,
            demod: None,
        })
    }

    /// Creates a plot of the instantaneous frequency of `source`.
    ///
    /// # Errors
    /// Returns an error if the scheduler cannot be created.
    pub fn demodulated(
        source: Arc<ComplexSource>,
        mode: DemodMode,
        surface: Arc<dyn RenderSurface>,
        config: &SchedulerConfig,
    ) -> Result<Self> {
        let demod = Arc::new(FrequencyDemod::with_mode(source, mode));
        let plotted: Arc<RealSource> = demod.clone();
        Ok(Self {
            scheduler: TileScheduler::new(AnySource::Real(plotted), surface, config)?,
            demod: Some(demod),
        })
    }

    /// The tile scheduler behind this plot.
    #[must_use]
    pub fn scheduler(&self) -> &TileScheduler {
        &self.scheduler
    }

    /// Demodulation mode, for demodulated plots.
    #[must_use]
    pub fn demod_mode(&self) -> Option<DemodMode> {
        self.demod.as_ref().map(|demod| demod.mode())
    }

    /// Switches the demodulation mode, dropping tiles rendered in the old
    /// mode and requesting a repaint. Returns false for plots that are not
    /// demodulated.
    pub fn set_demod_mode(&self, mode: DemodMode) -> bool {
        let Some(demod) = &self.demod else {
            return false;
        };
        if demod.set_mode(mode) != mode {
            log::debug!("{}: demod mode -> {mode}", self.scheduler.source_id());
            self.scheduler.clear_cache();
            self.scheduler.surface().invalidate();
        }
        true
    }

    /// Changes the plot height, dropping cached tiles.
    pub fn set_height(&self, height: u32) {
        self.scheduler.set_tile_height(height);
    }

    /// Tile width for a viewport `width` pixels wide: one tile per worker.
    #[must_use]
    pub fn tile_width(&self, width: u32) -> u32 {
        let threads = u32::try_from(self.scheduler.worker_threads()).unwrap_or(u32::MAX);
        (width / threads.max(1)).max(1)
    }

    /// Runs a paint pass over `viewport` and returns the tiles to draw,
    /// left to right.
    ///
    /// Every call starts a new frame: tiles still rendering that this pass
    /// no longer asks for are dropped by the workers.
    pub fn paint(&self, viewport: &Viewport) -> Vec<TileDraw> {
        self.scheduler.begin_frame();
        let range = viewport.view_range();
        let width = viewport.width();
        if range.is_empty() || width == 0 {
            return Vec::new();
        }

        let spc = viewport.samples_per_column();
        let tile_px = self.tile_width(width);
        // Saturates only at extreme zoom-out; `x_offset` still stays below `tile_px`.
        let samples_per_tile = u64::from(tile_px).saturating_mul(spc);
        let mut tile_index = range.minimum / samples_per_tile;
        let x_offset = ((range.minimum % samples_per_tile) / spc) as u32;

        let mut draws = Vec::new();
        let (tile, ready) = self.scheduler.request(tile_index, samples_per_tile, tile_px);
        draws.push(TileDraw {
            dest_x: 0,
            width: (tile_px - x_offset).min(width),
            src_x: x_offset,
            tile,
            ready,
        });
        tile_index += 1;

        let mut x = tile_px - x_offset;
        while x < width {
            let (tile, ready) = self.scheduler.request(tile_index, samples_per_tile, tile_px);
            draws.push(TileDraw {
                dest_x: x,
                width: tile_px.min(width - x),
                src_x: 0,
                tile,
                ready,
            });
            tile_index += 1;
            x += tile_px;
        }
        draws
    }
}

impl std::fmt::Debug for TracePlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracePlot")
            .field("scheduler", &self.scheduler)
            .field("demod_mode", &self.demod_mode())
            .finish()
    }
}

/// Draws tiles into a transparent `width` x `height` image.
#[must_use]
pub fn composite(draws: &[TileDraw], width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);
    for draw in draws {
        let src = draw.tile.image();
        if draw.src_x >= src.width() {
            continue;
        }
        let columns = draw.width.min(src.width() - draw.src_x);
        let rows = src.height().min(height);
        let piece = imageops::crop_imm(src, draw.src_x, 0, columns, rows).to_image();
        imageops::replace(&mut canvas, &piece, i64::from(draw.dest_x), 0);
    }
    canvas
}
