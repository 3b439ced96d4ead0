//! Sample/pixel coordinate mapping.
//!
//! [`ViewConfig::samples_per_column`] is the only place the samples-per-column
//! ratio is derived; every conversion between pixel columns and sample
//! indices goes through it. The two conversions are lossy: many samples map
//! to one column, so `column_to_sample(sample_to_column(s))` may land up to
//! `samples_per_column - 1` samples before `s`.

use crate::{Error, Result, SampleRange};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// FFT size, zoom level and FFT skip for the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewConfig {
    fft_size: u64,
    zoom_level: u64,
    skip: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            zoom_level: 1,
            skip: 1,
        }
    }
}

impl ViewConfig {
    /// Creates a view configuration.
    ///
    /// # Errors
    /// Returns an error if any parameter is zero.
    pub fn new(fft_size: u64, zoom_level: u64, skip: u64) -> Result<Self> {
        if fft_size == 0 {
            return Err(Error::InvalidViewConfig("fft_size must be at least 1".into()));
        }
        if zoom_level == 0 {
            return Err(Error::InvalidViewConfig("zoom_level must be at least 1".into()));
        }
        if skip == 0 {
            return Err(Error::InvalidViewConfig("skip must be at least 1".into()));
        }
        Ok(Self {
            fft_size,
            zoom_level,
            skip,
        })
    }

    /// Builds a configuration from power-of-two control positions.
    ///
    /// `fft_power` selects `fft_size = 2^fft_power`. A non-negative
    /// `zoom_steps` zooms in by `2^zoom_steps` (capped at the FFT size); a
    /// negative value zooms out by skipping `2^-zoom_steps` FFTs per column.
    ///
    /// # Errors
    /// Returns an error if `fft_power` does not fit in 32 bits of FFT size.
    pub fn from_controls(fft_power: u32, zoom_steps: i32) -> Result<Self> {
        if fft_power > 31 {
            return Err(Error::InvalidViewConfig(format!(
                "fft power {fft_power} out of range"
            )));
        }
        let fft_size = 1u64 << fft_power;
        let steps = u64::from(zoom_steps.unsigned_abs()).min(31);
        let factor = (1u64 << steps).min(fft_size);
        if zoom_steps >= 0 {
            Self::new(fft_size, factor, 1)
        } else {
            Self::new(fft_size, 1, factor)
        }
    }

    /// FFT size.
    #[must_use]
    pub fn fft_size(&self) -> u64 {
        self.fft_size
    }

    /// Zoom level (columns per FFT).
    #[must_use]
    pub fn zoom_level(&self) -> u64 {
        self.zoom_level
    }

    /// Number of FFTs skipped per column.
    #[must_use]
    pub fn skip(&self) -> u64 {
        self.skip
    }

    /// Samples represented by one pixel column. Always at least 1.
    #[must_use]
    pub fn samples_per_column(&self) -> u64 {
        (self.fft_size.saturating_mul(self.skip) / self.zoom_level).max(1)
    }

    /// Column containing `sample` (floor division).
    #[must_use]
    pub fn sample_to_column(&self, sample: u64) -> u64 {
        sample / self.samples_per_column()
    }

    /// First sample of `column`.
    #[must_use]
    pub fn column_to_sample(&self, column: u64) -> u64 {
        column.saturating_mul(self.samples_per_column())
    }
}

/// A sample that should stay under a given pixel across a zoom change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomAnchor {
    /// Sample index to keep fixed.
    pub sample: u64,
    /// Pixel offset from the left edge of the viewport.
    pub pixel: u32,
}

/// Scroll position and extent of the visible part of a capture.
#[derive(Debug, Clone)]
pub struct Viewport {
    config: ViewConfig,
    scroll_column: u64,
    width_px: u32,
    sample_count: u64,
    anchor: Option<ZoomAnchor>,
}

impl Viewport {
    /// Creates a viewport scrolled to the start of the capture.
    #[must_use]
    pub fn new(config: ViewConfig, width_px: u32, sample_count: u64) -> Self {
        Self {
            config,
            scroll_column: 0,
            width_px,
            sample_count,
            anchor: None,
        }
    }

    /// Current view configuration.
    #[must_use]
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Samples per pixel column for the current configuration.
    #[must_use]
    pub fn samples_per_column(&self) -> u64 {
        self.config.samples_per_column()
    }

    /// Horizontal scroll position, in columns.
    #[must_use]
    pub fn scroll(&self) -> u64 {
        self.scroll_column
    }

    /// Viewport width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width_px
    }

    /// Total number of samples in the capture.
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Largest valid scroll position.
    #[must_use]
    pub fn max_scroll(&self) -> u64 {
        self.config
            .sample_to_column(self.sample_count)
            .saturating_sub(u64::from(self.width_px))
    }

    /// Scrolls to `column`, clamped to the valid range.
    pub fn set_scroll(&mut self, column: u64) {
        self.scroll_column = column.min(self.max_scroll());
    }

    /// Resizes the viewport.
    pub fn set_width(&mut self, width_px: u32) {
        self.width_px = width_px;
        self.set_scroll(self.scroll_column);
    }

    /// Updates the capture length (for example after a source reload).
    pub fn set_sample_count(&mut self, sample_count: u64) {
        self.sample_count = sample_count;
        self.set_scroll(self.scroll_column);
    }

    /// Samples currently visible, clipped to the capture length.
    #[must_use]
    pub fn view_range(&self) -> SampleRange {
        let start = self.config.column_to_sample(self.scroll_column);
        let visible = self.config.column_to_sample(u64::from(self.width_px));
        SampleRange::new(start, start.saturating_add(visible).min(self.sample_count))
    }

    /// Sample under viewport pixel `x`.
    #[must_use]
    pub fn pixel_to_sample(&self, x: u32) -> u64 {
        self.config
            .column_to_sample(self.scroll_column.saturating_add(u64::from(x)))
    }

    /// Viewport pixel of `sample`; negative or beyond the width when off screen.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn sample_to_pixel(&self, sample: u64) -> i64 {
        let column = self.config.sample_to_column(sample) as i64;
        column - self.scroll_column as i64
    }

    /// Remembers the sample under pixel `x` as the anchor for the next zoom.
    pub fn set_anchor(&mut self, x: u32) {
        self.anchor = Some(ZoomAnchor {
            sample: self.pixel_to_sample(x),
            pixel: x,
        });
    }

    /// Pending zoom anchor, if any.
    #[must_use]
    pub fn anchor(&self) -> Option<ZoomAnchor> {
        self.anchor
    }

    /// Applies a new view configuration.
    ///
    /// The anchor sample (or, with no anchor, the sample at the viewport
    /// midpoint) stays under the same pixel, as far as scroll limits allow.
    /// The anchor is consumed.
    pub fn set_config(&mut self, config: ViewConfig) {
        let anchor = self.anchor.take().unwrap_or_else(|| self.midpoint_anchor());
        self.config = config;
        let column = self.config.sample_to_column(anchor.sample);
        self.set_scroll(column.saturating_sub(u64::from(anchor.pixel)));
    }

    fn midpoint_anchor(&self) -> ZoomAnchor {
        let range = self.view_range();
        ZoomAnchor {
            sample: range.minimum + range.length() / 2,
            pixel: self.width_px / 2,
        }
    }
}
