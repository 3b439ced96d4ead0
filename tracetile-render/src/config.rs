//! Scheduler configuration.

use std::time::Duration;

use sysinfo::System;

use crate::{Error, Result};

/// Default debounce delay between the last tile miss and dispatch.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Default tile height in pixels.
pub const DEFAULT_TILE_HEIGHT: u32 = 200;

/// Cache budget used when system memory cannot be queried.
pub const FALLBACK_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for a [`TileScheduler`](crate::TileScheduler).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Number of worker threads. `None` uses the available parallelism.
    pub threads: Option<usize>,
    /// Delay after the last cache miss before pending jobs are dispatched.
    pub debounce: Duration,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Fraction of available system memory to use for cached tiles
    /// (0.0 < fraction <= 1.0).
    pub memory_fraction: f64,
    /// Explicit cache budget override (bytes). If set, `memory_fraction` is ignored.
    pub memory_budget_bytes: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            threads: None,
            debounce: DEFAULT_DEBOUNCE,
            tile_height: DEFAULT_TILE_HEIGHT,
            memory_fraction: 0.05,
            memory_budget_bytes: None,
        }
    }
}

impl SchedulerConfig {
    /// Set the number of worker threads.
    ///
    /// Values less than 1 are clamped to 1. Use [`Self::try_with_threads`]
    /// to surface invalid values as an error instead.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    /// Set the debounce delay.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the tile height in pixels.
    ///
    /// Values less than 1 are clamped to 1.
    #[must_use]
    pub fn with_tile_height(mut self, height: u32) -> Self {
        self.tile_height = height.max(1);
        self
    }

    /// Set the fraction of available system memory to target.
    #[must_use]
    pub fn with_memory_fraction(mut self, fraction: f64) -> Self {
        self.memory_fraction = fraction;
        self
    }

    /// Set an explicit cache budget in bytes.
    #[must_use]
    pub fn with_memory_budget_bytes(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = Some(bytes);
        self
    }

    /// Fallible variant of [`Self::with_threads`].
    ///
    /// # Errors
    /// Returns an error if `threads` is 0.
    pub fn try_with_threads(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        self.threads = Some(threads);
        Ok(self)
    }

    /// Fallible variant of [`Self::with_tile_height`].
    ///
    /// # Errors
    /// Returns an error if `height` is 0.
    pub fn try_with_tile_height(mut self, height: u32) -> Result<Self> {
        if height == 0 {
            return Err(Error::Config("tile_height must be at least 1".to_string()));
        }
        self.tile_height = height;
        Ok(self)
    }

    /// Return the worker thread count, clamped to at least 1.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.threads
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, usize::from))
            .max(1)
    }

    /// Resolve the tile cache budget in bytes.
    ///
    /// # Errors
    /// Returns an error if the memory fraction is invalid or system memory cannot be queried.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn resolve_budget_bytes(&self) -> Result<usize> {
        if let Some(bytes) = self.memory_budget_bytes {
            return Ok(bytes);
        }
        if !(0.0 < self.memory_fraction && self.memory_fraction <= 1.0) {
            return Err(Error::Config(
                "memory_fraction must be in (0.0, 1.0]".to_string(),
            ));
        }
        let mut system = System::new();
        system.refresh_memory();
        let available = system.available_memory();
        if available == 0 {
            return Err(Error::Config(
                "available system memory reported as 0".to_string(),
            ));
        }
        let budget = (available as f64 * self.memory_fraction).floor() as u64;
        Ok(usize::try_from(budget).unwrap_or(usize::MAX))
    }

    /// Like [`Self::resolve_budget_bytes`], falling back to
    /// [`FALLBACK_CACHE_BYTES`] with a warning.
    #[must_use]
    pub fn budget_bytes_or_fallback(&self) -> usize {
        match self.resolve_budget_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("{err}; using {FALLBACK_CACHE_BYTES} byte tile cache");
                FALLBACK_CACHE_BYTES
            }
        }
    }
}
