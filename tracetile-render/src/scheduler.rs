//! Tile cache and scheduler.
//!
//! The render thread asks for tiles with [`TileScheduler::request_tile`],
//! which never waits on computation: a miss returns a transparent
//! placeholder and queues a job. A debounce timer collects misses for a
//! short quiet period and then hands every queued job to the worker pool.
//! Workers drop a job when its tile is no longer wanted by the latest frame,
//! either when they pick it up or when they are about to cache the result.
//!
//! Workers never hold the state lock while rasterizing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracetile_core::AnySource;

use crate::cache::TileCache;
use crate::config::SchedulerConfig;
use crate::key::{PendingJob, SourceId, TileKey};
use crate::raster::rasterize;
use crate::surface::RenderSurface;
use crate::tile::PixelTile;
use crate::{Error, Result};

/// Counters describing what the scheduler has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Jobs handed to the worker pool.
    pub dispatched: u64,
    /// Tiles rendered and cached.
    pub completed: u64,
    /// Jobs dropped because their tile was no longer wanted.
    pub discarded: u64,
    /// Jobs whose sample range was unavailable.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct State {
    cache: TileCache,
    pending: HashMap<TileKey, PendingJob>,
    /// Keys being rendered, tagged with the generation they were dispatched in.
    in_flight: HashMap<TileKey, u64>,
    /// Keys requested by the current paint pass.
    demand: HashSet<TileKey>,
    generation: u64,
}

struct Shared {
    source_id: SourceId,
    source: AnySource,
    surface: Arc<dyn RenderSurface>,
    state: Mutex<State>,
    pool: RwLock<Arc<ThreadPool>>,
    tile_height: AtomicU32,
    counters: Counters,
}

enum TimerMsg {
    Arm,
    SetDelay(Duration),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_pool(threads: usize) -> Result<Arc<ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("tracetile-tile-{i}"))
        .build()?;
    Ok(Arc::new(pool))
}

/// Demand-driven tile cache backed by a worker pool.
///
/// Methods that take part in painting ([`Self::begin_frame`],
/// [`Self::request_tile`]) are meant to be called from one render thread.
/// Everything else is safe to call from any thread.
pub struct TileScheduler {
    shared: Arc<Shared>,
    timer_tx: Option<Sender<TimerMsg>>,
    timer: Option<JoinHandle<()>>,
}

impl TileScheduler {
    /// Creates a scheduler with its own worker pool.
    ///
    /// # Errors
    /// Returns an error if the worker pool cannot be built.
    pub fn new(
        source: AnySource,
        surface: Arc<dyn RenderSurface>,
        config: &SchedulerConfig,
    ) -> Result<Self> {
        let pool = build_pool(config.effective_threads())?;
        Self::with_pool(source, surface, config, pool)
    }

    /// Creates a scheduler running tiles on `pool`.
    ///
    /// # Errors
    /// Returns an error if the debounce timer thread cannot be started.
    pub fn with_pool(
        source: AnySource,
        surface: Arc<dyn RenderSurface>,
        config: &SchedulerConfig,
        pool: Arc<ThreadPool>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            source_id: SourceId::next(),
            source,
            surface,
            state: Mutex::new(State {
                cache: TileCache::new(config.budget_bytes_or_fallback()),
                pending: HashMap::new(),
                in_flight: HashMap::new(),
                demand: HashSet::new(),
                generation: 0,
            }),
            pool: RwLock::new(pool),
            tile_height: AtomicU32::new(config.tile_height.max(1)),
            counters: Counters::default(),
        });

        let (tx, rx) = mpsc::channel();
        let weak = Arc::downgrade(&shared);
        let delay = config.debounce;
        let timer = std::thread::Builder::new()
            .name(format!("tracetile-debounce-{}", shared.source_id.get()))
            .spawn(move || run_timer(&weak, &rx, delay))
            .map_err(|err| Error::Config(format!("cannot start debounce timer: {err}")))?;

        Ok(Self {
            shared,
            timer_tx: Some(tx),
            timer: Some(timer),
        })
    }

    /// Identity of this scheduler's tiles.
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.shared.source_id
    }

    /// The source tiles are rendered from.
    #[must_use]
    pub fn source(&self) -> &AnySource {
        &self.shared.source
    }

    pub(crate) fn surface(&self) -> &Arc<dyn RenderSurface> {
        &self.shared.surface
    }

    /// Tile height in pixels.
    #[must_use]
    pub fn tile_height(&self) -> u32 {
        self.shared.tile_height.load(Ordering::Acquire)
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.shared
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current_num_threads()
    }

    /// Starts a paint pass: the demand set is rebuilt from the requests
    /// that follow.
    pub fn begin_frame(&self) {
        lock(&self.shared.state).demand.clear();
    }

    /// Returns the tile for the given identity, or a transparent
    /// placeholder of `width_px` x tile height while it is being rendered.
    pub fn request_tile(
        &self,
        tile_index: u64,
        samples_per_tile: u64,
        width_px: u32,
    ) -> Arc<PixelTile> {
        self.request(tile_index, samples_per_tile, width_px).0
    }

    /// Like [`Self::request_tile`], also reporting whether the tile came
    /// from the cache.
    pub(crate) fn request(
        &self,
        tile_index: u64,
        samples_per_tile: u64,
        width_px: u32,
    ) -> (Arc<PixelTile>, bool) {
        let key = TileKey {
            source: self.shared.source_id,
            tile_index,
            samples_per_tile,
            width_px,
        };
        let queued = {
            let mut state = lock(&self.shared.state);
            state.demand.insert(key);
            if let Some(tile) = state.cache.get(&key) {
                return (tile, true);
            }
            let fresh = !state.pending.contains_key(&key) && !state.in_flight.contains_key(&key);
            if fresh {
                state.pending.insert(key, PendingJob::from(key));
            }
            fresh
        };
        // Only new jobs extend the window; repeat misses must not starve it.
        if queued {
            self.send_timer(TimerMsg::Arm);
        }
        (
            Arc::new(PixelTile::transparent(width_px, self.tile_height())),
            false,
        )
    }

    /// Dispatches every pending job now instead of waiting for the timer.
    pub fn flush_pending(&self) {
        self.shared.dispatch_pending();
    }

    /// Number of jobs waiting for the debounce timer.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.state).pending.len()
    }

    /// Number of jobs running or queued in the worker pool.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        lock(&self.shared.state).in_flight.len()
    }

    /// Returns true when nothing is pending or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = lock(&self.shared.state);
        state.pending.is_empty() && state.in_flight.is_empty()
    }

    /// Cached tile for `key`, without touching its recency.
    #[must_use]
    pub fn cached_tile(&self, key: &TileKey) -> Option<Arc<PixelTile>> {
        lock(&self.shared.state).cache.peek(key)
    }

    /// Number of cached tiles.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        lock(&self.shared.state).cache.len()
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.shared.counters.snapshot()
    }

    /// Drops every cached tile. Jobs already running will not be cached.
    pub fn clear_cache(&self) {
        let mut state = lock(&self.shared.state);
        state.generation += 1;
        state.cache.clear();
        state.in_flight.clear();
        log::debug!(
            "{}: tile cache cleared (generation {})",
            self.shared.source_id,
            state.generation
        );
    }

    /// Changes the tile height; cached tiles are dropped.
    pub fn set_tile_height(&self, height: u32) {
        let height = height.max(1);
        if self.shared.tile_height.swap(height, Ordering::AcqRel) != height {
            self.clear_cache();
        }
    }

    /// Replaces the worker pool with one of `threads` threads.
    ///
    /// Jobs already queued on the old pool still run there.
    ///
    /// # Errors
    /// Returns an error if the new pool cannot be built.
    pub fn set_worker_threads(&self, threads: usize) -> Result<()> {
        let pool = build_pool(threads)?;
        *self
            .shared
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner) = pool;
        Ok(())
    }

    /// Changes the debounce delay. Takes effect from the next arm.
    pub fn set_debounce(&self, delay: Duration) {
        self.send_timer(TimerMsg::SetDelay(delay));
    }

    fn send_timer(&self, msg: TimerMsg) {
        if let Some(tx) = &self.timer_tx {
            if tx.send(msg).is_err() {
                log::warn!("{}: debounce timer has stopped", self.shared.source_id);
            }
        }
    }
}

impl Drop for TileScheduler {
    fn drop(&mut self) {
        // Disconnecting the channel stops the timer thread.
        self.timer_tx.take();
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                log::warn!("{}: debounce timer panicked", self.shared.source_id);
            }
        }
    }
}

impl std::fmt::Debug for TileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileScheduler")
            .field("source_id", &self.shared.source_id)
            .field("source", &self.shared.source)
            .field("tile_height", &self.tile_height())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn dispatch_pending(self: &Arc<Self>) {
        let (jobs, generation) = {
            let mut state = lock(&self.state);
            if state.pending.is_empty() {
                return;
            }
            let generation = state.generation;
            let jobs: Vec<PendingJob> = state.pending.drain().map(|(_, job)| job).collect();
            for job in &jobs {
                state.in_flight.insert(job.key(self.source_id), generation);
            }
            (jobs, generation)
        };

        let pool = Arc::clone(&self.pool.read().unwrap_or_else(PoisonError::into_inner));
        log::debug!(
            "{}: dispatching {} tile jobs (generation {generation})",
            self.source_id,
            jobs.len()
        );
        self.counters
            .dispatched
            .fetch_add(jobs.len() as u64, Ordering::Relaxed);
        for job in jobs {
            let shared = Arc::clone(self);
            pool.spawn(move || shared.run_job(job.key(shared.source_id), generation));
        }
    }

    fn is_wanted(state: &State, key: &TileKey, generation: u64) -> bool {
        state.generation == generation && state.demand.contains(key)
    }

    fn release(state: &mut State, key: &TileKey, generation: u64) {
        if state.in_flight.get(key) == Some(&generation) {
            state.in_flight.remove(key);
        }
    }

    fn run_job(&self, key: TileKey, generation: u64) {
        {
            let mut state = lock(&self.state);
            if !Self::is_wanted(&state, &key, generation) {
                Self::release(&mut state, &key, generation);
                drop(state);
                log::trace!("{key}: stale before start");
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let height = self.tile_height.load(Ordering::Acquire);
        let tile = rasterize(&self.source, key.sample_range(), key.width_px, height);

        let mut state = lock(&self.state);
        let wanted = Self::is_wanted(&state, &key, generation);
        Self::release(&mut state, &key, generation);
        match tile {
            None => {
                drop(state);
                log::trace!("{key}: sample range unavailable");
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) if !wanted => {
                drop(state);
                log::trace!("{key}: stale after render");
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            }
            Some(tile) => {
                state.cache.insert(key, Arc::new(tile));
                drop(state);
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.surface.invalidate();
            }
        }
    }
}

fn run_timer(shared: &Weak<Shared>, rx: &Receiver<TimerMsg>, mut delay: Duration) {
    let mut deadline: Option<Instant> = None;
    loop {
        let msg = match deadline {
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => return,
            },
            Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            },
        };
        match msg {
            Some(TimerMsg::Arm) => deadline = Some(Instant::now() + delay),
            Some(TimerMsg::SetDelay(new_delay)) => delay = new_delay,
            None => {
                deadline = None;
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                shared.dispatch_pending();
            }
        }
    }
}
