//! Scheduler behaviour: deduplication, debounce, staleness and cache
//! invalidation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracetile_core::{
    AnySource, Complex32, ComplexSource, MemorySource, RealSource, SampleSource, ViewConfig,
    Viewport,
};
use tracetile_dsp::DemodMode;
use tracetile_render::{
    composite, rasterize, RenderSurface, SchedulerConfig, TileKey, TileScheduler, TracePlot,
};

#[derive(Default)]
struct CountingSurface {
    invalidations: AtomicUsize,
}

impl CountingSurface {
    fn count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl RenderSurface for CountingSurface {
    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }
}

/// A source whose reads block until its gate opens.
struct GatedSource<T> {
    inner: MemorySource<T>,
    gate: Arc<Gate>,
    calls: AtomicUsize,
}

impl<T: Copy + Send + Sync + 'static> GatedSource<T> {
    fn new(samples: Vec<T>) -> Self {
        Self {
            inner: MemorySource::new(samples, 1e6),
            gate: Arc::new(Gate::default()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Copy + Send + Sync + 'static> SampleSource for GatedSource<T> {
    type Sample = T;

    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn rate(&self) -> f64 {
        self.inner.rate()
    }

    fn samples(&self, offset: u64, length: usize) -> Option<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();
        self.inner.samples(offset, length)
    }
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn settled(scheduler: &TileScheduler) -> bool {
    let stats = scheduler.stats();
    stats.completed + stats.discarded + stats.failed == stats.dispatched
}

/// Config whose timer never fires on its own; tests flush explicitly.
fn manual_config(threads: usize) -> SchedulerConfig {
    SchedulerConfig::default()
        .with_threads(threads)
        .with_debounce(Duration::from_secs(3_600))
        .with_tile_height(32)
        .with_memory_budget_bytes(16 << 20)
}

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|n| (n % 1_000) as f32).collect()
}

fn key(scheduler: &TileScheduler, tile_index: u64, samples_per_tile: u64, width_px: u32) -> TileKey {
    TileKey {
        source: scheduler.source_id(),
        tile_index,
        samples_per_tile,
        width_px,
    }
}

#[test]
fn burst_of_misses_dispatches_one_job_per_tile() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(100_000), 1e6));
    let surface = Arc::new(CountingSurface::default());
    let scheduler =
        TileScheduler::new(AnySource::Real(source), surface.clone(), &manual_config(2)).unwrap();

    scheduler.begin_frame();
    for _ in 0..10 {
        let placeholder = scheduler.request_tile(0, 10_000, 100);
        assert!(placeholder.is_blank());
        assert_eq!((placeholder.width(), placeholder.height()), (100, 32));
    }
    for _ in 0..5 {
        scheduler.request_tile(1, 10_000, 100);
    }
    assert_eq!(scheduler.pending_count(), 2);
    assert_eq!(scheduler.stats().dispatched, 0);

    scheduler.flush_pending();
    assert_eq!(scheduler.pending_count(), 0);
    assert_eq!(scheduler.stats().dispatched, 2);

    wait_until("both tiles", || scheduler.is_idle());
    let stats = scheduler.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.discarded + stats.failed, 0);
    assert_eq!(surface.count(), 2);

    let cached = scheduler.cached_tile(&key(&scheduler, 0, 10_000, 100)).unwrap();
    let hit = scheduler.request_tile(0, 10_000, 100);
    assert!(Arc::ptr_eq(&cached, &hit));
    assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn in_flight_tile_is_not_queued_again() {
    let source = Arc::new(GatedSource::new(ramp(50_000)));
    let gate = Arc::clone(&source.gate);
    let as_real: Arc<RealSource> = source.clone();
    let scheduler = TileScheduler::new(
        AnySource::Real(as_real),
        Arc::new(CountingSurface::default()),
        &manual_config(1),
    )
    .unwrap();

    scheduler.begin_frame();
    scheduler.request_tile(2, 5_000, 50);
    scheduler.flush_pending();
    wait_until("worker to start", || source.calls() == 1);

    scheduler.begin_frame();
    scheduler.request_tile(2, 5_000, 50);
    assert_eq!(scheduler.pending_count(), 0);
    assert_eq!(scheduler.in_flight_count(), 1);

    gate.open();
    wait_until("tile", || scheduler.is_idle());
    assert_eq!(scheduler.stats().dispatched, 1);
    assert_eq!(scheduler.stats().completed, 1);
    assert_eq!(source.calls(), 1);
}

#[test]
fn stale_results_are_never_cached() {
    let source = Arc::new(GatedSource::new(ramp(100_000)));
    let gate = Arc::clone(&source.gate);
    let as_real: Arc<RealSource> = source.clone();
    let surface = Arc::new(CountingSurface::default());
    let scheduler =
        TileScheduler::new(AnySource::Real(as_real), surface.clone(), &manual_config(1)).unwrap();

    scheduler.begin_frame();
    scheduler.request_tile(0, 1_000, 10);
    scheduler.request_tile(1, 1_000, 10);
    scheduler.flush_pending();
    wait_until("worker to start", || source.calls() == 1);

    // The user scrolled away: the next frame wants a different tile.
    scheduler.begin_frame();
    scheduler.request_tile(50, 1_000, 10);
    gate.open();
    wait_until("stale jobs", || scheduler.in_flight_count() == 0);

    let stats = scheduler.stats();
    assert_eq!(stats.discarded, 2);
    assert_eq!(stats.completed, 0);
    // The second job noticed before reading any samples.
    assert_eq!(source.calls(), 1);
    assert!(scheduler.cached_tile(&key(&scheduler, 0, 1_000, 10)).is_none());
    assert!(scheduler.cached_tile(&key(&scheduler, 1, 1_000, 10)).is_none());
    assert_eq!(surface.count(), 0);

    scheduler.flush_pending();
    wait_until("wanted tile", || scheduler.is_idle());
    assert!(scheduler.cached_tile(&key(&scheduler, 50, 1_000, 10)).is_some());
    assert_eq!(surface.count(), 1);
}

#[test]
fn cached_tile_matches_direct_rasterization() {
    let samples: Vec<Complex32> = (0..40_000)
        .map(|n| Complex32::from_polar(1.0 + (n % 7) as f32 * 0.1, n as f32 * 0.013))
        .collect();
    let source: Arc<ComplexSource> = Arc::new(MemorySource::new(samples, 2e6));
    let any = AnySource::Complex(source);
    let scheduler =
        TileScheduler::new(any.clone(), Arc::new(CountingSurface::default()), &manual_config(3))
            .unwrap();

    scheduler.begin_frame();
    for tile in 0..4 {
        scheduler.request_tile(tile, 8_000, 120);
    }
    scheduler.flush_pending();
    wait_until("tiles", || scheduler.is_idle());

    for tile in 0..4 {
        let key = key(&scheduler, tile, 8_000, 120);
        let cached = scheduler.cached_tile(&key).unwrap();
        let direct = rasterize(&any, key.sample_range(), 120, 32).unwrap();
        assert_eq!(*cached, direct);
        assert!(!cached.is_blank());
    }
}

#[test]
fn unavailable_range_fails_softly_and_retries() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(1_000), 1e6));
    let surface = Arc::new(CountingSurface::default());
    let scheduler =
        TileScheduler::new(AnySource::Real(source), surface.clone(), &manual_config(1)).unwrap();

    scheduler.begin_frame();
    scheduler.request_tile(3, 400, 40);
    scheduler.flush_pending();
    wait_until("failure", || scheduler.is_idle());

    assert_eq!(scheduler.stats().failed, 1);
    assert_eq!(scheduler.cached_count(), 0);
    assert_eq!(surface.count(), 0);

    // The next paint pass asks again.
    scheduler.begin_frame();
    let placeholder = scheduler.request_tile(3, 400, 40);
    assert!(placeholder.is_blank());
    assert_eq!(scheduler.pending_count(), 1);
}

#[test]
fn debounce_timer_dispatches_after_quiet_period() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(10_000), 1e6));
    let surface = Arc::new(CountingSurface::default());
    let config = manual_config(2).with_debounce(Duration::from_millis(400));
    let scheduler = TileScheduler::new(AnySource::Real(source), surface.clone(), &config).unwrap();

    scheduler.begin_frame();
    scheduler.request_tile(0, 1_000, 20);
    std::thread::sleep(Duration::from_millis(200));
    // A second miss inside the window pushes the deadline out.
    scheduler.request_tile(1, 1_000, 20);
    std::thread::sleep(Duration::from_millis(250));
    assert_eq!(scheduler.stats().dispatched, 0);
    assert_eq!(scheduler.pending_count(), 2);

    wait_until("timer", || scheduler.cached_count() == 2);
    assert_eq!(scheduler.stats().dispatched, 2);
    assert_eq!(surface.count(), 2);
}

#[test]
fn repeat_misses_do_not_postpone_dispatch() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(10_000), 1e6));
    let config = manual_config(1).with_debounce(Duration::from_millis(100));
    let scheduler = TileScheduler::new(
        AnySource::Real(source),
        Arc::new(CountingSurface::default()),
        &config,
    )
    .unwrap();

    // Repaints every 30 ms keep asking for the same pending tile.
    for _ in 0..20 {
        scheduler.begin_frame();
        scheduler.request_tile(0, 1_000, 20);
        std::thread::sleep(Duration::from_millis(30));
    }
    assert!(scheduler.stats().dispatched >= 1, "pending tile never dispatched");
}

#[test]
fn set_debounce_changes_the_delay() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(10_000), 1e6));
    let scheduler = TileScheduler::new(
        AnySource::Real(source),
        Arc::new(CountingSurface::default()),
        &manual_config(1),
    )
    .unwrap();
    scheduler.set_debounce(Duration::from_millis(5));

    scheduler.begin_frame();
    scheduler.request_tile(0, 1_000, 20);
    wait_until("timer", || scheduler.cached_count() == 1);
}

#[test]
fn tile_height_change_clears_cache() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(10_000), 1e6));
    let scheduler = TileScheduler::new(
        AnySource::Real(source),
        Arc::new(CountingSurface::default()),
        &manual_config(1),
    )
    .unwrap();

    scheduler.begin_frame();
    scheduler.request_tile(0, 1_000, 20);
    scheduler.flush_pending();
    wait_until("tile", || scheduler.is_idle());
    assert_eq!(scheduler.cached_count(), 1);

    scheduler.set_tile_height(64);
    assert_eq!(scheduler.cached_count(), 0);
    let placeholder = scheduler.request_tile(0, 1_000, 20);
    assert_eq!(placeholder.height(), 64);
    scheduler.flush_pending();
    wait_until("tile", || scheduler.is_idle());
    let key = key(&scheduler, 0, 1_000, 20);
    assert_eq!(scheduler.cached_tile(&key).unwrap().height(), 64);
}

#[test]
fn worker_pool_can_be_resized() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(10_000), 1e6));
    let scheduler = TileScheduler::new(
        AnySource::Real(source),
        Arc::new(CountingSurface::default()),
        &manual_config(1),
    )
    .unwrap();
    assert_eq!(scheduler.worker_threads(), 1);
    scheduler.set_worker_threads(3).unwrap();
    assert_eq!(scheduler.worker_threads(), 3);

    scheduler.begin_frame();
    scheduler.request_tile(0, 1_000, 20);
    scheduler.flush_pending();
    wait_until("tile", || scheduler.is_idle());
    assert_eq!(scheduler.stats().completed, 1);
}

#[test]
fn schedulers_have_distinct_identities() {
    let source: Arc<RealSource> = Arc::new(MemorySource::new(ramp(10), 1e6));
    let a = TileScheduler::new(
        AnySource::Real(source.clone()),
        Arc::new(CountingSurface::default()),
        &manual_config(1),
    )
    .unwrap();
    let b = TileScheduler::new(
        AnySource::Real(source),
        Arc::new(CountingSurface::default()),
        &manual_config(1),
    )
    .unwrap();
    assert_ne!(a.source_id(), b.source_id());
}

fn fm_capture(len: usize) -> Vec<Complex32> {
    let mut phase = 0.0f32;
    (0..len)
        .map(|n| {
            phase += 0.2 * ((n as f32) * 0.001).sin();
            Complex32::from_polar(1.0, phase)
        })
        .collect()
}

fn paint_until_ready(plot: &TracePlot, viewport: &Viewport) -> Vec<tracetile_render::TileDraw> {
    let mut draws = plot.paint(viewport);
    while !draws.iter().all(|d| d.ready) {
        plot.scheduler().flush_pending();
        wait_until("frame", || plot.scheduler().is_idle());
        draws = plot.paint(viewport);
    }
    draws
}

#[test]
fn demod_toggle_drops_tiles_from_the_old_mode() {
    let source: Arc<ComplexSource> = Arc::new(MemorySource::new(fm_capture(100_000), 1e6));
    let surface = Arc::new(CountingSurface::default());
    let plot = TracePlot::demodulated(
        Arc::clone(&source),
        DemodMode::Full,
        surface.clone(),
        &manual_config(2),
    )
    .unwrap();
    let viewport = Viewport::new(ViewConfig::new(100, 1, 1).unwrap(), 200, 100_000);

    let full = composite(&paint_until_ready(&plot, &viewport), 200, 32);
    assert!(plot.scheduler().cached_count() > 0);
    let before = surface.count();

    assert!(plot.set_demod_mode(DemodMode::Cheap));
    assert_eq!(plot.demod_mode(), Some(DemodMode::Cheap));
    assert_eq!(plot.scheduler().cached_count(), 0);
    assert_eq!(surface.count(), before + 1);

    let draws = plot.paint(&viewport);
    assert!(draws.iter().all(|d| !d.ready && d.tile.is_blank()));

    let cheap = composite(&paint_until_ready(&plot, &viewport), 200, 32);
    assert_ne!(full, cheap);

    // Setting the same mode again keeps the cache.
    let cached = plot.scheduler().cached_count();
    assert!(plot.set_demod_mode(DemodMode::Cheap));
    assert_eq!(plot.scheduler().cached_count(), cached);
}

#[test]
fn job_running_across_a_mode_toggle_is_discarded() {
    let source = Arc::new(GatedSource::new(fm_capture(50_000)));
    let gate = Arc::clone(&source.gate);
    let as_complex: Arc<ComplexSource> = source.clone();
    let plot = TracePlot::demodulated(
        as_complex,
        DemodMode::Full,
        Arc::new(CountingSurface::default()),
        &manual_config(1),
    )
    .unwrap();
    let viewport = Viewport::new(ViewConfig::new(50, 1, 1).unwrap(), 100, 50_000);

    plot.paint(&viewport);
    plot.scheduler().flush_pending();
    wait_until("worker to start", || source.calls() == 1);

    plot.set_demod_mode(DemodMode::Cheap);
    gate.open();
    wait_until("old job", || settled(plot.scheduler()));

    assert_eq!(plot.scheduler().stats().completed, 0);
    assert_eq!(plot.scheduler().cached_count(), 0);
}
