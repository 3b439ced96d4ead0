//! Frequency demodulation as a stacked sample source.
#![allow(clippy::cast_possible_truncation)]

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use num_complex::Complex32;
use tracetile_core::{ComplexSource, DecimatedIndices, SampleSource};

use crate::filter::{FmDiscriminator, PhaseDifference, SampleFilter};

/// Demodulator operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DemodMode {
    /// FM discriminator run over every sample, with state carried across
    /// sample boundaries.
    #[default]
    Full,
    /// Phase difference between neighbouring samples of a single call.
    Cheap,
}

impl DemodMode {
    fn to_u8(self) -> u8 {
        match self {
            Self::Full => 0,
            Self::Cheap => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Cheap,
            _ => Self::Full,
        }
    }
}

impl fmt::Display for DemodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Cheap => write!(f, "cheap"),
        }
    }
}

/// Frequency demodulator reading from a complex source.
///
/// # Consumption contract
///
/// Both modes produce correct output for arbitrary chunked, out-of-order
/// and concurrent calls to [`SampleSource::samples`]:
///
/// - **Cheap** mode is stateless across calls. The first output of every
///   call is zero by definition, so results depend on where a call starts.
/// - **Full** mode never shares a filter between calls. Each call builds its
///   own [`FmDiscriminator`] and replays the filter's history (the samples
///   preceding `offset`) through it before producing output, so a given
///   sample always demodulates to the same value regardless of chunking.
///   Sequential consumers that want one long-lived filter use
///   [`FrequencyDemod::stream`].
///
/// The mode is read once per call; switching it while calls are running
/// affects only calls that start afterwards.
pub struct FrequencyDemod {
    source: Arc<ComplexSource>,
    mode: AtomicU8,
}

impl FrequencyDemod {
    /// Creates a demodulator in [`DemodMode::Full`].
    pub fn new(source: Arc<ComplexSource>) -> Self {
        Self::with_mode(source, DemodMode::Full)
    }

    /// Creates a demodulator in the given mode.
    pub fn with_mode(source: Arc<ComplexSource>, mode: DemodMode) -> Self {
        Self {
            source,
            mode: AtomicU8::new(mode.to_u8()),
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> DemodMode {
        DemodMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Switches the mode. Returns the previous mode.
    pub fn set_mode(&self, mode: DemodMode) -> DemodMode {
        DemodMode::from_u8(self.mode.swap(mode.to_u8(), Ordering::AcqRel))
    }

    /// The underlying complex source.
    #[must_use]
    pub fn input(&self) -> &Arc<ComplexSource> {
        &self.source
    }

    fn build_filter(&self, mode: DemodMode) -> Box<dyn SampleFilter> {
        match mode {
            DemodMode::Full => Box::new(FmDiscriminator::from_bandwidth(
                self.source.relative_bandwidth(),
            )),
            DemodMode::Cheap => Box::new(PhaseDifference),
        }
    }

    /// Runs a fresh filter over `[offset - history, offset + length)` and
    /// returns the outputs for `[offset, offset + length)`.
    fn demodulate_range(&self, offset: u64, length: usize) -> Option<Vec<f32>> {
        let mut filter = self.build_filter(self.mode());
        let history = usize::try_from(offset)
            .map_or(filter.history(), |offset| offset.min(filter.history()));
        let input = self
            .source
            .samples(offset - history as u64, length.checked_add(history)?);
        let Some(input) = input else {
            log::trace!("demod input unavailable at {offset}+{length}");
            return None;
        };
        let mut output = vec![0.0f32; input.len()];
        filter.process(&input, &mut output);
        output.drain(..history);
        Some(output)
    }

    /// Demodulates `length` samples from `offset`, keeping every `stride`-th
    /// output plus the final one.
    ///
    /// The filter still runs over every input sample, so the retained values
    /// are exactly those [`SampleSource::samples`] would return at the same
    /// positions.
    ///
    /// Tile rasterization does not use this: it needs every sample for the
    /// per-tile min/max and decimates itself. This is for callers that only
    /// want a thinned trace, such as exports and previews.
    #[must_use]
    pub fn samples_decimated(&self, offset: u64, length: usize, stride: usize) -> Option<Vec<f32>> {
        let output = self.demodulate_range(offset, length)?;
        Some(
            DecimatedIndices::new(output.len(), stride)
                .map(|index| output[index])
                .collect(),
        )
    }

    /// Starts a sequential stream at `offset` with one long-lived filter.
    ///
    /// The stream is only meaningful when consumed strictly in order from a
    /// single thread; it is the reference the per-call replay reproduces.
    #[must_use]
    pub fn stream(&self, offset: u64) -> DemodStream<'_> {
        let mode = self.mode();
        DemodStream {
            demod: self,
            filter: self.build_filter(mode),
            position: offset,
            primed: offset == 0,
        }
    }
}

impl SampleSource for FrequencyDemod {
    type Sample = f32;

    fn count(&self) -> u64 {
        self.source.count()
    }

    fn rate(&self) -> f64 {
        self.source.rate()
    }

    fn relative_bandwidth(&self) -> f64 {
        self.source.relative_bandwidth()
    }

    fn samples(&self, offset: u64, length: usize) -> Option<Vec<f32>> {
        self.demodulate_range(offset, length)
    }
}

impl fmt::Debug for FrequencyDemod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyDemod")
            .field("mode", &self.mode())
            .field("count", &self.source.count())
            .finish_non_exhaustive()
    }
}

/// Sequential demodulation with a single filter instance.
pub struct DemodStream<'a> {
    demod: &'a FrequencyDemod,
    filter: Box<dyn SampleFilter>,
    position: u64,
    primed: bool,
}

impl DemodStream<'_> {
    /// Position of the next sample the stream will produce.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Demodulates the next `length` samples, advancing the stream.
    ///
    /// Returns `None` (without advancing) when the input is unavailable.
    pub fn next_chunk(&mut self, length: usize) -> Option<Vec<f32>> {
        if !self.primed {
            let history = usize::try_from(self.position)
                .map_or(self.filter.history(), |p| p.min(self.filter.history()));
            let start = self.position - history as u64;
            let warmup: Vec<Complex32> = self.demod.source.samples(start, history)?;
            let mut scratch = vec![0.0f32; warmup.len()];
            self.filter.process(&warmup, &mut scratch);
            self.primed = true;
        }
        let input = self.demod.source.samples(self.position, length)?;
        let mut output = vec![0.0f32; input.len()];
        self.filter.process(&input, &mut output);
        self.position += input.len() as u64;
        Some(output)
    }
}

impl fmt::Debug for DemodStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemodStream")
            .field("position", &self.position)
            .field("primed", &self.primed)
            .finish_non_exhaustive()
    }
}
