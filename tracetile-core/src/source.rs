//! Sample source traits and types.
//!
//! A [`SampleSource`] is an indexable provider of a typed sample sequence.
//! Sources may be stacked: a transform is itself a source reading from
//! another one. Rendering code never downcasts; it works on the closed
//! [`AnySource`] enum, resolved once when a plot is constructed.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex32;

/// Element kind of a sample sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Two-channel (I/Q) complex samples.
    Complex,
    /// Single-channel real samples.
    Real,
}

impl SampleKind {
    /// Number of interleaved channels per sample.
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::Complex => 2,
            Self::Real => 1,
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complex => write!(f, "complex<f32>"),
            Self::Real => write!(f, "f32"),
        }
    }
}

/// Indexable provider of a typed sample sequence.
///
/// Implementations must be safe for concurrent reads: tile workers call
/// [`SampleSource::samples`] from several threads at once.
pub trait SampleSource: Send + Sync {
    /// Sample element type.
    type Sample: Copy + Send + Sync + 'static;

    /// Total number of samples.
    fn count(&self) -> u64;

    /// Sample rate in samples per second.
    fn rate(&self) -> f64;

    /// Occupied bandwidth relative to the sample rate, in `0..=1`.
    fn relative_bandwidth(&self) -> f64 {
        1.0
    }

    /// Returns `length` samples starting at `offset`.
    ///
    /// Returns `None` when the range is not available (for example when it
    /// extends past [`SampleSource::count`]). Callers treat this as a
    /// transient condition.
    fn samples(&self, offset: u64, length: usize) -> Option<Vec<Self::Sample>>;
}

/// A complex-valued source, as a trait object.
pub type ComplexSource = dyn SampleSource<Sample = Complex32>;

/// A real-valued source, as a trait object.
pub type RealSource = dyn SampleSource<Sample = f32>;

/// A sample buffer tagged with its element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// Complex samples.
    Complex(Vec<Complex32>),
    /// Real samples.
    Real(Vec<f32>),
}

impl Samples {
    /// Number of samples in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Complex(v) => v.len(),
            Self::Real(v) => v.len(),
        }
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element kind of the buffer.
    #[must_use]
    pub fn kind(&self) -> SampleKind {
        match self {
            Self::Complex(_) => SampleKind::Complex,
            Self::Real(_) => SampleKind::Real,
        }
    }
}

/// The closed set of source kinds the renderer understands.
#[derive(Clone)]
pub enum AnySource {
    /// A complex-valued source.
    Complex(Arc<ComplexSource>),
    /// A real-valued source.
    Real(Arc<RealSource>),
}

impl AnySource {
    /// Element kind of this source.
    #[must_use]
    pub fn kind(&self) -> SampleKind {
        match self {
            Self::Complex(_) => SampleKind::Complex,
            Self::Real(_) => SampleKind::Real,
        }
    }

    /// Total number of samples.
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            Self::Complex(src) => src.count(),
            Self::Real(src) => src.count(),
        }
    }

    /// Sample rate in samples per second.
    #[must_use]
    pub fn rate(&self) -> f64 {
        match self {
            Self::Complex(src) => src.rate(),
            Self::Real(src) => src.rate(),
        }
    }

    /// Relative bandwidth of the source.
    #[must_use]
    pub fn relative_bandwidth(&self) -> f64 {
        match self {
            Self::Complex(src) => src.relative_bandwidth(),
            Self::Real(src) => src.relative_bandwidth(),
        }
    }

    /// Fetches a range of samples, tagged with their kind.
    #[must_use]
    pub fn samples(&self, offset: u64, length: usize) -> Option<Samples> {
        match self {
            Self::Complex(src) => src.samples(offset, length).map(Samples::Complex),
            Self::Real(src) => src.samples(offset, length).map(Samples::Real),
        }
    }
}

impl fmt::Debug for AnySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnySource")
            .field("kind", &self.kind())
            .field("count", &self.count())
            .field("rate", &self.rate())
            .finish()
    }
}

/// An in-memory sample source backed by a shared slice.
#[derive(Debug, Clone)]
pub struct MemorySource<T> {
    samples: Arc<[T]>,
    rate: f64,
    relative_bandwidth: f64,
}

impl<T: Copy + Send + Sync + 'static> MemorySource<T> {
    /// Creates a source from owned samples.
    pub fn new(samples: impl Into<Arc<[T]>>, rate: f64) -> Self {
        Self {
            samples: samples.into(),
            rate,
            relative_bandwidth: 1.0,
        }
    }

    /// Sets the relative bandwidth reported by the source.
    #[must_use]
    pub fn with_relative_bandwidth(mut self, bandwidth: f64) -> Self {
        self.relative_bandwidth = bandwidth.clamp(f64::MIN_POSITIVE, 1.0);
        self
    }

    /// Returns the samples as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.samples
    }
}

impl<T: Copy + Send + Sync + 'static> SampleSource for MemorySource<T> {
    type Sample = T;

    fn count(&self) -> u64 {
        self.samples.len() as u64
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn relative_bandwidth(&self) -> f64 {
        self.relative_bandwidth
    }

    fn samples(&self, offset: u64, length: usize) -> Option<Vec<T>> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(length)?;
        self.samples.get(start..end).map(<[T]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_bounds() {
        let src = MemorySource::new(vec![1.0f32, 2.0, 3.0, 4.0], 1000.0);
        assert_eq!(src.count(), 4);
        assert_eq!(src.samples(1, 2), Some(vec![2.0, 3.0]));
        assert_eq!(src.samples(2, 2), Some(vec![3.0, 4.0]));
        assert_eq!(src.samples(3, 2), None);
        assert_eq!(src.samples(u64::MAX, 1), None);
    }

    #[test]
    fn test_any_source_kind_is_fixed_at_construction() {
        let complex: Arc<ComplexSource> =
            Arc::new(MemorySource::new(vec![Complex32::new(1.0, 0.0); 8], 1e6));
        let any = AnySource::Complex(complex);
        assert_eq!(any.kind(), SampleKind::Complex);
        assert_eq!(any.kind().channels(), 2);

        let fetched = any.samples(0, 4).unwrap();
        assert_eq!(fetched.kind(), SampleKind::Complex);
        assert_eq!(fetched.len(), 4);
    }
}
