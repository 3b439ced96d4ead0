//! Sample sources over raw capture files.

use std::path::Path;
use std::sync::Arc;

use num_complex::Complex32;
use tracetile_core::{AnySource, SampleKind, SampleSource};

use crate::format::RawFormat;
use crate::reader::MappedFileReader;
use crate::{Error, Result};

/// Metadata shared by raw file sources.
#[derive(Debug, Clone)]
struct RawFile {
    reader: MappedFileReader,
    format: RawFormat,
    rate: f64,
    relative_bandwidth: f64,
    count: u64,
}

impl RawFile {
    fn open(path: &Path, format: RawFormat, rate: f64) -> Result<Self> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidFormat(format!(
                "sample rate must be positive, got {rate}"
            )));
        }
        let reader = MappedFileReader::open(path)?;
        let width = format.bytes_per_sample();
        let trailing = reader.len() % width;
        if trailing != 0 {
            log::warn!(
                "{}: ignoring {trailing} trailing bytes (not a whole {format} sample)",
                path.display()
            );
        }
        let count = (reader.len() / width) as u64;
        Ok(Self {
            reader,
            format,
            rate,
            relative_bandwidth: 1.0,
            count,
        })
    }

    fn bytes(&self, offset: u64, length: usize) -> Option<&[u8]> {
        let width = self.format.bytes_per_sample();
        let start = usize::try_from(offset).ok()?.checked_mul(width)?;
        self.reader.slice(start, length.checked_mul(width)?)
    }
}

/// A complex capture file (`cf32`, `cs16`, `cs8` or `cu8`).
#[derive(Debug, Clone)]
pub struct RawComplexSource {
    file: RawFile,
}

impl RawComplexSource {
    /// Opens a complex capture file.
    ///
    /// # Errors
    /// Returns an error if the format is not complex, the rate is not
    /// positive, or the file cannot be mapped.
    pub fn open<P: AsRef<Path>>(path: P, format: RawFormat, rate: f64) -> Result<Self> {
        if format.kind() != SampleKind::Complex {
            return Err(Error::InvalidFormat(format!("{format} is not a complex format")));
        }
        Ok(Self {
            file: RawFile::open(path.as_ref(), format, rate)?,
        })
    }

    /// Sets the occupied bandwidth relative to the sample rate.
    #[must_use]
    pub fn with_relative_bandwidth(mut self, bandwidth: f64) -> Self {
        self.file.relative_bandwidth = bandwidth.clamp(f64::MIN_POSITIVE, 1.0);
        self
    }

    /// Sample format of the file.
    #[must_use]
    pub fn format(&self) -> RawFormat {
        self.file.format
    }
}

impl SampleSource for RawComplexSource {
    type Sample = Complex32;

    fn count(&self) -> u64 {
        self.file.count
    }

    fn rate(&self) -> f64 {
        self.file.rate
    }

    fn relative_bandwidth(&self) -> f64 {
        self.file.relative_bandwidth
    }

    fn samples(&self, offset: u64, length: usize) -> Option<Vec<Complex32>> {
        let bytes = self.file.bytes(offset, length)?;
        let mut out = Vec::with_capacity(length);
        self.file.format.decode_complex(bytes, &mut out);
        Some(out)
    }
}

/// A real-valued capture file (`f32`).
#[derive(Debug, Clone)]
pub struct RawRealSource {
    file: RawFile,
}

impl RawRealSource {
    /// Opens a real capture file.
    ///
    /// # Errors
    /// Returns an error if the format is not real, the rate is not positive,
    /// or the file cannot be mapped.
    pub fn open<P: AsRef<Path>>(path: P, format: RawFormat, rate: f64) -> Result<Self> {
        if format.kind() != SampleKind::Real {
            return Err(Error::InvalidFormat(format!("{format} is not a real format")));
        }
        Ok(Self {
            file: RawFile::open(path.as_ref(), format, rate)?,
        })
    }
}

impl SampleSource for RawRealSource {
    type Sample = f32;

    fn count(&self) -> u64 {
        self.file.count
    }

    fn rate(&self) -> f64 {
        self.file.rate
    }

    fn samples(&self, offset: u64, length: usize) -> Option<Vec<f32>> {
        let bytes = self.file.bytes(offset, length)?;
        let mut out = Vec::with_capacity(length);
        self.file.format.decode_real(bytes, &mut out);
        Some(out)
    }
}

/// Opens a raw capture as a plottable source.
///
/// The format is taken from `format` or, when `None`, inferred from the
/// file extension.
///
/// # Errors
/// Returns an error if the format cannot be determined, the rate is not
/// positive, or the file cannot be mapped.
pub fn open_source<P: AsRef<Path>>(
    path: P,
    format: Option<RawFormat>,
    rate: f64,
) -> Result<AnySource> {
    let path = path.as_ref();
    let format = match format {
        Some(format) => format,
        None => RawFormat::from_path(path)?,
    };
    log::debug!("opening {} as {format} at {rate} Hz", path.display());
    Ok(match format.kind() {
        SampleKind::Complex => {
            AnySource::Complex(Arc::new(RawComplexSource::open(path, format, rate)?))
        }
        SampleKind::Real => AnySource::Real(Arc::new(RawRealSource::open(path, format, rate)?)),
    })
}
