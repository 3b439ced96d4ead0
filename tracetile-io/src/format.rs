//! Raw sample file formats.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use num_complex::Complex32;
use tracetile_core::SampleKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Layout of a headerless, interleaved little-endian sample file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RawFormat {
    /// Complex 32-bit float (`.cf32`, `.cfile`, `.fc32`).
    Cf32,
    /// Complex signed 16-bit (`.cs16`, `.sc16`, `.c16`).
    Cs16,
    /// Complex signed 8-bit, as written by `HackRF` tools (`.cs8`, `.sc8`, `.c8`).
    Cs8,
    /// Complex unsigned 8-bit, as written by RTL-SDR tools (`.cu8`, `.uc8`).
    Cu8,
    /// Real 32-bit float (`.f32`).
    F32,
}

impl RawFormat {
    /// All supported formats.
    pub const ALL: [Self; 5] = [Self::Cf32, Self::Cs16, Self::Cs8, Self::Cu8, Self::F32];

    /// Format for a file extension (case-insensitive, without the dot).
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "cf32" | "cfile" | "fc32" => Some(Self::Cf32),
            "cs16" | "sc16" | "c16" => Some(Self::Cs16),
            "cs8" | "sc8" | "c8" => Some(Self::Cs8),
            "cu8" | "uc8" => Some(Self::Cu8),
            "f32" => Some(Self::F32),
            _ => None,
        }
    }

    /// Format implied by a path's extension.
    ///
    /// # Errors
    /// Returns an error if the path has no recognised extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "cannot infer sample format from {}",
                    path.display()
                ))
            })
    }

    /// Bytes per sample (both channels for complex formats).
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Cf32 => 8,
            Self::Cs16 | Self::F32 => 4,
            Self::Cs8 | Self::Cu8 => 2,
        }
    }

    /// Element kind the format decodes to.
    #[must_use]
    pub fn kind(self) -> SampleKind {
        match self {
            Self::F32 => SampleKind::Real,
            Self::Cf32 | Self::Cs16 | Self::Cs8 | Self::Cu8 => SampleKind::Complex,
        }
    }

    /// Canonical extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Cf32 => "cf32",
            Self::Cs16 => "cs16",
            Self::Cs8 => "cs8",
            Self::Cu8 => "cu8",
            Self::F32 => "f32",
        }
    }

    /// Decodes whole complex samples from `bytes`. Real formats yield nothing.
    pub(crate) fn decode_complex(self, bytes: &[u8], out: &mut Vec<Complex32>) {
        match self {
            Self::Cf32 => out.extend(bytes.chunks_exact(8).map(|c| {
                Complex32::new(
                    f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                )
            })),
            Self::Cs16 => out.extend(bytes.chunks_exact(4).map(|c| {
                Complex32::new(
                    f32::from(i16::from_le_bytes([c[0], c[1]])) / 32_768.0,
                    f32::from(i16::from_le_bytes([c[2], c[3]])) / 32_768.0,
                )
            })),
            Self::Cs8 => out.extend(bytes.chunks_exact(2).map(|c| {
                Complex32::new(
                    f32::from(i8::from_le_bytes([c[0]])) / 127.0,
                    f32::from(i8::from_le_bytes([c[1]])) / 127.0,
                )
            })),
            Self::Cu8 => out.extend(bytes.chunks_exact(2).map(|c| {
                Complex32::new(
                    (f32::from(c[0]) - 127.4) / 128.0,
                    (f32::from(c[1]) - 127.4) / 128.0,
                )
            })),
            Self::F32 => {}
        }
    }

    /// Decodes whole real samples from `bytes`. Complex formats yield nothing.
    pub(crate) fn decode_real(self, bytes: &[u8], out: &mut Vec<f32>) {
        if self == Self::F32 {
            out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
            );
        }
    }
}

impl fmt::Display for RawFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for RawFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| Error::InvalidFormat(format!("unknown sample format '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_extension_aliases() {
        assert_eq!(RawFormat::from_extension("cfile"), Some(RawFormat::Cf32));
        assert_eq!(RawFormat::from_extension("FC32"), Some(RawFormat::Cf32));
        assert_eq!(RawFormat::from_extension("sc16"), Some(RawFormat::Cs16));
        assert_eq!(RawFormat::from_extension("c8"), Some(RawFormat::Cs8));
        assert_eq!(RawFormat::from_extension("uc8"), Some(RawFormat::Cu8));
        assert_eq!(RawFormat::from_extension("wav"), None);
        assert_eq!(".cu8".parse::<RawFormat>().unwrap(), RawFormat::Cu8);
        assert!("iq".parse::<RawFormat>().is_err());
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            RawFormat::from_path(Path::new("/tmp/capture.cs8")).unwrap(),
            RawFormat::Cs8
        );
        assert!(RawFormat::from_path(Path::new("capture")).is_err());
    }

    #[test]
    fn test_sizes_and_kinds() {
        for format in RawFormat::ALL {
            assert_eq!(RawFormat::from_extension(format.extension()), Some(format));
        }
        assert_eq!(RawFormat::Cf32.bytes_per_sample(), 8);
        assert_eq!(RawFormat::Cu8.bytes_per_sample(), 2);
        assert_eq!(RawFormat::F32.kind(), SampleKind::Real);
        assert_eq!(RawFormat::Cs16.kind(), SampleKind::Complex);
    }

    #[test]
    fn test_integer_scaling() {
        let mut out = Vec::new();
        RawFormat::Cs16.decode_complex(&[0x00, 0x80, 0x00, 0x40], &mut out);
        assert_relative_eq!(out[0].re, -1.0);
        assert_relative_eq!(out[0].im, 0.5);

        out.clear();
        RawFormat::Cs8.decode_complex(&[127, 0x81], &mut out);
        assert_relative_eq!(out[0].re, 1.0);
        assert_relative_eq!(out[0].im, -1.0);

        out.clear();
        RawFormat::Cu8.decode_complex(&[255, 0], &mut out);
        assert_relative_eq!(out[0].re, 127.6 / 128.0, epsilon = 1e-6);
        assert_relative_eq!(out[0].im, -127.4 / 128.0, epsilon = 1e-6);
    }
}
