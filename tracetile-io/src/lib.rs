//! tracetile-io: Memory-mapped raw capture sources for tracetile.
//!
//! This crate exposes headerless interleaved IQ recordings as sample
//! sources, reading them through memory-mapped files via memmap2.
//!

mod error;
mod format;
mod reader;
mod source;

pub use error::{Error, Result};
pub use format::RawFormat;
pub use reader::MappedFileReader;
pub use source::{open_source, RawComplexSource, RawRealSource};
