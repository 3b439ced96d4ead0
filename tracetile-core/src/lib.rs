//! tracetile-core: Core traits and types for tiled trace rendering.
//!
//! This crate provides the foundational abstractions shared by the
//! transform, rendering and I/O crates: sample sources, sample ranges,
//! the sample/pixel coordinate mapper and decimation helpers.
//!

pub mod decimate;
pub mod error;
pub mod range;
pub mod scale;
pub mod selection;
pub mod source;
pub mod view;

pub use decimate::{decimation_stride, DecimatedIndices};
pub use error::{Error, Result};
pub use range::SampleRange;
pub use scale::{format_si, time_ticks, TimeTick};
pub use selection::{extract_symbols, TimeSelection};
pub use source::{AnySource, ComplexSource, MemorySource, RealSource, SampleKind, SampleSource, Samples};
pub use view::{ViewConfig, Viewport, ZoomAnchor};

pub use num_complex::Complex32;
