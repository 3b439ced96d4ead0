//! tracetile-dsp: Streaming sample transforms.
//!
//! This crate provides the frequency demodulator that turns a complex
//! capture into an instantaneous-frequency trace:
//! - **Full** mode - FM discriminator with filter state carried across samples
//! - **Cheap** mode - per-call phase difference, stateless across calls
//!
#![warn(missing_docs)]

mod demod;
mod filter;

pub use demod::{DemodMode, DemodStream, FrequencyDemod};
pub use filter::{FmDiscriminator, PhaseDifference, SampleFilter};
