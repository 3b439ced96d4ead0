//! Per-sample demodulation filters.

use std::f32::consts::PI;

use num_complex::Complex32;

/// Smallest modulation factor accepted; keeps the discriminator gain finite.
const MIN_MODULATION_FACTOR: f32 = 1e-6;

/// Phase advance from `previous` to `current`; zero when either is zero.
#[inline]
fn phase_step(current: Complex32, previous: Complex32) -> f32 {
    let product = current * previous.conj();
    if product.norm_sqr() > 0.0 {
        product.arg()
    } else {
        0.0
    }
}

/// A filter mapping complex input samples to real output samples.
///
/// A filter may carry state from one sample to the next. `history` reports
/// how many preceding input samples must be replayed through a fresh
/// instance to reproduce that state exactly.
pub trait SampleFilter: Send {
    /// Preceding input samples needed to reach the state at a given offset.
    fn history(&self) -> usize;

    /// Returns the filter to its initial state.
    fn reset(&mut self);

    /// Filters `input` into `output`. Both slices have the same length.
    fn process(&mut self, input: &[Complex32], output: &mut [f32]);
}

/// FM discriminator: scaled phase change between consecutive samples.
///
/// `out = arg(x[n] * conj(x[n-1])) / (2π kf)`, with `x[-1]` taken as zero
/// (so the first output after a reset is zero).
#[derive(Debug, Clone)]
pub struct FmDiscriminator {
    previous: Complex32,
    gain: f32,
}

impl FmDiscriminator {
    /// Creates a discriminator with modulation factor `kf`.
    #[must_use]
    pub fn new(kf: f32) -> Self {
        let kf = kf.max(MIN_MODULATION_FACTOR);
        Self {
            previous: Complex32::new(0.0, 0.0),
            gain: 1.0 / (2.0 * PI * kf),
        }
    }

    /// Creates a discriminator for a signal occupying `relative_bandwidth`
    /// of the sample rate (`kf = relative_bandwidth / 2`).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_bandwidth(relative_bandwidth: f64) -> Self {
        Self::new((relative_bandwidth / 2.0) as f32)
    }

    /// Output scale applied to the raw phase difference.
    #[must_use]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Demodulates one sample.
    #[inline]
    pub fn demodulate(&mut self, sample: Complex32) -> f32 {
        let phase = phase_step(sample, self.previous);
        self.previous = sample;
        phase * self.gain
    }
}

impl SampleFilter for FmDiscriminator {
    fn history(&self) -> usize {
        1
    }

    fn reset(&mut self) {
        self.previous = Complex32::new(0.0, 0.0);
    }

    fn process(&mut self, input: &[Complex32], output: &mut [f32]) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.demodulate(sample);
        }
    }
}

/// Instantaneous frequency as the raw phase difference within one call.
///
/// The first output of every call is zero; nothing carries over between
/// calls, so any chunking of the input is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseDifference;

impl SampleFilter for PhaseDifference {
    fn history(&self) -> usize {
        0
    }

    fn reset(&mut self) {}

    fn process(&mut self, input: &[Complex32], output: &mut [f32]) {
        let Some((&first, rest)) = input.split_first() else {
            return;
        };
        let Some((head, tail)) = output.split_first_mut() else {
            return;
        };
        *head = 0.0;
        let mut previous = first;
        for (out, &sample) in tail.iter_mut().zip(rest) {
            *out = phase_step(sample, previous);
            previous = sample;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_phase_difference_quarter_turns() {
        let input = [
            Complex32::new(1.0, 0.0),
            Complex32::new(0.0, 1.0),
            Complex32::new(-1.0, 0.0),
        ];
        let mut output = [f32::NAN; 3];
        PhaseDifference.process(&input, &mut output);
        assert_relative_eq!(output[0], 0.0);
        assert_relative_eq!(output[1], FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(output[2], FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_phase_difference_empty() {
        let mut output: [f32; 0] = [];
        PhaseDifference.process(&[], &mut output);
    }

    #[test]
    fn test_discriminator_constant_phase_is_constant() {
        let mut filter = FmDiscriminator::from_bandwidth(0.5);
        let input = vec![Complex32::from_polar(0.7, 1.1); 64];
        let mut output = vec![f32::NAN; 64];
        filter.process(&input, &mut output);
        for &value in &output {
            assert_relative_eq!(value, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_discriminator_scales_by_bandwidth() {
        // A tone advancing π/4 per sample, kf = 0.25 → π/4 / (π/2) = 0.5.
        let mut filter = FmDiscriminator::new(0.25);
        let input: Vec<Complex32> = (0..16)
            .map(|n| Complex32::from_polar(1.0, n as f32 * PI / 4.0))
            .collect();
        let mut output = vec![0.0; 16];
        filter.process(&input, &mut output);
        assert_relative_eq!(output[0], 0.0);
        for &value in &output[1..] {
            assert_relative_eq!(value, 0.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_discriminator_state_carries_across_calls() {
        let input: Vec<Complex32> = (0..10)
            .map(|n| Complex32::from_polar(1.0, (n * n) as f32 * 0.05))
            .collect();

        let mut whole = FmDiscriminator::new(0.5);
        let mut expected = vec![0.0; 10];
        whole.process(&input, &mut expected);

        let mut split = FmDiscriminator::new(0.5);
        let mut actual = vec![0.0; 10];
        split.process(&input[..4], &mut actual[..4]);
        split.process(&input[4..], &mut actual[4..]);
        assert_eq!(actual, expected);

        split.reset();
        let mut again = vec![0.0; 10];
        split.process(&input, &mut again);
        assert_eq!(again, expected);
    }
}
