//! Time scale ticks and SI formatting for axis labels.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::{SampleRange, ViewConfig};

/// Target spacing between major ticks, in pixels.
const TICK_SPACING_PX: u32 = 80;

/// Upper bound on ticks returned for one range.
const MAX_TICKS: usize = 4096;

/// A tick on the time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeTick {
    /// Column relative to the start of the range.
    pub column: u64,
    /// Tick time in seconds from the start of the capture.
    pub seconds: f64,
    /// Major ticks carry a label; minor ticks do not.
    pub major: bool,
}

/// Computes major and minor time ticks for a visible sample range.
///
/// Major ticks are spaced on a power of ten so that roughly one fits in
/// every 80 pixels; minor ticks subdivide them by ten. Empty ranges and
/// non-positive sample rates produce no ticks.
#[must_use]
pub fn time_ticks(
    range: SampleRange,
    rate: f64,
    width_px: u32,
    config: &ViewConfig,
) -> Vec<TimeTick> {
    if range.is_empty() || rate <= 0.0 || !rate.is_finite() {
        return Vec::new();
    }
    let start = range.minimum as f64 / rate;
    let stop = range.maximum as f64 / rate;
    let duration = stop - start;
    if duration <= 0.0 {
        return Vec::new();
    }

    let max_ticks = f64::from((width_px / TICK_SPACING_PX).max(1));
    let major_step = 10.0 * 10f64.powf((duration / max_ticks).log10().floor());

    let mut ticks = Vec::new();
    push_ticks(&mut ticks, range, rate, start, stop, major_step, true, config);
    push_ticks(&mut ticks, range, rate, start, stop, major_step / 10.0, false, config);
    ticks
}

fn push_ticks(
    ticks: &mut Vec<TimeTick>,
    range: SampleRange,
    rate: f64,
    start: f64,
    stop: f64,
    step: f64,
    major: bool,
    config: &ViewConfig,
) {
    let mut tick = (start / step).floor() * step;
    let budget = ticks.len() + MAX_TICKS;
    while tick <= stop && ticks.len() < budget {
        let sample = (tick * rate) as u64;
        if sample >= range.minimum {
            ticks.push(TimeTick {
                column: config.sample_to_column(sample - range.minimum),
                seconds: tick,
                major,
            });
        }
        tick += step;
    }
}

/// Formats a value with an SI prefix, e.g. `0.0015` → `"1.5m"`.
#[must_use]
pub fn format_si(value: f64) -> String {
    const PREFIXES: [&str; 7] = ["n", "µ", "m", "", "k", "M", "G"];
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let mut magnitude = value.abs();
    let mut index = 3usize;
    while magnitude < 1.0 && index > 0 {
        magnitude *= 1e3;
        index -= 1;
    }
    while magnitude >= 1e3 && index < PREFIXES.len() - 1 {
        magnitude *= 1e-3;
        index += 1;
    }
    let digits = format!("{magnitude:.3}");
    let digits = digits.trim_end_matches('0').trim_end_matches('.');
    format!("{sign}{digits}{}", PREFIXES[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_format_si() {
        assert_eq!(format_si(0.0015), "1.5m");
        assert_eq!(format_si(2_400_000.0), "2.4M");
        assert_eq!(format_si(1.0), "1");
        assert_eq!(format_si(-250e-6), "-250µ");
        assert_eq!(format_si(0.0), "0");
    }

    #[test]
    fn test_major_ticks_are_powers_of_ten() {
        // 1 Msps, 800 px wide, 0.5 s visible → up to 10 ticks → 0.1 s apart.
        let config = ViewConfig::new(625, 1, 1).unwrap();
        let range = SampleRange::new(0, 500_000);
        let ticks = time_ticks(range, 1e6, 800, &config);
        let majors: Vec<&TimeTick> = ticks.iter().filter(|t| t.major).collect();
        assert!((5..=6).contains(&majors.len()), "{} majors", majors.len());
        assert_relative_eq!(majors[1].seconds, 0.1, epsilon = 1e-9);
        assert!((159..=160).contains(&majors[1].column));

        let minors = ticks.iter().filter(|t| !t.major).count();
        assert!(minors >= 45, "{minors} minors");
    }

    #[test]
    fn test_ticks_before_range_are_skipped() {
        let config = ViewConfig::new(100, 1, 1).unwrap();
        let range = SampleRange::new(1_050, 2_000);
        let ticks = time_ticks(range, 1_000.0, 400, &config);
        assert!(ticks.iter().all(|t| t.seconds * 1_000.0 >= 1_050.0 - 1e-6));
    }

    #[test]
    fn test_empty_range_has_no_ticks() {
        let config = ViewConfig::default();
        assert!(time_ticks(SampleRange::new(5, 5), 1e6, 800, &config).is_empty());
        assert!(time_ticks(SampleRange::new(0, 5), 0.0, 800, &config).is_empty());
    }
}
