//! Trace rasterization into pixel tiles.
//!
//! A tile's samples are decimated to at most one point per pixel column and
//! normalized to the tile height using the min/max of the fetched samples.
//! Complex sources are drawn as two traces (I in red, Q in blue); real
//! sources as one green trace.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use image::{Rgba, RgbaImage};
use tracetile_core::{decimation_stride, AnySource, SampleRange, Samples};

use crate::tile::PixelTile;

/// Colour of the in-phase channel of complex traces.
pub const I_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Colour of the quadrature channel of complex traces.
pub const Q_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
/// Colour of real-valued traces.
pub const REAL_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// A point of a trace path, in tile pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    /// Horizontal position, `0..=width-2`.
    pub x: f32,
    /// Vertical position, `0..=height-2`.
    pub y: f32,
}

/// Renders `range` of `source` into a `width` x `height` tile.
///
/// Returns `None` if the source cannot provide the range.
#[must_use]
pub fn rasterize(
    source: &AnySource,
    range: SampleRange,
    width: u32,
    height: u32,
) -> Option<PixelTile> {
    let length = usize::try_from(range.length()).ok()?;
    let mut tile = PixelTile::transparent(width, height);
    if length == 0 || width == 0 || height == 0 {
        return Some(tile);
    }

    match source.samples(range.minimum, length)? {
        Samples::Complex(samples) => {
            let i: Vec<f32> = samples.iter().map(|s| s.re).collect();
            let q: Vec<f32> = samples.iter().map(|s| s.im).collect();
            stroke_trace(tile.image_mut(), &build_trace(&i, width, height), I_COLOR);
            stroke_trace(tile.image_mut(), &build_trace(&q, width, height), Q_COLOR);
        }
        Samples::Real(samples) => {
            stroke_trace(
                tile.image_mut(),
                &build_trace(&samples, width, height),
                REAL_COLOR,
            );
        }
    }
    Some(tile)
}

/// Builds the decimated, normalized point path for one channel.
///
/// Keeps every `ceil(len / width)`-th sample. The last sample is always
/// included; when the stride skips it, it is placed at `x = width - 1`
/// before clipping.
#[must_use]
pub fn build_trace(values: &[f32], width: u32, height: u32) -> Vec<TracePoint> {
    let count = values.len();
    if count == 0 || width == 0 || height == 0 {
        return Vec::new();
    }

    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(f64::from(v)), hi.max(f64::from(v)))
        });
    let (mid, range) = if min <= max {
        let range = max - min;
        ((min + max) * 0.5, if range > 0.0 { range } else { 1.0 })
    } else {
        (0.0, 1.0)
    };

    let x_step = f64::from(width) / count as f64;
    let x_max = f64::from(width.saturating_sub(2));
    let y_max = f64::from(height.saturating_sub(2));
    let half_height = f64::from(height) * 0.5;
    let point = |index: usize, x: f64| {
        let value = f64::from(values[index]);
        let norm = if value.is_finite() { (value - mid) / range } else { 0.0 };
        let y = (1.0 - norm) * half_height;
        TracePoint {
            x: x.clamp(0.0, x_max) as f32,
            y: y.clamp(0.0, y_max) as f32,
        }
    };

    let stride = decimation_stride(count, width as usize);
    let mut points: Vec<TracePoint> = (0..count)
        .step_by(stride)
        .map(|index| point(index, index as f64 * x_step))
        .collect();
    if (count - 1) % stride != 0 {
        points.push(point(count - 1, f64::from(width) - 1.0));
    }
    points
}

/// Strokes a point path into `image` with straight one-pixel segments.
pub fn stroke_trace(image: &mut RgbaImage, points: &[TracePoint], color: Rgba<u8>) {
    match points {
        [] => {}
        [only] => plot(image, only.x, only.y, color),
        _ => {
            for pair in points.windows(2) {
                draw_segment(image, pair[0], pair[1], color);
            }
        }
    }
}

fn draw_segment(image: &mut RgbaImage, from: TracePoint, to: TracePoint, color: Rgba<u8>) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
    for step in 0..=steps as u32 {
        let t = step as f32 / steps;
        plot(image, from.x + dx * t, from.y + dy * t, color);
    }
}

fn plot(image: &mut RgbaImage, x: f32, y: f32, color: Rgba<u8>) {
    let (x, y) = (x.round(), y.round());
    if x < 0.0 || y < 0.0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}
