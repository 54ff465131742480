//! Rosette layout: time runs clockwise from the bottom of the circle and
//! altitude pushes the trace outward from a base ring.
//!
//! Screen coordinates have y growing downward, so `angle = π/2` is the
//! 6 o'clock position and increasing angles sweep clockwise. The pointer
//! resolver inverts the same convention through [`fraction_for_angle`].

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use crate::config::PipelineOptions;
use crate::track::{Ranges, Sample, TrackState};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RosetteLayout {
    pub center_x: f64,
    pub center_y: f64,
    pub base_radius: f64,
    pub variable_radius: f64,
}

impl RosetteLayout {
    pub fn for_canvas(width: f64, height: f64, options: &PipelineOptions) -> Self {
        let half = 0.5 * width.min(height).max(0.0);
        Self {
            center_x: 0.5 * width,
            center_y: 0.5 * height,
            base_radius: half * options.base_radius_fraction,
            variable_radius: half * options.variable_radius_fraction,
        }
    }

    pub fn outer_radius(&self) -> f64 {
        self.base_radius + self.variable_radius
    }

    pub fn to_cartesian(&self, angle: f64, radius: f64) -> (f64, f64) {
        (
            self.center_x + radius * angle.cos(),
            self.center_y + radius * angle.sin(),
        )
    }

    /// Interpolate in polar space, then convert; avoids cutting chords
    /// across the circle the way a straight x/y blend would.
    pub fn interpolate(&self, a: &RosettePoint, b: &RosettePoint, f: f64) -> (f64, f64) {
        let angle = a.angle + angular_step(a.angle, b.angle) * f;
        let radius = a.radius + (b.radius - a.radius) * f;
        self.to_cartesian(angle, radius)
    }

    /// `steps + 1` points along one segment, both ends included.
    pub fn sample_segment(&self, a: &RosettePoint, b: &RosettePoint, steps: usize) -> Vec<(f64, f64)> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| self.interpolate(a, b, i as f64 / steps as f64))
            .collect()
    }
}

/// Signed angular step between two rosette angles.
///
/// Angles are unwrapped over `[π/2, π/2 + 2π]`, so forward steps keep their
/// full length even past half a turn. Backward steps (out-of-order time) take
/// the shorter way round; the closing step from the end of the track onto its
/// start is a whole backward turn and becomes no movement at all.
fn angular_step(from: f64, to: f64) -> f64 {
    let raw = to - from;
    if raw >= -PI {
        return raw;
    }
    let wrapped = raw.rem_euclid(TAU);
    if TAU - wrapped < 1e-9 {
        0.0
    } else {
        wrapped
    }
}

#[derive(Clone, Debug, Default)]
pub struct RosetteGeometry {
    points: Vec<RosettePoint>,
    sample_count: usize,
}

impl RosetteGeometry {
    pub fn build(state: &TrackState, layout: &RosetteLayout) -> Self {
        Self::from_samples(state.samples(), state.ranges(), state.time_span_ms(), layout)
    }

    pub fn from_samples(
        samples: &[Sample],
        ranges: &Ranges,
        span: Option<(f64, f64)>,
        layout: &RosetteLayout,
    ) -> Self {
        let count = samples.len();
        let mut points: Vec<RosettePoint> = samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let fraction = time_fraction(sample.timestamp_ms, index, count, span);
                let angle = angle_for_fraction(fraction);
                let lift = if sample.altitude_ft.is_finite() {
                    linear_map(
                        sample.altitude_ft,
                        ranges.alt_min,
                        ranges.alt_max,
                        0.0,
                        layout.variable_radius,
                        true,
                    )
                } else {
                    0.0
                };
                let radius = layout.base_radius + lift;
                let (x, y) = layout.to_cartesian(angle, radius);
                RosettePoint {
                    x,
                    y,
                    angle,
                    radius,
                    index,
                    altitude_ft: sample.altitude_ft,
                    speed_kt: sample.speed_kt,
                    heading_deg: sample.heading_deg,
                    timestamp_ms: sample.timestamp_ms,
                }
            })
            .collect();

        // Close the loop; with one sample the second copy repeats the first.
        if !points.is_empty() {
            points.push(points[0]);
            points.push(points[1]);
        }

        Self {
            points,
            sample_count: count,
        }
    }

    /// The closed sequence: one point per sample, then copies of points 0 and 1.
    pub fn points(&self) -> &[RosettePoint] {
        &self.points
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn point_for_sample(&self, index: usize) -> Option<&RosettePoint> {
        if index < self.sample_count {
            self.points.get(index)
        } else {
            None
        }
    }

    /// One segment per sample, the last one closing back onto the start.
    pub fn segments(&self) -> Vec<Segment> {
        if self.sample_count == 0 {
            return Vec::new();
        }
        self.points[..=self.sample_count]
            .windows(2)
            .enumerate()
            .map(|(ordinal, pair)| Segment {
                ordinal,
                from: pair[0],
                to: pair[1],
                speed_kt: mean_finite(pair[0].speed_kt, pair[1].speed_kt),
            })
            .collect()
    }
}

fn mean_finite(a: f64, b: f64) -> f64 {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => 0.5 * (a + b),
        (true, false) => a,
        (false, true) => b,
        (false, false) => f64::NAN,
    }
}
