use serde::Serialize;

use crate::geometry::{fraction_for_angle, RosetteLayout};
use crate::track::{Sample, TrackState};

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct PointerHit {
    pub index: usize,
    /// Share of the time span under the pointer, in `[0, 1)`.
    pub fraction: f64,
    /// Time the pointer angle stands for; `None` when no sample is timed.
    pub target_time_ms: Option<f64>,
}

/// Resolve a screen position to the sample closest in time to its angle.
pub fn resolve_pointer(state: &TrackState, layout: &RosetteLayout, x: f64, y: f64) -> Option<PointerHit> {
    let angle = (y - layout.center_y).atan2(x - layout.center_x);
    resolve_fraction(state.samples(), state.time_span_ms(), fraction_for_angle(angle))
}

/// Nearest-timestamp lookup for a time fraction.
///
/// Samples keep their file order, which need not be sorted by time, so this
/// is a full linear scan. Without any finite timestamp the index is taken
/// proportionally instead.
pub fn resolve_fraction(samples: &[Sample], span: Option<(f64, f64)>, fraction: f64) -> Option<PointerHit> {
    if samples.is_empty() {
        return None;
    }
    let last_index = samples.len() - 1;

    let Some((first_ms, last_ms)) = span else {
        let guess = (fraction * last_index as f64).round();
        let index = if guess.is_finite() {
            (guess.max(0.0) as usize).min(last_index)
        } else {
            0
        };
        return Some(PointerHit {
            index,
            fraction,
            target_time_ms: None,
        });
    };

    let target = first_ms + fraction * (last_ms - first_ms);
    let mut best: Option<(usize, f64)> = None;
    for (index, sample) in samples.iter().enumerate() {
        if !sample.timestamp_ms.is_finite() {
            continue;
        }
        let diff = (sample.timestamp_ms - target).abs();
        if best.map_or(true, |(_, best_diff)| diff < best_diff) {
            best = Some((index, diff));
        }
    }

    best.map(|(index, _)| PointerHit {
        index: index.min(last_index),
        fraction,
        target_time_ms: Some(target),
    })
}
