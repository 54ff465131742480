//! Takeoff/landing detection and the time-weighted in-flight speed average.
//!
//! Takeoff is the first sample that is airborne with a usable timestamp.
//! Landing is the first later sample whose altitude returns to exactly zero
//! after a non-zero reading. Taxi segments and segments with any missing
//! datum never contribute to the average.

use serde::{Deserialize, Serialize};

use crate::config::PhaseFallback;
use crate::track::Sample;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FlightPhase {
    pub takeoff_index: Option<usize>,
    pub takeoff_timestamp_ms: Option<f64>,
    pub landing_index: Option<usize>,
    pub landing_timestamp_ms: Option<f64>,
    pub average_in_flight_speed_kt: Option<f64>,
    /// First index of the span the average was taken over.
    pub span_start_index: Option<usize>,
    /// Last index of the span the average was taken over.
    pub span_end_index: Option<usize>,
    pub tracked_duration_ms: Option<f64>,
}

impl FlightPhase {
    /// Touchdown minus takeoff, only when both exist and are ordered.
    pub fn total_flight_time_ms(&self) -> Option<f64> {
        match (self.takeoff_timestamp_ms, self.landing_timestamp_ms) {
            (Some(takeoff), Some(landing))
                if takeoff.is_finite() && landing.is_finite() && landing > takeoff =>
            {
                Some(landing - takeoff)
            }
            _ => None,
        }
    }
}

pub fn detect_flight_phase(samples: &[Sample], fallback: PhaseFallback) -> FlightPhase {
    let mut phase = FlightPhase::default();

    let Some(takeoff) = find_takeoff(samples) else {
        return phase;
    };
    phase.takeoff_index = Some(takeoff);
    phase.takeoff_timestamp_ms = Some(samples[takeoff].timestamp_ms);

    let landing = find_landing(samples, takeoff);
    if let Some(idx) = landing {
        phase.landing_index = Some(idx);
        phase.landing_timestamp_ms = Some(samples[idx].timestamp_ms);
    }

    // Takeoff already carries a finite timestamp, so it is always the span start.
    let start = takeoff;
    let end = match (landing, fallback) {
        (Some(idx), _) => Some(idx),
        (None, PhaseFallback::ClampToDatasetBounds) => last_timed(samples),
        (None, PhaseFallback::None) => None,
    };

    if let Some(end) = end {
        phase.span_start_index = Some(start);
        phase.span_end_index = Some(end);
        let duration = samples[end].timestamp_ms - samples[start].timestamp_ms;
        if duration.is_finite() && duration > 0.0 {
            phase.tracked_duration_ms = Some(duration);
        }
        phase.average_in_flight_speed_kt = average_airborne_speed(samples, start, end);
    }

    phase
}

fn find_takeoff(samples: &[Sample]) -> Option<usize> {
    samples.iter().position(|s| {
        s.timestamp_ms.is_finite() && s.altitude_ft.is_finite() && s.altitude_ft > 0.0
    })
}

fn find_landing(samples: &[Sample], takeoff: usize) -> Option<usize> {
    (takeoff + 1..samples.len()).find(|&j| {
        let prev = samples[j - 1].altitude_ft;
        let cur = &samples[j];
        prev.is_finite()
            && prev != 0.0
            && cur.altitude_ft.is_finite()
            && cur.altitude_ft == 0.0
            && cur.timestamp_ms.is_finite()
    })
}

fn last_timed(samples: &[Sample]) -> Option<usize> {
    samples.iter().rposition(|s| s.timestamp_ms.is_finite())
}

/// Trapezoidal average over pairs `(i, i + 1)` with `start <= i < end`.
pub fn average_airborne_speed(samples: &[Sample], start: usize, end: usize) -> Option<f64> {
    if start >= end || end >= samples.len() {
        return None;
    }
    let mut weighted = 0.0;
    let mut total_s = 0.0;
    for pair in samples[start..=end].windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let dt = (b.timestamp_ms - a.timestamp_ms) / 1000.0;
        let airborne = a.altitude_ft.is_finite()
            && b.altitude_ft.is_finite()
            && a.altitude_ft > 0.0
            && b.altitude_ft > 0.0;
        let forward = dt > 0.0;
        if !forward || !airborne || !a.speed_kt.is_finite() || !b.speed_kt.is_finite() {
            continue;
        }
        weighted += 0.5 * (a.speed_kt + b.speed_kt) * dt;
        total_s += dt;
    }
    if total_s > 0.0 {
        Some(weighted / total_s)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(alts: &[f64], speeds: &[f64], times_s: &[f64]) -> Vec<Sample> {
        alts.iter()
            .zip(speeds)
            .zip(times_s)
            .map(|((&alt, &speed), &t)| Sample {
                latitude: 0.0,
                longitude: 0.0,
                altitude_ft: alt,
                speed_kt: speed,
                heading_deg: 90.0,
                raw_time: String::new(),
                timestamp_ms: t * 1000.0,
            })
            .collect()
    }

    #[test]
    fn finds_takeoff_and_touchdown() {
        let samples = series(
            &[0.0, 0.0, 150.0, 300.0, 150.0, 0.0, 0.0],
            &[10.0, 20.0, 120.0, 200.0, 120.0, 30.0, 5.0],
            &[0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
        );
        let phase = detect_flight_phase(&samples, PhaseFallback::ClampToDatasetBounds);
        assert_eq!(phase.takeoff_index, Some(2));
        assert_eq!(phase.landing_index, Some(5));
        assert_eq!(phase.takeoff_timestamp_ms, Some(20_000.0));
        assert_eq!(phase.landing_timestamp_ms, Some(50_000.0));
        assert_eq!(phase.total_flight_time_ms(), Some(30_000.0));
        // Only 2->3 and 3->4 are airborne at both ends.
        let avg = phase.average_in_flight_speed_kt.unwrap();
        assert!((avg - 160.0).abs() < 1e-9);
    }

    #[test]
    fn grounded_track_has_no_phase() {
        let samples = series(&[0.0, 0.0, 0.0], &[5.0, 6.0, 7.0], &[0.0, 1.0, 2.0]);
        let phase = detect_flight_phase(&samples, PhaseFallback::ClampToDatasetBounds);
        assert_eq!(phase, FlightPhase::default());
    }

    #[test]
    fn takeoff_requires_a_timestamp() {
        let samples = series(
            &[100.0, 200.0, 0.0],
            &[100.0, 100.0, 100.0],
            &[f64::NAN, 10.0, 20.0],
        );
        let phase = detect_flight_phase(&samples, PhaseFallback::ClampToDatasetBounds);
        assert_eq!(phase.takeoff_index, Some(1));
        assert_eq!(phase.landing_index, Some(2));
    }

    #[test]
    fn missing_landing_clamps_to_last_timed_sample() {
        let samples = series(
            &[0.0, 1000.0, 2000.0, 3000.0, 3000.0],
            &[50.0, 200.0, 300.0, 400.0, f64::NAN],
            &[0.0, 60.0, 120.0, 180.0, f64::NAN],
        );
        let phase = detect_flight_phase(&samples, PhaseFallback::ClampToDatasetBounds);
        assert_eq!(phase.landing_index, None);
        assert_eq!(phase.span_start_index, Some(1));
        assert_eq!(phase.span_end_index, Some(3));
        assert_eq!(phase.tracked_duration_ms, Some(120_000.0));
        assert_eq!(phase.total_flight_time_ms(), None);
        let avg = phase.average_in_flight_speed_kt.unwrap();
        assert!((avg - 300.0).abs() < 1e-9);

        let strict = detect_flight_phase(&samples, PhaseFallback::None);
        assert_eq!(strict.takeoff_index, Some(1));
        assert_eq!(strict.average_in_flight_speed_kt, None);
        assert_eq!(strict.span_end_index, None);
    }

    #[test]
    fn average_is_time_weighted() {
        // 100 kt for 10 s then 400 kt for 50 s; a naive mean would be 250.
        let samples = series(
            &[500.0, 500.0, 500.0, 500.0],
            &[100.0, 100.0, 400.0, 400.0],
            &[0.0, 10.0, 10.0, 60.0],
        );
        let avg = average_airborne_speed(&samples, 0, 3).unwrap();
        assert!((avg - (100.0 * 10.0 + 400.0 * 50.0) / 60.0).abs() < 1e-9);
    }

    #[test]
    fn segments_with_missing_data_are_skipped() {
        let samples = series(
            &[500.0, f64::NAN, 500.0, 500.0],
            &[100.0, 100.0, 200.0, f64::NAN],
            &[0.0, 10.0, 20.0, 30.0],
        );
        assert_eq!(average_airborne_speed(&samples, 0, 3), None);
    }

    #[test]
    fn landing_needs_a_nonzero_predecessor() {
        let samples = series(
            &[0.0, 100.0, f64::NAN, 0.0, 50.0, 0.0],
            &[0.0; 6],
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        );
        let phase = detect_flight_phase(&samples, PhaseFallback::ClampToDatasetBounds);
        assert_eq!(phase.takeoff_index, Some(1));
        assert_eq!(phase.landing_index, Some(5));
    }
}
