use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};

use crate::config::PipelineOptions;
use crate::direction::{classify_direction, TrackDirection};
use crate::parse::{parse_csv, ParsedCsv};
use crate::phase::{detect_flight_phase, FlightPhase};

const SENTINEL: f64 = 1e9;

/// One telemetry row. Missing optional fields are NaN.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
    pub speed_kt: f64,
    pub heading_deg: f64,
    pub raw_time: String,
    pub timestamp_ms: f64,
}

impl Sample {
    pub fn has_position(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lat_min: SENTINEL,
            lat_max: -SENTINEL,
            lon_min: SENTINEL,
            lon_max: -SENTINEL,
        }
    }
}

impl Bounds {
    fn observe(&mut self, sample: &Sample) {
        if sample.latitude.is_finite() {
            self.lat_min = self.lat_min.min(sample.latitude);
            self.lat_max = self.lat_max.max(sample.latitude);
        }
        if sample.longitude.is_finite() {
            self.lon_min = self.lon_min.min(sample.longitude);
            self.lon_max = self.lon_max.max(sample.longitude);
        }
    }

    /// False until at least one finite coordinate pair was observed.
    pub fn is_populated(&self) -> bool {
        self.lat_min <= self.lat_max && self.lon_min <= self.lon_max
    }
}

/// Altitude and speed extents used by the radius and stroke maps.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Ranges {
    pub alt_min: f64,
    pub alt_max: f64,
    pub spd_min: f64,
    pub spd_max: f64,
}

impl Default for Ranges {
    fn default() -> Self {
        Self {
            alt_min: SENTINEL,
            alt_max: -SENTINEL,
            spd_min: SENTINEL,
            spd_max: -SENTINEL,
        }
    }
}

impl Ranges {
    fn observe(&mut self, sample: &Sample) {
        if sample.altitude_ft.is_finite() {
            self.alt_min = self.alt_min.min(sample.altitude_ft);
            self.alt_max = self.alt_max.max(sample.altitude_ft);
        }
        if sample.speed_kt.is_finite() {
            self.spd_min = self.spd_min.min(sample.speed_kt);
            self.spd_max = self.spd_max.max(sample.speed_kt);
        }
    }

    fn finalize(&mut self) {
        (self.alt_min, self.alt_max) = widen(self.alt_min, self.alt_max);
        (self.spd_min, self.spd_max) = widen(self.spd_min, self.spd_max);
    }
}

/// Unobserved extents collapse to `0..1`; zero-width extents grow by one.
fn widen(min: f64, max: f64) -> (f64, f64) {
    if min > max {
        (0.0, 1.0)
    } else if min == max {
        (min, min + 1.0)
    } else {
        (min, max)
    }
}

/// Owned state of one dataset, driven through `reset -> ingest* -> finalize`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TrackState {
    samples: Vec<Sample>,
    bounds: Bounds,
    ranges: Ranges,
    callsign: Option<String>,
    phase: FlightPhase,
    direction: TrackDirection,
    #[serde(skip)]
    rendered_segments: usize,
}

impl TrackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `text` and run the full pipeline on a fresh state.
    pub fn from_csv(text: &str, options: &PipelineOptions) -> Self {
        let mut state = Self::new();
        state.load_csv(text, options);
        state
    }

    /// Replace the current dataset with the rows parsed from `text`.
    pub fn load_csv(&mut self, text: &str, options: &PipelineOptions) {
        self.load_parsed(parse_csv(text, options), options);
    }

    pub fn load_parsed(&mut self, parsed: ParsedCsv, options: &PipelineOptions) {
        self.reset();
        self.callsign = parsed.callsign;
        for sample in parsed.samples {
            self.ingest(sample);
        }
        self.finalize(options);
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.bounds = Bounds::default();
        self.ranges = Ranges::default();
        self.callsign = None;
        self.phase = FlightPhase::default();
        self.direction = TrackDirection::Unknown;
        self.rendered_segments = 0;
    }

    pub fn ingest(&mut self, sample: Sample) {
        self.bounds.observe(&sample);
        self.ranges.observe(&sample);
        self.samples.push(sample);
    }

    pub fn finalize(&mut self, options: &PipelineOptions) {
        self.ranges.finalize();
        self.phase = detect_flight_phase(&self.samples, options.phase_fallback);
        self.direction = classify_direction(&self.samples);
        self.rendered_segments = 0;
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn ranges(&self) -> &Ranges {
        &self.ranges
    }

    pub fn callsign(&self) -> Option<&str> {
        self.callsign.as_deref()
    }

    pub fn phase(&self) -> &FlightPhase {
        &self.phase
    }

    pub fn direction(&self) -> TrackDirection {
        self.direction
    }

    /// First and last finite timestamps in row order.
    pub fn time_span_ms(&self) -> Option<(f64, f64)> {
        let first = self.samples.iter().find(|s| s.timestamp_ms.is_finite())?;
        let last = self.samples.iter().rev().find(|s| s.timestamp_ms.is_finite())?;
        Some((first.timestamp_ms, last.timestamp_ms))
    }

    /// Whether the finite timestamps never decrease in row order.
    pub fn timestamps_monotonic(&self) -> bool {
        let mut previous = f64::NEG_INFINITY;
        for ts in self.samples.iter().map(|s| s.timestamp_ms) {
            if !ts.is_finite() {
                continue;
            }
            if ts < previous {
                return false;
            }
            previous = ts;
        }
        true
    }

    pub fn rendered_segments(&self) -> usize {
        self.rendered_segments
    }

    /// Hand out the next `batch` segment indices for progressive drawing,
    /// out of `total` segments in the current geometry.
    pub fn advance_render(&mut self, batch: usize, total: usize) -> std::ops::Range<usize> {
        let start = self.rendered_segments.min(total);
        let end = start.saturating_add(batch).min(total);
        self.rendered_segments = end;
        start..end
    }
}

/// A track shared between one writer and any number of readers.
#[derive(Clone, Debug, Default)]
pub struct SharedTrack {
    inner: Arc<RwLock<TrackState>>,
}

impl SharedTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset, ingest and finalize under a single write lock.
    pub fn replace_from_csv(&self, text: &str, options: &PipelineOptions) -> usize {
        let parsed = parse_csv(text, options);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.load_parsed(parsed, options);
        guard.len()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, TrackState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
