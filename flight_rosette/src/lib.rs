//! Flight telemetry rosette: CSV ingest, flight phase and direction
//! detection, circular time/altitude layout, speed color encoding and
//! pointer lookup. Drawing is left to a [`render::Renderer`].

use serde::Serialize;
use thiserror::Error;

pub mod config;
pub mod direction;
pub mod format;
pub mod geometry;
pub mod parse;
pub mod phase;
pub mod pointer;
pub mod render;
pub mod speed;
pub mod track;

pub use config::{PhaseFallback, PipelineOptions, TimestampSource};
pub use direction::{classify_direction, TrackDirection};
pub use format::CursorReadout;
pub use geometry::{RosetteGeometry, RosetteLayout, RosettePoint, Segment};
pub use phase::{detect_flight_phase, FlightPhase};
pub use pointer::{resolve_pointer, PointerHit};
pub use render::{draw_rosette, FrameRequest, Renderer, SegmentStyle};
pub use speed::{Rgb, SpeedBand, SpeedEncoder};
pub use track::{Sample, SharedTrack, TrackState};

#[derive(Error, Debug)]
pub enum RosetteError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Per-track headline figures, one row of a batch summary.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FlightSummary {
    pub callsign: Option<String>,
    pub samples: usize,
    pub takeoff: String,
    pub landing: String,
    pub flight_time: String,
    pub total_flight_time_ms: Option<f64>,
    pub average_speed_kt: Option<f64>,
    pub direction: TrackDirection,
    pub timestamps_monotonic: bool,
}

impl FlightSummary {
    pub fn from_track(state: &TrackState) -> Self {
        let phase = state.phase();
        let stamp = |ts: Option<f64>| match ts {
            Some(ms) => format::format_timestamp_ms(ms),
            None => format::PLACEHOLDER.to_string(),
        };
        let total = phase.total_flight_time_ms();
        Self {
            callsign: state.callsign().map(str::to_string),
            samples: state.len(),
            takeoff: stamp(phase.takeoff_timestamp_ms),
            landing: stamp(phase.landing_timestamp_ms),
            flight_time: format::format_duration_ms(total),
            total_flight_time_ms: total,
            average_speed_kt: phase.average_in_flight_speed_kt,
            direction: state.direction(),
            timestamps_monotonic: state.timestamps_monotonic(),
        }
    }
}
