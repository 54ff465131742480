use std::fmt;

use serde::{Deserialize, Serialize};

use crate::track::Sample;

const DEGENERATE_DEG: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrackDirection {
    Eastbound,
    Westbound,
    #[default]
    Unknown,
}

impl fmt::Display for TrackDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackDirection::Eastbound => write!(f, "eastbound"),
            TrackDirection::Westbound => write!(f, "westbound"),
            TrackDirection::Unknown => write!(f, "unknown"),
        }
    }
}

/// Shortest signed longitude delta in degrees, in `[-180, 180)`.
pub fn longitude_delta(lon1: f64, lon2: f64) -> f64 {
    (lon2 - lon1 + 540.0).rem_euclid(360.0) - 180.0
}

pub fn direction_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> TrackDirection {
    let dlon = longitude_delta(lon1, lon2);
    if dlon.abs() < DEGENERATE_DEG {
        // Same meridian: fall back to north/south, identical points stay unknown.
        let dlat = lat2 - lat1;
        if dlat.abs() < DEGENERATE_DEG {
            TrackDirection::Unknown
        } else if dlat > 0.0 {
            TrackDirection::Eastbound
        } else {
            TrackDirection::Westbound
        }
    } else if dlon > 0.0 {
        TrackDirection::Eastbound
    } else {
        TrackDirection::Westbound
    }
}

/// Classify from the first and last samples with a finite position.
pub fn classify_direction(samples: &[Sample]) -> TrackDirection {
    let first = samples.iter().find(|s| s.has_position());
    let last = samples.iter().rev().find(|s| s.has_position());
    match (first, last) {
        (Some(a), Some(b)) => direction_between(a.latitude, a.longitude, b.latitude, b.longitude),
        _ => TrackDirection::Unknown,
    }
}
