//! Display strings for summaries and the cursor readout. Undefined values
//! render as an em dash placeholder.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::track::Sample;

pub const PLACEHOLDER: &str = "—";

/// `HH:MM:SS`, hours not wrapped at 24.
pub fn format_duration_ms(duration_ms: Option<f64>) -> String {
    match duration_ms {
        Some(ms) if ms.is_finite() && ms >= 0.0 => {
            let total = (ms / 1000.0).round() as u64;
            format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
        }
        _ => PLACEHOLDER.to_string(),
    }
}

/// `YYYY-MM-DD / HH:MM:SS UTC`.
pub fn format_timestamp_ms(timestamp_ms: f64) -> String {
    if !timestamp_ms.is_finite() {
        return PLACEHOLDER.to_string();
    }
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms.round() as i64) {
        Some(dt) => dt.format("%Y-%m-%d / %H:%M:%S UTC").to_string(),
        None => PLACEHOLDER.to_string(),
    }
}

/// `DD.DDDDD° N, DD.DDDDD° E`.
pub fn format_lat_lon(latitude: f64, longitude: f64) -> String {
    if !(latitude.is_finite() && longitude.is_finite()) {
        return PLACEHOLDER.to_string();
    }
    let ns = if latitude >= 0.0 { 'N' } else { 'S' };
    let ew = if longitude >= 0.0 { 'E' } else { 'W' };
    format!(
        "{:.5}° {ns}, {:.5}° {ew}",
        latitude.abs(),
        longitude.abs()
    )
}

fn format_quantity(value: f64, decimals: usize, suffix: &str) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}{suffix}")
    } else {
        PLACEHOLDER.to_string()
    }
}

/// Text fields shown next to the cursor for one sample.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CursorReadout {
    pub index: usize,
    pub time: String,
    pub position: String,
    pub altitude: String,
    pub speed: String,
    pub heading: String,
}

impl CursorReadout {
    pub fn from_sample(index: usize, sample: &Sample) -> Self {
        let time = if sample.timestamp_ms.is_finite() {
            format_timestamp_ms(sample.timestamp_ms)
        } else if !sample.raw_time.is_empty() {
            sample.raw_time.clone()
        } else {
            PLACEHOLDER.to_string()
        };
        Self {
            index,
            time,
            position: format_lat_lon(sample.latitude, sample.longitude),
            altitude: format_quantity(sample.altitude_ft, 0, " ft"),
            speed: format_quantity(sample.speed_kt, 0, " kt"),
            heading: format_quantity(sample.heading_deg, 0, "°"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_zero_padded() {
        assert_eq!(format_duration_ms(Some(0.0)), "00:00:00");
        assert_eq!(format_duration_ms(Some(3_723_000.0)), "01:02:03");
        assert_eq!(format_duration_ms(Some(30.0 * 3_600_000.0)), "30:00:00");
        assert_eq!(format_duration_ms(None), PLACEHOLDER);
        assert_eq!(format_duration_ms(Some(f64::NAN)), PLACEHOLDER);
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(
            format_timestamp_ms(1_700_000_000_000.0),
            "2023-11-14 / 22:13:20 UTC"
        );
        assert_eq!(format_timestamp_ms(f64::NAN), PLACEHOLDER);
    }

    #[test]
    fn coordinates_carry_hemispheres() {
        assert_eq!(format_lat_lon(40.7128, -74.006), "40.71280° N, 74.00600° W");
        assert_eq!(format_lat_lon(-33.9, 151.2), "33.90000° S, 151.20000° E");
        assert_eq!(format_lat_lon(f64::NAN, 1.0), PLACEHOLDER);
    }

    #[test]
    fn readout_uses_placeholders_for_gaps() {
        let sample = Sample {
            latitude: 1.0,
            longitude: 2.0,
            altitude_ft: 35_000.0,
            speed_kt: f64::NAN,
            heading_deg: 271.6,
            raw_time: "late".into(),
            timestamp_ms: f64::NAN,
        };
        let readout = CursorReadout::from_sample(7, &sample);
        assert_eq!(readout.index, 7);
        assert_eq!(readout.time, "late");
        assert_eq!(readout.altitude, "35000 ft");
        assert_eq!(readout.speed, PLACEHOLDER);
        assert_eq!(readout.heading, "272°");
    }
}
