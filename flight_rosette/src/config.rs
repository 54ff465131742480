use serde::{Deserialize, Serialize};

use crate::RosetteError;

/// Where a sample's timestamp is read from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Numeric `Timestamp` column, Unix epoch seconds.
    EpochSeconds,
    /// Textual `UTC` column, falling back to `Timestamp` when the text is unusable.
    UtcString,
}

impl Default for TimestampSource {
    fn default() -> Self {
        TimestampSource::EpochSeconds
    }
}

/// How the averaging span is closed when no touchdown is found.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseFallback {
    ClampToDatasetBounds,
    None,
}

impl Default for PhaseFallback {
    fn default() -> Self {
        PhaseFallback::ClampToDatasetBounds
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineOptions {
    pub timestamp_source: TimestampSource,
    pub smoothing_window_kt: f64,
    pub phase_fallback: PhaseFallback,
    pub stroke_saturation_kt: f64,
    pub min_stroke_weight: f64,
    pub max_stroke_weight: f64,
    /// Share of the half-canvas used by the ground-level ring.
    pub base_radius_fraction: f64,
    /// Share of the half-canvas added on top of the ring at maximum altitude.
    pub variable_radius_fraction: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timestamp_source: TimestampSource::EpochSeconds,
            smoothing_window_kt: 15.0,
            phase_fallback: PhaseFallback::ClampToDatasetBounds,
            stroke_saturation_kt: 600.0,
            min_stroke_weight: 1.0,
            max_stroke_weight: 8.0,
            base_radius_fraction: 0.35,
            variable_radius_fraction: 0.5,
        }
    }
}

impl PipelineOptions {
    /// Parse options from JSON; missing keys keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, RosetteError> {
        let options: PipelineOptions =
            serde_json::from_str(text).map_err(|e| RosetteError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), RosetteError> {
        if !self.smoothing_window_kt.is_finite() || self.smoothing_window_kt < 0.0 {
            return Err(RosetteError::InvalidParameter(format!(
                "smoothing_window_kt must be a non-negative number, got {}",
                self.smoothing_window_kt
            )));
        }
        if !self.stroke_saturation_kt.is_finite() || self.stroke_saturation_kt <= 0.0 {
            return Err(RosetteError::InvalidParameter(format!(
                "stroke_saturation_kt must be positive, got {}",
                self.stroke_saturation_kt
            )));
        }
        if !(self.min_stroke_weight.is_finite() && self.max_stroke_weight.is_finite())
            || self.min_stroke_weight < 0.0
            || self.min_stroke_weight > self.max_stroke_weight
        {
            return Err(RosetteError::InvalidParameter(format!(
                "stroke weights must satisfy 0 <= min <= max, got {}..{}",
                self.min_stroke_weight, self.max_stroke_weight
            )));
        }
        for (name, value) in [
            ("base_radius_fraction", self.base_radius_fraction),
            ("variable_radius_fraction", self.variable_radius_fraction),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RosetteError::InvalidParameter(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.base_radius_fraction + self.variable_radius_fraction > 1.0 {
            return Err(RosetteError::InvalidParameter(
                "base_radius_fraction + variable_radius_fraction must not exceed 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineOptions::default().validate().is_ok());
    }

    #[test]
    fn json_overrides_only_named_keys() {
        let options = PipelineOptions::from_json_str(
            r#"{ "timestamp_source": "utc_string", "smoothing_window_kt": 20 }"#,
        )
        .unwrap();
        assert_eq!(options.timestamp_source, TimestampSource::UtcString);
        assert_eq!(options.smoothing_window_kt, 20.0);
        assert_eq!(options.phase_fallback, PhaseFallback::ClampToDatasetBounds);
        assert_eq!(options.max_stroke_weight, 8.0);
    }

    #[test]
    fn rejects_inverted_stroke_weights() {
        let options = PipelineOptions {
            min_stroke_weight: 5.0,
            max_stroke_weight: 2.0,
            ..PipelineOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(RosetteError::InvalidParameter(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            PipelineOptions::from_json_str("{ not json"),
            Err(RosetteError::Config(_))
        ));
    }
}
