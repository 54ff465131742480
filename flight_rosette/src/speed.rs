//! Speed to color and stroke weight.
//!
//! Bands are fixed and contiguous. Colors are blended across each internal
//! boundary over a smoothing width so adjacent speeds never jump, while the
//! band table itself stays canonical.

use serde::{Deserialize, Serialize};

use crate::config::PipelineOptions;
use crate::RosetteError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Largest per-channel difference.
    pub fn distance(self, other: Rgb) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeedBand {
    pub label: String,
    pub min_kt: f64,
    /// Exclusive upper edge; infinite for the last band.
    pub max_kt: f64,
    pub color: Rgb,
}

impl SpeedBand {
    fn new(label: &str, min_kt: f64, max_kt: f64, color: Rgb) -> Self {
        Self {
            label: label.to_string(),
            min_kt,
            max_kt,
            color,
        }
    }

    fn contains(&self, speed: f64) -> bool {
        self.min_kt <= speed && speed < self.max_kt
    }
}

pub fn default_bands() -> Vec<SpeedBand> {
    vec![
        SpeedBand::new("taxi", 0.0, 50.0, Rgb::new(128, 128, 128)),
        SpeedBand::new("slow", 50.0, 150.0, Rgb::new(46, 134, 222)),
        SpeedBand::new("climb", 150.0, 250.0, Rgb::new(38, 166, 91)),
        SpeedBand::new("transition", 250.0, 350.0, Rgb::new(241, 196, 15)),
        SpeedBand::new("cruise", 350.0, 450.0, Rgb::new(230, 126, 34)),
        SpeedBand::new("fast", 450.0, f64::INFINITY, Rgb::new(192, 57, 43)),
    ]
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeedEncoder {
    bands: Vec<SpeedBand>,
    smoothing_kt: f64,
    stroke_saturation_kt: f64,
    min_weight: f64,
    max_weight: f64,
}

impl SpeedEncoder {
    pub fn new(options: &PipelineOptions) -> Self {
        Self {
            bands: default_bands(),
            smoothing_kt: options.smoothing_window_kt.max(0.0),
            stroke_saturation_kt: options.stroke_saturation_kt,
            min_weight: options.min_stroke_weight,
            max_weight: options.max_stroke_weight,
        }
    }

    /// Use a custom band table. Bands must be non-empty, ascending and
    /// contiguous; the last band must be open-ended.
    pub fn with_bands(
        bands: Vec<SpeedBand>,
        options: &PipelineOptions,
    ) -> Result<Self, RosetteError> {
        let Some(last) = bands.last() else {
            return Err(RosetteError::InvalidParameter("no speed bands given".into()));
        };
        if last.max_kt != f64::INFINITY {
            return Err(RosetteError::InvalidParameter(format!(
                "last speed band '{}' must be open-ended",
                last.label
            )));
        }
        for band in &bands {
            if !band.min_kt.is_finite() || band.max_kt <= band.min_kt {
                return Err(RosetteError::InvalidParameter(format!(
                    "speed band '{}' has an empty interval",
                    band.label
                )));
            }
        }
        for pair in bands.windows(2) {
            if pair[0].max_kt != pair[1].min_kt {
                return Err(RosetteError::InvalidParameter(format!(
                    "speed bands '{}' and '{}' are not contiguous",
                    pair[0].label, pair[1].label
                )));
            }
        }
        Ok(Self {
            bands,
            ..Self::new(options)
        })
    }

    pub fn bands(&self) -> &[SpeedBand] {
        &self.bands
    }

    pub fn band_index(&self, speed: f64) -> Option<usize> {
        if !speed.is_finite() {
            return None;
        }
        if speed < self.bands[0].min_kt {
            return Some(0);
        }
        self.bands.iter().position(|band| band.contains(speed))
    }

    pub fn color_for(&self, speed: f64) -> Rgb {
        let fallback = self.bands[self.bands.len() - 1].color;
        let Some(idx) = self.band_index(speed) else {
            return fallback;
        };
        let band = &self.bands[idx];
        let mut color = band.color;
        if self.smoothing_kt <= 0.0 {
            return color;
        }

        let window = self.smoothing_kt.min(band.max_kt - band.min_kt);
        if idx > 0 {
            let into = speed - band.min_kt;
            if into < window {
                let prev = self.bands[idx - 1].color;
                color = prev.lerp(band.color, 0.5 + 0.5 * into / window);
            }
        }
        if let Some(next) = self.bands.get(idx + 1) {
            let remaining = band.max_kt - speed;
            if remaining < window {
                color = color.lerp(next.color, 0.5 - 0.5 * remaining / window);
            }
        }
        color
    }

    pub fn stroke_for(&self, speed: f64) -> f64 {
        let saturation = self.stroke_saturation_kt;
        if !speed.is_finite() || saturation.is_nan() || saturation <= 0.0 {
            return self.min_weight;
        }
        let clamped = speed.clamp(0.0, saturation);
        self.min_weight
            + (self.max_weight - self.min_weight) * clamped / saturation
    }
}

impl Default for SpeedEncoder {
    fn default() -> Self {
        Self::new(&PipelineOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_centers_keep_their_color() {
        let encoder = SpeedEncoder::default();
        assert_eq!(encoder.color_for(25.0), Rgb::new(128, 128, 128));
        assert_eq!(encoder.color_for(200.0), Rgb::new(38, 166, 91));
        assert_eq!(encoder.color_for(900.0), Rgb::new(192, 57, 43));
    }

    #[test]
    fn boundaries_blend_without_jumps() {
        let encoder = SpeedEncoder::default();
        for band in &encoder.bands()[1..] {
            let below = encoder.color_for(band.min_kt - 0.001);
            let above = encoder.color_for(band.min_kt + 0.001);
            assert!(
                below.distance(above) <= 1,
                "jump at {} kt: {:?} vs {:?}",
                band.min_kt,
                below,
                above
            );
        }
    }

    #[test]
    fn blend_is_halfway_at_the_edge() {
        let encoder = SpeedEncoder::default();
        let taxi = Rgb::new(128, 128, 128);
        let slow = Rgb::new(46, 134, 222);
        assert_eq!(encoder.color_for(50.0), taxi.lerp(slow, 0.5));
        assert_eq!(encoder.color_for(65.0), slow);
        assert_eq!(encoder.color_for(35.0), taxi);
    }

    #[test]
    fn zero_smoothing_gives_hard_bands() {
        let options = PipelineOptions {
            smoothing_window_kt: 0.0,
            ..PipelineOptions::default()
        };
        let encoder = SpeedEncoder::new(&options);
        assert_eq!(encoder.color_for(49.999), Rgb::new(128, 128, 128));
        assert_eq!(encoder.color_for(50.0), Rgb::new(46, 134, 222));
    }

    #[test]
    fn out_of_domain_speeds() {
        let encoder = SpeedEncoder::default();
        let last = Rgb::new(192, 57, 43);
        assert_eq!(encoder.color_for(f64::NAN), last);
        assert_eq!(encoder.color_for(f64::INFINITY), last);
        assert_eq!(encoder.color_for(-10.0), Rgb::new(128, 128, 128));
    }

    #[test]
    fn stroke_is_clamped_linear() {
        let encoder = SpeedEncoder::default();
        assert_eq!(encoder.stroke_for(-5.0), 1.0);
        assert_eq!(encoder.stroke_for(0.0), 1.0);
        assert!((encoder.stroke_for(300.0) - 4.5).abs() < 1e-12);
        assert_eq!(encoder.stroke_for(600.0), 8.0);
        assert_eq!(encoder.stroke_for(2000.0), 8.0);
        assert_eq!(encoder.stroke_for(f64::NAN), 1.0);
    }

    #[test]
    fn unvalidated_saturation_falls_back_to_min_weight() {
        for saturation in [-1.0, 0.0, f64::NAN] {
            let options = PipelineOptions {
                stroke_saturation_kt: saturation,
                ..PipelineOptions::default()
            };
            let encoder = SpeedEncoder::new(&options);
            assert_eq!(encoder.stroke_for(10.0), 1.0);
            assert_eq!(encoder.stroke_for(900.0), 1.0);
        }
    }

    #[test]
    fn custom_bands_are_validated() {
        let options = PipelineOptions::default();
        let gap = vec![
            SpeedBand::new("a", 0.0, 10.0, Rgb::new(0, 0, 0)),
            SpeedBand::new("b", 20.0, f64::INFINITY, Rgb::new(255, 255, 255)),
        ];
        assert!(SpeedEncoder::with_bands(gap, &options).is_err());
        assert!(SpeedEncoder::with_bands(Vec::new(), &options).is_err());

        let narrow = vec![
            SpeedBand::new("a", 0.0, 10.0, Rgb::new(0, 0, 0)),
            SpeedBand::new("b", 10.0, 20.0, Rgb::new(100, 100, 100)),
            SpeedBand::new("c", 20.0, f64::INFINITY, Rgb::new(200, 200, 200)),
        ];
        let encoder = SpeedEncoder::with_bands(narrow, &options).unwrap();
        for edge in [10.0, 20.0] {
            let below = encoder.color_for(edge - 0.001);
            let above = encoder.color_for(edge + 0.001);
            assert!(below.distance(above) <= 1);
        }
    }
}
