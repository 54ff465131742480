//! Renderer capability and frame sequencing.
//!
//! The core never draws. A [`Renderer`] receives polar-interpolated segment
//! paths with their color and stroke weight, plus the cursor sample, and
//! turns them into pixels however it likes.

use crate::format::CursorReadout;
use crate::geometry::{RosetteGeometry, RosetteLayout, RosettePoint, Segment};
use crate::speed::{Rgb, SpeedEncoder};
use crate::track::TrackState;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentStyle {
    pub color: Rgb,
    pub stroke_weight: f64,
}

impl SegmentStyle {
    pub fn for_segment(segment: &Segment, encoder: &SpeedEncoder) -> Self {
        Self {
            color: encoder.color_for(segment.speed_kt),
            stroke_weight: encoder.stroke_for(segment.speed_kt),
        }
    }
}

pub trait Renderer {
    type Error;

    fn begin(&mut self, layout: &RosetteLayout) -> Result<(), Self::Error>;

    fn draw_segment(
        &mut self,
        segment: &Segment,
        path: &[(f64, f64)],
        style: SegmentStyle,
    ) -> Result<(), Self::Error>;

    fn draw_cursor(&mut self, point: &RosettePoint, readout: &CursorReadout) -> Result<(), Self::Error>;

    fn finish(&mut self) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug)]
pub struct FrameRequest {
    pub layout: RosetteLayout,
    /// Interpolation steps per segment.
    pub steps: usize,
    pub cursor: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub segments_drawn: usize,
    pub cursor_drawn: bool,
}

/// Draw the whole track in one frame.
pub fn draw_rosette<R: Renderer>(
    renderer: &mut R,
    state: &TrackState,
    encoder: &SpeedEncoder,
    request: &FrameRequest,
) -> Result<FrameStats, R::Error> {
    let geometry = RosetteGeometry::build(state, &request.layout);
    let segments = geometry.segments();
    draw_frame(renderer, state, &geometry, &segments, 0..segments.len(), encoder, request)
}

/// Draw only the next `batch` segments not yet handed out since the last
/// reset, for progressive reveal across frames.
pub fn draw_next_batch<R: Renderer>(
    renderer: &mut R,
    state: &mut TrackState,
    encoder: &SpeedEncoder,
    request: &FrameRequest,
    batch: usize,
) -> Result<FrameStats, R::Error> {
    let geometry = RosetteGeometry::build(state, &request.layout);
    let segments = geometry.segments();
    let range = state.advance_render(batch, segments.len());
    draw_frame(renderer, state, &geometry, &segments, range, encoder, request)
}

fn draw_frame<R: Renderer>(
    renderer: &mut R,
    state: &TrackState,
    geometry: &RosetteGeometry,
    segments: &[Segment],
    range: std::ops::Range<usize>,
    encoder: &SpeedEncoder,
    request: &FrameRequest,
) -> Result<FrameStats, R::Error> {
    let mut stats = FrameStats::default();
    renderer.begin(&request.layout)?;

    for segment in &segments[range] {
        let path = request
            .layout
            .sample_segment(&segment.from, &segment.to, request.steps);
        renderer.draw_segment(segment, &path, SegmentStyle::for_segment(segment, encoder))?;
        stats.segments_drawn += 1;
    }

    if let Some(index) = request.cursor {
        if let (Some(point), Some(sample)) =
            (geometry.point_for_sample(index), state.samples().get(index))
        {
            renderer.draw_cursor(point, &CursorReadout::from_sample(index, sample))?;
            stats.cursor_drawn = true;
        }
    }

    renderer.finish()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineOptions;

    #[derive(Default)]
    struct Recorder {
        began: usize,
        finished: usize,
        segments: Vec<(usize, usize, SegmentStyle)>,
        cursor: Option<usize>,
    }

    impl Renderer for Recorder {
        type Error = String;

        fn begin(&mut self, _layout: &RosetteLayout) -> Result<(), String> {
            self.began += 1;
            Ok(())
        }

        fn draw_segment(
            &mut self,
            segment: &Segment,
            path: &[(f64, f64)],
            style: SegmentStyle,
        ) -> Result<(), String> {
            self.segments.push((segment.ordinal, path.len(), style));
            Ok(())
        }

        fn draw_cursor(&mut self, point: &RosettePoint, _readout: &CursorReadout) -> Result<(), String> {
            self.cursor = Some(point.index);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), String> {
            self.finished += 1;
            Ok(())
        }
    }

    fn state() -> TrackState {
        TrackState::from_csv(
            "Position,Altitude,Speed,Timestamp\n\
             \"0,0\",0,20,0\n\
             \"0,1\",1000,250,60\n\
             \"0,2\",2000,480,120\n\
             \"0,3\",0,30,180",
            &PipelineOptions::default(),
        )
    }

    fn request(cursor: Option<usize>) -> FrameRequest {
        FrameRequest {
            layout: RosetteLayout::for_canvas(400.0, 400.0, &PipelineOptions::default()),
            steps: 8,
            cursor,
        }
    }

    #[test]
    fn full_frame_draws_every_segment_and_cursor() {
        let encoder = SpeedEncoder::default();
        let mut recorder = Recorder::default();
        let stats = draw_rosette(&mut recorder, &state(), &encoder, &request(Some(2))).unwrap();
        assert_eq!(stats.segments_drawn, 4);
        assert!(stats.cursor_drawn);
        assert_eq!((recorder.began, recorder.finished), (1, 1));
        assert_eq!(recorder.cursor, Some(2));
        assert!(recorder.segments.iter().all(|(_, len, _)| *len == 9));
        // Segment 1 averages 250 and 480 kt.
        let style = recorder.segments[1].2;
        assert_eq!(style.color, encoder.color_for(365.0));
        assert!((style.stroke_weight - encoder.stroke_for(365.0)).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_cursor_is_ignored() {
        let mut recorder = Recorder::default();
        let stats =
            draw_rosette(&mut recorder, &state(), &SpeedEncoder::default(), &request(Some(99)))
                .unwrap();
        assert!(!stats.cursor_drawn);
        assert_eq!(recorder.cursor, None);
    }

    #[test]
    fn batches_reveal_progressively_until_reset() {
        let mut track = state();
        let encoder = SpeedEncoder::default();
        let mut recorder = Recorder::default();
        let first = draw_next_batch(&mut recorder, &mut track, &encoder, &request(None), 3).unwrap();
        let second = draw_next_batch(&mut recorder, &mut track, &encoder, &request(None), 3).unwrap();
        let third = draw_next_batch(&mut recorder, &mut track, &encoder, &request(None), 3).unwrap();
        assert_eq!(
            (first.segments_drawn, second.segments_drawn, third.segments_drawn),
            (3, 1, 0)
        );
        let ordinals: Vec<usize> = recorder.segments.iter().map(|(o, _, _)| *o).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);

        track.finalize(&PipelineOptions::default());
        let again = draw_next_batch(&mut recorder, &mut track, &encoder, &request(None), 10).unwrap();
        assert_eq!(again.segments_drawn, 4);
    }

    #[test]
    fn empty_track_still_frames() {
        let mut recorder = Recorder::default();
        let stats = draw_rosette(
            &mut recorder,
            &TrackState::new(),
            &SpeedEncoder::default(),
            &request(Some(0)),
        )
        .unwrap();
        assert_eq!(stats, FrameStats::default());
        assert_eq!((recorder.began, recorder.finished), (1, 1));
    }
}
