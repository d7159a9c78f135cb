use std::time::Duration;

use subtitle_ocr_types::Segment;

/// Recognised text this short (after trimming) is treated as noise.
const MIN_TEXT_CHARS: usize = 3;

/// Folds a stream of `(timestamp, text)` observations into timed segments.
///
/// Each `push` consumes the builder and returns the next state, so the
/// accumulator can be threaded through `Iterator::fold` or an async loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentBuilder {
    last_text: Option<String>,
    current_start: Option<Duration>,
    segments: Vec<Segment>,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, timestamp: Duration, text: &str) -> Self {
        let text = text.trim();
        if text.chars().count() < MIN_TEXT_CHARS {
            return self;
        }
        if self.last_text.as_deref() == Some(text) {
            return self;
        }
        self.close_at(timestamp);
        self.last_text = Some(text.to_string());
        self.current_start = Some(timestamp);
        self
    }

    /// Closes the open segment at `duration` and returns every segment.
    pub fn finish(mut self, duration: Duration) -> Vec<Segment> {
        self.close_at(duration);
        self.segments
    }

    pub fn open_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    fn close_at(&mut self, end: Duration) {
        let (Some(text), Some(start)) = (self.last_text.take(), self.current_start.take()) else {
            return;
        };
        if end > start {
            self.segments.push(Segment::new(start, end, text));
        }
    }
}

pub fn fold_segments<'a, I>(observations: I, duration: Duration) -> Vec<Segment>
where
    I: IntoIterator<Item = (Duration, &'a str)>,
{
    observations
        .into_iter()
        .fold(SegmentBuilder::new(), |builder, (timestamp, text)| {
            builder.push(timestamp, text)
        })
        .finish(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::FrameSampler;

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    fn assert_well_formed(segments: &[Segment]) {
        for segment in segments {
            assert!(segment.start < segment.end, "{segment:?}");
            assert_eq!(segment.text, segment.text.trim());
            assert!(!segment.text.is_empty());
        }
        for pair in segments.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{pair:?}");
        }
    }

    #[test]
    fn constant_text_spans_the_whole_video() {
        let sampler = FrameSampler::new(30.0, 300);
        let observations: Vec<(Duration, &str)> = sampler
            .sampled_indices()
            .map(|index| (sampler.timestamp(index), "HELLO WORLD"))
            .collect();

        let segments = fold_segments(observations, sampler.duration());

        assert_eq!(
            segments,
            vec![Segment::new(Duration::ZERO, secs(10.0), "HELLO WORLD")]
        );
    }

    #[test]
    fn changed_text_closes_at_the_change() {
        let sampler = FrameSampler::new(30.0, 300);
        let observations: Vec<(Duration, &str)> = sampler
            .sampled_indices()
            .map(|index| {
                let text = if index < 150 { "FIRST LINE" } else { "SECOND LINE" };
                (sampler.timestamp(index), text)
            })
            .collect();

        let segments = fold_segments(observations, sampler.duration());

        assert_eq!(
            segments,
            vec![
                Segment::new(Duration::ZERO, secs(5.0), "FIRST LINE"),
                Segment::new(secs(5.0), secs(10.0), "SECOND LINE"),
            ]
        );
    }

    #[test]
    fn short_and_empty_text_is_noise() {
        let texts = ["", "a", "HELLO", "x", "HELLO", ""];
        let observations = texts
            .iter()
            .enumerate()
            .map(|(second, text)| (secs(second as f64), *text));

        let segments = fold_segments(observations, secs(6.0));

        assert_eq!(segments, vec![Segment::new(secs(2.0), secs(6.0), "HELLO")]);
    }

    #[test]
    fn whitespace_is_trimmed_before_comparison() {
        let segments = fold_segments(
            [(secs(0.0), "  Hi there "), (secs(1.0), "Hi there")],
            secs(2.0),
        );
        assert_eq!(segments, vec![Segment::new(secs(0.0), secs(2.0), "Hi there")]);
    }

    #[test]
    fn no_text_yields_no_segments() {
        assert!(fold_segments(Vec::<(Duration, &str)>::new(), secs(3.0)).is_empty());
        assert!(fold_segments([(secs(0.0), "  "), (secs(1.0), "ab")], secs(3.0)).is_empty());
    }

    #[test]
    fn open_segment_is_dropped_when_duration_does_not_exceed_start() {
        let builder = SegmentBuilder::new().push(secs(4.0), "LATE TEXT");
        assert_eq!(builder.open_text(), Some("LATE TEXT"));
        assert!(builder.clone().finish(secs(4.0)).is_empty());
        assert!(builder.finish(secs(2.0)).is_empty());
    }

    #[test]
    fn alternating_text_stays_ordered() {
        let texts = ["ONE", "TWO", "TWO", "ONE", "THREE", "", "THREE", "ONE"];
        let observations = texts
            .iter()
            .enumerate()
            .map(|(step, text)| (secs(step as f64 * 0.5), *text));

        let segments = fold_segments(observations, secs(4.0));

        assert_well_formed(&segments);
        let texts: Vec<&str> = segments.iter().map(|segment| segment.text.as_str()).collect();
        assert_eq!(texts, ["ONE", "TWO", "ONE", "THREE", "ONE"]);
        assert_eq!(segments.last().map(|segment| segment.end), Some(secs(4.0)));
    }

    #[test]
    fn folding_is_deterministic() {
        let observations = [
            (secs(0.0), "Alpha"),
            (secs(0.5), "Alpha"),
            (secs(1.0), "Beta"),
            (secs(1.5), "z"),
            (secs(2.0), "Gamma"),
        ];
        let first = fold_segments(observations, secs(3.0));
        let second = fold_segments(observations, secs(3.0));
        assert_eq!(first, second);
        assert_well_formed(&first);
    }
}
