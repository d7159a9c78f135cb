use std::time::Duration;

/// Picks which decoded frames are sent to recognition.
///
/// Roughly two frames per second are sampled: every `max(1, floor(fps / 2))`-th
/// frame, starting at frame 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSampler {
    fps: f64,
    total_frames: u64,
    interval: u64,
}

impl FrameSampler {
    pub fn new(fps: f64, total_frames: u64) -> Self {
        let interval = ((fps / 2.0).floor() as u64).max(1);
        Self {
            fps,
            total_frames,
            interval,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn should_sample(&self, index: u64) -> bool {
        index < self.total_frames && index % self.interval == 0
    }

    pub fn timestamp(&self, index: u64) -> Duration {
        Duration::from_secs_f64(index as f64 / self.fps)
    }

    /// Length of the video as implied by frame count and rate.
    pub fn duration(&self) -> Duration {
        self.timestamp(self.total_frames)
    }

    pub fn sampled_indices(&self) -> impl Iterator<Item = u64> + use<> {
        (0..self.total_frames).step_by(self.interval as usize)
    }
}

/// Frame-phase progress: `floor(index * 80 / total)`, reported only when it grows.
#[derive(Debug, Clone, Copy)]
pub struct FrameProgress {
    total_frames: u64,
    last: Option<u8>,
}

pub const FRAME_PHASE_PERCENT: u64 = 80;
pub const WRITING_PERCENT: u8 = 85;
pub const DONE_PERCENT: u8 = 100;

impl FrameProgress {
    pub fn new(total_frames: u64) -> Self {
        Self {
            total_frames,
            last: None,
        }
    }

    pub fn update(&mut self, index: u64) -> Option<u8> {
        if self.total_frames == 0 {
            return None;
        }
        let percent = (index.min(self.total_frames) * FRAME_PHASE_PERCENT / self.total_frames) as u8;
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_fps_samples_every_fifteenth_frame() {
        let sampler = FrameSampler::new(30.0, 300);
        assert_eq!(sampler.interval(), 15);
        let indices: Vec<u64> = sampler.sampled_indices().collect();
        assert_eq!(indices.len(), 20);
        assert_eq!(indices[1], 15);
        assert_eq!(sampler.timestamp(15), Duration::from_millis(500));
        assert_eq!(sampler.duration(), Duration::from_secs(10));
    }

    #[test]
    fn low_frame_rates_sample_every_frame() {
        let sampler = FrameSampler::new(1.0, 6);
        assert_eq!(sampler.interval(), 1);
        assert!((0..6).all(|index| sampler.should_sample(index)));
        assert!(!sampler.should_sample(6));
    }

    #[test]
    fn fractional_rates_floor_the_interval() {
        assert_eq!(FrameSampler::new(29.97, 10).interval(), 14);
        assert_eq!(FrameSampler::new(3.9, 10).interval(), 1);
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut progress = FrameProgress::new(300);
        assert_eq!(progress.update(0), Some(0));
        assert_eq!(progress.update(1), None);
        assert_eq!(progress.update(15), Some(4));
        assert_eq!(progress.update(15), None);
        assert_eq!(progress.update(10), None);
        assert_eq!(progress.update(285), Some(76));
        assert_eq!(progress.update(1000), Some(80));
    }
}
