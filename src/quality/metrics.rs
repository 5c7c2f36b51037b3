//! Performance samples and the sources that produce them

use std::collections::VecDeque;

use serde::Serialize;

/// A point-in-time performance reading
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub frame_time_ms: f32,
    pub draw_calls: u32,
    pub triangles: u64,
    pub memory_mb: f32,
}

impl PerformanceSample {
    pub fn from_fps(fps: f32) -> Self {
        Self {
            frame_time_ms: if fps > 0.0 { 1000.0 / fps } else { f32::INFINITY },
            ..Default::default()
        }
    }

    pub fn fps(&self) -> f32 {
        if self.frame_time_ms > 0.0 && self.frame_time_ms.is_finite() {
            1000.0 / self.frame_time_ms
        } else {
            0.0
        }
    }
}

/// Something that can report how the last frame performed.
///
/// Returns `None` until it has anything to report; callers treat that as
/// "no signal", never as a slow frame.
pub trait MetricsSource {
    fn sample(&mut self) -> Option<PerformanceSample>;
}

/// Replays a fixed series of FPS readings, then reports nothing.
#[derive(Clone, Debug, Default)]
pub struct ScriptedMetrics {
    samples: VecDeque<PerformanceSample>,
}

impl ScriptedMetrics {
    pub fn from_fps(series: impl IntoIterator<Item = f32>) -> Self {
        Self {
            samples: series.into_iter().map(PerformanceSample::from_fps).collect(),
        }
    }

    pub fn push(&mut self, sample: PerformanceSample) {
        self.samples.push_back(sample);
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl MetricsSource for ScriptedMetrics {
    fn sample(&mut self) -> Option<PerformanceSample> {
        self.samples.pop_front()
    }
}

/// Rolling window of the most recent samples
#[derive(Clone, Debug)]
pub struct SampleWindow {
    samples: VecDeque<PerformanceSample>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: PerformanceSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&PerformanceSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame-count-weighted average FPS over the window; 0 when empty
    pub fn average_fps(&self) -> f32 {
        let total_ms: f32 = self.samples.iter().map(|s| s.frame_time_ms).sum();
        if self.samples.is_empty() || total_ms <= 0.0 || !total_ms.is_finite() {
            return 0.0;
        }
        self.samples.len() as f32 * 1000.0 / total_ms
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_fps() {
        assert!((PerformanceSample::from_fps(50.0).frame_time_ms - 20.0).abs() < 1e-4);
        assert!((PerformanceSample::from_fps(30.0).fps() - 30.0).abs() < 1e-3);
        assert_eq!(PerformanceSample::default().fps(), 0.0);
        assert_eq!(PerformanceSample::from_fps(0.0).fps(), 0.0);
    }

    #[test]
    fn test_scripted_metrics_runs_dry() {
        let mut metrics = ScriptedMetrics::from_fps([60.0, 30.0]);
        assert_eq!(metrics.remaining(), 2);
        assert!(metrics.sample().is_some());
        assert!((metrics.sample().unwrap().fps() - 30.0).abs() < 1e-3);
        assert!(metrics.sample().is_none());
    }

    #[test]
    fn test_window_is_bounded_and_averages() {
        let mut window = SampleWindow::new(2);
        assert_eq!(window.average_fps(), 0.0);

        window.push(PerformanceSample::from_fps(10.0));
        window.push(PerformanceSample::from_fps(50.0));
        window.push(PerformanceSample::from_fps(50.0));
        assert_eq!(window.len(), 2);
        assert!((window.average_fps() - 50.0).abs() < 1e-3);
        assert!((window.latest().unwrap().fps() - 50.0).abs() < 1e-3);
    }
}
