//! Frame timing utilities

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::quality::metrics::{MetricsSource, PerformanceSample};

/// FPS statistics over the retained history
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FpsWindow {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
}

/// Tracks frame timing plus the renderer counters of the last frame.
///
/// Acts as the [`MetricsSource`] for the quality controller: it yields no
/// sample until at least one frame has been recorded.
pub struct FrameTimer {
    last_frame: Instant,
    frame_count: u64,
    /// Most recent frame times in milliseconds, oldest first
    history: VecDeque<f32>,
    max_history: usize,
    latest: Option<PerformanceSample>,
    draw_calls: u32,
    triangles: u64,
    memory_mb: f32,
}

impl FrameTimer {
    pub fn new(max_history: usize) -> Self {
        Self {
            last_frame: Instant::now(),
            frame_count: 0,
            history: VecDeque::with_capacity(max_history),
            max_history: max_history.max(1),
            latest: None,
            draw_calls: 0,
            triangles: 0,
            memory_mb: 0.0,
        }
    }

    /// Call once per rendered frame to measure wall-clock frame time
    pub fn tick(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.record_frame(delta);
    }

    /// Record a frame of known duration (used by `tick` and by synthetic drivers)
    pub fn record_frame(&mut self, frame_time: Duration) {
        let frame_time_ms = frame_time.as_secs_f32() * 1000.0;
        self.frame_count += 1;

        self.history.push_back(frame_time_ms);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }

        self.latest = Some(PerformanceSample {
            frame_time_ms,
            draw_calls: self.draw_calls,
            triangles: self.triangles,
            memory_mb: self.memory_mb,
        });
    }

    /// Renderer counters reported with the following frames
    pub fn set_render_counters(&mut self, draw_calls: u32, triangles: u64, memory_mb: f32) {
        self.draw_calls = draw_calls;
        self.triangles = triangles;
        self.memory_mb = memory_mb;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// FPS statistics over the retained frame history
    pub fn fps_window(&self) -> FpsWindow {
        if self.history.is_empty() {
            return FpsWindow::default();
        }

        let total_ms: f32 = self.history.iter().sum();
        let mut min_fps = f32::INFINITY;
        let mut max_fps = 0.0f32;
        for &ms in &self.history {
            let fps = if ms > 0.0 { 1000.0 / ms } else { 0.0 };
            min_fps = min_fps.min(fps);
            max_fps = max_fps.max(fps);
        }

        FpsWindow {
            avg: if total_ms > 0.0 { self.history.len() as f32 * 1000.0 / total_ms } else { 0.0 },
            min: min_fps,
            max: max_fps,
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(60)
    }
}

impl MetricsSource for FrameTimer {
    fn sample(&mut self) -> Option<PerformanceSample> {
        self.latest
    }
}
