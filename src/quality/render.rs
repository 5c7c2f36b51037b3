//! The renderer knobs the quality controller turns

use serde::Serialize;

/// Global rendering settings the quality axis may change.
pub trait RenderTarget {
    fn pixel_ratio(&self) -> f32;

    fn set_pixel_ratio(&mut self, ratio: f32);

    /// Highest pixel ratio the display supports
    fn device_pixel_ratio(&self) -> f32;

    fn shadows_enabled(&self) -> bool;

    fn set_shadows_enabled(&mut self, enabled: bool);
}

/// Plain-data render target
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderSettings {
    pub pixel_ratio: f32,
    pub device_pixel_ratio: f32,
    pub shadows: bool,
}

impl RenderSettings {
    pub fn new(device_pixel_ratio: f32) -> Self {
        let device_pixel_ratio = device_pixel_ratio.max(1.0);
        Self {
            pixel_ratio: device_pixel_ratio,
            device_pixel_ratio,
            shadows: true,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RenderTarget for RenderSettings {
    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    fn shadows_enabled(&self) -> bool {
        self.shadows
    }

    fn set_shadows_enabled(&mut self, enabled: bool) {
        self.shadows = enabled;
    }
}
