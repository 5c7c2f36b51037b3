//! Core types, configuration and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod config;
pub mod camera;
pub mod time;

pub use types::*;
pub use error::Error;
pub use config::{ResourceConfig, StreamingConfig, QualityConfig, ViewerConfig};
pub use camera::Camera;
pub use time::FrameTimer;
