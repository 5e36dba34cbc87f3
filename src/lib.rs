//! surface-bind - binds a live module graph to a pad-grid control surface
//!
//! The [`engine::SurfaceEngine`] is driven by a single tick loop: input from
//! the device is queued by the transport callback, drained on each
//! [`engine::SurfaceEngine::poll`], and every tick ends with a diffed LED
//! flush and one display frame.

pub mod binder;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod grid;
pub mod history;
pub mod leds;
pub mod midi;
pub mod mode;
pub mod paths;
pub mod surface;
pub mod transport;
