//! shaderpad engine crate.
//!
//! This crate owns the platform + GPU runtime pieces used by the view and the
//! studio binary: window/event loop, wgpu device, per-frame context, input
//! translation, and logging.

pub mod device;
pub mod window;
pub mod input;
pub mod core;

pub mod logging;
pub mod render;
