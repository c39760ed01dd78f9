//! Window-bound wgpu device and swapchain.

mod gpu;

pub use gpu::{log_uncaptured_errors, Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
