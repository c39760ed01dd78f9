//! shaderpad: edit `shader.vert`, `shader.frag` and `vertices.txt` in any
//! editor and press F5 to see the result.
//!
//! Keys: F5 / Ctrl+R reload and compile, Ctrl+O open a texture, Ctrl+S save,
//! Escape quit. Images dropped on the window are loaded as textures.

mod app;
mod config;
mod store;

use anyhow::Result;
use winit::dpi::LogicalSize;

use shaderpad_engine::device::GpuInit;
use shaderpad_engine::logging::{LoggingConfig, init_logging};
use shaderpad_engine::window::{Runtime, RuntimeConfig};

use crate::app::StudioApp;
use crate::config::StudioConfig;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    init_logging(LoggingConfig::from_args(&args));
    let config = StudioConfig::from_args(&args);

    let runtime = RuntimeConfig {
        title: config.title.clone(),
        initial_size: LogicalSize::new(config.width, config.height),
    };
    // Fragment output goes to the screen unconverted.
    let gpu = GpuInit {
        prefer_srgb: false,
        ..GpuInit::default()
    };

    let app = StudioApp::new(config)?;
    Runtime::run(runtime, gpu, app)
}
