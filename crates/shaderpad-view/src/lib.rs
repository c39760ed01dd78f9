//! Texture, vertex-data and shader handling plus the live render view.
//!
//! Everything except [`View`] is CPU-only and can be used without a device.

pub mod shader;
pub mod texture;
pub mod vertex_data;
pub mod view;

pub use shader::{ShaderError, ShaderProgram, ShaderStage, compile_stage};
pub use texture::{MipLevel, Texture, TextureError};
pub use vertex_data::{LayoutError, VertexDataError, VertexDataErrorKind, VertexLayout, parse_vertex_data};
pub use view::{TextureSlot, View, ViewError};

/// Shared console for tests; the filter is pinned so assertions on error lines
/// do not depend on `RUST_LOG`.
#[cfg(test)]
pub(crate) fn test_console() -> shaderpad_engine::logging::LogConsole {
    use shaderpad_engine::logging::{LoggingConfig, init_logging};

    init_logging(LoggingConfig {
        env_filter: Some("info".to_string()),
        ..LoggingConfig::default()
    })
}
