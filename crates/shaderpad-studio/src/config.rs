use std::path::PathBuf;

/// Studio window and workspace settings.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub title: String,
    /// Initial logical window width.
    pub width: f64,
    /// Initial logical window height.
    pub height: f64,
    /// Directory holding the shader and vertex-data files.
    pub base_dir: PathBuf,
    /// Linear RGBA, applied before every draw.
    pub clear_color: [f64; 4],
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            title: "shaderpad".to_string(),
            width: 1280.0,
            height: 720.0,
            base_dir: PathBuf::from("."),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl StudioConfig {
    /// Reads `--dir <path>` / `--dir=<path>`; everything else keeps its default.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            if let Some(dir) = arg.strip_prefix("--dir=") {
                config = config.with_base_dir(dir);
            } else if arg == "--dir" {
                if let Some(dir) = args.next() {
                    config = config.with_base_dir(dir.as_ref());
                }
            }
        }
        config
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }
}
