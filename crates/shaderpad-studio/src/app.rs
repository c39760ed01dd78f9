use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use winit::event::WindowEvent;
use winit::window::WindowId;

use shaderpad_engine::core::{App, AppControl, FrameCtx};
use shaderpad_engine::input::{InputFrame, Key};
use shaderpad_engine::logging::{NamedLogger, logger};
use shaderpad_view::{Texture, View, parse_vertex_data};

use crate::config::StudioConfig;
use crate::store::{SourceFiles, Sources};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Something the user asked for this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Re-read the source files and compile them.
    Reload,
    /// Pick an image with the file dialog.
    OpenTexture,
    LoadTexture(PathBuf),
    Save,
    Quit,
}

/// Maps this frame's key presses and dropped files to actions, in a fixed order.
pub fn actions_for(frame: &InputFrame) -> Vec<Action> {
    let mut actions = Vec::new();

    if frame.pressed(Key::Escape) {
        actions.push(Action::Quit);
        return actions;
    }
    if frame.pressed_with_command(Key::S) {
        actions.push(Action::Save);
    }
    if frame.pressed(Key::F5) || frame.pressed_with_command(Key::R) {
        actions.push(Action::Reload);
    }
    if frame.pressed_with_command(Key::O) {
        actions.push(Action::OpenTexture);
    }
    actions.extend(frame.dropped_files.iter().cloned().map(Action::LoadTexture));

    actions
}

/// Shader playground: the view plus the files it is fed from.
pub struct StudioApp {
    config: StudioConfig,
    files: SourceFiles,
    sources: Sources,
    /// File contents as of the last load or save.
    on_disk: Sources,
    view: View,
    log: NamedLogger,
    /// Shown in the title until the next successful action.
    last_error: Option<String>,
    title_dirty: bool,
}

impl StudioApp {
    pub fn new(config: StudioConfig) -> Result<Self> {
        let files = SourceFiles::new(&config.base_dir);
        let sources = files
            .load_or_init(&Sources::builtin())
            .context("failed to prepare shader sources")?;

        let app = Self {
            config,
            files,
            on_disk: sources.clone(),
            sources,
            view: View::new(),
            log: logger("studio"),
            last_error: None,
            title_dirty: true,
        };
        log::info!(target: app.log.name(), "editing sources in {}", app.files.dir().display());
        Ok(app)
    }

    /// Recompiles the shaders, then replaces the vertex data.
    fn compile(&mut self) -> Result<()> {
        self.view
            .recompile_shaders(&self.sources.vertex, &self.sources.fragment)?;

        let layout = parse_vertex_data(&self.sources.vertices)
            .with_context(|| format!("in {}", self.files.vertices_path().display()))?;
        self.view.set_vertex_data(layout)?;
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.sources = self.files.load()?;
        self.on_disk = self.sources.clone();
        if self.log.enabled(log::Level::Debug) {
            log::debug!(
                target: self.log.name(),
                "loaded {} / {} / {} lines",
                self.sources.vertex.lines().count(),
                self.sources.fragment.lines().count(),
                self.sources.vertices.lines().count()
            );
        }
        self.compile()
    }

    fn save(&mut self) -> Result<()> {
        let written = self.files.save(&self.sources, &self.on_disk)?;
        self.on_disk = self.sources.clone();
        log::info!(target: self.log.name(), "saved sources ({written} file(s) changed)");
        Ok(())
    }

    fn load_texture(&mut self, path: &Path) -> Result<()> {
        let texture = Texture::open(path)?;
        self.view.add_texture(texture)?;
        Ok(())
    }

    fn pick_texture(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Open texture")
            .add_filter("Images", &IMAGE_EXTENSIONS)
            .set_directory(self.files.dir())
            .pick_file()
    }

    fn run(&mut self, action: Action) -> AppControl {
        let result = match &action {
            Action::Quit => return AppControl::Exit,
            Action::Reload => self.reload(),
            Action::Save => self.save(),
            Action::OpenTexture => match self.pick_texture() {
                Some(path) => self.load_texture(&path),
                None => Ok(()),
            },
            Action::LoadTexture(path) => self.load_texture(path),
        };
        self.report(&action, result);
        AppControl::Continue
    }

    /// Errors end the action only; they are logged and shown in the title.
    fn report(&mut self, action: &Action, result: Result<()>) {
        match result {
            Ok(()) => {
                if self.last_error.take().is_some() {
                    self.title_dirty = true;
                }
            }
            Err(err) => {
                log::error!(target: self.log.name(), "{action:?} failed: {err:#}");
                self.last_error = Some(format!("{err:#}"));
                self.title_dirty = true;
            }
        }
    }

    fn title(&self) -> String {
        match &self.last_error {
            Some(err) => {
                let first_line = err.lines().next().unwrap_or_default();
                format!("{} - error: {first_line}", self.config.title)
            }
            None => self.config.title.clone(),
        }
    }
}

impl App for StudioApp {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        if let WindowEvent::HoveredFile(path) = event {
            log::debug!(target: "studio", "file hovered: {}", path.display());
        }
        AppControl::Continue
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.view.resize(width, height);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if !self.view.is_initialized() {
            self.view.initialize(&ctx.render_ctx());
            self.view.set_clear_color(self.config.clear_color());
            let result = self.compile();
            self.report(&Action::Reload, result);
        }

        for action in actions_for(ctx.input_frame) {
            if self.run(action) == AppControl::Exit {
                return AppControl::Exit;
            }
        }

        if self.title_dirty {
            ctx.window.set_title(&self.title());
            self.title_dirty = false;
        }

        if self.view.take_redraw() {
            ctx.runtime.request_redraw();
        }

        let view = &mut self.view;
        ctx.render(|rctx, target| view.paint(rctx, target))
    }
}
