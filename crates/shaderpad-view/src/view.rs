use std::borrow::Cow;

use shaderpad_engine::render::{RenderCtx, RenderTarget};
use wgpu::util::DeviceExt;

use crate::shader::{SAMPLER_BINDING, ShaderError, ShaderProgram, TEXTURE_BINDING};
use crate::texture::Texture;
use crate::vertex_data::{LayoutError, VertexLayout};

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Errors returned by [`View`] operations.
///
/// Each one is logged at error level before it is returned (GLSL diagnostics
/// on the `shader` target, everything else on `view`). The view is left as it
/// was before the call.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("no graphics context: the view has not been initialized")]
    NoContext,

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("texture '{0}' has no pixels")]
    EmptyTexture(String),

    #[error("texture '{name}' is {width}x{height}, the device supports at most {max}x{max}")]
    TextureTooLarge {
        name: String,
        width: u32,
        height: u32,
        max: u32,
    },
}

/// An uploaded texture.
///
/// Only the first slot is bound when drawing.
#[derive(Debug)]
pub struct TextureSlot {
    name: String,
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl TextureSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mip_level_count(&self) -> u32 {
        self.texture.mip_level_count()
    }
}

/// Device-owned state created by [`View::initialize`].
struct Gpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    /// 1x1 white, bound while no texture has been added.
    fallback: TextureSlot,
}

struct Geometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Live render view: one program, one interleaved mesh, a list of textures.
///
/// The host drives it with [`initialize`](Self::initialize) once a device
/// exists, [`resize`](Self::resize) on size changes and
/// [`paint`](Self::paint) every frame. Mutating operations set a redraw flag
/// the host polls with [`take_redraw`](Self::take_redraw) to schedule a frame.
pub struct View {
    gpu: Option<Gpu>,

    program: Option<ShaderProgram>,
    /// Present only while `program` accepts `layout`.
    pipeline: Option<wgpu::RenderPipeline>,

    layout: VertexLayout,
    geometry: Option<Geometry>,

    textures: Vec<TextureSlot>,

    viewport: (u32, u32),
    clear_color: wgpu::Color,
    redraw: bool,
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl View {
    pub fn new() -> Self {
        Self {
            gpu: None,
            program: None,
            pipeline: None,
            layout: VertexLayout::default_rectangle(),
            geometry: None,
            textures: Vec::new(),
            viewport: (0, 0),
            clear_color: wgpu::Color::BLACK,
            redraw: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    /// Allocates GPU objects and uploads the default rectangle.
    ///
    /// Later calls are ignored.
    pub fn initialize(&mut self, ctx: &RenderCtx<'_>) {
        if self.gpu.is_some() {
            return;
        }

        let device = ctx.device.clone();
        let queue = ctx.queue.clone();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shaderpad texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shaderpad pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shaderpad sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let mut white = Texture::from_image(&image::DynamicImage::ImageRgba8(
            image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
        ));
        white.set_name("fallback");
        let fallback = upload_texture(&device, &queue, &bind_group_layout, &sampler, &white);

        self.gpu = Some(Gpu {
            device,
            queue,
            format: ctx.surface_format,
            bind_group_layout,
            pipeline_layout,
            sampler,
            fallback,
        });
        self.viewport = ctx.viewport;

        self.upload_geometry();
        self.rebuild_pipeline();
        self.redraw = true;

        log::info!(
            target: "view",
            "view initialized: {:?}, {}x{}",
            ctx.surface_format,
            ctx.viewport.0,
            ctx.viewport.1
        );
    }

    /// Stores the drawable size in physical pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.redraw = true;
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
        self.redraw = true;
    }

    /// Clears the target and draws the mesh with the current program and the
    /// first texture.
    pub fn paint(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        let Some(gpu) = self.gpu.as_mut() else {
            log::warn!(target: "view", "paint called before initialize");
            return;
        };
        if gpu.format != ctx.surface_format {
            log::debug!(target: "view", "surface format changed to {:?}", ctx.surface_format);
            gpu.format = ctx.surface_format;
            self.rebuild_pipeline();
        }

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shaderpad view pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let (Some(gpu), Some(pipeline), Some(geometry)) =
            (self.gpu.as_ref(), self.pipeline.as_ref(), self.geometry.as_ref())
        else {
            return;
        };

        // The viewport may lag one resize behind the surface.
        let width = self.viewport.0.min(ctx.viewport.0);
        let height = self.viewport.1.min(ctx.viewport.1);
        if width == 0 || height == 0 {
            return;
        }

        let slot = self.textures.first().unwrap_or(&gpu.fallback);

        rpass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &slot.bind_group, &[]);
        rpass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
        rpass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..geometry.index_count, 0, 0..1);
    }

    /// Compiles and links a new program.
    ///
    /// A program the device rejects counts as a link failure. On any failure
    /// the previous program and pipeline stay in use.
    pub fn recompile_shaders(&mut self, vertex_src: &str, fragment_src: &str) -> Result<(), ViewError> {
        let Some(gpu) = self.gpu.as_ref() else {
            return fail(ViewError::NoContext);
        };

        let program = ShaderProgram::link(vertex_src, fragment_src)?;
        let pipeline = match program.check_vertex_layout(&self.layout) {
            Ok(()) => Some(create_pipeline(gpu, &program, &self.layout).or_else(|e| fail(e.into()))?),
            Err(err) => {
                log::warn!(target: "view", "nothing drawn until vertex data matches the program: {err}");
                None
            }
        };

        self.program = Some(program);
        self.pipeline = pipeline;
        self.redraw = true;
        log::info!(target: "view", "shaders compiled");
        Ok(())
    }

    /// Uploads `texture` with a full mip chain and appends it to the slot list.
    pub fn add_texture(&mut self, texture: Texture) -> Result<(), ViewError> {
        let Some(gpu) = self.gpu.as_ref() else {
            return fail(ViewError::NoContext);
        };

        if texture.is_empty() {
            return fail(ViewError::EmptyTexture(texture.name().to_string()));
        }
        let max = gpu.device.limits().max_texture_dimension_2d;
        if texture.width() > max || texture.height() > max {
            return fail(ViewError::TextureTooLarge {
                name: texture.name().to_string(),
                width: texture.width(),
                height: texture.height(),
                max,
            });
        }

        let slot = upload_texture(&gpu.device, &gpu.queue, &gpu.bind_group_layout, &gpu.sampler, &texture);
        log::info!(
            target: "view",
            "texture '{}' uploaded ({}x{}, {} mip levels, slot {})",
            slot.name,
            slot.width,
            slot.height,
            slot.mip_level_count(),
            self.textures.len()
        );

        self.textures.push(slot);
        self.redraw = true;
        Ok(())
    }

    /// Replaces the mesh and its attribute layout.
    pub fn set_vertex_data(&mut self, layout: VertexLayout) -> Result<(), ViewError> {
        if self.gpu.is_none() {
            return fail(ViewError::NoContext);
        }

        log::debug!(
            target: "view",
            "vertex data: {} vertices, attributes {:?}, offsets {:?}, stride {}, {} indices",
            layout.vertex_count(),
            layout.attribute_sizes(),
            layout.offsets(),
            layout.stride(),
            layout.index_count()
        );

        self.layout = layout;
        self.upload_geometry();
        self.rebuild_pipeline();
        self.redraw = true;
        Ok(())
    }

    /// Validates the raw parts and replaces the mesh.
    ///
    /// A stride mismatch leaves the current buffers untouched.
    pub fn set_vertex_data_raw(
        &mut self,
        vertices: Vec<f32>,
        attribute_sizes: Vec<u32>,
        indices: Vec<u32>,
    ) -> Result<(), ViewError> {
        if self.gpu.is_none() {
            return fail(ViewError::NoContext);
        }
        let layout = VertexLayout::new(vertices, attribute_sizes, indices).or_else(|e| fail(e.into()))?;
        self.set_vertex_data(layout)
    }

    pub fn textures(&self) -> &[TextureSlot] {
        &self.textures
    }

    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    /// Whether the current program, layout and surface produce a pipeline.
    pub fn is_drawable(&self) -> bool {
        self.pipeline.is_some() && self.geometry.is_some()
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    /// Returns and clears the redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    fn upload_geometry(&mut self) {
        let Some(gpu) = self.gpu.as_ref() else { return };

        if let Some(old) = self.geometry.take() {
            old.vertex_buffer.destroy();
            old.index_buffer.destroy();
        }

        if self.layout.vertices().is_empty() || self.layout.indices().is_empty() {
            log::debug!(target: "view", "empty mesh; nothing will be drawn");
            return;
        }

        let vertex_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("shaderpad vbo"),
            contents: bytemuck::cast_slice(self.layout.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("shaderpad ebo"),
            contents: bytemuck::cast_slice(self.layout.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.geometry = Some(Geometry {
            vertex_buffer,
            index_buffer,
            index_count: self.layout.index_count(),
        });
    }

    fn rebuild_pipeline(&mut self) {
        self.pipeline = None;
        let (Some(gpu), Some(program)) = (self.gpu.as_ref(), self.program.as_ref()) else {
            return;
        };

        if let Err(err) = program.check_vertex_layout(&self.layout) {
            log::warn!(target: "view", "nothing drawn until vertex data matches the program: {err}");
            return;
        }

        match create_pipeline(gpu, program, &self.layout) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(err) => log::error!(target: "view", "pipeline rejected: {err}"),
        }
    }
}

impl Drop for View {
    fn drop(&mut self) {
        if let Some(geometry) = self.geometry.take() {
            geometry.vertex_buffer.destroy();
            geometry.index_buffer.destroy();
        }
        for slot in self.textures.drain(..) {
            slot.texture.destroy();
        }
        if let Some(gpu) = self.gpu.take() {
            gpu.fallback.texture.destroy();
        }
    }
}

fn fail<T>(err: ViewError) -> Result<T, ViewError> {
    log::error!(target: "view", "{err}");
    Err(err)
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    texture: &Texture,
) -> TextureSlot {
    let levels = texture.mip_chain();

    let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(texture.name()),
        size: wgpu::Extent3d {
            width: texture.width(),
            height: texture.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: levels.len() as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip_level, level) in levels.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: mip_level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &level.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * level.width),
                rows_per_image: Some(level.height),
            },
            wgpu::Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("shaderpad texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    TextureSlot {
        name: texture.name().to_string(),
        width: texture.width(),
        height: texture.height(),
        texture: gpu_texture,
        bind_group,
    }
}

/// Builds the pipeline inside a validation error scope so a rejection comes
/// back as a link error instead of reaching the uncaptured-error handler.
fn create_pipeline(
    gpu: &Gpu,
    program: &ShaderProgram,
    layout: &VertexLayout,
) -> Result<wgpu::RenderPipeline, ShaderError> {
    let scope = gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shaderpad vertex shader"),
        source: wgpu::ShaderSource::Naga(Cow::Owned(program.vertex_module().clone())),
    });
    let fragment = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shaderpad fragment shader"),
        source: wgpu::ShaderSource::Naga(Cow::Owned(program.fragment_module().clone())),
    });

    let attributes = layout.vertex_attributes();
    let buffers = [wgpu::VertexBufferLayout {
        array_stride: layout.stride_bytes(),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];

    let pipeline = gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shaderpad pipeline"),
        layout: Some(&gpu.pipeline_layout),

        vertex: wgpu::VertexState {
            module: &vertex,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &fragment,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: gpu.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    match pollster::block_on(scope.pop()) {
        Some(err) => Err(ShaderError::Link { log: err.to_string() }),
        None => Ok(pipeline),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::test_console;

    const VERTEX: &str = r#"#version 450
layout(location = 0) in vec3 a_pos;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_pos.xy * 0.5 + 0.5;
    gl_Position = vec4(a_pos, 1.0);
}
"#;

    const FRAGMENT: &str = r#"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 frag_color;
layout(set = 0, binding = 0) uniform texture2D u_texture;
layout(set = 0, binding = 1) uniform sampler u_sampler;

void main() {
    frag_color = texture(sampler2D(u_texture, u_sampler), v_uv);
}
"#;

    struct Headless {
        device: wgpu::Device,
        queue: wgpu::Queue,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl Headless {
        /// Device on wgpu's noop backend: nothing executes, but every call is
        /// validated as on real hardware.
        fn new() -> Self {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::NOOP,
                backend_options: wgpu::BackendOptions {
                    noop: wgpu::NoopBackendOptions { enable: true },
                    ..Default::default()
                },
                ..Default::default()
            });
            let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .expect("noop adapter");
            let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
                .expect("noop device");

            let errors = Arc::new(Mutex::new(Vec::new()));
            let sink = errors.clone();
            device.on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
                sink.lock().unwrap().push(err.to_string());
            }));

            Self { device, queue, errors }
        }

        fn ctx(&self) -> RenderCtx<'_> {
            RenderCtx::new(&self.device, &self.queue, TEXTURE_FORMAT, (64, 64))
        }

        fn paint(&self, view: &mut View) {
            let target = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("test target"),
                size: wgpu::Extent3d {
                    width: 64,
                    height: 64,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let color_view = target.create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            {
                let mut rt = RenderTarget::new(&mut encoder, &color_view);
                view.paint(&self.ctx(), &mut rt);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        }

        fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }
    }

    fn checker(name: &str, w: u32, h: u32) -> Texture {
        let img = image::RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        let mut tex = Texture::from_image(&image::DynamicImage::ImageRgba8(img));
        tex.set_name(name);
        tex
    }

    #[test]
    fn operations_without_context_fail() {
        let console = test_console();
        let mut view = View::new();

        assert!(matches!(view.recompile_shaders(VERTEX, FRAGMENT), Err(ViewError::NoContext)));
        assert!(matches!(view.add_texture(checker("a", 2, 2)), Err(ViewError::NoContext)));
        assert!(matches!(
            view.set_vertex_data(VertexLayout::default_rectangle()),
            Err(ViewError::NoContext)
        ));
        assert!(!view.has_program());
        assert!(view.textures().is_empty());
        assert!(!view.needs_redraw());

        assert!(
            console
                .lines_for("view")
                .iter()
                .any(|l| l.level == log::Level::Error && l.message.starts_with("no graphics context"))
        );
    }

    #[test]
    fn initialize_uploads_default_rectangle() {
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());

        assert!(view.is_initialized());
        assert_eq!(view.vertex_layout(), &VertexLayout::default_rectangle());
        assert!(view.take_redraw());
        assert!(!view.needs_redraw());

        view.recompile_shaders(VERTEX, FRAGMENT).unwrap();
        assert!(view.is_drawable());
        gpu.paint(&mut view);
        assert_eq!(gpu.errors(), Vec::<String>::new());
    }

    #[test]
    fn broken_shader_keeps_previous_program_and_logs() {
        let console = test_console();
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());
        view.recompile_shaders(VERTEX, FRAGMENT).unwrap();

        let broken = VERTEX.replace("gl_Position = vec4(a_pos, 1.0);", "gl_Position = vec4(a_pos, 1.0)");
        let err = view.recompile_shaders(&broken, FRAGMENT).unwrap_err();
        assert!(matches!(err, ViewError::Shader(ShaderError::Compile { .. })));

        assert!(view.has_program());
        assert!(view.is_drawable());
        gpu.paint(&mut view);

        assert!(
            console
                .lines_for("shader")
                .iter()
                .any(|l| l.level == log::Level::Error && l.message.starts_with("vertex shader compilation failed"))
        );
    }

    #[test]
    fn device_rejected_program_keeps_previous_pipeline() {
        let console = test_console();
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());
        view.recompile_shaders(VERTEX, FRAGMENT).unwrap();
        view.take_redraw();

        // Links on the CPU side, but the device refuses a flat output feeding a
        // smoothly interpolated input.
        let flat = VERTEX.replace("layout(location = 0) out vec2 v_uv;", "layout(location = 0) flat out vec2 v_uv;");
        ShaderProgram::link(&flat, FRAGMENT).unwrap();

        let err = view.recompile_shaders(&flat, FRAGMENT).unwrap_err();
        match &err {
            ViewError::Shader(ShaderError::Link { log }) => assert!(!log.is_empty()),
            other => panic!("expected a link error, got {other:?}"),
        }

        assert!(view.has_program());
        assert!(view.is_drawable());
        assert!(!view.needs_redraw());
        gpu.paint(&mut view);
        assert_eq!(gpu.errors(), Vec::<String>::new());

        let message = err.to_string();
        assert!(
            console
                .lines_for("view")
                .iter()
                .any(|l| l.level == log::Level::Error && l.message == message)
        );
    }

    #[test]
    fn uncaptured_errors_are_logged_on_the_gpu_target() {
        let console = test_console();
        let gpu = Headless::new();
        shaderpad_engine::device::log_uncaptured_errors(&gpu.device);

        let _buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("usage-less buffer"),
            size: 4,
            usage: wgpu::BufferUsages::empty(),
            mapped_at_creation: false,
        });

        assert!(
            console
                .lines_for("gpu")
                .iter()
                .any(|l| l.level == log::Level::Error && l.message.contains("usage-less buffer"))
        );
    }

    #[test]
    fn stride_mismatch_leaves_buffers_unchanged() {
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());

        let err = view
            .set_vertex_data_raw(vec![0.0; 7], vec![3, 3, 2], vec![0, 1, 2])
            .unwrap_err();
        assert!(matches!(err, ViewError::Layout(LayoutError::StrideMismatch { .. })));
        assert_eq!(view.vertex_layout(), &VertexLayout::default_rectangle());

        view.set_vertex_data_raw(vec![0.0; 24], vec![3, 3, 2], vec![0, 1, 2])
            .unwrap();
        assert_eq!(view.vertex_layout().stride(), 8);
        assert_eq!(view.vertex_layout().offsets(), [0, 3, 6]);
    }

    #[test]
    fn program_waits_for_matching_vertex_data() {
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());

        let vertex = VERTEX
            .replace("layout(location = 0) in vec3 a_pos;", "layout(location = 0) in vec3 a_pos;\nlayout(location = 1) in vec2 a_uv;")
            .replace("v_uv = a_pos.xy * 0.5 + 0.5;", "v_uv = a_uv;");
        view.recompile_shaders(&vertex, FRAGMENT).unwrap();
        assert!(view.has_program());
        assert!(!view.is_drawable());

        let quad = vec![
            -1.0, -1.0, 0.0, 0.0, 0.0, //
            1.0, -1.0, 0.0, 1.0, 0.0, //
            1.0, 1.0, 0.0, 1.0, 1.0,
        ];
        view.set_vertex_data_raw(quad, vec![3, 2], vec![0, 1, 2]).unwrap();
        assert!(view.is_drawable());
        gpu.paint(&mut view);
        assert_eq!(gpu.errors(), Vec::<String>::new());
    }

    #[test]
    fn textures_are_appended() {
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());

        assert!(view.take_redraw());
        view.add_texture(checker("first", 8, 4)).unwrap();
        assert!(view.take_redraw());
        view.add_texture(checker("second", 3, 3)).unwrap();
        assert!(view.needs_redraw());

        let names: Vec<_> = view.textures().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(view.textures()[0].mip_level_count(), 4);
        assert_eq!((view.textures()[1].width(), view.textures()[1].height()), (3, 3));

        view.recompile_shaders(VERTEX, FRAGMENT).unwrap();
        gpu.paint(&mut view);
        assert_eq!(gpu.errors(), Vec::<String>::new());
    }

    #[test]
    fn oversized_texture_is_rejected() {
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());

        let max = gpu.device.limits().max_texture_dimension_2d;
        let tall = Texture::from_image(&image::DynamicImage::ImageRgba8(image::RgbaImage::new(1, max + 1)));
        assert!(matches!(view.add_texture(tall), Err(ViewError::TextureTooLarge { .. })));
        assert!(view.textures().is_empty());
    }

    #[test]
    fn empty_mesh_is_accepted_and_skipped() {
        let gpu = Headless::new();
        let mut view = View::new();
        view.initialize(&gpu.ctx());
        view.recompile_shaders(VERTEX, FRAGMENT).unwrap();

        view.set_vertex_data_raw(Vec::new(), vec![3], Vec::new()).unwrap();
        assert!(!view.is_drawable());
        gpu.paint(&mut view);
        assert_eq!(gpu.errors(), Vec::<String>::new());
    }
}
