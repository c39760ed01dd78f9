//! GLSL compilation and interface checks.
//!
//! Sources go through naga's GLSL front end and validator, so every error a
//! user can type is caught on the CPU with a readable diagnostic, before wgpu
//! sees the module.
//!
//! Resource convention (descriptor set 0):
//! - `binding = 0`: `texture2D`, the first loaded texture
//! - `binding = 1`: `sampler`, linear filtering with mipmaps

use std::fmt;

use naga::{Binding, ImageClass, ImageDimension, Module, ResourceBinding, ScalarKind, TypeInner};

use crate::vertex_data::VertexLayout;

pub const TEXTURE_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;

/// Pipeline stage a source belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn to_naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// Compilation or linking failure, carrying the compiler's diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage} shader compilation failed:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("shader linking failed: {log}")]
    Link { log: String },

    #[error("vertex layout does not match the vertex shader: {log}")]
    LayoutMismatch { log: String },
}

/// A stage input or output bound to a `location`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Varying {
    pub location: u32,
    pub kind: ScalarKind,
    pub components: u32,
}

/// Parses and validates one GLSL stage.
///
/// Failures are logged at error level on the `shader` target.
pub fn compile_stage(source: &str, stage: ShaderStage) -> Result<Module, ShaderError> {
    parse_and_validate(source, stage).inspect_err(log_error)
}

fn log_error(err: &ShaderError) {
    log::error!(target: "shader", "{err}");
}

fn parse_and_validate(source: &str, stage: ShaderStage) -> Result<Module, ShaderError> {
    log::debug!(target: "shader", "compiling {stage} shader");

    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.to_naga());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| ShaderError::Compile {
            stage,
            log: errors.emit_to_string(source),
        })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    validator
        .validate(&module)
        .map_err(|err| ShaderError::Compile {
            stage,
            log: err.emit_to_string(source),
        })?;

    if !module.entry_points.iter().any(|ep| ep.stage == stage.to_naga()) {
        return Err(ShaderError::Compile {
            stage,
            log: format!("no {stage} entry point (`void main()`)"),
        });
    }

    Ok(module)
}

/// A linked vertex + fragment pair.
#[derive(Debug)]
pub struct ShaderProgram {
    vertex: Module,
    fragment: Module,
    vertex_inputs: Vec<Varying>,
    samples_texture: bool,
}

impl ShaderProgram {
    /// Compiles both stages and checks that they fit together and fit the
    /// resources the view provides.
    ///
    /// Failures are logged at error level on the `shader` target.
    pub fn link(vertex_src: &str, fragment_src: &str) -> Result<Self, ShaderError> {
        let vertex = compile_stage(vertex_src, ShaderStage::Vertex)?;
        let fragment = compile_stage(fragment_src, ShaderStage::Fragment)?;
        Self::from_modules(vertex, fragment).inspect_err(log_error)
    }

    fn from_modules(vertex: Module, fragment: Module) -> Result<Self, ShaderError> {
        let vertex_inputs = stage_inputs(&vertex, ShaderStage::Vertex);
        let vertex_outputs = stage_outputs(&vertex, ShaderStage::Vertex);
        let fragment_inputs = stage_inputs(&fragment, ShaderStage::Fragment);
        let fragment_outputs = stage_outputs(&fragment, ShaderStage::Fragment);

        for input in &fragment_inputs {
            match vertex_outputs.iter().find(|o| o.location == input.location) {
                None => {
                    return Err(link_error(format!(
                        "fragment input at location {} is not written by the vertex shader",
                        input.location
                    )));
                }
                Some(output) if output.kind != input.kind || output.components != input.components => {
                    return Err(link_error(format!(
                        "location {}: vertex output is {} but fragment input is {}",
                        input.location,
                        type_name(output),
                        type_name(input)
                    )));
                }
                Some(_) => {}
            }
        }

        match fragment_outputs.iter().find(|o| o.location == 0) {
            Some(out) if out.kind == ScalarKind::Float && out.components == 4 => {}
            Some(out) => {
                return Err(link_error(format!(
                    "fragment output at location 0 is {}; a vec4 color is required",
                    type_name(out)
                )));
            }
            None => {
                return Err(link_error(
                    "fragment shader does not write a color to location 0".to_string(),
                ));
            }
        }

        let samples_texture = check_resources(&vertex, ShaderStage::Vertex)?
            | check_resources(&fragment, ShaderStage::Fragment)?;

        log::debug!(
            target: "shader",
            "linked program: {} vertex inputs, texture {}",
            vertex_inputs.len(),
            if samples_texture { "used" } else { "unused" }
        );

        Ok(Self {
            vertex,
            fragment,
            vertex_inputs,
            samples_texture,
        })
    }

    /// Inputs consumed by the vertex stage, sorted by location.
    pub fn vertex_inputs(&self) -> &[Varying] {
        &self.vertex_inputs
    }

    /// Whether either stage declares the texture or sampler binding.
    pub fn samples_texture(&self) -> bool {
        self.samples_texture
    }

    /// Every vertex input must be fed by a float attribute at its location.
    ///
    /// Component counts may differ; missing components read as `(0, 0, 0, 1)`.
    pub fn check_vertex_layout(&self, layout: &VertexLayout) -> Result<(), ShaderError> {
        let attributes = layout.attribute_sizes();
        for input in &self.vertex_inputs {
            if input.location as usize >= attributes.len() {
                return Err(ShaderError::LayoutMismatch {
                    log: format!(
                        "input at location {} has no attribute ({} attribute(s) defined)",
                        input.location,
                        attributes.len()
                    ),
                });
            }
            if input.kind != ScalarKind::Float {
                return Err(ShaderError::LayoutMismatch {
                    log: format!(
                        "input at location {} is {}; vertex data only provides floats",
                        input.location,
                        type_name(input)
                    ),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn vertex_module(&self) -> &Module {
        &self.vertex
    }

    pub(crate) fn fragment_module(&self) -> &Module {
        &self.fragment
    }
}

fn link_error(log: String) -> ShaderError {
    ShaderError::Link { log }
}

fn type_name(v: &Varying) -> String {
    let scalar = match v.kind {
        ScalarKind::Float => "float",
        ScalarKind::Sint => "int",
        ScalarKind::Uint => "uint",
        ScalarKind::Bool => "bool",
        _ => "abstract",
    };
    if v.components == 1 {
        scalar.to_string()
    } else {
        format!("{scalar}{}", v.components)
    }
}

fn entry_point(module: &Module, stage: ShaderStage) -> Option<&naga::EntryPoint> {
    module.entry_points.iter().find(|ep| ep.stage == stage.to_naga())
}

fn stage_inputs(module: &Module, stage: ShaderStage) -> Vec<Varying> {
    let mut out = Vec::new();
    if let Some(ep) = entry_point(module, stage) {
        for arg in &ep.function.arguments {
            collect_varyings(module, arg.ty, arg.binding.as_ref(), &mut out);
        }
    }
    out.sort_by_key(|v| v.location);
    out
}

fn stage_outputs(module: &Module, stage: ShaderStage) -> Vec<Varying> {
    let mut out = Vec::new();
    if let Some(result) = entry_point(module, stage).and_then(|ep| ep.function.result.as_ref()) {
        collect_varyings(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out.sort_by_key(|v| v.location);
    out
}

/// Location-bound values of `ty`, descending into an unbound struct.
fn collect_varyings(
    module: &Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            if let Some((kind, components)) = scalar_shape(&module.types[ty].inner) {
                out.push(Varying {
                    location: *location,
                    kind,
                    components,
                });
            }
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_varyings(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn scalar_shape(inner: &TypeInner) -> Option<(ScalarKind, u32)> {
    match inner {
        TypeInner::Scalar(scalar) => Some((scalar.kind, 1)),
        TypeInner::Vector { size, scalar } => Some((scalar.kind, *size as u32)),
        _ => None,
    }
}

/// Rejects bindings the view does not provide. Returns whether the texture
/// or sampler is declared.
fn check_resources(module: &Module, stage: ShaderStage) -> Result<bool, ShaderError> {
    let mut uses_texture = false;

    for (_, var) in module.global_variables.iter() {
        let Some(&ResourceBinding { group, binding }) = var.binding.as_ref() else {
            continue;
        };
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        let inner = &module.types[var.ty].inner;

        let ok = match (group, binding) {
            (0, TEXTURE_BINDING) => matches!(
                inner,
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class: ImageClass::Sampled {
                        kind: ScalarKind::Float,
                        multi: false,
                    },
                }
            ),
            (0, SAMPLER_BINDING) => matches!(inner, TypeInner::Sampler { comparison: false }),
            _ => false,
        };

        if !ok {
            return Err(link_error(format!(
                "{stage} shader resource '{name}' at set = {group}, binding = {binding} is not provided \
                 (available: texture2D at binding {TEXTURE_BINDING}, sampler at binding {SAMPLER_BINDING}, set 0)"
            )));
        }
        uses_texture = true;
    }

    Ok(uses_texture)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"#version 450
layout(location = 0) in vec3 a_pos;
layout(location = 1) in vec3 a_color;
layout(location = 0) out vec3 v_color;

void main() {
    v_color = a_color;
    gl_Position = vec4(a_pos, 1.0);
}
"#;

    const FRAGMENT: &str = r#"#version 450
layout(location = 0) in vec3 v_color;
layout(location = 0) out vec4 frag_color;

void main() {
    frag_color = vec4(v_color, 1.0);
}
"#;

    const TEXTURED_FRAGMENT: &str = r#"#version 450
layout(location = 0) in vec3 v_color;
layout(location = 0) out vec4 frag_color;
layout(set = 0, binding = 0) uniform texture2D u_texture;
layout(set = 0, binding = 1) uniform sampler u_sampler;

void main() {
    frag_color = texture(sampler2D(u_texture, u_sampler), v_color.xy);
}
"#;

    fn layout(sizes: Vec<u32>) -> VertexLayout {
        let stride: u32 = sizes.iter().sum();
        VertexLayout::new(vec![0.0; stride as usize], sizes, vec![0]).unwrap()
    }

    #[test]
    fn valid_pair_links() {
        let program = ShaderProgram::link(VERTEX, FRAGMENT).unwrap();
        assert!(!program.samples_texture());

        let locations: Vec<_> = program.vertex_inputs().iter().map(|v| v.location).collect();
        assert_eq!(locations, [0, 1]);
        assert_eq!(program.vertex_inputs()[0].components, 3);
        assert_eq!(program.vertex_inputs()[0].kind, ScalarKind::Float);
    }

    #[test]
    fn syntax_error_reports_compile_log() {
        let broken = VERTEX.replace("gl_Position = vec4(a_pos, 1.0);", "gl_Position = vec4(a_pos, 1.0)");
        let err = ShaderProgram::link(&broken, FRAGMENT).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn fragment_errors_name_the_fragment_stage() {
        let err = compile_stage("#version 450\nvoid main() { undefined_call(); }", ShaderStage::Fragment)
            .unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: ShaderStage::Fragment, .. }));
        assert!(err.to_string().starts_with("fragment shader compilation failed"));
    }

    #[test]
    fn mismatched_varyings_fail_to_link() {
        let fragment = FRAGMENT.replace("in vec3 v_color", "in vec2 v_color").replace("vec4(v_color, 1.0)", "vec4(v_color, 0.0, 1.0)");
        let err = ShaderProgram::link(VERTEX, &fragment).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }), "{err:?}");

        let fragment = FRAGMENT.replace("location = 0) in", "location = 3) in");
        let err = ShaderProgram::link(VERTEX, &fragment).unwrap_err();
        assert!(err.to_string().contains("location 3"), "{err}");
    }

    #[test]
    fn color_output_must_be_a_vec4() {
        let fragment = FRAGMENT
            .replace("out vec4 frag_color", "out vec3 frag_color")
            .replace("vec4(v_color, 1.0)", "v_color");
        let err = ShaderProgram::link(VERTEX, &fragment).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }), "{err:?}");
        assert!(err.to_string().contains("vec4"), "{err}");

        let fragment = FRAGMENT.replace("location = 0) out", "location = 1) out");
        let err = ShaderProgram::link(VERTEX, &fragment).unwrap_err();
        assert!(err.to_string().contains("location 0"), "{err}");
    }

    #[test]
    fn failures_are_logged_on_the_shader_target() {
        let console = crate::test_console();

        let broken = FRAGMENT.replace("frag_color = vec4(v_color, 1.0);", "frag_color = vec4(v_colour, 1.0);");
        let err = ShaderProgram::link(VERTEX, &broken).unwrap_err();
        let fragment = FRAGMENT.replace("in vec3 v_color", "in vec2 v_color").replace("vec4(v_color, 1.0)", "vec4(v_color, 0.0, 1.0)");
        let link_err = ShaderProgram::link(VERTEX, &fragment).unwrap_err();

        let lines = console.lines_for("shader");
        for expected in [err.to_string(), link_err.to_string()] {
            assert!(
                lines.iter().any(|l| l.level == log::Level::Error && l.message == expected),
                "{expected} not logged"
            );
        }
    }

    #[test]
    fn texture_bindings_are_recognized() {
        let program = ShaderProgram::link(VERTEX, TEXTURED_FRAGMENT).unwrap();
        assert!(program.samples_texture());
    }

    #[test]
    fn unknown_bindings_fail_to_link() {
        let fragment = TEXTURED_FRAGMENT.replace("binding = 1", "binding = 4");
        let err = ShaderProgram::link(VERTEX, &fragment).unwrap_err();
        assert!(err.to_string().contains("binding = 4"), "{err}");
    }

    #[test]
    fn layout_must_cover_every_input() {
        let program = ShaderProgram::link(VERTEX, FRAGMENT).unwrap();
        program.check_vertex_layout(&layout(vec![3, 3])).unwrap();
        program.check_vertex_layout(&layout(vec![3, 3, 2])).unwrap();
        // Fewer components than the shader reads are filled in by the pipeline.
        program.check_vertex_layout(&layout(vec![2, 4])).unwrap();

        let err = program.check_vertex_layout(&layout(vec![3])).unwrap_err();
        assert!(matches!(err, ShaderError::LayoutMismatch { .. }));
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }
}
