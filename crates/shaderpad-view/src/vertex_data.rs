//! Interleaved vertex data: the layout model and its text format.
//!
//! The text format is three blank-line-separated segments of comma-separated
//! numbers:
//!
//! ```text
//! -0.5, -0.5, 0.0,   1.0, 0.0, 0.0,
//!  0.5, -0.5, 0.0,   0.0, 1.0, 0.0,
//!  0.0,  0.5, 0.0,   0.0, 0.0, 1.0
//!
//! 3, 3
//!
//! 0, 1, 2
//! ```
//!
//! 1. vertex floats, all attributes of a vertex back to back
//! 2. component count of each attribute, in shader-location order
//! 3. triangle-list indices
//!
//! Line breaks and spaces inside a segment are insignificant and a single
//! trailing comma per segment is tolerated.

use std::fmt;
use std::str::FromStr;

/// Attribute slots available to a vertex layout (wgpu's default limit).
pub const MAX_ATTRIBUTES: usize = 16;

/// Widest attribute, in floats (`Float32x4`).
pub const MAX_ATTRIBUTE_SIZE: u32 = 4;

const FLOAT_SIZE: u64 = std::mem::size_of::<f32>() as u64;

/// Reasons a vertex layout is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("no vertex attributes given")]
    NoAttributes,

    #[error("{count} vertex attributes given (at most {max} are supported)", max = MAX_ATTRIBUTES)]
    TooManyAttributes { count: usize },

    #[error("attribute {index} has {size} components (expected 1 to {max})", max = MAX_ATTRIBUTE_SIZE)]
    AttributeSize { index: usize, size: u32 },

    #[error("{floats} vertex floats do not divide into vertices of {stride} floats")]
    StrideMismatch { floats: usize, stride: u32 },
}

/// Validated interleaved vertex data plus its attribute layout and indices.
///
/// Invariant: the float count is a whole multiple of [`stride`](Self::stride),
/// which is the sum of the attribute sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLayout {
    vertices: Vec<f32>,
    attribute_sizes: Vec<u32>,
    indices: Vec<u32>,
}

impl VertexLayout {
    pub fn new(
        vertices: Vec<f32>,
        attribute_sizes: Vec<u32>,
        indices: Vec<u32>,
    ) -> Result<Self, LayoutError> {
        if attribute_sizes.is_empty() {
            return Err(LayoutError::NoAttributes);
        }
        if attribute_sizes.len() > MAX_ATTRIBUTES {
            return Err(LayoutError::TooManyAttributes {
                count: attribute_sizes.len(),
            });
        }
        if let Some((index, &size)) = attribute_sizes
            .iter()
            .enumerate()
            .find(|(_, s)| !(1..=MAX_ATTRIBUTE_SIZE).contains(*s))
        {
            return Err(LayoutError::AttributeSize { index, size });
        }

        let stride: u32 = attribute_sizes.iter().sum();
        if vertices.len() % stride as usize != 0 {
            return Err(LayoutError::StrideMismatch {
                floats: vertices.len(),
                stride,
            });
        }

        Ok(Self {
            vertices,
            attribute_sizes,
            indices,
        })
    }

    /// The rectangle shown before any vertex data is loaded: two triangles of
    /// positions only.
    pub fn default_rectangle() -> Self {
        #[rustfmt::skip]
        let points = vec![
            -0.7, -0.7, 0.0, // bottom left
             0.7, -0.7, 0.0, // bottom right
             0.7,  0.7, 0.0, // top right

             0.7,  0.7, 0.0, // top right
            -0.7,  0.7, 0.0, // top left
            -0.7, -0.7, 0.0, // bottom left
        ];

        Self {
            vertices: points,
            attribute_sizes: vec![3],
            indices: (0..6).collect(),
        }
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn attribute_sizes(&self) -> &[u32] {
        &self.attribute_sizes
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Floats per vertex.
    pub fn stride(&self) -> u32 {
        self.attribute_sizes.iter().sum()
    }

    pub fn stride_bytes(&self) -> u64 {
        self.stride() as u64 * FLOAT_SIZE
    }

    /// Start of each attribute within a vertex, in floats.
    pub fn offsets(&self) -> Vec<u32> {
        self.attribute_sizes
            .iter()
            .scan(0, |offset, size| {
                let start = *offset;
                *offset += size;
                Some(start)
            })
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.stride() as usize
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// One `Float32xN` attribute per entry, at `shader_location` = its position.
    pub fn vertex_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.attribute_sizes
            .iter()
            .zip(self.offsets())
            .enumerate()
            .map(|(location, (&size, offset))| wgpu::VertexAttribute {
                format: float_format(size),
                offset: offset as u64 * FLOAT_SIZE,
                shader_location: location as u32,
            })
            .collect()
    }
}

fn float_format(size: u32) -> wgpu::VertexFormat {
    match size {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

// ── text format ───────────────────────────────────────────────────────────

/// What went wrong while reading vertex-data text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexDataErrorKind {
    /// The text did not have exactly three segments.
    SegmentCount { found: usize },
    /// A token is not a number of the expected kind.
    InvalidNumber { token: String, expected: &'static str },
    /// Two commas with nothing between them.
    EmptyToken,
    /// Numbers parsed, but they do not form a valid layout.
    Layout(LayoutError),
}

impl fmt::Display for VertexDataErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentCount { found } => write!(
                f,
                "expected 3 blank-line-separated segments (vertices, attribute sizes, indices), found {found}"
            ),
            Self::InvalidNumber { token, expected } => {
                write!(f, "'{token}' is not {expected}")
            }
            Self::EmptyToken => write!(f, "empty value between commas"),
            Self::Layout(e) => write!(f, "{e}"),
        }
    }
}

/// A vertex-data parse error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("vertex data error at {line}:{col}: {kind}")]
pub struct VertexDataError {
    pub kind: VertexDataErrorKind,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// 1-based source column number where the error occurred.
    pub col: usize,
}

impl VertexDataError {
    fn new(kind: VertexDataErrorKind, line: usize, col: usize) -> Self {
        Self { kind, line, col }
    }
}

/// Parses the three-segment vertex-data text into a validated layout.
pub fn parse_vertex_data(src: &str) -> Result<VertexLayout, VertexDataError> {
    let segments = split_segments(src);
    if segments.len() != 3 {
        let (line, col) = match segments.get(3) {
            Some(extra) => (extra.start_line(), 1),
            None => (src.lines().count().max(1), 1),
        };
        return Err(VertexDataError::new(
            VertexDataErrorKind::SegmentCount {
                found: segments.len(),
            },
            line,
            col,
        ));
    }

    let vertices: Vec<f32> = parse_numbers(&segments[0], "a number")?;
    if let Some(bad) = tokens(&segments[0]).iter().zip(&vertices).find(|(_, v)| !v.is_finite()) {
        let (token, _) = bad;
        return Err(VertexDataError::new(
            VertexDataErrorKind::InvalidNumber {
                token: token.text.clone(),
                expected: "a finite number",
            },
            token.line,
            token.col,
        ));
    }
    let attribute_sizes: Vec<u32> = parse_numbers(&segments[1], "a non-negative integer")?;
    let indices: Vec<u32> = parse_numbers(&segments[2], "a non-negative integer")?;

    log::debug!(
        target: "view",
        "parsed vertex data: {} floats, attributes {:?}, {} indices",
        vertices.len(),
        attribute_sizes,
        indices.len()
    );

    VertexLayout::new(vertices, attribute_sizes, indices).map_err(|e| {
        let at = match e {
            LayoutError::StrideMismatch { .. } => &segments[0],
            _ => &segments[1],
        };
        VertexDataError::new(VertexDataErrorKind::Layout(e), at.start_line(), 1)
    })
}

/// Consecutive non-blank lines, with their 1-based line numbers.
struct Segment<'a> {
    lines: Vec<(usize, &'a str)>,
}

impl Segment<'_> {
    fn start_line(&self) -> usize {
        self.lines.first().map_or(1, |(n, _)| *n)
    }
}

fn split_segments(src: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut current: Vec<(usize, &str)> = Vec::new();

    // `lines()` already strips a trailing '\r'.
    for (i, line) in src.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                segments.push(Segment { lines: std::mem::take(&mut current) });
            }
        } else {
            current.push((i + 1, line));
        }
    }
    if !current.is_empty() {
        segments.push(Segment { lines: current });
    }

    segments
}

struct Token {
    text: String,
    line: usize,
    col: usize,
}

/// Splits a segment on commas and line breaks. Positions point at the first
/// non-blank character of each token, or at the comma closing an empty one.
///
/// A comma right before a line break (or the end of the segment) does not
/// open an empty token, so both `1, 2,` and one value per line are accepted.
fn tokens(segment: &Segment<'_>) -> Vec<Token> {
    let mut out = Vec::new();

    for &(line_no, line) in &segment.lines {
        let mut text = String::new();
        let mut start: Option<usize> = None;

        for (col, ch) in line.chars().enumerate() {
            let col = col + 1;
            if ch == ',' {
                let col = start.take().unwrap_or(col);
                out.push(Token { text: std::mem::take(&mut text), line: line_no, col });
            } else if ch.is_whitespace() {
                if start.is_some() {
                    text.push(' ');
                }
            } else {
                start.get_or_insert(col);
                text.push(ch);
            }
        }

        if let Some(col) = start {
            out.push(Token { text, line: line_no, col });
        }
    }

    for token in &mut out {
        token.text.truncate(token.text.trim_end().len());
    }
    out
}

fn parse_numbers<T: FromStr>(
    segment: &Segment<'_>,
    expected: &'static str,
) -> Result<Vec<T>, VertexDataError> {
    let toks = tokens(segment);
    let mut values = Vec::with_capacity(toks.len());

    for token in &toks {
        if token.text.is_empty() {
            return Err(VertexDataError::new(
                VertexDataErrorKind::EmptyToken,
                token.line,
                token.col,
            ));
        }

        let value = token.text.parse::<T>().map_err(|_| {
            VertexDataError::new(
                VertexDataErrorKind::InvalidNumber {
                    token: token.text.clone(),
                    expected,
                },
                token.line,
                token.col,
            )
        })?;
        values.push(value);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
-0.5, -0.5, 0.0,  1.0, 0.0, 0.0,  0.0, 0.0,
 0.5, -0.5, 0.0,  0.0, 1.0, 0.0,  1.0, 0.0,
 0.0,  0.5, 0.0,  0.0, 0.0, 1.0,  0.5, 1.0

3, 3, 2

0, 1, 2
";

    fn kind(src: &str) -> VertexDataErrorKind {
        parse_vertex_data(src).unwrap_err().kind
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn stride_and_offsets_for_position_color_uv() {
        let layout = VertexLayout::new(vec![0.0; 16], vec![3, 3, 2], vec![0, 1]).unwrap();
        assert_eq!(layout.stride(), 8);
        assert_eq!(layout.offsets(), [0, 3, 6]);
        assert_eq!(layout.stride_bytes(), 32);
        assert_eq!(layout.vertex_count(), 2);
        assert_eq!(layout.index_count(), 2);
    }

    #[test]
    fn vertex_attributes_use_byte_offsets_and_locations() {
        let layout = VertexLayout::new(vec![0.0; 8], vec![3, 3, 2], vec![]).unwrap();
        let attrs = layout.vertex_attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[2].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(attrs[2].shader_location, 2);
    }

    #[test]
    fn accepts_only_whole_vertices() {
        for n in 0..=24 {
            let result = VertexLayout::new(vec![1.0; n], vec![3, 3, 2], vec![]);
            assert_eq!(result.is_ok(), n % 8 == 0, "{n} floats");
        }
    }

    #[test]
    fn stride_mismatch_reports_counts() {
        let err = VertexLayout::new(vec![0.0; 7], vec![3, 2], vec![]).unwrap_err();
        assert_eq!(err, LayoutError::StrideMismatch { floats: 7, stride: 5 });
    }

    #[test]
    fn rejects_empty_and_out_of_range_attributes() {
        assert_eq!(
            VertexLayout::new(vec![], vec![], vec![]).unwrap_err(),
            LayoutError::NoAttributes
        );
        assert_eq!(
            VertexLayout::new(vec![], vec![3, 0], vec![]).unwrap_err(),
            LayoutError::AttributeSize { index: 1, size: 0 }
        );
        assert_eq!(
            VertexLayout::new(vec![], vec![5], vec![]).unwrap_err(),
            LayoutError::AttributeSize { index: 0, size: 5 }
        );
        assert_eq!(
            VertexLayout::new(vec![], vec![1; 17], vec![]).unwrap_err(),
            LayoutError::TooManyAttributes { count: 17 }
        );
    }

    #[test]
    fn default_rectangle_is_two_triangles() {
        let rect = VertexLayout::default_rectangle();
        assert_eq!(rect.stride(), 3);
        assert_eq!(rect.vertex_count(), 6);
        assert_eq!(rect.indices(), [0, 1, 2, 3, 4, 5]);
    }

    // ── text format ───────────────────────────────────────────────────────

    #[test]
    fn parses_three_segments() {
        let layout = parse_vertex_data(TRIANGLE).unwrap();
        assert_eq!(layout.vertices().len(), 24);
        assert_eq!(layout.vertices()[3], 1.0);
        assert_eq!(layout.attribute_sizes(), [3, 3, 2]);
        assert_eq!(layout.indices(), [0, 1, 2]);
        assert_eq!(layout.vertex_count(), 3);
    }

    #[test]
    fn accepts_crlf_and_extra_blank_lines() {
        let src = "\r\n1,2,3\r\n4,5,6\r\n\r\n\r\n3\r\n\r\n0,1\r\n\r\n";
        let layout = parse_vertex_data(src).unwrap();
        assert_eq!(layout.vertices(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(layout.indices(), [0, 1]);
    }

    #[test]
    fn trailing_comma_is_tolerated() {
        let layout = parse_vertex_data("1, 2,\n\n2,\n\n0,").unwrap();
        assert_eq!(layout.vertices(), [1.0, 2.0]);
        assert_eq!(layout.attribute_sizes(), [2]);
        assert_eq!(layout.indices(), [0]);
    }

    #[test]
    fn wrong_segment_count() {
        assert_eq!(kind("1,2,3\n\n3"), VertexDataErrorKind::SegmentCount { found: 2 });
        assert_eq!(kind(""), VertexDataErrorKind::SegmentCount { found: 0 });

        let err = parse_vertex_data("1\n\n1\n\n0\n\n9").unwrap_err();
        assert_eq!(err.kind, VertexDataErrorKind::SegmentCount { found: 4 });
        assert_eq!((err.line, err.col), (7, 1));
    }

    #[test]
    fn non_numeric_token_points_at_it() {
        let err = parse_vertex_data("1.0, 2.0,\n 3.0, abc\n\n2\n\n0").unwrap_err();
        assert_eq!(
            err.kind,
            VertexDataErrorKind::InvalidNumber { token: "abc".into(), expected: "a number" }
        );
        assert_eq!((err.line, err.col), (2, 7));
    }

    #[test]
    fn negative_size_and_fractional_index_are_rejected() {
        assert!(matches!(
            kind("1,2\n\n-2\n\n0"),
            VertexDataErrorKind::InvalidNumber { .. }
        ));
        assert!(matches!(
            kind("1,2\n\n2\n\n0.5"),
            VertexDataErrorKind::InvalidNumber { .. }
        ));
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        assert!(matches!(
            kind("1, NaN\n\n2\n\n0"),
            VertexDataErrorKind::InvalidNumber { expected: "a finite number", .. }
        ));
    }

    #[test]
    fn doubled_comma_is_an_empty_token() {
        let err = parse_vertex_data("1,,2\n\n3\n\n0").unwrap_err();
        assert_eq!(err.kind, VertexDataErrorKind::EmptyToken);
        assert_eq!((err.line, err.col), (1, 3));
    }

    #[test]
    fn line_breaks_separate_numbers() {
        let layout = parse_vertex_data("1\n2\n\n2\n\n0").unwrap();
        assert_eq!(layout.vertices(), [1.0, 2.0]);

        let layout = parse_vertex_data("0, 0, 0\n1, 1, 1\n\n3\n\n0\n1").unwrap();
        assert_eq!(layout.vertices(), [0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(layout.indices(), [0, 1]);
    }

    #[test]
    fn spaces_within_a_line_still_need_commas() {
        let err = parse_vertex_data("1 2\n\n2\n\n0").unwrap_err();
        assert_eq!(
            err.kind,
            VertexDataErrorKind::InvalidNumber { token: "1 2".into(), expected: "a number" }
        );
        assert_eq!((err.line, err.col), (1, 1));
    }

    #[test]
    fn comma_starting_a_line_is_an_empty_token() {
        let err = parse_vertex_data("1,\n,2\n\n2\n\n0").unwrap_err();
        assert_eq!(err.kind, VertexDataErrorKind::EmptyToken);
        assert_eq!((err.line, err.col), (2, 1));
    }

    #[test]
    fn stride_mismatch_surfaces_as_layout_error() {
        let err = parse_vertex_data("1,2,3,4,5\n\n3, 3\n\n0").unwrap_err();
        assert_eq!(
            err.kind,
            VertexDataErrorKind::Layout(LayoutError::StrideMismatch { floats: 5, stride: 6 })
        );
        assert_eq!(err.line, 1);
        assert!(err.to_string().contains("do not divide"));
    }
}
