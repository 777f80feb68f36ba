//! Mesh builders
//!
//! A closed set of geometry generators, one per renderer kind. Builders are
//! plain data; `build` produces the vertex list the renderer uploads into a
//! device-local buffer.

use std::collections::HashMap;
use std::rc::Rc;

use crate::render::vertex::RenderingVertex;

/// Metrics for one glyph in a font atlas
#[derive(Debug, Clone, Copy)]
pub struct Glyph {
    /// Top-left atlas UV
    pub uv_min: [f32; 2],
    /// Bottom-right atlas UV
    pub uv_max: [f32; 2],
    /// Glyph quad size in pixels
    pub size: [f32; 2],
    /// Horizontal cursor advance in pixels
    pub advance: f32,
}

/// Glyph metric table supplied by the font-loading layer
///
/// Parsing font files is the asset layer's job; the text builder only
/// consumes the resulting metrics.
#[derive(Debug, Clone, Default)]
pub struct FontAtlas {
    glyphs: HashMap<char, Glyph>,
    /// Vertical distance between baselines in pixels
    pub line_height: f32,
}

impl FontAtlas {
    /// Build an atlas from a glyph table
    pub fn new(glyphs: HashMap<char, Glyph>, line_height: f32) -> Self {
        Self {
            glyphs,
            line_height,
        }
    }

    /// Look up a glyph
    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(&c)
    }
}

/// Geometry generator for one renderer kind
pub enum MeshBuilder {
    /// Externally supplied triangle mesh
    Mesh {
        /// Vertex list as loaded by the asset layer
        vertices: Vec<RenderingVertex>,
    },
    /// Textured quad of the given pixel size
    Sprite {
        /// Quad size in pixels
        size: [f32; 2],
    },
    /// Line gizmo for the three coordinate axes
    Axis,
    /// Quads per glyph laid out along the baseline
    Text {
        /// The string to lay out
        text: String,
        /// Glyph metrics
        atlas: Rc<FontAtlas>,
    },
}

impl MeshBuilder {
    /// Generate the vertex list for this builder
    pub fn build(&self) -> Vec<RenderingVertex> {
        match self {
            Self::Mesh { vertices } => vertices.clone(),
            Self::Sprite { size } => build_quad(0.0, 0.0, size[0], size[1], [0.0, 0.0], [1.0, 1.0]),
            Self::Axis => build_axis_lines(),
            Self::Text { text, atlas } => build_text(text, atlas),
        }
    }
}

fn build_quad(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    uv_min: [f32; 2],
    uv_max: [f32; 2],
) -> Vec<RenderingVertex> {
    let v = |px: f32, py: f32, u: f32, t: f32| RenderingVertex {
        pos: [px, py, 0.0],
        color: [1.0, 1.0, 1.0],
        texcoord: [u, t],
        normal: [0.0, 0.0, 1.0],
    };

    vec![
        v(x, y, uv_min[0], uv_min[1]),
        v(x + width, y, uv_max[0], uv_min[1]),
        v(x + width, y + height, uv_max[0], uv_max[1]),
        v(x + width, y + height, uv_max[0], uv_max[1]),
        v(x, y + height, uv_min[0], uv_max[1]),
        v(x, y, uv_min[0], uv_min[1]),
    ]
}

fn build_axis_lines() -> Vec<RenderingVertex> {
    let line = |to: [f32; 3], color: [f32; 3]| {
        [
            RenderingVertex {
                pos: [0.0, 0.0, 0.0],
                color,
                texcoord: [0.0, 0.0],
                normal: [0.0, 1.0, 0.0],
            },
            RenderingVertex {
                pos: to,
                color,
                texcoord: [0.0, 0.0],
                normal: [0.0, 1.0, 0.0],
            },
        ]
    };

    let mut vertices = Vec::with_capacity(6);
    vertices.extend(line([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]));
    vertices.extend(line([0.0, 1.0, 0.0], [0.0, 1.0, 0.0]));
    vertices.extend(line([0.0, 0.0, 1.0], [0.0, 0.0, 1.0]));
    vertices
}

fn build_text(text: &str, atlas: &FontAtlas) -> Vec<RenderingVertex> {
    let mut vertices = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut cursor_y = 0.0f32;

    for c in text.chars() {
        if c == '\n' {
            cursor_x = 0.0;
            cursor_y += atlas.line_height;
            continue;
        }

        let Some(glyph) = atlas.glyph(c) else {
            continue;
        };

        vertices.extend(build_quad(
            cursor_x,
            cursor_y,
            glyph.size[0],
            glyph.size[1],
            glyph.uv_min,
            glyph.uv_max,
        ));
        cursor_x += glyph.advance;
    }

    vertices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_atlas() -> Rc<FontAtlas> {
        let mut glyphs = HashMap::new();
        glyphs.insert(
            'a',
            Glyph {
                uv_min: [0.0, 0.0],
                uv_max: [0.5, 0.5],
                size: [8.0, 16.0],
                advance: 9.0,
            },
        );
        glyphs.insert(
            'b',
            Glyph {
                uv_min: [0.5, 0.0],
                uv_max: [1.0, 0.5],
                size: [8.0, 16.0],
                advance: 10.0,
            },
        );
        Rc::new(FontAtlas::new(glyphs, 18.0))
    }

    #[test]
    fn sprite_builds_two_triangles() {
        let builder = MeshBuilder::Sprite { size: [32.0, 16.0] };
        let vertices = builder.build();
        assert_eq!(vertices.len(), 6);
        // Quad corners span the requested size
        assert_eq!(vertices[2].pos, [32.0, 16.0, 0.0]);
        assert_eq!(vertices[2].texcoord, [1.0, 1.0]);
    }

    #[test]
    fn axis_builds_three_colored_lines() {
        let vertices = MeshBuilder::Axis.build();
        assert_eq!(vertices.len(), 6);
        assert_eq!(vertices[1].color, [1.0, 0.0, 0.0]);
        assert_eq!(vertices[3].color, [0.0, 1.0, 0.0]);
        assert_eq!(vertices[5].color, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn text_advances_cursor_per_glyph() {
        let builder = MeshBuilder::Text {
            text: "ab".to_string(),
            atlas: test_atlas(),
        };
        let vertices = builder.build();
        assert_eq!(vertices.len(), 12);
        // Second glyph starts after the first glyph's advance
        assert_eq!(vertices[6].pos[0], 9.0);
    }

    #[test]
    fn text_skips_unknown_glyphs_and_handles_newlines() {
        let builder = MeshBuilder::Text {
            text: "a\nz b".to_string(),
            atlas: test_atlas(),
        };
        let vertices = builder.build();
        // 'z', ' ' missing from the atlas: only 'a' and 'b' produce quads
        assert_eq!(vertices.len(), 12);
        // 'b' sits on the second line
        assert_eq!(vertices[6].pos[1], 18.0);
    }

    #[test]
    fn mesh_builder_returns_supplied_vertices() {
        let triangle = vec![
            RenderingVertex {
                pos: [0.0, -0.5, 0.0],
                color: [1.0, 0.0, 0.0],
                texcoord: [0.5, 0.0],
                normal: [0.0, 0.0, 1.0],
            };
            3
        ];
        let builder = MeshBuilder::Mesh {
            vertices: triangle.clone(),
        };
        assert_eq!(builder.build(), triangle);
    }
}
