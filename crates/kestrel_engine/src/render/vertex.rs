//! GPU-visible data layouts
//!
//! The vertex format shared by every renderer kind and the uniform payload
//! pushed into per-user uniform buffers. Both are `Pod` so uploads are plain
//! byte casts.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;

/// Vertex format consumed by all engine pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RenderingVertex {
    /// Position in model space
    pub pos: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Texture coordinate
    pub texcoord: [f32; 2],
    /// Normal in model space
    pub normal: [f32; 3],
}

impl RenderingVertex {
    /// Vertex buffer binding description (binding 0, per-vertex rate)
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions for locations 0..=3
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 32,
            },
        ]
    }
}

/// Per-object uniform payload: view-projection and model matrices
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MatrixUbo {
    /// Combined view-projection matrix
    pub vp: [[f32; 4]; 4],
    /// Model matrix
    pub model: [[f32; 4]; 4],
}

impl MatrixUbo {
    /// Build the payload from matrix types
    pub fn new(vp: Mat4, model: Mat4) -> Self {
        Self {
            vp: vp.into(),
            model: model.into(),
        }
    }
}

impl Default for MatrixUbo {
    fn default() -> Self {
        Self::new(Mat4::identity(), Mat4::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn vertex_stride_matches_binding() {
        assert_eq!(
            RenderingVertex::binding_description().stride as usize,
            std::mem::size_of::<RenderingVertex>()
        );
        assert_eq!(std::mem::size_of::<RenderingVertex>(), 44);
    }

    #[test]
    fn attribute_offsets_match_struct_layout() {
        let attrs = RenderingVertex::attribute_descriptions();
        assert_eq!(attrs[0].offset as usize, offset_of!(RenderingVertex, pos));
        assert_eq!(attrs[1].offset as usize, offset_of!(RenderingVertex, color));
        assert_eq!(attrs[2].offset as usize, offset_of!(RenderingVertex, texcoord));
        assert_eq!(attrs[3].offset as usize, offset_of!(RenderingVertex, normal));
    }

    #[test]
    fn attribute_locations_are_sequential() {
        let attrs = RenderingVertex::attribute_descriptions();
        for (i, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.location, i as u32);
            assert_eq!(attr.binding, 0);
        }
    }

    #[test]
    fn matrix_ubo_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<MatrixUbo>(), 128);
    }
}
