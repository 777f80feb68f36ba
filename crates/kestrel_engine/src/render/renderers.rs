//! Renderer object model
//!
//! A renderer ties one piece of geometry to a shared pipeline and a private
//! user slot on it. The kind set is closed and dispatched by `match`: 3D
//! meshes and the axis gizmo render in world space, sprites and text in
//! pixel space. Renderers record draw calls from inside the engine's render
//! callback; they never begin or end the render pass and never submit.

use ash::vk;
use std::rc::Rc;

use crate::foundation::math::{ortho_pixel_space, Mat4, Transform};
use crate::render::mesh_builders::{FontAtlas, MeshBuilder};
use crate::render::vertex::{MatrixUbo, RenderingVertex};
use crate::render::vulkan::{
    Buffer, Pipeline, PipelineSettings, ShaderDefinition, TextureImage, VulkanContext,
    VulkanRenderingEngine, VulkanResult,
};

/// The closed set of renderer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    /// Textured or untextured 3D mesh
    Mesh3D,
    /// Screen-space textured quad
    Sprite,
    /// Screen-space text quads
    Text,
    /// World-space coordinate axis gizmo
    AxisDebug,
}

/// One renderable object bound to a shared pipeline
pub struct Renderer {
    kind: RendererKind,
    pipeline: Rc<Pipeline>,
    user_index: usize,
    mesh_builder: MeshBuilder,
    vertex_buffer: Option<Buffer>,
    vertex_count: u32,
    texture: Option<Rc<TextureImage>>,
    view_projection: Mat4,
    transform: Transform,
    parent_transform: Transform,
    screen: vk::Extent2D,
    matrix_data: MatrixUbo,
    mesh_dirty: bool,
    matrices_dirty: bool,
    descriptors_dirty: bool,
}

impl Renderer {
    /// Create a renderer of the given kind
    ///
    /// Requests a pipeline from the engine's cache: the settings signature
    /// is derived from the shader pair, the kind's topology and whether a
    /// texture is bound, so renderers with matching configuration share one
    /// pipeline and differ only in their user slot.
    pub fn new(
        engine: &mut VulkanRenderingEngine,
        kind: RendererKind,
        mesh_builder: MeshBuilder,
        shader: ShaderDefinition,
        texture: Option<Rc<TextureImage>>,
    ) -> VulkanResult<Self> {
        let mut settings = PipelineSettings::default_with_shader(shader);
        if kind == RendererKind::AxisDebug {
            settings.topology = vk::PrimitiveTopology::LINE_LIST;
            settings.cull_mode = vk::CullModeFlags::NONE;
        }
        if texture.is_none() {
            // Untextured pipelines drop the sampler binding entirely
            settings
                .descriptor_layout_settings
                .retain(|s| s.descriptor_type != vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        }

        let (user_index, pipeline) = engine.get_pipeline(&settings)?;
        let screen = engine.swapchain_extent();
        let has_texture = texture.is_some();

        Ok(Self {
            kind,
            pipeline,
            user_index,
            mesh_builder,
            vertex_buffer: None,
            vertex_count: 0,
            texture,
            view_projection: Mat4::identity(),
            transform: Transform::default(),
            parent_transform: Transform::default(),
            screen,
            matrix_data: MatrixUbo::default(),
            mesh_dirty: true,
            matrices_dirty: true,
            descriptors_dirty: has_texture,
        })
    }

    /// Convenience constructor for a 3D mesh renderer
    pub fn new_mesh(
        engine: &mut VulkanRenderingEngine,
        vertices: Vec<RenderingVertex>,
        shader: ShaderDefinition,
        texture: Option<Rc<TextureImage>>,
    ) -> VulkanResult<Self> {
        Self::new(
            engine,
            RendererKind::Mesh3D,
            MeshBuilder::Mesh { vertices },
            shader,
            texture,
        )
    }

    /// Convenience constructor for a sprite renderer
    pub fn new_sprite(
        engine: &mut VulkanRenderingEngine,
        size: [f32; 2],
        shader: ShaderDefinition,
        texture: Rc<TextureImage>,
    ) -> VulkanResult<Self> {
        Self::new(
            engine,
            RendererKind::Sprite,
            MeshBuilder::Sprite { size },
            shader,
            Some(texture),
        )
    }

    /// Convenience constructor for a text renderer
    pub fn new_text(
        engine: &mut VulkanRenderingEngine,
        text: String,
        atlas: Rc<FontAtlas>,
        shader: ShaderDefinition,
        font_texture: Rc<TextureImage>,
    ) -> VulkanResult<Self> {
        Self::new(
            engine,
            RendererKind::Text,
            MeshBuilder::Text { text, atlas },
            shader,
            Some(font_texture),
        )
    }

    /// Convenience constructor for the axis debug renderer
    pub fn new_axis(
        engine: &mut VulkanRenderingEngine,
        shader: ShaderDefinition,
    ) -> VulkanResult<Self> {
        Self::new(engine, RendererKind::AxisDebug, MeshBuilder::Axis, shader, None)
    }

    /// Get this renderer's kind
    pub fn kind(&self) -> RendererKind {
        self.kind
    }

    /// Get the shared pipeline this renderer draws with
    pub fn pipeline(&self) -> &Rc<Pipeline> {
        &self.pipeline
    }

    /// Get this renderer's user slot on the shared pipeline
    pub fn user_index(&self) -> usize {
        self.user_index
    }

    /// Replace the mesh geometry; re-uploaded on the next render
    pub fn supply_mesh(&mut self, vertices: Vec<RenderingVertex>) {
        self.mesh_builder = MeshBuilder::Mesh { vertices };
        self.mesh_dirty = true;
    }

    /// Replace the text content of a text renderer
    pub fn supply_text(&mut self, text: String) {
        if let MeshBuilder::Text { text: current, .. } = &mut self.mesh_builder {
            *current = text;
            self.mesh_dirty = true;
        } else {
            log::warn!("supply_text called on a {:?} renderer", self.kind);
        }
    }

    /// Set the world-space view-projection matrix (3D kinds)
    pub fn set_view_projection(&mut self, vp: Mat4) {
        self.view_projection = vp;
        self.matrices_dirty = true;
    }

    /// Update this object's transform, its parent transform and the screen size
    pub fn update_transform(
        &mut self,
        transform: Transform,
        parent_transform: Transform,
        screen: vk::Extent2D,
    ) {
        self.transform = transform;
        self.parent_transform = parent_transform;
        self.screen = screen;
        self.matrices_dirty = true;
    }

    /// Rebuild the vertex buffer immediately instead of on the next render
    pub fn force_build(&mut self, ctx: &VulkanContext) -> VulkanResult<()> {
        self.rebuild_mesh(ctx)
    }

    fn rebuild_mesh(&mut self, ctx: &VulkanContext) -> VulkanResult<()> {
        let vertices = self.mesh_builder.build();
        self.vertex_count = vertices.len() as u32;

        if self.vertex_buffer.is_some() {
            // The old buffer may still be referenced by frames in flight;
            // its lifetime must be bounded by a full device wait
            ctx.wait_idle()?;
            self.vertex_buffer = None;
        }

        if !vertices.is_empty() {
            self.vertex_buffer = Some(Buffer::vertex_from_data(ctx, &vertices)?);
        }

        self.mesh_dirty = false;
        Ok(())
    }

    fn update_matrices(&mut self) {
        let model = self.parent_transform.to_matrix() * self.transform.to_matrix();

        let vp = match self.kind {
            RendererKind::Mesh3D | RendererKind::AxisDebug => self.view_projection,
            RendererKind::Sprite | RendererKind::Text => {
                ortho_pixel_space(self.screen.width as f32, self.screen.height as f32)
            }
        };

        self.matrix_data = MatrixUbo::new(vp, model);
        self.matrices_dirty = false;
    }

    /// Record this object's draw call into the frame's command buffer
    ///
    /// Called from the engine's render callback with the active command
    /// buffer, frame-slot index and render context.
    pub fn render(
        &mut self,
        ctx: &VulkanContext,
        command_buffer: vk::CommandBuffer,
        frame: usize,
    ) -> VulkanResult<()> {
        if self.mesh_dirty {
            self.rebuild_mesh(ctx)?;
        }

        if self.descriptors_dirty {
            if let Some(texture) = &self.texture {
                self.pipeline.write_user_texture(self.user_index, texture)?;
            }
            self.descriptors_dirty = false;
        }

        if self.matrices_dirty {
            self.update_matrices();
        }

        // Uniform writes are safe here: the engine has already waited on
        // this frame slot's fence
        self.pipeline
            .update_uniform(self.user_index, frame, &self.matrix_data)?;

        let Some(vertex_buffer) = &self.vertex_buffer else {
            return Ok(());
        };

        self.pipeline.bind(command_buffer, self.user_index, frame);

        unsafe {
            ctx.device().cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[vertex_buffer.handle()],
                &[0],
            );
            ctx.device().cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
        }

        Ok(())
    }
}
