//! Graphics pipeline with shared per-user descriptor state
//!
//! One [`Pipeline`] is shared by every renderer whose settings signature
//! matches (see the pipeline manager). Sharing works through user slots:
//! each user gets its own uniform buffer and descriptor set per frame in
//! flight, so renderers push independent matrices through a single pipeline
//! and descriptor-set layout.

use ash::{vk, Device};
use std::cell::RefCell;
use std::ffi::CStr;
use std::path::PathBuf;

use super::buffer::Buffer;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::render_pass::RenderPass;
use super::shader::ShaderModule;
use super::texture::TextureImage;
use crate::render::vertex::{MatrixUbo, RenderingVertex};

/// Maximum renderer users sharing one pipeline
///
/// Bounds the descriptor pool created per pipeline; exceeding it is a
/// resource-exhaustion error at `allocate_new_user_data` time.
pub const MAX_PIPELINE_USERS: usize = 64;

/// Vertex and fragment shader pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDefinition {
    /// Path to the vertex stage SPIR-V
    pub vertex: PathBuf,
    /// Path to the fragment stage SPIR-V
    pub fragment: PathBuf,
}

/// One binding in the pipeline's descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorLayoutSettings {
    /// Binding index
    pub binding: u32,
    /// Descriptor count at this binding
    pub count: u32,
    /// Descriptor type
    pub descriptor_type: vk::DescriptorType,
    /// Shader stages that access the binding
    pub stage_flags: vk::ShaderStageFlags,
}

/// Cache signature for pipeline lookup
///
/// Two requests with equal settings must resolve to the same pipeline
/// object; anything that changes compiled pipeline state belongs here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Shader pair
    pub shader: ShaderDefinition,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Face culling mode
    pub cull_mode: vk::CullModeFlags,
    /// Descriptor set layout bindings
    pub descriptor_layout_settings: Vec<DescriptorLayoutSettings>,
}

impl PipelineSettings {
    /// Default settings: triangle list, back-face culling, a matrix uniform
    /// at binding 0 and a combined image sampler at binding 1
    pub fn default_with_shader(shader: ShaderDefinition) -> Self {
        Self {
            shader,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            descriptor_layout_settings: vec![
                DescriptorLayoutSettings {
                    binding: 0,
                    count: 1,
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    stage_flags: vk::ShaderStageFlags::VERTEX,
                },
                DescriptorLayoutSettings {
                    binding: 1,
                    count: 1,
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    stage_flags: vk::ShaderStageFlags::FRAGMENT,
                },
            ],
        }
    }
}

/// Per-user descriptor state: one uniform buffer and one descriptor set for
/// each frame in flight
struct PipelineUserData {
    uniform_buffers: Vec<Buffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
}

/// Graphics pipeline plus its descriptor machinery and user slots
pub struct Pipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_layout_settings: Vec<DescriptorLayoutSettings>,
    user_data: RefCell<Vec<PipelineUserData>>,
    frames_in_flight: usize,
}

impl Pipeline {
    /// Build a pipeline for the given settings against a render pass
    ///
    /// Expensive: loads and compiles both shader stages and creates the
    /// descriptor pool. The manager caches the result for the renderer
    /// engine's lifetime.
    pub fn new(
        ctx: &VulkanContext,
        settings: &PipelineSettings,
        render_pass: &RenderPass,
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        let device = ctx.device_clone();

        let vertex_shader = ShaderModule::from_file(device.clone(), &settings.shader.vertex)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), &settings.shader.fragment)?;

        let entry = CStr::from_bytes_with_nul(b"main\0").unwrap();
        let shader_stages = [
            vertex_shader.create_stage_info(vk::ShaderStageFlags::VERTEX, entry),
            fragment_shader.create_stage_info(vk::ShaderStageFlags::FRAGMENT, entry),
        ];

        let binding_descriptions = [RenderingVertex::binding_description()];
        let attribute_descriptions = RenderingVertex::attribute_descriptions();
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(settings.topology)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; the engine sets them to the
        // current swapchain extent every frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(settings.cull_mode)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(render_pass.samples());

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();

        let color_blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let descriptor_set_layout =
            Self::create_descriptor_set_layout(&device, &settings.descriptor_layout_settings)?;

        let set_layouts = [descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, err)| VulkanError::Api(err))?
        };
        let pipeline = pipelines[0];

        let descriptor_pool = Self::create_descriptor_pool(
            &device,
            &settings.descriptor_layout_settings,
            frames_in_flight,
        )?;

        Ok(Self {
            device,
            pipeline,
            layout,
            descriptor_set_layout,
            descriptor_pool,
            descriptor_layout_settings: settings.descriptor_layout_settings.clone(),
            user_data: RefCell::new(Vec::new()),
            frames_in_flight,
        })
    }

    fn create_descriptor_set_layout(
        device: &Device,
        settings: &[DescriptorLayoutSettings],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = settings
            .iter()
            .map(|s| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(s.binding)
                    .descriptor_count(s.count)
                    .descriptor_type(s.descriptor_type)
                    .stage_flags(s.stage_flags)
                    .build()
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn create_descriptor_pool(
        device: &Device,
        settings: &[DescriptorLayoutSettings],
        frames_in_flight: usize,
    ) -> VulkanResult<vk::DescriptorPool> {
        let capacity = (frames_in_flight * MAX_PIPELINE_USERS) as u32;

        let pool_sizes: Vec<vk::DescriptorPoolSize> = settings
            .iter()
            .map(|s| vk::DescriptorPoolSize {
                ty: s.descriptor_type,
                descriptor_count: s.count * capacity,
            })
            .collect();

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(capacity);

        unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Allocate a fresh user slot on this pipeline
    ///
    /// Creates one persistently mapped uniform buffer and one descriptor set
    /// per frame in flight, writes the uniform binding, and returns the slot
    /// index the renderer uses for all later calls.
    pub fn allocate_new_user_data(&self, ctx: &VulkanContext) -> VulkanResult<usize> {
        let mut users = self.user_data.borrow_mut();

        if users.len() >= MAX_PIPELINE_USERS {
            return Err(VulkanError::ResourceExhausted {
                requested: std::mem::size_of::<MatrixUbo>() as u64,
                result: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            });
        }

        let mut uniform_buffers = Vec::with_capacity(self.frames_in_flight);
        for _ in 0..self.frames_in_flight {
            uniform_buffers.push(Buffer::uniform(
                ctx,
                std::mem::size_of::<MatrixUbo>() as vk::DeviceSize,
            )?);
        }

        let set_layouts = vec![self.descriptor_set_layout; self.frames_in_flight];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&set_layouts);

        let descriptor_sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        // Uniform binding is known now; the sampler binding is written once
        // the renderer supplies a texture
        for (buffer, &set) in uniform_buffers.iter().zip(descriptor_sets.iter()) {
            let buffer_info = [vk::DescriptorBufferInfo {
                buffer: buffer.handle(),
                offset: 0,
                range: std::mem::size_of::<MatrixUbo>() as vk::DeviceSize,
            }];

            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info)
                .build();

            unsafe {
                self.device.update_descriptor_sets(&[write], &[]);
            }
        }

        users.push(PipelineUserData {
            uniform_buffers,
            descriptor_sets,
        });

        Ok(users.len() - 1)
    }

    /// Write the combined-image-sampler binding for a user's descriptor sets
    ///
    /// No-op when the pipeline layout has no sampler binding.
    pub fn write_user_texture(
        &self,
        user_index: usize,
        texture: &TextureImage,
    ) -> VulkanResult<()> {
        let Some(sampler_binding) = self
            .descriptor_layout_settings
            .iter()
            .find(|s| s.descriptor_type == vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        else {
            return Ok(());
        };

        let view = texture.image.view().ok_or(VulkanError::InvalidOperation {
            reason: "texture has no image view".to_string(),
        })?;
        let sampler = texture.sampler().ok_or(VulkanError::InvalidOperation {
            reason: "texture has no sampler".to_string(),
        })?;

        let users = self.user_data.borrow();
        let user = &users[user_index];

        for &set in &user.descriptor_sets {
            let image_info = [vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }];

            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(sampler_binding.binding)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info)
                .build();

            unsafe {
                self.device.update_descriptor_sets(&[write], &[]);
            }
        }

        Ok(())
    }

    /// Write a user's uniform buffer for the given frame slot
    ///
    /// Must only be called after the frame slot's fence wait, otherwise the
    /// GPU may still be reading the buffer.
    pub fn update_uniform(
        &self,
        user_index: usize,
        frame: usize,
        ubo: &MatrixUbo,
    ) -> VulkanResult<()> {
        let mut users = self.user_data.borrow_mut();
        let user = &mut users[user_index];
        user.uniform_buffers[frame].write_data(std::slice::from_ref(ubo))
    }

    /// Bind the pipeline and the user's descriptor set for a frame slot
    pub fn bind(&self, command_buffer: vk::CommandBuffer, user_index: usize, frame: usize) {
        let users = self.user_data.borrow();
        let set = users[user_index].descriptor_sets[frame];

        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                0,
                &[set],
                &[],
            );
        }
    }

    /// Get the pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get the pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Number of allocated user slots
    pub fn user_count(&self) -> usize {
        self.user_data.borrow().len()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            // Uniform buffers free themselves; sets go with the pool
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(vertex: &str, topology: vk::PrimitiveTopology) -> PipelineSettings {
        PipelineSettings {
            shader: ShaderDefinition {
                vertex: PathBuf::from(vertex),
                fragment: PathBuf::from("default_frag.spv"),
            },
            topology,
            cull_mode: vk::CullModeFlags::BACK,
            descriptor_layout_settings: vec![],
        }
    }

    #[test]
    fn identical_settings_compare_equal() {
        let a = settings("default_vert.spv", vk::PrimitiveTopology::TRIANGLE_LIST);
        let b = settings("default_vert.spv", vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(a, b);
    }

    #[test]
    fn topology_changes_the_signature() {
        let a = settings("default_vert.spv", vk::PrimitiveTopology::TRIANGLE_LIST);
        let b = settings("default_vert.spv", vk::PrimitiveTopology::LINE_LIST);
        assert_ne!(a, b);
    }

    #[test]
    fn shader_path_changes_the_signature() {
        let a = settings("default_vert.spv", vk::PrimitiveTopology::TRIANGLE_LIST);
        let b = settings("text_vert.spv", vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_ne!(a, b);
    }

    #[test]
    fn descriptor_layout_changes_the_signature() {
        let a = PipelineSettings::default_with_shader(ShaderDefinition {
            vertex: PathBuf::from("default_vert.spv"),
            fragment: PathBuf::from("default_frag.spv"),
        });
        let mut b = a.clone();
        b.descriptor_layout_settings.pop();
        assert_ne!(a, b);
    }
}
