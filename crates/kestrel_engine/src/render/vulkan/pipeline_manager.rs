//! Pipeline cache keyed by settings signature
//!
//! Renderers with identical shader/topology/descriptor-layout settings share
//! one pipeline object and get a private user slot on it instead of a
//! duplicate pipeline. Pipelines are never evicted; they live as long as the
//! rendering engine. Lookup is a linear scan — the number of distinct
//! pipeline configurations is bounded by content, not object count.

use std::rc::Rc;

use super::context::{VulkanContext, VulkanResult};
use super::pipeline::{Pipeline, PipelineSettings};
use super::render_pass::RenderPass;

/// Owns every pipeline built for the engine, deduplicated by settings
pub struct PipelineManager {
    pipelines: Vec<(PipelineSettings, Rc<Pipeline>)>,
    frames_in_flight: usize,
}

impl PipelineManager {
    /// Create an empty cache
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            pipelines: Vec::new(),
            frames_in_flight,
        }
    }

    /// Get a pipeline for the given settings plus a fresh user slot on it
    ///
    /// A cache hit allocates a new user slot on the existing pipeline; a
    /// miss builds the pipeline (shader load, compile, descriptor pool) and
    /// inserts it. Identical settings always return the same pipeline
    /// object.
    pub fn get_pipeline(
        &mut self,
        ctx: &VulkanContext,
        render_pass: &RenderPass,
        settings: &PipelineSettings,
    ) -> VulkanResult<(usize, Rc<Pipeline>)> {
        // O(N) over distinct configurations
        if let Some((_, pipeline)) = self.pipelines.iter().find(|(s, _)| s == settings) {
            let user_index = pipeline.allocate_new_user_data(ctx)?;
            return Ok((user_index, Rc::clone(pipeline)));
        }

        log::debug!(
            "Creating new pipeline (no usable pipeline found), current pipelines: {}",
            self.pipelines.len()
        );

        let pipeline = Rc::new(Pipeline::new(
            ctx,
            settings,
            render_pass,
            self.frames_in_flight,
        )?);
        self.pipelines.push((settings.clone(), Rc::clone(&pipeline)));

        let user_index = pipeline.allocate_new_user_data(ctx)?;
        Ok((user_index, pipeline))
    }

    /// Number of distinct pipelines in the cache
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}
