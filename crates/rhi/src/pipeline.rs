//! The triangle's pipeline and its (empty) layout.
//!
//! [`GraphicsPipelineBuilder`] fills in the fixed-function state for a
//! pipeline bound to one subpass of a [`RenderPass`], with the viewport and
//! scissor baked in rather than dynamic.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use trigon_rhi::device::Device;
//! use trigon_rhi::render_pass::RenderPass;
//! use trigon_rhi::shader::{Shader, ShaderStage};
//! use trigon_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>, render_pass: &RenderPass) -> Result<(), trigon_rhi::RhiError> {
//! let vertex_shader =
//!     Shader::from_spirv_file(device.clone(), Path::new("shaders/vert.spv"), ShaderStage::Vertex)?;
//! let fragment_shader =
//!     Shader::from_spirv_file(device.clone(), Path::new("shaders/frag.spv"), ShaderStage::Fragment)?;
//!
//! let layout = PipelineLayout::empty(device.clone())?;
//!
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vertex_shader)
//!     .fragment_shader(&fragment_shader)
//!     .render_pass(render_pass, 0)
//!     .viewport_extent(vk::Extent2D { width: 800, height: 600 })
//!     .build(device.clone(), &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::shader::Shader;

/// Owned `VkPipelineLayout`.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout with no descriptor sets and no push constants.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineLayoutCreate`] if creation fails.
    pub fn empty(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default();

        let layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&create_info, None)
                .map_err(RhiError::PipelineLayoutCreate)?
        };

        debug!("Created empty pipeline layout");

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Owned graphics `VkPipeline`. Only ever bound at the graphics bind point.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

/// Every three vertices form one filled triangle; no primitive restart.
fn input_assembly_state() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
    vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
}

/// Filled polygons, back faces culled, clockwise winding (in framebuffer
/// coordinates, y down) counts as front-facing.
fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
}

fn multisample_state() -> vk::PipelineMultisampleStateCreateInfo<'static> {
    vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .min_sample_shading(1.0)
}

/// Blending off, all four channels written.
fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

/// Viewport covering `extent` with depth range [0, 1].
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor rectangle covering `extent`.
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Builds a graphics pipeline for one render pass subpass.
///
/// Shaders, render pass and viewport extent must be set. The fixed-function
/// state is the triangle's: a triangle list with no vertex input, filled,
/// back faces culled, clockwise front faces, one sample, no depth test and
/// one unblended RGBA attachment. No state is dynamic.
#[derive(Default)]
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    viewport_extent: Option<vk::Extent2D>,
    render_pass: Option<&'a RenderPass>,
    subpass: u32,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Bakes a viewport and scissor covering `extent` into the pipeline.
    pub fn viewport_extent(mut self, extent: vk::Extent2D) -> Self {
        self.viewport_extent = Some(extent);
        self
    }

    /// The pipeline may only be bound inside `subpass` of `render_pass` or a
    /// compatible render pass.
    pub fn render_pass(mut self, render_pass: &'a RenderPass, subpass: u32) -> Self {
        self.render_pass = Some(render_pass);
        self.subpass = subpass;
        self
    }

    fn required(&self) -> RhiResult<(&'a Shader, &'a Shader, &'a RenderPass, vk::Extent2D)> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::InvalidPipeline("Vertex shader is required".to_string()))?;

        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::InvalidPipeline("Fragment shader is required".to_string()))?;

        let render_pass = self
            .render_pass
            .ok_or_else(|| RhiError::InvalidPipeline("Render pass is required".to_string()))?;

        let extent = self
            .viewport_extent
            .ok_or_else(|| RhiError::InvalidPipeline("Viewport extent is required".to_string()))?;

        Ok((vertex_shader, fragment_shader, render_pass, extent))
    }

    /// # Errors
    ///
    /// - [`RhiError::InvalidPipeline`] if a shader, the render pass or the
    ///   viewport extent is missing
    /// - [`RhiError::PipelineCreate`] if `vkCreateGraphicsPipelines` fails
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let (vertex_shader, fragment_shader, render_pass, extent) = self.required()?;

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        // Vertices come from gl_VertexIndex in the shader.
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly_state = input_assembly_state();

        let viewports = [full_viewport(extent)];
        let scissors = [full_scissor(extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = rasterization_state();
        let multisample_state = multisample_state();

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [color_blend_attachment()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(self.subpass);

        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, result)| RhiError::PipelineCreate(result))?
        }
        .into_iter()
        .next()
        .ok_or(RhiError::PipelineCreate(vk::Result::ERROR_UNKNOWN))?;

        info!(
            "Graphics pipeline created for {}x{} (subpass {})",
            extent.width, extent.height, self.subpass
        );

        Ok(Pipeline { device, pipeline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_list_without_restart() {
        let state = input_assembly_state();
        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.primitive_restart_enable, vk::FALSE);
    }

    #[test]
    fn test_rasterization_state() {
        let state = rasterization_state();
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(state.line_width, 1.0);
        assert_eq!(state.rasterizer_discard_enable, vk::FALSE);
        assert_eq!(state.depth_clamp_enable, vk::FALSE);
    }

    #[test]
    fn test_single_sample() {
        let state = multisample_state();
        assert_eq!(state.rasterization_samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(state.sample_shading_enable, vk::FALSE);
    }

    #[test]
    fn test_color_blend_attachment_writes_rgba_unblended() {
        let state = color_blend_attachment();
        assert_eq!(state.blend_enable, vk::FALSE);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn test_graphics_pipeline_builder_default() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert!(builder.render_pass.is_none());
        assert_eq!(builder.subpass, 0);
        assert!(builder.viewport_extent.is_none());
    }

    #[test]
    fn test_viewport_extent_setter() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let builder = GraphicsPipelineBuilder::new().viewport_extent(extent);
        assert_eq!(builder.viewport_extent, Some(extent));
    }

    #[test]
    fn test_missing_shader_is_invalid() {
        let result = GraphicsPipelineBuilder::new().required();
        match result {
            Err(RhiError::InvalidPipeline(msg)) => assert!(msg.contains("Vertex shader")),
            _ => panic!("expected InvalidPipeline"),
        }
    }

    #[test]
    fn test_full_viewport_and_scissor() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };

        let viewport = full_viewport(extent);
        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (800.0, 600.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

        let scissor = full_scissor(extent);
        assert_eq!(scissor.offset, vk::Offset2D { x: 0, y: 0 });
        assert_eq!(scissor.extent, extent);
    }
}
