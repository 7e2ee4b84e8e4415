//! Main renderer orchestration.
//!
//! This module provides the [`Renderer`] struct that owns every Vulkan object
//! needed to draw the triangle into a swapchain, and the Vulkan
//! implementation of [`FrameBackend`].

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use trigon_rhi::command::CommandPool;
use trigon_rhi::device::Device;
use trigon_rhi::framebuffer::{Framebuffer, create_framebuffers};
use trigon_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use trigon_rhi::render_pass::RenderPass;
use trigon_rhi::shader::{Shader, ShaderStage};
use trigon_rhi::swapchain::Swapchain;
use trigon_rhi::{RhiError, RhiResult};

use crate::frame::FrameCursor;
use crate::frame_manager::{self, Acquired, FrameBackend, FrameData, FrameStatus, Presented};
use crate::recording::{TriangleDraw, record_triangle};

/// Renders the triangle into the images of one swapchain.
///
/// # Resource Destruction Order
///
/// Drop waits for the device to go idle, then fields are dropped in
/// declaration order:
/// 1. Framebuffers
/// 2. Graphics pipeline
/// 3. Pipeline layout
/// 4. Render pass
/// 5. Per-frame semaphores and fences
/// 6. Command pool (frees the command buffers)
///
/// The swapchain is borrowed, not owned, and must outlive the renderer.
pub struct Renderer {
    /// One framebuffer per swapchain image view, in image order.
    framebuffers: Vec<Framebuffer>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    render_pass: RenderPass,
    /// Per-frame command buffers and sync objects.
    frames: Vec<FrameData>,
    command_pool: CommandPool,
    /// Frames presented so far; selects the frame slot.
    cursor: FrameCursor,
    /// Extent the pipeline and framebuffers were built for.
    extent: vk::Extent2D,
    device: Arc<Device>,
}

impl Renderer {
    /// Creates the renderer for `swapchain`.
    ///
    /// Loads the vertex and fragment SPIR-V from the given paths; both shader
    /// modules are destroyed again once the pipeline exists.
    ///
    /// # Errors
    ///
    /// Returns the error of the first construction step that fails. Objects
    /// created by earlier steps are destroyed on return.
    pub fn new(
        device: Arc<Device>,
        swapchain: &Swapchain,
        vertex_shader: &Path,
        fragment_shader: &Path,
    ) -> RhiResult<Self> {
        let extent = swapchain.extent();

        info!(
            "Initializing renderer ({}x{}, {} swapchain images)",
            extent.width,
            extent.height,
            swapchain.image_count()
        );

        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;

        let (pipeline_layout, pipeline) = {
            let vertex = Shader::from_spirv_file(device.clone(), vertex_shader, ShaderStage::Vertex)?;
            let fragment =
                Shader::from_spirv_file(device.clone(), fragment_shader, ShaderStage::Fragment)?;

            let layout = PipelineLayout::empty(device.clone())?;
            let pipeline = Self::create_triangle_pipeline(
                device.clone(),
                &vertex,
                &fragment,
                &render_pass,
                &layout,
                extent,
            )?;

            (layout, pipeline)
        };

        let framebuffers =
            create_framebuffers(&device, &render_pass, swapchain.image_views(), extent)?;

        let command_pool = CommandPool::new(device.clone(), device.queue_families().graphics)?;
        let frames = FrameData::create_all(&device, &command_pool)?;

        info!("Renderer initialized");

        Ok(Self {
            framebuffers,
            pipeline,
            pipeline_layout,
            render_pass,
            frames,
            command_pool,
            cursor: FrameCursor::new(),
            extent,
            device,
        })
    }

    /// Creates the fixed-function pipeline for the hard-coded triangle.
    fn create_triangle_pipeline(
        device: Arc<Device>,
        vertex: &Shader,
        fragment: &Shader,
        render_pass: &RenderPass,
        layout: &PipelineLayout,
        extent: vk::Extent2D,
    ) -> RhiResult<Pipeline> {
        GraphicsPipelineBuilder::new()
            .vertex_shader(vertex)
            .fragment_shader(fragment)
            .viewport_extent(extent)
            .render_pass(render_pass, 0)
            .build(device, layout)
    }

    /// Draws one frame into `swapchain`.
    ///
    /// `swapchain` must be the swapchain the renderer was created for.
    ///
    /// # Errors
    ///
    /// Returns a per-frame error (acquire, record, submit, present) or a
    /// failed fence operation. An out-of-date swapchain is not an error.
    pub fn draw_frame(&mut self, swapchain: &Swapchain) -> RhiResult<FrameStatus> {
        debug_assert_eq!(swapchain.extent(), self.extent);

        let mut backend = VulkanFrames {
            device: &self.device,
            swapchain,
            frames: &self.frames,
            framebuffers: &self.framebuffers,
            render_pass: self.render_pass.handle(),
            pipeline: self.pipeline.handle(),
            extent: self.extent,
        };

        frame_manager::draw_frame(&mut self.cursor, &mut backend)
    }

    /// Number of frames submitted and presented so far.
    #[inline]
    pub fn frames_drawn(&self) -> u64 {
        self.cursor.frame_count()
    }

    /// Framebuffers in swapchain image order; `framebuffers()[i]` targets
    /// `swapchain.image_views()[i]`.
    #[inline]
    pub fn framebuffers(&self) -> &[Framebuffer] {
        &self.framebuffers
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Frames still executing reference every object below.
        if let Err(e) = self.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        info!(
            "Destroying renderer after {} frames",
            self.cursor.frame_count()
        );
    }
}

/// [`FrameBackend`] over the renderer's Vulkan objects for one frame.
struct VulkanFrames<'a> {
    device: &'a Device,
    swapchain: &'a Swapchain,
    frames: &'a [FrameData],
    framebuffers: &'a [Framebuffer],
    render_pass: vk::RenderPass,
    pipeline: vk::Pipeline,
    extent: vk::Extent2D,
}

impl FrameBackend for VulkanFrames<'_> {
    type Error = RhiError;

    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frames[slot].sync().in_flight_fence().wait(u64::MAX)
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<Acquired> {
        let semaphore = self.frames[slot].sync().image_available_semaphore().handle();

        match self.swapchain.acquire_next_image(semaphore) {
            Ok((image_index, suboptimal)) => Ok(Acquired::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
            Err(code) => Err(RhiError::Acquire(code)),
        }
    }

    fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frames[slot].sync().in_flight_fence().reset()
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let command_buffer = self.frames[slot].command_buffer();
        command_buffer.reset()?;

        let draw = TriangleDraw {
            render_pass: self.render_pass,
            framebuffer: self.framebuffers[image_index as usize].handle(),
            extent: self.extent,
            pipeline: self.pipeline,
        };

        record_triangle(command_buffer, &draw)
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        let frame = &self.frames[slot];

        let wait_semaphores = [frame.sync().image_available_semaphore().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.sync().render_finished_semaphore().handle()];
        let command_buffers = [frame.command_buffer().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .handle()
                .queue_submit(
                    self.device.graphics_queue(),
                    &[submit_info],
                    frame.sync().in_flight_fence().handle(),
                )
                .map_err(RhiError::Submit)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<Presented> {
        let wait_semaphore = self.frames[slot].sync().render_finished_semaphore().handle();

        match self
            .swapchain
            .present(self.device.present_queue(), image_index, wait_semaphore)
        {
            Ok(false) => Ok(Presented::Optimal),
            Ok(true) => Ok(Presented::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Presented::OutOfDate),
            Err(code) => Err(RhiError::Present(code)),
        }
    }
}
