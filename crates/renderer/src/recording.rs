//! Command buffer recording for the triangle pass.

use ash::vk;

use trigon_rhi::command::CommandBuffer;
use trigon_rhi::{RhiError, RhiResult};

/// Clear color for the swapchain image: opaque dark grey.
pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Vertices in the hard-coded triangle.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// The subset of command buffer operations the triangle pass records.
pub trait CommandRecorder {
    fn begin(&self) -> RhiResult<()>;
    fn begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo, contents: vk::SubpassContents);
    fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);
    fn draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn end_render_pass(&self);
    fn end(&self) -> RhiResult<()>;
}

impl CommandRecorder for CommandBuffer {
    fn begin(&self) -> RhiResult<()> {
        CommandBuffer::begin(self)
    }

    fn begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo, contents: vk::SubpassContents) {
        CommandBuffer::begin_render_pass(self, begin_info, contents);
    }

    fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        CommandBuffer::bind_pipeline(self, bind_point, pipeline);
    }

    fn draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        CommandBuffer::draw(self, vertex_count, instance_count, first_vertex, first_instance);
    }

    fn end_render_pass(&self) {
        CommandBuffer::end_render_pass(self);
    }

    fn end(&self) -> RhiResult<()> {
        CommandBuffer::end(self)
    }
}

/// Handles needed to record one triangle frame.
#[derive(Clone, Copy, Debug)]
pub struct TriangleDraw {
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the acquired swapchain image.
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
}

/// Records the triangle pass into `recorder`.
///
/// One render pass over the full extent, cleared to [`CLEAR_COLOR`], with a
/// single draw of [`TRIANGLE_VERTEX_COUNT`] vertices.
///
/// # Errors
///
/// Returns [`RhiError::Record`] if beginning or ending the command buffer
/// fails.
pub fn record_triangle<R: CommandRecorder + ?Sized>(
    recorder: &R,
    draw: &TriangleDraw,
) -> Result<(), RhiError> {
    recorder.begin()?;

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: CLEAR_COLOR,
        },
    }];

    let begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(draw.render_pass)
        .framebuffer(draw.framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: draw.extent,
        })
        .clear_values(&clear_values);

    recorder.begin_render_pass(&begin_info, vk::SubpassContents::INLINE);
    recorder.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, draw.pipeline);
    recorder.draw(TRIANGLE_VERTEX_COUNT, 1, 0, 0);
    recorder.end_render_pass();

    recorder.end()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use ash::vk::Handle;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Command {
        Begin,
        BeginRenderPass {
            render_pass: vk::RenderPass,
            framebuffer: vk::Framebuffer,
            area: (i32, i32, u32, u32),
            clear: [f32; 4],
            contents: vk::SubpassContents,
        },
        BindPipeline(vk::PipelineBindPoint, vk::Pipeline),
        Draw(u32, u32, u32, u32),
        EndRenderPass,
        End,
    }

    #[derive(Default)]
    struct RecordingMock {
        commands: RefCell<Vec<Command>>,
        fail_end: bool,
    }

    impl CommandRecorder for RecordingMock {
        fn begin(&self) -> RhiResult<()> {
            self.commands.borrow_mut().push(Command::Begin);
            Ok(())
        }

        fn begin_render_pass(
            &self,
            begin_info: &vk::RenderPassBeginInfo,
            contents: vk::SubpassContents,
        ) {
            // SAFETY: the clear value array outlives the call and holds one entry.
            let clear = unsafe { (*begin_info.p_clear_values).color.float32 };
            let area = begin_info.render_area;
            assert_eq!(begin_info.clear_value_count, 1);
            self.commands.borrow_mut().push(Command::BeginRenderPass {
                render_pass: begin_info.render_pass,
                framebuffer: begin_info.framebuffer,
                area: (
                    area.offset.x,
                    area.offset.y,
                    area.extent.width,
                    area.extent.height,
                ),
                clear,
                contents,
            });
        }

        fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
            self.commands
                .borrow_mut()
                .push(Command::BindPipeline(bind_point, pipeline));
        }

        fn draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
            self.commands.borrow_mut().push(Command::Draw(
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            ));
        }

        fn end_render_pass(&self) {
            self.commands.borrow_mut().push(Command::EndRenderPass);
        }

        fn end(&self) -> RhiResult<()> {
            self.commands.borrow_mut().push(Command::End);
            if self.fail_end {
                return Err(RhiError::Record(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            Ok(())
        }
    }

    fn triangle_draw() -> TriangleDraw {
        TriangleDraw {
            render_pass: vk::RenderPass::from_raw(0x10),
            framebuffer: vk::Framebuffer::from_raw(0x20),
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            pipeline: vk::Pipeline::from_raw(0x30),
        }
    }

    #[test]
    fn test_records_triangle_pass_in_order() {
        let mock = RecordingMock::default();
        let draw = triangle_draw();

        record_triangle(&mock, &draw).unwrap();

        assert_eq!(
            *mock.commands.borrow(),
            vec![
                Command::Begin,
                Command::BeginRenderPass {
                    render_pass: draw.render_pass,
                    framebuffer: draw.framebuffer,
                    area: (0, 0, 800, 600),
                    clear: [0.1, 0.1, 0.1, 1.0],
                    contents: vk::SubpassContents::INLINE,
                },
                Command::BindPipeline(vk::PipelineBindPoint::GRAPHICS, draw.pipeline),
                Command::Draw(3, 1, 0, 0),
                Command::EndRenderPass,
                Command::End,
            ]
        );
    }

    #[test]
    fn test_single_draw_bracketed_by_render_pass() {
        let mock = RecordingMock::default();
        record_triangle(&mock, &triangle_draw()).unwrap();

        let commands = mock.commands.borrow();
        let count = |pred: fn(&Command) -> bool| commands.iter().filter(|c| pred(c)).count();
        assert_eq!(count(|c| matches!(c, Command::Begin)), 1);
        assert_eq!(count(|c| matches!(c, Command::End)), 1);
        assert_eq!(count(|c| matches!(c, Command::BeginRenderPass { .. })), 1);
        assert_eq!(count(|c| matches!(c, Command::EndRenderPass)), 1);
        assert_eq!(count(|c| matches!(c, Command::Draw(..))), 1);
    }

    #[test]
    fn test_end_failure_is_record_error() {
        let mock = RecordingMock {
            fail_end: true,
            ..Default::default()
        };

        let err = record_triangle(&mock, &triangle_draw()).unwrap_err();

        assert!(matches!(
            err,
            RhiError::Record(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        ));
    }
}
