//! Frame management and synchronization.
//!
//! This module provides the per-frame resources and the state machine that
//! drives one frame through acquire, record, submit and present.
//!
//! # Overview
//!
//! The frame manager implements a "frames in flight" pattern where multiple
//! frames can be processed concurrently:
//!
//! 1. While the GPU renders frame N, the CPU prepares frame N+1
//! 2. Each frame slot has its own command buffer, semaphores and fence
//! 3. The slot's fence keeps the CPU from re-recording a command buffer the
//!    GPU is still executing
//!
//! [`draw_frame`] is written against the [`FrameBackend`] trait so the
//! ordering of the steps can be checked without a GPU. The Vulkan
//! implementation lives in [`crate::renderer`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use trigon_rhi::RhiResult;
use trigon_rhi::command::{CommandBuffer, CommandPool};
use trigon_rhi::device::Device;
use trigon_rhi::sync::FrameSync;

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::frame::FrameCursor;

/// Per-frame rendering data.
///
/// # Synchronization Flow
///
/// ```text
/// 1. Wait on in_flight_fence (CPU waits for previous use of this slot)
/// 2. Acquire swapchain image (signals image_available_semaphore)
/// 3. Reset in_flight_fence, then reset and record command_buffer
/// 4. Submit command_buffer:
///    - Wait on image_available_semaphore
///    - Signal render_finished_semaphore
///    - Signal in_flight_fence
/// 5. Present (waits on render_finished_semaphore)
/// ```
pub struct FrameData {
    /// Command buffer for recording rendering commands.
    command_buffer: CommandBuffer,
    /// Semaphores and fence owned by this slot.
    sync: FrameSync,
}

impl FrameData {
    /// Allocates [`MAX_FRAMES_IN_FLIGHT`] command buffers from `command_pool`
    /// and creates one set of sync objects per slot.
    ///
    /// # Errors
    ///
    /// Returns an error if command buffer allocation or sync object creation
    /// fails. Sync objects already created are destroyed.
    pub fn create_all(device: &Arc<Device>, command_pool: &CommandPool) -> RhiResult<Vec<Self>> {
        let command_buffers = command_pool.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for (i, command_buffer) in command_buffers.into_iter().enumerate() {
            let sync = FrameSync::new(device.clone())?;
            debug!("Created frame data for frame {}", i);
            frames.push(Self {
                command_buffer,
                sync,
            });
        }

        info!(
            "Frame data created with {} frames in flight",
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(frames)
    }

    /// Returns a reference to the command buffer.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    /// Returns the slot's semaphores and fence.
    #[inline]
    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }
}

/// Outcome of acquiring a swapchain image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    /// An image is available; `suboptimal` is set when the swapchain no
    /// longer matches the surface exactly but can still be presented to.
    Ready { image_index: u32, suboptimal: bool },
    /// The swapchain can no longer be used with the surface.
    OutOfDate,
}

/// Outcome of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// What a call to [`draw_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and queued for presentation.
    Presented { slot: usize, image_index: u32 },
    /// Acquire reported an out-of-date swapchain; nothing was submitted and
    /// the cursor did not move.
    Skipped,
}

/// The GPU operations one frame is made of.
///
/// Every method receives the slot chosen by the [`FrameCursor`]. Recoverable
/// swapchain conditions are reported through [`Acquired`] and [`Presented`];
/// anything returned as `Err` ends the frame loop.
pub trait FrameBackend {
    type Error;

    /// Block until the slot's previous submission has completed.
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Acquire the next swapchain image, signaling the slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> Result<Acquired, Self::Error>;

    /// Return the slot's fence to the unsignaled state.
    fn reset_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Reset and record the slot's command buffer for `image_index`.
    fn record(&mut self, slot: usize, image_index: u32) -> Result<(), Self::Error>;

    /// Submit the slot's command buffer, signaling its render-finished
    /// semaphore and fence.
    fn submit(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Queue `image_index` for presentation after the slot's render-finished
    /// semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> Result<Presented, Self::Error>;
}

/// Draws one frame with the slot the cursor points at.
///
/// The fence is reset only once an image has been acquired, so an
/// out-of-date acquire leaves the slot's fence signaled and the next
/// iteration does not block on it.
///
/// # Errors
///
/// Propagates the first error returned by the backend.
pub fn draw_frame<B: FrameBackend>(
    cursor: &mut FrameCursor,
    backend: &mut B,
) -> Result<FrameStatus, B::Error> {
    let slot = cursor.slot();

    backend.wait_for_slot(slot)?;

    let image_index = match backend.acquire_image(slot)? {
        Acquired::Ready {
            image_index,
            suboptimal,
        } => {
            if suboptimal {
                debug!("Swapchain suboptimal during acquire");
            }
            image_index
        }
        Acquired::OutOfDate => {
            warn!("Swapchain out of date during acquire, skipping frame");
            return Ok(FrameStatus::Skipped);
        }
    };

    backend.reset_slot(slot)?;
    backend.record(slot, image_index)?;
    backend.submit(slot)?;

    match backend.present(slot, image_index)? {
        Presented::Optimal => {}
        Presented::Suboptimal => warn!("Swapchain suboptimal during present"),
        Presented::OutOfDate => warn!("Swapchain out of date during present"),
    }

    cursor.advance();

    Ok(FrameStatus::Presented { slot, image_index })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Reset(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum FenceState {
        Signaled,
        Unsignaled,
        Pending,
    }

    #[derive(Debug, PartialEq, Eq)]
    struct MockError(&'static str);

    /// Swapchain of three images handed out round-robin, with fences that
    /// complete as soon as they are waited on.
    struct MockBackend {
        calls: Vec<Call>,
        fences: [FenceState; MAX_FRAMES_IN_FLIGHT],
        next_image: u32,
        acquire_script: VecDeque<Acquired>,
        present_result: Presented,
        fail_submit: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                fences: [FenceState::Signaled; MAX_FRAMES_IN_FLIGHT],
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_result: Presented::Optimal,
                fail_submit: false,
            }
        }
    }

    impl FrameBackend for MockBackend {
        type Error = MockError;

        fn wait_for_slot(&mut self, slot: usize) -> Result<(), MockError> {
            self.calls.push(Call::Wait(slot));
            match self.fences[slot] {
                FenceState::Unsignaled => Err(MockError("wait on a fence nothing will signal")),
                _ => {
                    self.fences[slot] = FenceState::Signaled;
                    Ok(())
                }
            }
        }

        fn acquire_image(&mut self, slot: usize) -> Result<Acquired, MockError> {
            self.calls.push(Call::Acquire(slot));
            if let Some(scripted) = self.acquire_script.pop_front() {
                return Ok(scripted);
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % 3;
            Ok(Acquired::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn reset_slot(&mut self, slot: usize) -> Result<(), MockError> {
            self.calls.push(Call::Reset(slot));
            assert_eq!(self.fences[slot], FenceState::Signaled);
            self.fences[slot] = FenceState::Unsignaled;
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> Result<(), MockError> {
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> Result<(), MockError> {
            self.calls.push(Call::Submit(slot));
            if self.fail_submit {
                return Err(MockError("submit"));
            }
            assert_eq!(self.fences[slot], FenceState::Unsignaled);
            self.fences[slot] = FenceState::Pending;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> Result<Presented, MockError> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.present_result)
        }
    }

    #[test]
    fn test_single_frame_call_order() {
        let mut cursor = FrameCursor::new();
        let mut backend = MockBackend::new();

        let status = draw_frame(&mut cursor, &mut backend).unwrap();

        assert_eq!(
            status,
            FrameStatus::Presented {
                slot: 0,
                image_index: 0
            }
        );
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(cursor.frame_count(), 1);
    }

    #[test]
    fn test_sixty_frames_advance_cursor_to_sixty() {
        let mut cursor = FrameCursor::new();
        let mut backend = MockBackend::new();

        for _ in 0..60 {
            draw_frame(&mut cursor, &mut backend).unwrap();
        }

        assert_eq!(cursor.frame_count(), 60);
        let presents = backend
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Present(..)))
            .count();
        assert_eq!(presents, 60);
    }

    #[test]
    fn test_slots_alternate() {
        let mut cursor = FrameCursor::new();
        let mut backend = MockBackend::new();

        let slots: Vec<usize> = (0..4)
            .map(|_| match draw_frame(&mut cursor, &mut backend).unwrap() {
                FrameStatus::Presented { slot, .. } => slot,
                FrameStatus::Skipped => panic!("unexpected skip"),
            })
            .collect();

        assert_eq!(slots, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_out_of_date_acquire_skips_without_reset() {
        let mut cursor = FrameCursor::new();
        let mut backend = MockBackend::new();
        backend.acquire_script.push_back(Acquired::OutOfDate);

        let status = draw_frame(&mut cursor, &mut backend).unwrap();

        assert_eq!(status, FrameStatus::Skipped);
        assert_eq!(cursor.frame_count(), 0);
        assert_eq!(backend.calls, vec![Call::Wait(0), Call::Acquire(0)]);
        assert_eq!(backend.fences[0], FenceState::Signaled);

        // The same slot is retried and its fence wait does not deadlock.
        let status = draw_frame(&mut cursor, &mut backend).unwrap();
        assert!(matches!(status, FrameStatus::Presented { slot: 0, .. }));
        assert_eq!(cursor.frame_count(), 1);
    }

    #[test]
    fn test_suboptimal_acquire_still_draws() {
        let mut cursor = FrameCursor::new();
        let mut backend = MockBackend::new();
        backend.acquire_script.push_back(Acquired::Ready {
            image_index: 2,
            suboptimal: true,
        });

        let status = draw_frame(&mut cursor, &mut backend).unwrap();

        assert_eq!(
            status,
            FrameStatus::Presented {
                slot: 0,
                image_index: 2
            }
        );
        assert!(backend.calls.contains(&Call::Record(0, 2)));
    }

    #[test]
    fn test_suboptimal_and_out_of_date_present_continue() {
        for result in [Presented::Suboptimal, Presented::OutOfDate] {
            let mut cursor = FrameCursor::new();
            let mut backend = MockBackend::new();
            backend.present_result = result;

            for _ in 0..3 {
                draw_frame(&mut cursor, &mut backend).unwrap();
            }

            assert_eq!(cursor.frame_count(), 3);
        }
    }

    #[test]
    fn test_submit_error_is_returned_and_cursor_stays() {
        let mut cursor = FrameCursor::new();
        let mut backend = MockBackend::new();
        backend.fail_submit = true;

        let result = draw_frame(&mut cursor, &mut backend);

        assert_eq!(result, Err(MockError("submit")));
        assert_eq!(cursor.frame_count(), 0);
        assert!(!backend.calls.iter().any(|call| matches!(call, Call::Present(..))));
    }

    #[test]
    fn test_frame_data_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameData>();
    }
}
