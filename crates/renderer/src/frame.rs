//! Frame cursor over the frames-in-flight ring.

use crate::MAX_FRAMES_IN_FLIGHT;

/// Monotonic count of presented frames.
///
/// The slot used for the next frame is the count modulo
/// [`MAX_FRAMES_IN_FLIGHT`]. The count only moves forward when a frame is
/// actually submitted, so a skipped frame reuses its slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCursor {
    frame: u64,
}

impl FrameCursor {
    /// Create a cursor at frame 0.
    pub fn new() -> Self {
        Self { frame: 0 }
    }

    /// Index of the frame slot the next frame renders with.
    #[inline]
    pub fn slot(&self) -> usize {
        (self.frame % MAX_FRAMES_IN_FLIGHT as u64) as usize
    }

    /// Number of frames advanced past so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Advance to the next frame.
    pub fn advance(&mut self) {
        self.frame += 1;
    }
}
