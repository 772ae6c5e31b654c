//! CLOCK (second-chance) replacement policy.

use crate::buffer::replacer::Replacer;
use crate::buffer::Frame;
use crate::common::FrameId;

/// Second-chance clock over a fixed frame table.
///
/// A frame is a victim iff it is unpinned and its reference bit is clear.
/// Unpinned frames with the bit set lose it as the hand passes. After two
/// full laps without a victim every frame must be pinned.
///
/// # Example
/// ```
/// use pagetree::buffer::replacer::{ClockReplacer, Replacer};
/// use pagetree::buffer::Frame;
///
/// let frames: Vec<Frame> = (0..3).map(|_| Frame::new()).collect();
/// let mut clock = ClockReplacer::new(frames.len());
/// assert_eq!(clock.pick_victim(&frames).map(|f| f.0), Some(0));
/// ```
#[derive(Debug)]
pub struct ClockReplacer {
    /// Position of the clock hand.
    hand: usize,
    num_frames: usize,
}

impl ClockReplacer {
    /// Create a clock over `num_frames` frames, hand at frame 0.
    pub fn new(num_frames: usize) -> Self {
        Self {
            hand: 0,
            num_frames,
        }
    }

    /// Current position of the clock hand.
    #[inline]
    pub fn hand(&self) -> usize {
        self.hand
    }

    #[inline]
    fn advance(&mut self) {
        self.hand = (self.hand + 1) % self.num_frames;
    }
}

impl Replacer for ClockReplacer {
    fn pick_victim(&mut self, frames: &[Frame]) -> Option<FrameId> {
        debug_assert_eq!(frames.len(), self.num_frames);
        if self.num_frames == 0 {
            return None;
        }

        for _ in 0..2 * self.num_frames {
            let frame = &frames[self.hand];
            if frame.is_victim() {
                let victim = FrameId::new(self.hand);
                self.advance();
                return Some(victim);
            }
            if !frame.is_pinned() && frame.is_referenced() {
                frame.clear_referenced();
            }
            self.advance();
        }

        None
    }
}
