//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`ClockReplacer`] - Second-chance clock over the frame table

mod clock;

pub use clock::ClockReplacer;

use crate::buffer::Frame;
use crate::common::FrameId;

/// Chooses which frame to reuse when a page must be brought in.
///
/// The replacer reads pin counts and reference bits straight from the
/// frame table; it does not track page identity.
pub trait Replacer: Send {
    /// Pick a frame that holds no pin, or `None` if every frame is in use.
    fn pick_victim(&mut self, frames: &[Frame]) -> Option<FrameId>;
}
