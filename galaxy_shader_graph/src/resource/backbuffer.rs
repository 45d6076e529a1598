/// Pass render targets and backbuffer pairs
///
/// A pass renders into a single framebuffer, or into the back buffer of a
/// pair when it reads its own previous output. The pair swaps after every
/// completed draw so the front buffer always holds the last finished output.

use crate::graphics_device::{FramebufferHandle, TextureHandle};

/// A framebuffer and its color texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferSlot {
    pub framebuffer: FramebufferHandle,
    pub texture: TextureHandle,
}

/// Front/back framebuffers used alternately
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackbufferPair {
    front: FramebufferSlot,
    back: FramebufferSlot,
}

impl BackbufferPair {
    pub fn new(front: FramebufferSlot, back: FramebufferSlot) -> Self {
        Self { front, back }
    }

    /// Last completed output
    pub fn front(&self) -> FramebufferSlot {
        self.front
    }

    /// Buffer written by the next draw
    pub fn back(&self) -> FramebufferSlot {
        self.back
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }
}

/// Framebuffers of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBuffers {
    Single(FramebufferSlot),
    Pair(BackbufferPair),
}

/// Render target of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassTarget {
    pub width: u32,
    pub height: u32,
    pub buffers: TargetBuffers,
    /// At least one draw completed since the buffers were allocated
    pub drawn: bool,
}

impl PassTarget {
    pub fn new(width: u32, height: u32, buffers: TargetBuffers) -> Self {
        Self {
            width,
            height,
            buffers,
            drawn: false,
        }
    }

    /// Framebuffer the next draw writes
    pub fn draw_slot(&self) -> FramebufferSlot {
        match &self.buffers {
            TargetBuffers::Single(slot) => *slot,
            TargetBuffers::Pair(pair) => pair.back(),
        }
    }

    /// Last completed output, if any
    pub fn output(&self) -> Option<FramebufferSlot> {
        if !self.drawn {
            return None;
        }
        match &self.buffers {
            TargetBuffers::Single(slot) => Some(*slot),
            TargetBuffers::Pair(pair) => Some(pair.front()),
        }
    }

    /// Texture holding the previous output while the back buffer is drawn
    ///
    /// Only a pair can be read while drawing; a single buffer has none.
    pub fn previous_output(&self) -> Option<TextureHandle> {
        match &self.buffers {
            TargetBuffers::Pair(pair) if self.drawn => Some(pair.front().texture),
            _ => None,
        }
    }

    /// Mark the draw complete and swap a pair
    pub fn complete_draw(&mut self) {
        self.drawn = true;
        if let TargetBuffers::Pair(pair) = &mut self.buffers {
            pair.swap();
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self.buffers, TargetBuffers::Pair(_))
    }

    /// Every framebuffer of the target
    pub fn slots(&self) -> Vec<FramebufferSlot> {
        match &self.buffers {
            TargetBuffers::Single(slot) => vec![*slot],
            TargetBuffers::Pair(pair) => vec![pair.front(), pair.back()],
        }
    }
}

#[cfg(test)]
#[path = "backbuffer_tests.rs"]
mod tests;
