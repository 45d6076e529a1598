/// Resource module - GPU objects owned by a Surface

pub mod backbuffer;
pub mod resource_manager;

pub use backbuffer::{FramebufferSlot, BackbufferPair, TargetBuffers, PassTarget};
pub use resource_manager::{ResourceManager, ResourceCounts};
