//! Surface module
//!
//! The root object a host creates: it owns a device context and drives the
//! resolver, the scheduler, the resources and the texture loads of one
//! declared pass tree.

mod surface;
mod surface_desc;
mod surface_commands;

pub use surface::Surface;
pub use surface_desc::{SurfaceDesc, SurfaceEvents, software_device_factory};
pub use surface_commands::{SurfaceCommands, Effect};
