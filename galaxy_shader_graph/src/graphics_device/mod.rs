/// Graphics device module - device trait and the software backend

pub mod graphics_device;
pub mod software_device;

pub use graphics_device::*;
pub use software_device::{SoftwareDevice, Fragment, FragmentShader};
