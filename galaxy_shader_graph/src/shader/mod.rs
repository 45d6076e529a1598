//! Shader module
//!
//! Program descriptions and the catalog that maps stable program ids to them.

mod shader_catalog;

pub use shader_catalog::{
    ProgramId, ProgramDesc, ProgramSource,
    UniformDecl, UniformType,
    ShaderCatalog,
};
