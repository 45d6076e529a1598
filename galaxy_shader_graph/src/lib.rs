/*!
# Galaxy Shader Graph

Core of a declarative shader-pass renderer.

A front-end describes GPU passes (a shader program bound to uniform values,
some of which are outputs of other passes) and sends them as commits. The
core resolves the references between passes, orders them, redraws only what
changed and keeps GPU resources consistent across device loss.

## Architecture

- **Surface**: root object owning one device context and one pass tree
- **DeclaredTree / Commit**: the node descriptions sent by the front-end
- **DependencyResolver**: aliases, texture references and draw order
- **RenderScheduler**: per-pass dirty state and draw execution
- **ResourceManager**: framebuffers, backbuffer pairs, programs, textures
- **TextureLoaderRegistry**: pluggable asynchronous texture loaders
- **Observer**: instrumentation of draws, errors and diagnostics
- **GraphicsDevice**: device trait, with a CPU `SoftwareDevice` backend
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod uniform;
pub mod shader;
pub mod graphics_device;
pub mod graph;
pub mod resolver;
pub mod scheduler;
pub mod resource;
pub mod texture_loader;
pub mod instrumentation;
pub mod surface;

// Main shadergraph namespace module
pub mod shadergraph {
    // Error types
    pub use crate::error::{Error, Result};

    // Process-wide state
    pub use crate::engine::Engine;

    // Root object
    pub use crate::surface::{Surface, SurfaceDesc, SurfaceEvents, SurfaceCommands, Effect};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Declared graph sub-module
    pub mod graph {
        pub use crate::graph::*;
    }

    // Uniform values sub-module
    pub mod uniform {
        pub use crate::uniform::*;
    }

    // Shader catalog sub-module
    pub mod shader {
        pub use crate::shader::*;
    }

    // Device sub-module
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Resolver sub-module
    pub mod resolver {
        pub use crate::resolver::*;
    }

    // Scheduler sub-module
    pub mod scheduler {
        pub use crate::scheduler::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Texture loading sub-module
    pub mod texture {
        pub use crate::texture_loader::*;
    }

    // Instrumentation sub-module
    pub mod instrumentation {
        pub use crate::instrumentation::*;
    }
}

// Re-export math library at crate root
pub use glam;
