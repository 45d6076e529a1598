//! Render scheduler module
//!
//! Per-pass dirty tracking, draw planning and draw execution.

mod render_scheduler;

pub use render_scheduler::{
    RenderScheduler, PassState, DrawScope, DrawContext, DrawReport,
};
