//! Dependency resolver module
//!
//! Turns the declared tree into a resolved graph: concrete texture bindings
//! per pass, dependency edges between passes and a topological draw order.

mod resolved_graph;
mod dependency_resolver;

pub use resolved_graph::{ResolvedGraph, PassBindings, ResolvedUniform, ResolvedTexture};
pub use dependency_resolver::{DependencyResolver, Resolution};
