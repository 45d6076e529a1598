/// Render scheduler
///
/// Tracks whether each pass is clean, dirty or drawing, plans which dirty
/// passes a draw request covers and runs them in the resolved topological
/// order. A clean pass is never drawn. A failing pass stays dirty and the
/// run goes on with the others; a lost context stops the run.
///
/// A pass that sampled a dependency while it was dirty (a sync pass reading
/// a deferred one, or a sync pass left clean in its own cycle) is marked
/// dirty again as soon as that dependency draws.

use std::sync::Arc;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::error::{Error, Result};
use crate::graph::{DeclaredTree, NodeId};
use crate::graphics_device::DrawCall;
use crate::instrumentation::{Observer, PassInfo, SurfaceInfo};
use crate::resolver::ResolvedGraph;
use crate::resource::ResourceManager;
use crate::shader::ShaderCatalog;
use crate::texture_loader::TextureCache;

/// Draw state of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Clean,
    Dirty,
    Drawing,
}

/// Which dirty passes a draw request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawScope {
    /// Every dirty pass
    Full,
    /// A pass, what it samples and what samples it
    Pass(NodeId),
    /// Dirty passes declared `sync`. Their deferred dependencies are not
    /// drawn; the last drawn output is sampled until the next flush.
    Sync,
}

/// Everything a run needs besides the scheduler itself
pub struct DrawContext<'a> {
    pub tree: &'a DeclaredTree,
    pub graph: &'a ResolvedGraph,
    pub catalog: &'a ShaderCatalog,
    pub cache: &'a TextureCache,
    pub resources: &'a mut ResourceManager,
    pub observers: &'a [Arc<dyn Observer>],
    pub surface: &'a SurfaceInfo,
    pub surface_size: (u32, u32),
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawReport {
    /// Passes drawn, in draw order
    pub drawn: Vec<NodeId>,
    /// Passes whose draw failed
    pub failed: Vec<(NodeId, Error)>,
    /// The run stopped because the device context is lost
    pub context_lost: bool,
}

impl DrawReport {
    /// Whether the run issued any draw attempt
    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty() && self.failed.is_empty() && !self.context_lost
    }
}

/// Per-Surface scheduler state
#[derive(Debug, Default)]
pub struct RenderScheduler {
    states: FxHashMap<NodeId, PassState>,
    /// Sync passes drawn since the current cycle began
    fresh_sync: FxHashSet<NodeId>,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a scheduling cycle (one Surface entry point)
    pub fn begin_cycle(&mut self) {
        self.fresh_sync.clear();
    }

    /// Track the passes of a new graph: new passes start dirty, removed ones are forgotten
    pub fn sync_with_graph(&mut self, graph: &ResolvedGraph) {
        self.states.retain(|pass, _| graph.contains(*pass));
        for pass in graph.order() {
            self.states.entry(*pass).or_insert(PassState::Dirty);
        }
    }

    pub fn state(&self, pass: NodeId) -> Option<PassState> {
        self.states.get(&pass).copied()
    }

    pub fn is_dirty(&self, pass: NodeId) -> bool {
        self.state(pass) == Some(PassState::Dirty)
    }

    pub fn dirty_count(&self) -> usize {
        self.states.values().filter(|state| **state == PassState::Dirty).count()
    }

    /// Mark a pass and everything depending on it dirty
    ///
    /// Sync passes already drawn in the current cycle are left clean and
    /// stop the propagation. Returns false if nothing was marked.
    pub fn mark_dirty(&mut self, graph: &ResolvedGraph, pass: NodeId) -> bool {
        let mut marked = false;
        let mut seen = FxHashSet::default();
        let mut stack = vec![pass];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) || self.fresh_sync.contains(&node) {
                continue;
            }
            if let Some(state) = self.states.get_mut(&node) {
                *state = PassState::Dirty;
                marked = true;
            }
            stack.extend_from_slice(graph.dependents(node));
        }
        marked
    }

    /// Mark every tracked pass dirty
    pub fn mark_all_dirty(&mut self) {
        self.fresh_sync.clear();
        for state in self.states.values_mut() {
            *state = PassState::Dirty;
        }
    }

    pub fn forget(&mut self, pass: NodeId) {
        self.states.remove(&pass);
        self.fresh_sync.remove(&pass);
    }

    /// Dirty passes covered by a scope, in draw order
    pub fn plan(&self, graph: &ResolvedGraph, tree: &DeclaredTree, scope: DrawScope) -> Vec<NodeId> {
        let covered = scope_passes(graph, tree, scope);
        graph.in_order(&covered).into_iter().filter(|pass| self.is_dirty(*pass)).collect()
    }

    /// Mark the clean passes downstream of a freshly drawn pass dirty
    ///
    /// Those passes last drew from an older output of `pass`. Returns the
    /// passes marked.
    fn mark_stale_dependents(&mut self, graph: &ResolvedGraph, pass: NodeId) -> Vec<NodeId> {
        let mut marked = Vec::new();
        let mut stack = graph.dependents(pass).to_vec();
        while let Some(node) = stack.pop() {
            if self.state(node) != Some(PassState::Clean) {
                continue;
            }
            self.states.insert(node, PassState::Dirty);
            self.fresh_sync.remove(&node);
            marked.push(node);
            stack.extend_from_slice(graph.dependents(node));
        }
        marked
    }

    /// Draw the dirty passes of a scope
    ///
    /// Emits one draw start/end pair around a non-empty plan. Passes made
    /// stale by a draw of this run are drawn too when the scope covers them.
    pub fn run(&mut self, scope: DrawScope, ctx: &mut DrawContext<'_>) -> DrawReport {
        let mut report = DrawReport::default();
        let graph = ctx.graph;
        let covered = scope_passes(graph, ctx.tree, scope);
        if !graph.order().iter().any(|pass| covered.contains(pass) && self.is_dirty(*pass)) {
            return report;
        }
        for observer in ctx.observers {
            observer.on_surface_draw_start(ctx.surface);
        }

        // Dependents come later in the order, so stale ones are reached below
        for &pass in graph.order() {
            if !covered.contains(&pass) || !self.is_dirty(pass) {
                continue;
            }
            let info = pass_info(ctx, pass);
            self.states.insert(pass, PassState::Drawing);

            match draw_pass(ctx, pass) {
                Ok(()) => {
                    self.states.insert(pass, PassState::Clean);
                    if ctx.tree.pass(pass).map_or(false, |desc| desc.is_sync()) {
                        self.fresh_sync.insert(pass);
                    }
                    crate::engine_trace!("shadergraph::RenderScheduler",
                        "Drew '{}' {} ({}x{})", info.name, pass, info.width, info.height);
                    for observer in ctx.observers {
                        observer.on_node_draw(ctx.surface, &info);
                    }
                    report.drawn.push(pass);
                    let stale = self.mark_stale_dependents(graph, pass);
                    if !stale.is_empty() {
                        crate::engine_trace!("shadergraph::RenderScheduler",
                            "{} stale after {}", join_ids(&stale), pass);
                    }
                }
                Err(Error::ContextLost) => {
                    self.states.insert(pass, PassState::Dirty);
                    crate::engine_warn!("shadergraph::RenderScheduler",
                        "Context lost while drawing '{}', run stopped", info.name);
                    report.context_lost = true;
                    break;
                }
                Err(error) => {
                    self.states.insert(pass, PassState::Dirty);
                    crate::engine_error!("shadergraph::RenderScheduler",
                        "Failed to draw '{}' {}: {}", info.name, pass, error);
                    for observer in ctx.observers {
                        observer.on_node_draw_error(ctx.surface, &info, &error);
                    }
                    report.failed.push((pass, error));
                }
            }
        }

        // Consumers of a failed pass sampled stale output
        let failed: Vec<NodeId> = report.failed.iter().map(|(pass, _)| *pass).collect();
        for pass in failed {
            self.mark_dirty(ctx.graph, pass);
        }

        for observer in ctx.observers {
            observer.on_surface_draw_end(ctx.surface);
        }
        report
    }
}

/// Passes a scope reaches, dirty or not
fn scope_passes(graph: &ResolvedGraph, tree: &DeclaredTree, scope: DrawScope) -> FxHashSet<NodeId> {
    match scope {
        DrawScope::Full => graph.order().iter().copied().collect(),
        DrawScope::Pass(pass) => {
            let mut covered = graph.dependency_closure(pass);
            covered.insert(pass);
            covered.extend(graph.transitive_dependents(pass));
            covered
        }
        DrawScope::Sync => graph
            .order()
            .iter()
            .copied()
            .filter(|pass| tree.pass(*pass).map_or(false, |desc| desc.is_sync()))
            .collect(),
    }
}

fn join_ids(passes: &[NodeId]) -> String {
    passes.iter().map(|pass| pass.to_string()).collect::<Vec<_>>().join(", ")
}

fn pass_info(ctx: &DrawContext<'_>, pass: NodeId) -> PassInfo {
    let (width, height) = ctx.tree.resolved_size(pass, ctx.surface_size);
    PassInfo {
        id: pass,
        name: ctx.tree.pass(pass).map(|desc| desc.name.clone()).unwrap_or_default(),
        width,
        height,
    }
}

fn draw_pass(ctx: &mut DrawContext<'_>, pass: NodeId) -> Result<()> {
    let bindings = ctx.graph.bindings(pass).ok_or_else(|| {
        Error::UnknownNode(format!("{} is not in the resolved graph", pass))
    })?;
    let program = ctx.catalog.program(bindings.program).ok_or_else(|| {
        Error::InvalidResource(format!("{} is not in the shader catalog", bindings.program))
    })?;
    let (width, height) = ctx.tree.resolved_size(pass, ctx.surface_size);

    ctx.resources.ensure_target(pass, width, height, bindings.needs_pair())?;
    let program = ctx.resources.ensure_program(bindings.program, &program)?;
    let uniforms = ctx.resources.bind_uniforms(pass, bindings, ctx.cache)?;
    let target = ctx.resources.draw_target(pass)?;
    ctx.resources.draw(&DrawCall {
        program,
        target,
        clear: bindings.clear,
        blend: bindings.blend,
        uniforms: &uniforms,
    })?;
    ctx.resources.complete_draw(pass);
    Ok(())
}

#[cfg(test)]
#[path = "render_scheduler_tests.rs"]
mod tests;
