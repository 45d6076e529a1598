/// Dependency resolver
///
/// Walks the declared tree pass by pass, validates uniforms against the
/// program declarations, follows aliases to their terminal target, builds
/// the dependency edges and orders passes topologically.
///
/// Problems never abort a resolve: the offending binding is defaulted or
/// nulled and a diagnostic is produced. A diagnostic is reported once while
/// it persists, and again when its node is re-declared.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::graph::{DeclaredTree, NodeId, NodeKind, PassDesc};
use crate::graphics_device::BlendMode;
use crate::instrumentation::{Diagnostic, DiagnosticKind};
use crate::shader::{ProgramDesc, ShaderCatalog, UniformType};
use crate::texture_loader::TextureDescriptor;
use crate::uniform::{TextureOptions, TextureRef, UniformValue};
use super::resolved_graph::{PassBindings, ResolvedGraph, ResolvedTexture, ResolvedUniform};

/// Output of `DependencyResolver::resolve`
#[derive(Debug, Clone)]
pub struct Resolution {
    pub graph: ResolvedGraph,
    /// Diagnostics not reported before
    pub diagnostics: Vec<Diagnostic>,
    /// Passes whose bindings differ from the previous graph (new passes included)
    pub rebound: Vec<NodeId>,
}

/// Per-Surface resolver, remembers what it already reported
#[derive(Debug, Default)]
pub struct DependencyResolver {
    reported: FxHashSet<Diagnostic>,
    generation: u64,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the whole tree
    ///
    /// `touched` holds the nodes created or updated by the commit being
    /// resolved; their persisting diagnostics are reported again.
    pub fn resolve(
        &mut self,
        tree: &DeclaredTree,
        catalog: &ShaderCatalog,
        touched: &FxHashSet<NodeId>,
        previous: Option<&ResolvedGraph>,
    ) -> Resolution {
        self.generation += 1;
        let mut walk = Walk {
            tree,
            catalog,
            diagnostics: Vec::new(),
        };

        let mut bindings = FxHashMap::default();
        let mut dependencies: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        let mut consumers: FxHashMap<TextureDescriptor, Vec<NodeId>> = FxHashMap::default();
        let pass_ids = tree.pass_ids();

        for pass in tree.passes() {
            let (pass_bindings, scope) = walk.resolve_pass(pass);
            for descriptor in scope.descriptors {
                let list = consumers.entry(descriptor).or_default();
                if !list.contains(&pass.id) {
                    list.push(pass.id);
                }
            }
            dependencies.insert(pass.id, scope.dependencies);
            bindings.insert(pass.id, pass_bindings);
        }

        for (from, to, cycle) in find_cycles(&pass_ids, &dependencies) {
            if let Some(list) = dependencies.get_mut(&from) {
                list.retain(|dep| *dep != to);
            }
            if let Some(pass_bindings) = bindings.get_mut(&from) {
                for (_, uniform) in pass_bindings.uniforms.iter_mut() {
                    uniform.replace_pass_output(to);
                }
            }
            walk.report(DiagnosticKind::PassCycle, None, format!(
                "passes {} sample each other, {} reads null from {}",
                join_ids(cycle), from, to
            ));
        }

        let mut dependents: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for pass in &pass_ids {
            for dep in dependencies.get(pass).map(|list| list.as_slice()).unwrap_or(&[]) {
                dependents.entry(*dep).or_default().push(*pass);
            }
        }

        let order = topological_order(tree, &pass_ids, &dependencies, &dependents);

        let rebound = order
            .iter()
            .copied()
            .filter(|pass| {
                previous.and_then(|graph| graph.bindings(*pass)) != bindings.get(pass)
            })
            .collect();

        let diagnostics = self.filter_reported(walk.diagnostics, touched);

        crate::engine_trace!("shadergraph::DependencyResolver",
            "Resolved generation {}: {} passes", self.generation, order.len());

        Resolution {
            graph: ResolvedGraph {
                generation: self.generation,
                order,
                dependencies,
                dependents,
                bindings,
                consumers,
            },
            diagnostics,
            rebound,
        }
    }

    /// Report every persisting diagnostic again on the next resolve
    pub fn forget_reported(&mut self) {
        self.reported.clear();
    }

    fn filter_reported(&mut self, current: Vec<Diagnostic>, touched: &FxHashSet<NodeId>) -> Vec<Diagnostic> {
        let mut seen = FxHashSet::default();
        let mut fresh = Vec::new();
        for diagnostic in current {
            if !seen.insert(diagnostic.clone()) {
                continue;
            }
            let retouched = diagnostic.node.map_or(false, |node| touched.contains(&node));
            if retouched || !self.reported.contains(&diagnostic) {
                fresh.push(diagnostic);
            }
        }
        self.reported = seen;
        fresh
    }
}

// ============================================================================
// Per-pass walk
// ============================================================================

struct Walk<'a> {
    tree: &'a DeclaredTree,
    catalog: &'a ShaderCatalog,
    diagnostics: Vec<Diagnostic>,
}

/// What a single pass pulled in while resolving
struct PassScope {
    id: NodeId,
    backbuffering: bool,
    dependencies: Vec<NodeId>,
    descriptors: Vec<TextureDescriptor>,
    reads_previous_output: bool,
}

impl PassScope {
    fn depend_on(&mut self, pass: NodeId) {
        if !self.dependencies.contains(&pass) {
            self.dependencies.push(pass);
        }
    }
}

impl<'a> Walk<'a> {
    fn report(&mut self, kind: DiagnosticKind, node: Option<NodeId>, message: String) {
        self.diagnostics.push(Diagnostic::new(kind, node, message));
    }

    fn resolve_pass(&mut self, pass: &PassDesc) -> (PassBindings, PassScope) {
        let program = self.catalog.program(pass.program);
        if program.is_none() {
            self.report(DiagnosticKind::UnknownProgram, Some(pass.id),
                format!("'{}' uses unknown {}", pass.name, pass.program));
        }
        let program = program.as_deref();

        let mut scope = PassScope {
            id: pass.id,
            backbuffering: pass.is_backbuffering(),
            dependencies: Vec::new(),
            descriptors: Vec::new(),
            reads_previous_output: false,
        };

        let mut values: Vec<(String, UniformValue)> = self.declared_values(pass, program).into_iter().collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));

        let mut uniforms = Vec::with_capacity(values.len());
        for (name, value) in values {
            let value = match program.map(|program| program.uniform(&name)) {
                Some(None) => {
                    self.report(DiagnosticKind::UnknownUniform, Some(pass.id),
                        format!("'{}' has no uniform '{}'", pass.name, name));
                    continue;
                }
                Some(Some(decl)) if !decl.ty.accepts(&value) => {
                    self.report(DiagnosticKind::WrongUniformShape, Some(pass.id), format!(
                        "uniform '{}' of '{}' expects {:?}, got {}",
                        name, pass.name, decl.ty, describe(&value)
                    ));
                    decl.ty.default_value()
                }
                Some(Some(decl)) => coerce(&decl.ty, value),
                None => value,
            };
            let options = if value.texture_refs().is_empty() {
                TextureOptions::default()
            } else {
                self.texture_options(pass, &name)
            };
            let resolved = self.resolve_value(&mut scope, value, options);
            uniforms.push((name, resolved));
        }

        if let Some(program) = program {
            for decl in &program.uniforms {
                if uniforms.iter().any(|(name, _)| *name == decl.name) {
                    continue;
                }
                self.report(DiagnosticKind::MissingUniform, Some(pass.id),
                    format!("uniform '{}' of '{}' is not provided", decl.name, pass.name));
                let value = decl.ty.default_value();
                let resolved = self.resolve_value(&mut scope, value, TextureOptions::default());
                uniforms.push((decl.name.clone(), resolved));
            }
            uniforms.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let blend = match &pass.blend {
            None => BlendMode::None,
            Some(raw) => BlendMode::parse(raw).unwrap_or_else(|| {
                self.report(DiagnosticKind::InvalidBlendMode, Some(pass.id),
                    format!("'{}' has invalid blend mode '{}'", pass.name, raw));
                BlendMode::None
            }),
        };

        let bindings = PassBindings {
            program: pass.program,
            uniforms,
            blend,
            clear: pass.clear,
            backbuffering: scope.backbuffering,
            reads_previous_output: scope.reads_previous_output,
        };
        (bindings, scope)
    }

    /// Declared uniforms plus the contributions of aliases bound to them
    fn declared_values(&self, pass: &PassDesc, program: Option<&ProgramDesc>) -> FxHashMap<String, UniformValue> {
        let mut values = pass.uniforms.clone();
        for child in self.tree.children(pass.id) {
            let binding = match self.tree.alias(*child).and_then(|alias| alias.bind_to.as_ref()) {
                Some(binding) => binding,
                None => continue,
            };
            let reference = UniformValue::Texture(TextureRef::Alias(*child));
            let index = match binding.index {
                None => {
                    values.insert(binding.uniform.clone(), reference);
                    continue;
                }
                Some(index) => index,
            };
            let declared_len = program
                .and_then(|program| program.uniform(&binding.uniform))
                .and_then(|decl| match decl.ty {
                    UniformType::Array(_, len) => Some(len),
                    _ => None,
                })
                .unwrap_or(0);
            let entry = values
                .entry(binding.uniform.clone())
                .or_insert_with(|| UniformValue::Array(Vec::new()));
            if !matches!(entry, UniformValue::Array(_)) {
                *entry = UniformValue::Array(Vec::new());
            }
            if let UniformValue::Array(slots) = entry {
                let len = declared_len.max(index + 1);
                if slots.len() < len {
                    slots.resize(len, UniformValue::Texture(TextureRef::Null));
                }
                slots[index] = reference;
            }
        }
        values
    }

    fn texture_options(&mut self, pass: &PassDesc, uniform: &str) -> TextureOptions {
        let desc = match pass.texture_options.get(uniform) {
            Some(desc) => desc,
            None => return TextureOptions::default(),
        };
        let (options, problems) = desc.parse();
        for problem in problems {
            self.report(DiagnosticKind::InvalidTextureOption, Some(pass.id),
                format!("uniform '{}' of '{}': {}", uniform, pass.name, problem));
        }
        options
    }

    fn resolve_value(&mut self, scope: &mut PassScope, value: UniformValue, options: TextureOptions) -> ResolvedUniform {
        match value {
            UniformValue::Texture(texture) => {
                ResolvedUniform::Texture(self.resolve_texture(scope, &texture), options)
            }
            UniformValue::Array(values) => ResolvedUniform::Array(
                values
                    .into_iter()
                    .map(|value| self.resolve_value(scope, value, options))
                    .collect(),
            ),
            other => ResolvedUniform::Value(other),
        }
    }

    fn resolve_texture(&mut self, scope: &mut PassScope, texture: &TextureRef) -> ResolvedTexture {
        match texture {
            TextureRef::Null => ResolvedTexture::Null,
            TextureRef::Pixels(pixels) => ResolvedTexture::Pixels(Arc::clone(pixels)),
            TextureRef::Loader(descriptor) => {
                if !scope.descriptors.contains(descriptor) {
                    scope.descriptors.push(descriptor.clone());
                }
                ResolvedTexture::Loaded(descriptor.clone())
            }
            TextureRef::Backbuffer => {
                if !scope.backbuffering {
                    self.report(DiagnosticKind::BackbufferWithoutBackbuffering, Some(scope.id),
                        format!("{} samples its previous output without backbuffering", scope.id));
                }
                scope.reads_previous_output = true;
                ResolvedTexture::PreviousOutput
            }
            TextureRef::Pass(node) | TextureRef::Alias(node) => self.resolve_node(scope, *node),
        }
    }

    /// Follow aliases until a pass or a non-node texture
    fn resolve_node(&mut self, scope: &mut PassScope, node: NodeId) -> ResolvedTexture {
        let mut chain: Vec<NodeId> = Vec::new();
        let mut current = node;
        loop {
            match self.tree.kind(current) {
                None => {
                    self.report(DiagnosticKind::DanglingReference, Some(scope.id),
                        format!("{} references {} which is not declared", scope.id, current));
                    return ResolvedTexture::Null;
                }
                Some(NodeKind::Pass) => {
                    scope.depend_on(current);
                    return ResolvedTexture::PassOutput(current);
                }
                Some(NodeKind::Alias) => {}
            }

            if let Some(start) = chain.iter().position(|alias| *alias == current) {
                let mut cycle = chain[start..].to_vec();
                cycle.sort();
                self.report(DiagnosticKind::AliasCycle, None,
                    format!("aliases {} forward to each other", join_ids(cycle)));
                return ResolvedTexture::Null;
            }
            chain.push(current);
            if chain.len() > self.tree.alias_count() {
                return ResolvedTexture::Null;
            }

            match self.alias_target(current) {
                None => {
                    self.report(DiagnosticKind::EmptyAlias, Some(current),
                        format!("alias {} has no target", current));
                    return ResolvedTexture::Null;
                }
                Some(TextureRef::Pass(next)) | Some(TextureRef::Alias(next)) => current = next,
                Some(TextureRef::Backbuffer) => {
                    self.report(DiagnosticKind::InvalidAliasTarget, Some(current),
                        format!("alias {} cannot forward to a previous output", current));
                    return ResolvedTexture::Null;
                }
                Some(other) => return self.resolve_texture(scope, &other),
            }
        }
    }

    /// Explicit target, else the first structural child
    fn alias_target(&self, alias: NodeId) -> Option<TextureRef> {
        if let Some(target) = self.tree.alias(alias).and_then(|desc| desc.target.clone()) {
            return Some(target);
        }
        let child = *self.tree.children(alias).first()?;
        match self.tree.kind(child)? {
            NodeKind::Pass => Some(TextureRef::Pass(child)),
            NodeKind::Alias => Some(TextureRef::Alias(child)),
        }
    }
}

// ============================================================================
// Graph helpers
// ============================================================================

fn coerce(ty: &UniformType, value: UniformValue) -> UniformValue {
    match (ty, value) {
        (UniformType::Float, UniformValue::Int(v)) => UniformValue::Float(v as f32),
        (UniformType::Int, UniformValue::Float(v)) => UniformValue::Int(v as i32),
        (UniformType::Bool, UniformValue::Int(v)) => UniformValue::Bool(v != 0),
        (UniformType::Bool, UniformValue::Float(v)) => UniformValue::Bool(v != 0.0),
        (UniformType::Array(element, _), UniformValue::Array(values)) => {
            UniformValue::Array(values.into_iter().map(|value| coerce(element, value)).collect())
        }
        (_, value) => value,
    }
}

fn describe(value: &UniformValue) -> String {
    match value {
        UniformValue::Array(values) => format!("array of {}", values.len()),
        other => other.kind_name().to_string(),
    }
}

fn join_ids(ids: Vec<NodeId>) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Back edges found by a depth-first walk, with the passes of each cycle
///
/// Walks passes in declaration order with a visiting stack and a visited set;
/// an edge into the visiting stack closes a cycle.
fn find_cycles(
    passes: &[NodeId],
    dependencies: &FxHashMap<NodeId, Vec<NodeId>>,
) -> Vec<(NodeId, NodeId, Vec<NodeId>)> {
    fn visit(
        node: NodeId,
        dependencies: &FxHashMap<NodeId, Vec<NodeId>>,
        visiting: &mut Vec<NodeId>,
        visited: &mut FxHashSet<NodeId>,
        back_edges: &mut Vec<(NodeId, NodeId, Vec<NodeId>)>,
    ) {
        if visited.contains(&node) {
            return;
        }
        visiting.push(node);
        for dep in dependencies.get(&node).map(|list| list.as_slice()).unwrap_or(&[]) {
            if let Some(start) = visiting.iter().position(|n| n == dep) {
                let mut cycle = visiting[start..].to_vec();
                cycle.sort();
                back_edges.push((node, *dep, cycle));
                continue;
            }
            visit(*dep, dependencies, visiting, visited, back_edges);
        }
        visiting.pop();
        visited.insert(node);
    }

    let mut visiting = Vec::new();
    let mut visited = FxHashSet::default();
    let mut back_edges = Vec::new();
    for pass in passes {
        visit(*pass, dependencies, &mut visiting, &mut visited, &mut back_edges);
    }
    back_edges
}

/// Kahn's algorithm, ready passes taken by declaration index
fn topological_order(
    tree: &DeclaredTree,
    passes: &[NodeId],
    dependencies: &FxHashMap<NodeId, Vec<NodeId>>,
    dependents: &FxHashMap<NodeId, Vec<NodeId>>,
) -> Vec<NodeId> {
    let position = |pass: NodeId| tree.declaration_index(pass).unwrap_or(usize::MAX);
    let mut pending: FxHashMap<NodeId, usize> = passes
        .iter()
        .map(|pass| (*pass, dependencies.get(pass).map_or(0, |list| list.len())))
        .collect();
    let mut ready: BinaryHeap<Reverse<(usize, NodeId)>> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(pass, _)| Reverse((position(*pass), *pass)))
        .collect();

    let mut order = Vec::with_capacity(passes.len());
    while let Some(Reverse((_, pass))) = ready.pop() {
        order.push(pass);
        for dependent in dependents.get(&pass).map(|list| list.as_slice()).unwrap_or(&[]) {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse((position(*dependent), *dependent)));
                }
            }
        }
    }
    order
}

#[cfg(test)]
#[path = "dependency_resolver_tests.rs"]
mod tests;
