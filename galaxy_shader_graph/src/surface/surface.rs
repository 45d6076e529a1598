/// Surface - root of a declared pass tree
///
/// A Surface owns one device context, the declared tree built from commits,
/// the resolved graph, the per-pass scheduler state, the GPU resources and
/// the texture cache. Every public entry point:
///
/// 1. starts a scheduling cycle and notices a lost device,
/// 2. does its work (apply, resolve, poll loads, draw),
/// 3. drains the effects queued through `SurfaceCommands` meanwhile.
///
/// The Surface draws synchronously on mount (first commit once the preload
/// barrier is open). Afterwards only sync passes draw inside the call that
/// dirtied them, unless the whole Surface is sync; other passes wait for
/// `flush`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use rustc_hash::FxHashSet;
use crate::engine::Engine;
use crate::engine_bail;
use crate::error::{Error, Result};
use crate::graph::{Commit, DeclaredTree, NodeId};
use crate::graphics_device::{DeviceFactory, GraphicsDevice, Rect};
use crate::instrumentation::{
    Diagnostic, DiagnosticKind, Observer, ObserverId, ObserverRegistry, SurfaceId, SurfaceInfo,
};
use crate::resolver::{DependencyResolver, ResolvedGraph};
use crate::resource::ResourceManager;
use crate::scheduler::{DrawContext, DrawReport, DrawScope, PassState, RenderScheduler};
use crate::shader::{ProgramId, ShaderCatalog};
use crate::texture_loader::{TextureCache, TextureDescriptor, TextureLoaderRegistry, TextureStatus};
use crate::uniform::PixelBuffer;
use super::surface_commands::{Effect, SurfaceCommands};
use super::surface_desc::{software_device_factory, SurfaceDesc, SurfaceEvents};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Gate holding every draw until the listed descriptors settled
#[derive(Debug, Clone, PartialEq)]
enum PreloadBarrier {
    Open,
    Pending(Vec<TextureDescriptor>),
}

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>> {
    match lock.read() {
        Ok(guard) => Ok(guard),
        Err(_) => engine_bail!("shadergraph::Surface", "{} lock poisoned", what),
    }
}

/// Root of a pass tree, owner of one device context
pub struct Surface {
    info: SurfaceInfo,
    width: u32,
    height: u32,
    sync: bool,
    tree: DeclaredTree,
    resolver: DependencyResolver,
    graph: ResolvedGraph,
    scheduler: RenderScheduler,
    resources: ResourceManager,
    cache: TextureCache,
    texture_loaders: Arc<RwLock<TextureLoaderRegistry>>,
    process_observers: Arc<RwLock<ObserverRegistry>>,
    shaders: Arc<RwLock<ShaderCatalog>>,
    observers: ObserverRegistry,
    events: Option<Arc<dyn SurfaceEvents>>,
    device_factory: DeviceFactory,
    preload: PreloadBarrier,
    /// Every descriptor ever preloaded, kept in the cache
    preloaded: Vec<TextureDescriptor>,
    mounted: bool,
    lost: bool,
    commands: SurfaceCommands,
}

impl Surface {
    /// Create a Surface and its device context
    ///
    /// Preloaded descriptors start loading right away.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` for a zero size, or the device
    /// factory error.
    pub fn new(desc: SurfaceDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            crate::engine_error!("shadergraph::Surface",
                "Surface '{}' needs a non-zero size, got {}x{}", desc.name, desc.width, desc.height);
            return Err(Error::InitializationFailed(format!(
                "surface '{}' has size {}x{}", desc.name, desc.width, desc.height
            )));
        }
        let device_factory = desc.device_factory.unwrap_or_else(software_device_factory);
        let device = (*device_factory)()?;

        let mut observers = ObserverRegistry::new();
        for observer in desc.observers {
            observers.add(observer);
        }

        let info = SurfaceInfo {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            name: desc.name,
        };
        let mut surface = Self {
            info,
            width: desc.width,
            height: desc.height,
            sync: desc.sync,
            tree: DeclaredTree::new(),
            resolver: DependencyResolver::new(),
            graph: ResolvedGraph::default(),
            scheduler: RenderScheduler::new(),
            resources: ResourceManager::new(device),
            cache: TextureCache::new(),
            texture_loaders: desc.texture_loaders.unwrap_or_else(Engine::texture_loaders),
            process_observers: desc.process_observers.unwrap_or_else(Engine::observers),
            shaders: desc.shaders.unwrap_or_else(Engine::shaders),
            observers,
            events: desc.events,
            device_factory,
            preload: PreloadBarrier::Pending(Vec::new()),
            preloaded: Vec::new(),
            mounted: false,
            lost: false,
            commands: SurfaceCommands::new(),
        };
        surface.arm_preload(desc.preload)?;

        crate::engine_info!("shadergraph::Surface", "Created {} '{}' ({}x{})",
            surface.info.id, surface.info.name, surface.width, surface.height);
        Ok(surface)
    }

    // ===== ACCESSORS =====

    pub fn id(&self) -> SurfaceId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &SurfaceInfo {
        &self.info
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// Whether the device context is usable
    pub fn is_available(&self) -> bool {
        !self.lost
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Whether the first full draw happened
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether the preload barrier still holds draws
    pub fn is_preloading(&self) -> bool {
        matches!(self.preload, PreloadBarrier::Pending(_))
    }

    pub fn has_pending_loads(&self) -> bool {
        self.cache.loading_count() > 0
    }

    pub fn tree(&self) -> &DeclaredTree {
        &self.tree
    }

    pub fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    pub fn pass_state(&self, pass: NodeId) -> Option<PassState> {
        self.scheduler.state(pass)
    }

    /// Current device context
    pub fn device(&self) -> Arc<Mutex<dyn GraphicsDevice>> {
        self.resources.device()
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Handle queuing effects drained after the current operation
    pub fn commands(&self) -> SurfaceCommands {
        self.commands.clone()
    }

    /// Register an observer of this Surface only
    pub fn add_observer(&mut self, observer: Arc<dyn Observer>) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    // ===== GRAPH CHANGES =====

    /// Apply a commit from the front-end
    ///
    /// Resolves the new tree, marks changed passes and their dependents
    /// dirty, starts texture loads and draws what the scheduling mode asks.
    ///
    /// # Errors
    ///
    /// Returns the tree error if the commit is malformed; the tree is then
    /// left as it was.
    pub fn commit(&mut self, commit: Commit) -> Result<()> {
        self.enter();
        let result = self.commit_inner(commit);
        self.leave();
        result
    }

    fn commit_inner(&mut self, commit: Commit) -> Result<()> {
        let applied = self.tree.apply(commit)?;
        for pass in &applied.removed {
            self.resources.release_pass(*pass);
            self.scheduler.forget(*pass);
        }
        self.refresh(&applied.touched())?;
        self.poll_loads_inner();
        self.draw_after_change()
    }

    /// Change the Surface size
    ///
    /// Passes whose resolved size changed are marked dirty; passes with an
    /// explicit size keep their contents.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!(
                "{} cannot be resized to {}x{}", self.info.id, width, height
            )));
        }
        self.enter();
        self.width = width;
        self.height = height;
        self.mark_resized();
        let result = self.draw_after_change();
        self.leave();
        result
    }

    // ===== DRAWING =====

    /// Poll loads and draw every dirty pass
    pub fn flush(&mut self) -> Result<DrawReport> {
        self.enter();
        let result = self.flush_inner();
        self.leave();
        result
    }

    fn flush_inner(&mut self) -> Result<DrawReport> {
        self.poll_loads_inner();
        self.draw(DrawScope::Full)
    }

    /// Mark every pass dirty
    pub fn redraw(&mut self) -> Result<()> {
        self.enter();
        self.scheduler.mark_all_dirty();
        let result = self.draw_after_change();
        self.leave();
        result
    }

    /// Draw a pass, the dirty passes it samples and the dirty passes sampling it
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownNode` if the pass is not declared.
    pub fn flush_pass(&mut self, pass: NodeId) -> Result<DrawReport> {
        self.enter();
        let result = self.flush_pass_inner(pass);
        self.leave();
        result
    }

    fn flush_pass_inner(&mut self, pass: NodeId) -> Result<DrawReport> {
        self.check_pass(pass)?;
        self.poll_loads_inner();
        self.draw(DrawScope::Pass(pass))
    }

    /// Mark a pass and its dependents dirty
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownNode` if the pass is not declared.
    pub fn redraw_pass(&mut self, pass: NodeId) -> Result<()> {
        self.enter();
        let result = self.redraw_pass_inner(pass);
        self.leave();
        result
    }

    fn redraw_pass_inner(&mut self, pass: NodeId) -> Result<()> {
        self.check_pass(pass)?;
        self.scheduler.mark_dirty(&self.graph, pass);
        self.draw_after_change()
    }

    fn check_pass(&self, pass: NodeId) -> Result<()> {
        if self.graph.contains(pass) {
            return Ok(());
        }
        Err(Error::UnknownNode(format!("{} is not a pass of {}", pass, self.info.id)))
    }

    // ===== CAPTURE =====

    /// Read back the whole Surface output (its root pass)
    pub fn capture(&self) -> Result<PixelBuffer> {
        self.capture_root(None)
    }

    /// Read back a region of the Surface output, origin bottom-left
    pub fn capture_region(&self, rect: Rect) -> Result<PixelBuffer> {
        self.capture_root(Some(rect))
    }

    fn capture_root(&self, rect: Option<Rect>) -> Result<PixelBuffer> {
        match self.tree.root_pass() {
            Some(root) => self.capture_pass(root, rect),
            None => Err(Error::InvalidResource(format!("{} has no pass to capture", self.info.id))),
        }
    }

    /// Read back the last output of a pass
    pub fn capture_pass(&self, pass: NodeId, rect: Option<Rect>) -> Result<PixelBuffer> {
        if self.lost {
            return Err(Error::ContextLost);
        }
        self.resources.capture(pass, rect)
    }

    // ===== TEXTURE LOADING =====

    /// Hold every draw until `descriptors` settled
    ///
    /// Calling it again before the barrier opened extends the same barrier.
    /// An empty list on an open barrier does nothing.
    pub fn preload(&mut self, descriptors: impl IntoIterator<Item = TextureDescriptor>) -> Result<()> {
        self.enter();
        let descriptors: Vec<TextureDescriptor> = descriptors.into_iter().collect();
        let result = if descriptors.is_empty() && !self.is_preloading() {
            Ok(())
        } else {
            self.arm_preload(descriptors)
        };
        if result.is_ok() {
            self.poll_loads_inner();
        }
        self.leave();
        result
    }

    fn arm_preload(&mut self, descriptors: Vec<TextureDescriptor>) -> Result<()> {
        let loaders = Arc::clone(&self.texture_loaders);
        let mut unclaimed = Vec::new();
        {
            let registry = read_lock(&loaders, "texture loader registry")?;
            for descriptor in &descriptors {
                if self.cache.request(descriptor, &registry).is_err() {
                    unclaimed.push(descriptor.clone());
                }
            }
        }
        for descriptor in unclaimed {
            self.report(&Diagnostic::new(DiagnosticKind::UnclaimedDescriptor, None,
                format!("no loader claims preloaded {}", descriptor)));
        }

        for descriptor in &descriptors {
            if !self.preloaded.contains(descriptor) {
                self.preloaded.push(descriptor.clone());
            }
        }
        match &mut self.preload {
            PreloadBarrier::Pending(pending) => pending.extend(descriptors),
            PreloadBarrier::Open => self.preload = PreloadBarrier::Pending(descriptors),
        }
        Ok(())
    }

    /// Poll pending texture loads, draw what the scheduling mode asks
    ///
    /// Returns how many loads settled.
    pub fn poll_loads(&mut self) -> Result<usize> {
        self.enter();
        let settled = self.poll_loads_inner();
        let result = self.draw_after_change().map(|_| settled);
        self.leave();
        result
    }

    fn poll_loads_inner(&mut self) -> usize {
        let settled = self.cache.poll();
        for load in &settled {
            let consumers = self.graph.consumers(&load.descriptor).to_vec();
            for pass in &consumers {
                self.scheduler.mark_dirty(&self.graph, *pass);
            }
            if let Err(error) = &load.result {
                self.report(&Diagnostic::new(DiagnosticKind::LoadFailed, consumers.first().copied(),
                    format!("{} failed to load: {}", load.descriptor, error)));
                if !self.preloaded.contains(&load.descriptor) {
                    if let Some(events) = &self.events {
                        events.on_load_error(error);
                    }
                }
            }
        }
        self.check_preload();
        settled.len()
    }

    fn check_preload(&mut self) {
        let pending = match &self.preload {
            PreloadBarrier::Open => return,
            PreloadBarrier::Pending(pending) => pending,
        };
        let mut failure = None;
        for descriptor in pending {
            match self.cache.status(descriptor) {
                Some(TextureStatus::Ready) => {}
                Some(TextureStatus::Failed) => {
                    if failure.is_none() {
                        failure = Some(self.cache.error(descriptor).cloned().unwrap_or_else(|| {
                            Error::TextureLoadFailed(format!("{} failed to load", descriptor))
                        }));
                    }
                }
                Some(TextureStatus::Loading) | None => return,
            }
        }

        let count = pending.len();
        self.preload = PreloadBarrier::Open;
        match failure {
            None => {
                crate::engine_debug!("shadergraph::Surface",
                    "{} preloaded {} textures", self.info.id, count);
                if let Some(events) = &self.events {
                    events.on_load();
                }
            }
            Some(error) => {
                crate::engine_warn!("shadergraph::Surface",
                    "{} preload failed: {}", self.info.id, error);
                if let Some(events) = &self.events {
                    events.on_load_error(&error);
                }
            }
        }
    }

    // ===== CONTEXT LIFECYCLE =====

    /// Handle a device context loss
    ///
    /// Idempotent while lost: the callback fires once per loss. GPU handles
    /// are forgotten, every pass is left dirty and draws are skipped until
    /// `handle_context_restored`.
    pub fn handle_context_lost(&mut self) {
        self.enter();
        self.context_lost();
        self.leave();
    }

    fn context_lost(&mut self) {
        if self.lost {
            return;
        }
        self.lost = true;
        self.resources.invalidate_all();
        self.scheduler.mark_all_dirty();
        crate::engine_warn!("shadergraph::Surface",
            "{} '{}' lost its device context", self.info.id, self.info.name);
        if let Some(events) = &self.events {
            events.on_context_lost();
        }
    }

    /// Acquire a new device context after a loss
    ///
    /// Objects are recreated lazily; the next flush redraws every pass.
    /// Does nothing if the context is not lost.
    ///
    /// # Errors
    ///
    /// Returns the device factory error; the Surface then stays lost.
    pub fn handle_context_restored(&mut self) -> Result<()> {
        self.enter();
        let result = self.context_restored();
        self.leave();
        result
    }

    fn context_restored(&mut self) -> Result<()> {
        if !self.lost {
            return Ok(());
        }
        let device = match (*self.device_factory)() {
            Ok(device) => device,
            Err(error) => {
                crate::engine_error!("shadergraph::Surface",
                    "{} failed to restore its device context: {}", self.info.id, error);
                return Err(error);
            }
        };
        self.resources.replace_device(device);
        self.lost = false;
        self.scheduler.mark_all_dirty();
        crate::engine_info!("shadergraph::Surface",
            "{} '{}' restored its device context", self.info.id, self.info.name);
        if let Some(events) = &self.events {
            events.on_context_restored();
        }
        Ok(())
    }

    /// Recreate the device context without a loss event, then redraw everything
    pub fn reboot_for_debug(&mut self) -> Result<()> {
        self.enter();
        let result = self.reboot_inner();
        self.leave();
        result
    }

    fn reboot_inner(&mut self) -> Result<()> {
        let device = (*self.device_factory)()?;
        self.resources.release_all();
        self.resources.replace_device(device);
        self.lost = false;
        self.scheduler.mark_all_dirty();
        crate::engine_debug!("shadergraph::Surface", "{} rebooted for debug", self.info.id);
        self.draw(DrawScope::Full).map(|_| ())
    }

    // ===== INTERNALS =====

    fn enter(&mut self) {
        self.scheduler.begin_cycle();
        if !self.lost && self.resources.is_lost() {
            self.context_lost();
        }
        self.drain_effects();
    }

    fn leave(&mut self) {
        self.drain_effects();
    }

    fn drain_effects(&mut self) {
        for effect in self.commands.take() {
            let result = match effect {
                Effect::RedrawPass(pass) => self.redraw_pass_inner(pass),
                Effect::FlushPass(pass) => self.flush_pass_inner(pass).map(|_| ()),
                Effect::Redraw => {
                    self.scheduler.mark_all_dirty();
                    self.draw_after_change()
                }
                Effect::Flush => self.flush_inner().map(|_| ()),
            };
            if let Err(error) = result {
                crate::engine_warn!("shadergraph::Surface",
                    "{} queued {:?} failed: {}", self.info.id, effect, error);
            }
        }
    }

    /// Every observer to notify: this Surface's, then the process-wide ones
    fn observers(&self) -> Vec<Arc<dyn Observer>> {
        let mut observers = self.observers.observers();
        match self.process_observers.read() {
            Ok(registry) => observers.extend(registry.observers()),
            Err(_) => {
                crate::engine_warn!("shadergraph::Surface", "Observer registry lock poisoned");
            }
        }
        observers
    }

    fn report(&self, diagnostic: &Diagnostic) {
        crate::engine_warn!("shadergraph::Surface",
            "{} '{}': {}", self.info.id, self.info.name, diagnostic);
        for observer in self.observers() {
            observer.on_diagnostic(&self.info, diagnostic);
        }
    }

    /// Re-resolve after a tree change
    fn refresh(&mut self, touched: &FxHashSet<NodeId>) -> Result<()> {
        let shaders = Arc::clone(&self.shaders);
        let resolution = {
            let catalog = read_lock(&shaders, "shader catalog")?;
            self.resolver.resolve(&self.tree, &catalog, touched, Some(&self.graph))
        };
        self.graph = resolution.graph;
        self.scheduler.sync_with_graph(&self.graph);

        for diagnostic in &resolution.diagnostics {
            self.report(diagnostic);
        }
        for pass in touched.iter().chain(resolution.rebound.iter()) {
            self.scheduler.mark_dirty(&self.graph, *pass);
        }
        self.mark_resized();

        self.request_textures()?;
        self.collect_garbage();
        Ok(())
    }

    fn mark_resized(&mut self) {
        let surface_size = (self.width, self.height);
        let resized: Vec<NodeId> = self
            .graph
            .order()
            .iter()
            .copied()
            .filter(|pass| {
                self.resources.target(*pass).map_or(false, |target| {
                    (target.width, target.height) != self.tree.resolved_size(*pass, surface_size)
                })
            })
            .collect();
        for pass in resized {
            self.scheduler.mark_dirty(&self.graph, pass);
        }
    }

    fn request_textures(&mut self) -> Result<()> {
        let used: Vec<TextureDescriptor> = self.graph.descriptors().cloned().collect();
        let loaders = Arc::clone(&self.texture_loaders);
        let mut unclaimed = Vec::new();
        {
            let registry = read_lock(&loaders, "texture loader registry")?;
            for descriptor in &used {
                if self.cache.request(descriptor, &registry).is_err() {
                    unclaimed.push(descriptor.clone());
                }
            }
        }
        for descriptor in unclaimed {
            let node = self.graph.consumers(&descriptor).first().copied();
            self.report(&Diagnostic::new(DiagnosticKind::UnclaimedDescriptor, node,
                format!("no loader claims {}, bound as null", descriptor)));
        }

        let preloaded = &self.preloaded;
        let dropped = self.cache.retain(|descriptor| {
            used.contains(descriptor) || preloaded.contains(descriptor)
        });
        if dropped > 0 {
            crate::engine_trace!("shadergraph::Surface",
                "{} dropped {} unused textures", self.info.id, dropped);
        }
        Ok(())
    }

    fn collect_garbage(&mut self) {
        let live_descriptors: FxHashSet<TextureDescriptor> = self.graph.descriptors().cloned().collect();
        let live_programs: FxHashSet<ProgramId> = self
            .graph
            .order()
            .iter()
            .filter_map(|pass| self.graph.bindings(*pass))
            .map(|bindings| bindings.program)
            .collect();
        self.resources.collect_garbage(&self.graph.pixel_buffers(), &live_descriptors, &live_programs);
    }

    fn draw_after_change(&mut self) -> Result<()> {
        let scope = if !self.mounted || self.sync {
            DrawScope::Full
        } else {
            DrawScope::Sync
        };
        self.draw(scope).map(|_| ())
    }

    fn draw(&mut self, scope: DrawScope) -> Result<DrawReport> {
        let plan = self.scheduler.plan(&self.graph, &self.tree, scope);
        if plan.is_empty() {
            return Ok(DrawReport::default());
        }
        let observers = self.observers();
        if self.lost || self.is_preloading() {
            for observer in &observers {
                observer.on_surface_draw_skipped(&self.info);
            }
            return Ok(DrawReport::default());
        }
        if scope == DrawScope::Full {
            self.mounted = true;
        }

        let shaders = Arc::clone(&self.shaders);
        let report = {
            let catalog = read_lock(&shaders, "shader catalog")?;
            let mut ctx = DrawContext {
                tree: &self.tree,
                graph: &self.graph,
                catalog: &catalog,
                cache: &self.cache,
                resources: &mut self.resources,
                observers: &observers,
                surface: &self.info,
                surface_size: (self.width, self.height),
            };
            self.scheduler.run(scope, &mut ctx)
        };
        if report.context_lost {
            self.context_lost();
        }
        Ok(report)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.resources.release_all();
        crate::engine_debug!("shadergraph::Surface", "Dropped {} '{}'", self.info.id, self.info.name);
    }
}

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;
