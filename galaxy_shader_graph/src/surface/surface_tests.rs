//! Unit tests for surface.rs
//!
//! Every Surface here gets its own registries, so nothing touches the
//! process-wide Engine state.

use super::*;
use std::sync::Mutex;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;
use glam::Vec4;
use crate::graph::{PassDesc, PassFlags};
use crate::graphics_device::SoftwareDevice;
use crate::instrumentation::CountersObserver;
use crate::shader::{ProgramDesc, UniformDecl, UniformType};
use crate::texture_loader::TextureLoader;
use crate::uniform::TextureRef;

// ============================================================================
// HELPERS
// ============================================================================

const COLOR: ProgramId = ProgramId(1);
const COPY: ProgramId = ProgramId(2);

#[derive(Default)]
struct Events {
    log: Mutex<Vec<&'static str>>,
}

impl Events {
    fn count(&self, event: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|e| **e == event).count()
    }
}

impl SurfaceEvents for Events {
    fn on_load(&self) {
        self.log.lock().unwrap().push("load");
    }
    fn on_load_error(&self, _error: &Error) {
        self.log.lock().unwrap().push("load_error");
    }
    fn on_context_lost(&self) {
        self.log.lock().unwrap().push("lost");
    }
    fn on_context_restored(&self) {
        self.log.lock().unwrap().push("restored");
    }
}

type Sender = oneshot::Sender<Result<PixelBuffer>>;

#[derive(Default)]
struct ManualLoader {
    senders: Mutex<Vec<(TextureDescriptor, Sender)>>,
}

impl ManualLoader {
    fn settle(&self, descriptor: &TextureDescriptor, result: Result<PixelBuffer>) {
        let mut senders = self.senders.lock().unwrap();
        let index = senders.iter().position(|(d, _)| d == descriptor).unwrap();
        let _ = senders.remove(index).1.send(result);
    }
}

impl TextureLoader for ManualLoader {
    fn can_load(&self, descriptor: &TextureDescriptor) -> bool {
        matches!(descriptor, TextureDescriptor::Id(_))
    }

    fn load(&self, descriptor: &TextureDescriptor) -> BoxFuture<'static, Result<PixelBuffer>> {
        let (sender, receiver) = oneshot::channel();
        self.senders.lock().unwrap().push((descriptor.clone(), sender));
        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(Error::TextureLoadFailed("cancelled".to_string())))
        }
        .boxed()
    }
}

struct Harness {
    counters: Arc<CountersObserver>,
    events: Arc<Events>,
    loader: Arc<ManualLoader>,
    devices: Arc<Mutex<Vec<Arc<Mutex<SoftwareDevice>>>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            counters: Arc::new(CountersObserver::new()),
            events: Arc::new(Events::default()),
            loader: Arc::new(ManualLoader::default()),
            devices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn desc(&self) -> SurfaceDesc {
        let mut catalog = ShaderCatalog::new();
        catalog.register_with_id(COLOR, ProgramDesc::kernel(
            "color",
            vec![UniformDecl::new("c", UniformType::Vec4)],
            |f| Some(f.vec4("c")),
        ));
        catalog.register_with_id(COPY, ProgramDesc::kernel(
            "copy",
            vec![UniformDecl::new("t", UniformType::Sampler2D)],
            |f| Some(f.texture("t", f.uv)),
        ));
        let mut loaders = TextureLoaderRegistry::new();
        loaders.add(self.loader.clone());

        let devices = self.devices.clone();
        let factory: DeviceFactory = Arc::new(move || {
            let device = SoftwareDevice::shared();
            devices.lock().unwrap().push(device.clone());
            let device: Arc<Mutex<dyn GraphicsDevice>> = device;
            Ok(device)
        });

        SurfaceDesc::new("test", 2, 2)
            .with_shaders(Arc::new(RwLock::new(catalog)))
            .with_texture_loaders(Arc::new(RwLock::new(loaders)))
            .with_process_observers(Arc::new(RwLock::new(ObserverRegistry::new())))
            .with_observer(self.counters.clone())
            .with_events(self.events.clone())
            .with_device_factory(factory)
    }

    fn surface(&self) -> Surface {
        Surface::new(self.desc()).unwrap()
    }

    fn device(&self) -> Arc<Mutex<SoftwareDevice>> {
        self.devices.lock().unwrap().last().unwrap().clone()
    }

    fn color_draws(&self) -> u64 {
        self.device().lock().unwrap().draw_count("color")
    }
}

fn color(id: u64, rgba: Vec4) -> PassDesc {
    PassDesc::new(NodeId(id), COLOR).with_uniform("c", rgba)
}

const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_zero_size_is_rejected() {
    let harness = Harness::new();
    let mut desc = harness.desc();
    desc.width = 0;
    assert!(matches!(Surface::new(desc), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_surface_ids_are_unique() {
    let harness = Harness::new();
    let a = harness.surface();
    let b = harness.surface();
    assert_ne!(a.id(), b.id());
    assert_eq!(a.name(), "test");
    assert!(a.is_available());
}

// ============================================================================
// SCHEDULING
// ============================================================================

#[test]
fn test_mount_draws_synchronously() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();

    assert!(surface.is_mounted());
    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Clean));
    assert_eq!(surface.capture().unwrap().pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(harness.events.count("load"), 1);
}

#[test]
fn test_updates_are_batched_until_flush() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();

    for i in 0..5 {
        let c = Vec4::new(0.0, 0.0, i as f32 / 4.0, 1.0);
        surface.commit(Commit::new().update(color(1, c))).unwrap();
    }
    assert_eq!(harness.color_draws(), 1);
    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Dirty));

    let report = surface.flush().unwrap();
    assert_eq!(report.drawn, vec![NodeId(1)]);
    assert_eq!(harness.color_draws(), 2);
    assert_eq!(surface.capture().unwrap().pixel(1, 1), Some([0, 0, 255, 255]));
}

#[test]
fn test_flush_without_dirty_passes_does_nothing() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();
    let before = harness.counters.global();

    assert!(surface.flush().unwrap().is_empty());
    assert_eq!(harness.counters.global(), before);
}

#[test]
fn test_identical_update_does_not_redraw() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();
    surface.commit(Commit::new().update(color(1, RED))).unwrap();

    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Clean));
}

#[test]
fn test_sync_surface_draws_every_change() {
    let harness = Harness::new();
    let mut surface = Surface::new(harness.desc().with_sync(true)).unwrap();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();
    surface.commit(Commit::new().update(color(1, GREEN))).unwrap();

    assert_eq!(harness.color_draws(), 2);
    assert_eq!(surface.capture().unwrap().pixel(0, 0), Some([0, 255, 0, 255]));
}

#[test]
fn test_sync_pass_draws_inside_the_commit() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new()
        .create(color(1, RED))
        .create(color(2, RED).with_index(1).with_flags(PassFlags::SYNC)))
        .unwrap();

    surface.commit(Commit::new()
        .update(color(1, GREEN))
        .update(color(2, GREEN).with_index(1).with_flags(PassFlags::SYNC)))
        .unwrap();

    assert_eq!(surface.pass_state(NodeId(2)), Some(PassState::Clean));
    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Dirty));
}

#[test]
fn test_redraw_marks_everything_dirty() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new()
        .create(color(1, RED))
        .create(color(2, RED).with_index(1)))
        .unwrap();

    surface.redraw().unwrap();
    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Dirty));
    assert_eq!(surface.pass_state(NodeId(2)), Some(PassState::Dirty));
    assert_eq!(surface.flush().unwrap().drawn.len(), 2);
}

#[test]
fn test_pass_operations_reject_unknown_ids() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    assert!(matches!(surface.flush_pass(NodeId(9)), Err(Error::UnknownNode(_))));
    assert!(matches!(surface.redraw_pass(NodeId(9)), Err(Error::UnknownNode(_))));
    assert!(matches!(surface.capture(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_rejected_commit_keeps_the_tree() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();

    let result = surface.commit(Commit::new().create(color(2, RED)).remove(NodeId(7)));
    assert!(matches!(result, Err(Error::UnknownNode(_))));
    assert_eq!(surface.tree().pass_count(), 1);
}

#[test]
fn test_removed_pass_releases_its_framebuffer() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new()
        .create(color(1, RED))
        .create(color(2, RED).with_index(1)))
        .unwrap();
    assert_eq!(harness.device().lock().unwrap().stats().framebuffers, 2);

    surface.commit(Commit::new().remove(NodeId(2))).unwrap();
    assert_eq!(harness.device().lock().unwrap().stats().framebuffers, 1);
    assert_eq!(surface.pass_state(NodeId(2)), None);

    drop(surface);
    assert_eq!(harness.device().lock().unwrap().stats().framebuffers, 0);
}

#[test]
fn test_resize_redraws_the_root() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();

    surface.resize(4, 3).unwrap();
    assert_eq!(surface.size(), (4, 3));
    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Dirty));
    surface.flush().unwrap();
    assert_eq!(surface.capture().unwrap().width(), 4);
    assert!(surface.resize(0, 3).is_err());
}

// ============================================================================
// PRELOAD AND LOADS
// ============================================================================

#[test]
fn test_preload_holds_draws_until_settled() {
    let harness = Harness::new();
    let descriptor = TextureDescriptor::Id(1);
    let mut surface = Surface::new(harness.desc().with_preload([descriptor.clone()])).unwrap();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();
    surface.flush().unwrap();

    assert!(surface.is_preloading());
    assert_eq!(harness.counters.global().surface_draw_start, 0);
    assert_eq!(harness.counters.global().surface_draw_skipped, 2);
    assert_eq!(harness.events.count("load"), 0);

    harness.loader.settle(&descriptor, Ok(PixelBuffer::filled(1, 1, [0, 0, 0, 255])));
    surface.flush().unwrap();
    assert!(!surface.is_preloading());
    assert_eq!(harness.events.count("load"), 1);
    assert_eq!(harness.counters.global().surface_draw_end, 1);
}

#[test]
fn test_failed_preload_reports_one_error() {
    let harness = Harness::new();
    let good = TextureDescriptor::Id(1);
    let unclaimed = TextureDescriptor::Key("nobody".to_string());
    let mut surface = Surface::new(harness.desc().with_preload([good.clone(), unclaimed])).unwrap();

    harness.loader.settle(&good, Ok(PixelBuffer::filled(1, 1, [0, 0, 0, 255])));
    assert_eq!(surface.poll_loads().unwrap(), 1);
    assert_eq!(harness.events.count("load_error"), 1);
    assert_eq!(harness.events.count("load"), 0);

    surface.flush().unwrap();
    assert_eq!(harness.events.count("load_error"), 1);
}

#[test]
fn test_loaded_texture_redraws_its_consumer() {
    let harness = Harness::new();
    let descriptor = TextureDescriptor::Id(5);
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(
        PassDesc::new(NodeId(1), COPY).with_uniform("t", TextureRef::Loader(descriptor.clone())),
    ))
    .unwrap();
    assert!(surface.has_pending_loads());
    assert_eq!(surface.capture().unwrap().pixel(0, 0), Some([0, 0, 0, 0]));

    harness.loader.settle(&descriptor, Ok(PixelBuffer::filled(1, 1, [0, 255, 0, 255])));
    surface.flush().unwrap();
    assert_eq!(surface.capture().unwrap().pixel(0, 0), Some([0, 255, 0, 255]));
}

// ============================================================================
// CONTEXT LIFECYCLE
// ============================================================================

#[test]
fn test_context_loss_and_restore() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();

    harness.device().lock().unwrap().lose_context();
    surface.commit(Commit::new().update(color(1, GREEN))).unwrap();
    surface.handle_context_lost();
    assert!(surface.is_lost());
    assert_eq!(harness.events.count("lost"), 1);
    assert!(surface.flush().unwrap().is_empty());
    assert!(matches!(surface.capture(), Err(Error::ContextLost)));

    surface.handle_context_restored().unwrap();
    surface.handle_context_restored().unwrap();
    assert_eq!(harness.events.count("restored"), 1);
    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Dirty));

    surface.flush().unwrap();
    assert_eq!(surface.capture().unwrap().pixel(0, 0), Some([0, 255, 0, 255]));
}

#[test]
fn test_reboot_for_debug_redraws_on_a_new_device() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();

    surface.reboot_for_debug().unwrap();
    assert_eq!(harness.devices.lock().unwrap().len(), 2);
    assert_eq!(harness.color_draws(), 1);
    assert!(surface.is_available());
    assert_eq!(harness.events.count("lost"), 0);
}

// ============================================================================
// DEFERRED EFFECTS
// ============================================================================

#[test]
fn test_queued_effects_drain_after_the_call() {
    let harness = Harness::new();
    let mut surface = harness.surface();
    surface.commit(Commit::new().create(color(1, RED))).unwrap();

    let commands = surface.commands();
    commands.redraw_pass(NodeId(1));
    commands.flush();
    surface.poll_loads().unwrap();

    assert!(commands.is_empty());
    assert_eq!(harness.color_draws(), 2);
    assert_eq!(surface.pass_state(NodeId(1)), Some(PassState::Clean));
}
