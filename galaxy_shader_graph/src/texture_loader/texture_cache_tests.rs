//! Unit tests for texture_cache.rs

use super::*;
use std::sync::Mutex;
use futures::channel::oneshot;
use futures::FutureExt;
use crate::texture_loader::TextureLoader;

// ============================================================================
// HELPERS
// ============================================================================

type Sender = oneshot::Sender<Result<PixelBuffer>>;

/// Loader resolved by hand through oneshot channels
#[derive(Default)]
struct ManualLoader {
    senders: Mutex<Vec<(TextureDescriptor, Sender)>>,
    loads: Mutex<u32>,
}

impl ManualLoader {
    fn take_sender(&self, descriptor: &TextureDescriptor) -> Sender {
        let mut senders = self.senders.lock().unwrap();
        let index = senders.iter().position(|(d, _)| d == descriptor).unwrap();
        senders.remove(index).1
    }
}

impl TextureLoader for ManualLoader {
    fn can_load(&self, descriptor: &TextureDescriptor) -> bool {
        matches!(descriptor, TextureDescriptor::Id(_))
    }

    fn load(&self, descriptor: &TextureDescriptor) -> BoxFuture<'static, Result<PixelBuffer>> {
        let (sender, receiver) = oneshot::channel();
        self.senders.lock().unwrap().push((descriptor.clone(), sender));
        *self.loads.lock().unwrap() += 1;
        async move {
            match receiver.await {
                Ok(result) => result,
                Err(_) => Err(Error::TextureLoadFailed("cancelled".to_string())),
            }
        }
        .boxed()
    }
}

fn setup() -> (Arc<ManualLoader>, TextureLoaderRegistry) {
    let loader = Arc::new(ManualLoader::default());
    let mut registry = TextureLoaderRegistry::new();
    registry.add(loader.clone());
    (loader, registry)
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_request_loads_once() {
    let (loader, registry) = setup();
    let mut cache = TextureCache::new();
    let d = TextureDescriptor::Id(1);

    assert_eq!(cache.request(&d, &registry), Ok(TextureStatus::Loading));
    assert_eq!(cache.request(&d, &registry), Ok(TextureStatus::Loading));
    assert_eq!(*loader.loads.lock().unwrap(), 1);
    assert_eq!(cache.loads_started(), 1);
    assert_eq!(cache.loading_count(), 1);
}

#[test]
fn test_poll_settles_ready() {
    let (loader, registry) = setup();
    let mut cache = TextureCache::new();
    let d = TextureDescriptor::Id(1);
    cache.request(&d, &registry).unwrap();

    assert!(cache.poll().is_empty());
    loader.take_sender(&d).send(Ok(PixelBuffer::filled(1, 1, [255, 0, 0, 255]))).unwrap();
    assert!(cache.has_wakeups());

    let settled = cache.poll();
    assert_eq!(settled, vec![SettledLoad { descriptor: d.clone(), result: Ok(()) }]);
    assert_eq!(cache.status(&d), Some(TextureStatus::Ready));
    assert_eq!(cache.pixels(&d).unwrap().pixel(0, 0), Some([255, 0, 0, 255]));
    assert!(cache.poll().is_empty());
}

#[test]
fn test_poll_settles_failed() {
    let (loader, registry) = setup();
    let mut cache = TextureCache::new();
    let d = TextureDescriptor::Id(2);
    cache.request(&d, &registry).unwrap();

    loader.take_sender(&d)
        .send(Err(Error::BackendError("404".to_string())))
        .unwrap();
    let settled = cache.poll();
    assert_eq!(settled.len(), 1);
    assert!(matches!(&settled[0].result, Err(Error::TextureLoadFailed(msg)) if msg.contains("404")));
    assert_eq!(cache.status(&d), Some(TextureStatus::Failed));
    assert!(cache.pixels(&d).is_none());
    assert!(cache.error(&d).is_some());
}

#[test]
fn test_unclaimed_descriptor_fails_once() {
    let (_loader, registry) = setup();
    let mut cache = TextureCache::new();
    let d = TextureDescriptor::Key("nobody".to_string());

    assert!(matches!(cache.request(&d, &registry), Err(Error::TextureLoadFailed(_))));
    assert_eq!(cache.request(&d, &registry), Ok(TextureStatus::Failed));
    assert!(TextureStatus::Failed.is_settled());
}

#[test]
fn test_retain_cancels_pending_load() {
    let (loader, registry) = setup();
    let mut cache = TextureCache::new();
    let d = TextureDescriptor::Id(3);
    cache.request(&d, &registry).unwrap();
    let sender = loader.take_sender(&d);

    assert_eq!(cache.retain(|_| false), 1);
    assert!(cache.is_empty());
    // The receiving future was dropped with the entry: nothing to write to
    assert!(sender.send(Ok(PixelBuffer::filled(1, 1, [0, 0, 0, 255]))).is_err());
    assert!(cache.poll().is_empty());
}
