// System
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

// Third Party
use futures::{pin_mut, Stream, StreamExt};
use kube::{
    api::Api,
    runtime::{
        reflector::{store::Writer, ObjectRef, Store},
        watcher,
        watcher::Event,
        WatchStreamExt,
    },
    Resource,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callbacks invoked by an [`Informer`], one per kind of change to a watched object.
pub trait ResourceEventHandler<K> {
    fn on_add(&mut self, obj: &K);
    fn on_update(&mut self, old: &K, new: &K);
    fn on_delete(&mut self, obj: &K);
}

/// Keeps a local copy of every watched object so that raw watch events can be turned into
/// add, update and delete callbacks.
///
/// The initial listing and every relist after a broken watch arrive as a full replacement
/// of the object set. Objects already known are reported as updates, new ones as additions,
/// and known objects missing from the listing as deletions with their last known state.
pub struct Informer<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    api: Api<K>,
    config: watcher::Config,
    writer: Writer<K>,
    store: Store<K>,
}

impl<K> Informer<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    pub fn new(api: Api<K>, config: watcher::Config) -> Self {
        let writer = Writer::default();
        let store = writer.as_reader();
        Self {
            api,
            config,
            writer,
            store,
        }
    }

    /// Read handle to the local cache.
    pub fn store(&self) -> Store<K> {
        self.store.clone()
    }

    /// Watch until `stop` is cancelled, delivering every change to `handler`.
    /// Reconnection and backoff are handled by the underlying watcher.
    pub async fn run<H>(mut self, handler: &mut H, stop: CancellationToken)
    where
        H: ResourceEventHandler<K>,
    {
        info!("Starting informer...");
        let stream = watcher(self.api.clone(), self.config.clone()).default_backoff();
        self.dispatch(stream, handler, stop).await;
        info!("Informer stopped");
    }

    /// Drain `stream` into `handler` until the stream ends or `stop` is cancelled.
    pub(crate) async fn dispatch<S, H>(&mut self, stream: S, handler: &mut H, stop: CancellationToken)
    where
        S: Stream<Item = Result<Event<K>, watcher::Error>>,
        H: ResourceEventHandler<K>,
    {
        pin_mut!(stream);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    debug!("Stop requested");
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.handle_event(event, handler),
                    Some(Err(error)) => {
                        warn!("Watch error, the watcher will retry: {}", error);
                    }
                    None => {
                        info!("Watch stream ended");
                        break;
                    }
                },
            }
        }
    }

    fn handle_event<H>(&mut self, event: Event<K>, handler: &mut H)
    where
        H: ResourceEventHandler<K>,
    {
        match &event {
            Event::Applied(obj) => match self.store.get(&ObjectRef::from_obj(obj)) {
                Some(old) => handler.on_update(&old, obj),
                None => handler.on_add(obj),
            },
            Event::Deleted(obj) => {
                // Deletes of objects never seen, or already deleted, are dropped
                if self.store.get(&ObjectRef::from_obj(obj)).is_some() {
                    handler.on_delete(obj);
                } else {
                    debug!("Ignoring delete of unknown object {:?}", obj.meta().name);
                }
            }
            Event::Restarted(objs) => {
                debug!("Relisted {} objects", objs.len());
                let mut listed = HashSet::with_capacity(objs.len());
                for obj in objs {
                    let key = ObjectRef::from_obj(obj);
                    match self.store.get(&key) {
                        Some(old) => handler.on_update(&old, obj),
                        None => handler.on_add(obj),
                    }
                    listed.insert(key);
                }
                for gone in self.store.state() {
                    if !listed.contains(&ObjectRef::from_obj(gone.as_ref())) {
                        handler.on_delete(&gone);
                    }
                }
            }
        }
        self.writer.apply_watcher_event(&event);
    }
}
