use crate::overlay::model::PanelState;
use crate::overlay::store::StateStore;
use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A state transform. It may run twice: once optimistically before the
/// persisted snapshot is available and once more against that snapshot, so
/// it has to be pure. Generate ids before building the closure.
pub type Transform = Arc<dyn Fn(&PanelState) -> PanelState + Send + Sync>;

enum WriterMessage {
    Save(PanelState),
    Flush(Sender<()>),
}

#[derive(Default)]
struct CacheState {
    latest: PanelState,
    hydrated: bool,
    pending: Vec<Transform>,
}

#[derive(Default)]
struct Shared {
    cache: Mutex<CacheState>,
    hydrated_signal: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory cache of the panel state in front of a [`StateStore`].
///
/// Reads always see the latest in-memory value. Writes are handed to a
/// background thread and never awaited; a failed write is logged and dropped.
pub struct StateRepository {
    shared: Arc<Shared>,
    writer_tx: Option<Sender<WriterMessage>>,
    writer_handle: Option<JoinHandle<()>>,
}

impl StateRepository {
    /// Spawns the writer thread. Its first job is hydrating the cache from
    /// `store`; updates issued before that finishes are queued and replayed.
    pub fn start(store: Arc<dyn StateStore>) -> Result<Self> {
        let shared = Arc::new(Shared::default());
        let (writer_tx, writer_rx) = channel::<WriterMessage>();

        let worker_shared = Arc::clone(&shared);
        let writer_handle = thread::Builder::new()
            .name("overlay-state-writer".to_string())
            .spawn(move || {
                hydrate(&worker_shared, store.as_ref());
                while let Ok(message) = writer_rx.recv() {
                    match message {
                        WriterMessage::Save(state) => persist(store.as_ref(), &state),
                        WriterMessage::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                tracing::debug!("overlay state writer stopped");
            })
            .context("spawn overlay state writer thread")?;

        Ok(Self {
            shared,
            writer_tx: Some(writer_tx),
            writer_handle: Some(writer_handle),
        })
    }

    pub fn get(&self) -> PanelState {
        self.shared.lock().latest.clone()
    }

    pub fn is_hydrated(&self) -> bool {
        self.shared.lock().hydrated
    }

    /// Blocks until the persisted snapshot has been loaded, or `timeout`
    /// elapses. Returns whether hydration completed.
    pub fn wait_for_hydration(&self, timeout: Duration) -> bool {
        let guard = self.shared.lock();
        let (guard, _) = self
            .shared
            .hydrated_signal
            .wait_timeout_while(guard, timeout, |cache| !cache.hydrated)
            .unwrap_or_else(PoisonError::into_inner);
        guard.hydrated
    }

    /// Applies `transform` to the cached state and schedules the write.
    /// Returns the new in-memory state.
    pub fn update<F>(&self, transform: F) -> PanelState
    where
        F: Fn(&PanelState) -> PanelState + Send + Sync + 'static,
    {
        let mut cache = self.shared.lock();
        let next = transform(&cache.latest);
        cache.latest = next.clone();
        if cache.hydrated {
            self.send(WriterMessage::Save(next.clone()));
        } else {
            tracing::debug!(
                pending = cache.pending.len() + 1,
                "overlay state not hydrated yet, queueing transform for replay"
            );
            cache.pending.push(Arc::new(transform));
        }
        next
    }

    /// Waits until hydration and every write scheduled so far are done.
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = channel();
        let tx = self
            .writer_tx
            .as_ref()
            .ok_or_else(|| anyhow!("overlay state writer already stopped"))?;
        tx.send(WriterMessage::Flush(ack_tx))
            .map_err(|_| anyhow!("overlay state writer disconnected"))?;
        ack_rx
            .recv()
            .map_err(|_| anyhow!("overlay state writer dropped flush acknowledgement"))
    }

    fn send(&self, message: WriterMessage) {
        let Some(tx) = self.writer_tx.as_ref() else {
            return;
        };
        if tx.send(message).is_err() {
            tracing::warn!("overlay state writer disconnected, write dropped");
        }
    }
}

impl Drop for StateRepository {
    fn drop(&mut self) {
        self.writer_tx.take();
        if let Some(handle) = self.writer_handle.take() {
            if handle.join().is_err() {
                tracing::error!("overlay state writer panicked");
            }
        }
    }
}

fn hydrate(shared: &Shared, store: &dyn StateStore) {
    let snapshot = store.load();
    let replayed = {
        let mut cache = shared.lock();
        let pending = std::mem::take(&mut cache.pending);
        let replay_count = pending.len();
        let next = pending
            .iter()
            .fold(snapshot, |state, transform| transform(&state));
        cache.latest = next.clone();
        cache.hydrated = true;
        shared.hydrated_signal.notify_all();
        tracing::debug!(
            replayed = replay_count,
            opponents = next.opponents.len(),
            "overlay state hydrated"
        );
        (replay_count > 0).then_some(next)
    };
    if let Some(state) = replayed {
        persist(store, &state);
    }
}

fn persist(store: &dyn StateStore, state: &PanelState) {
    if let Err(err) = store.save(state) {
        tracing::warn!(?err, "failed to persist overlay state");
    }
}
