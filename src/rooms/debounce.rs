//! Trailing-edge debounce for outbound room patches.
//!
//! Each key owns a pending patch union and a deadline. Every `schedule`
//! merges into the union and pushes the deadline out by the quiet window;
//! once the window passes with no new call, one `patch_room` carries the
//! whole union. Writes for a key are issued one at a time, in order.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use super::{record::RoomPatch, store::RoomStore};

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct DebouncedWriter {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn RoomStore>,
    quiet: Duration,
    // A key is present while its drain task is alive.
    slots: Mutex<HashMap<String, Option<Pending>>>,
}

struct Pending {
    patch: RoomPatch,
    deadline: Instant,
}

impl DebouncedWriter {
    pub fn new(store: Arc<dyn RoomStore>, quiet: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                quiet,
                slots: Mutex::default(),
            }),
        }
    }

    /// Queues `patch` for `key`. Must be called from within a tokio runtime.
    pub fn schedule(&self, key: &str, patch: RoomPatch) {
        if patch.is_empty() {
            return;
        }

        let deadline = Instant::now() + self.inner.quiet;
        let mut slots = self.inner.lock();
        match slots.get_mut(key) {
            Some(Some(pending)) => {
                pending.patch.merge(patch);
                pending.deadline = deadline;
            }
            Some(slot) => *slot = Some(Pending { patch, deadline }),
            None => {
                slots.insert(key.to_owned(), Some(Pending { patch, deadline }));
                tokio::spawn(Arc::clone(&self.inner).drain(key.to_owned()));
            }
        }
    }

    /// The union still waiting for its quiet window, if any.
    pub fn pending(&self, key: &str) -> Option<RoomPatch> {
        self.inner
            .lock()
            .get(key)
            .and_then(|slot| slot.as_ref().map(|p| p.patch.clone()))
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<Pending>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(self: Arc<Self>, key: String) {
        loop {
            let deadline = {
                let mut slots = self.lock();
                match slots.get(&key) {
                    Some(Some(pending)) => pending.deadline,
                    _ => {
                        slots.remove(&key);
                        return;
                    }
                }
            };

            tokio::time::sleep_until(deadline).await;

            let due = {
                let mut slots = self.lock();
                let Some(slot) = slots.get_mut(&key) else {
                    return;
                };
                if slot.as_ref().is_some_and(|p| p.deadline <= Instant::now()) {
                    slot.take()
                } else {
                    None
                }
            };

            if let Some(Pending { patch, .. }) = due {
                self.write(&key, patch).await;
            }
        }
    }

    async fn write(&self, key: &str, patch: RoomPatch) {
        match self.store.patch_room(key, &patch).await {
            Ok(()) => tracing::debug!(room_id = key, fields = patch.len(), "flushed room patch"),
            // Not retried: the next edit re-sends its field.
            Err(e) => tracing::warn!(room_id = key, error = %e, "dropped room patch"),
        }
    }
}
