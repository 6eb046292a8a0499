//! Store doubles for the sync and writer tests.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::{sync::broadcast, time::Instant};

use crate::error::{RoomError, RoomResult};

use super::{
    record::{RoomPatch, RoomRecord},
    store::{RoomStore, RoomSubscription},
};

/// Answers fetch/create from scripts and records every patch.
pub(crate) struct ScriptedStore {
    fetches: Mutex<VecDeque<RoomResult<RoomRecord>>>,
    creates: Mutex<VecDeque<RoomResult<RoomRecord>>>,
    patches: Mutex<Vec<(Instant, String, RoomPatch)>>,
    calls: Mutex<Vec<&'static str>>,
    fail_patches: AtomicBool,
    hang_patches: AtomicBool,
    feed: broadcast::Sender<RoomRecord>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self {
            fetches: Mutex::default(),
            creates: Mutex::default(),
            patches: Mutex::default(),
            calls: Mutex::default(),
            fail_patches: AtomicBool::new(false),
            hang_patches: AtomicBool::new(false),
            feed: broadcast::channel(16).0,
        }
    }

    /// Queues a fetch answer; an empty script answers `NotFound`.
    pub(crate) fn on_fetch(self, result: RoomResult<RoomRecord>) -> Self {
        self.fetches.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn on_create(self, result: RoomResult<RoomRecord>) -> Self {
        self.creates.lock().unwrap().push_back(result);
        self
    }

    pub(crate) fn failing_patches(self) -> Self {
        self.fail_patches.store(true, Ordering::SeqCst);
        self
    }

    /// Patches never resolve.
    pub(crate) fn hanging_patches(self) -> Self {
        self.hang_patches.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn patches(&self) -> Vec<(Instant, String, RoomPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.feed.receiver_count()
    }

    /// Pushes a snapshot to every subscriber, as the store would after a commit.
    pub(crate) fn push(&self, record: RoomRecord) {
        let _ = self.feed.send(record);
    }
}

#[async_trait]
impl RoomStore for ScriptedStore {
    async fn fetch_room(&self, room_id: &str) -> RoomResult<RoomRecord> {
        self.calls.lock().unwrap().push("fetch");
        let next = self.fetches.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(RoomError::not_found(room_id)))
    }

    async fn create_room(&self, room_id: &str) -> RoomResult<RoomRecord> {
        self.calls.lock().unwrap().push("create");
        let next = self.creates.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(RoomRecord::empty(room_id)))
    }

    async fn patch_room(&self, room_id: &str, patch: &RoomPatch) -> RoomResult<()> {
        self.calls.lock().unwrap().push("patch");
        self.patches
            .lock()
            .unwrap()
            .push((Instant::now(), room_id.to_owned(), patch.clone()));

        if self.hang_patches.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_patches.load(Ordering::SeqCst) {
            return Err(RoomError::transient("connection reset"));
        }
        Ok(())
    }

    async fn subscribe(&self, room_id: &str) -> RoomResult<RoomSubscription> {
        self.calls.lock().unwrap().push("subscribe");
        Ok(RoomSubscription::new(room_id, self.feed.subscribe()))
    }
}
