//! One client's live view of a room.
//!
//! Local edits land in the view immediately and go upstream through the
//! debounced writer. Remote snapshots from the store's change feed replace
//! the view wholesale; the store has already merged whatever field-scoped
//! patches produced them.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use uuid::Uuid;

use crate::{
    error::{RoomError, RoomResult},
    judge::{self, JudgmentService},
};

use super::{
    debounce::DebouncedWriter,
    record::{Participant, RoomField, RoomPatch, RoomRecord},
    store::RoomStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SyncStatus {
    Initializing,
    Ready,
    Erred(String),
}

/// What the UI renders: the mirrored record plus loading/error status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalView {
    pub record: RoomRecord,
    pub status: SyncStatus,
}

impl LocalView {
    pub fn initializing(room_id: impl Into<String>) -> Self {
        Self {
            record: RoomRecord::empty(room_id),
            status: SyncStatus::Initializing,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == SyncStatus::Initializing
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SyncStatus::Erred(message) => Some(message),
            _ => None,
        }
    }
}

/// Loads `room_id`, creating it if nobody has yet.
///
/// Losing the creation race to the other party is fine: the winner's row is
/// fetched instead. That second fetch is the only retry.
pub async fn get_or_create(store: &dyn RoomStore, room_id: &str) -> RoomResult<RoomRecord> {
    match store.fetch_room(room_id).await {
        Ok(record) => return Ok(record),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    match store.create_room(room_id).await {
        Err(e) if e.is_conflict() => {
            tracing::debug!(room_id, "room created concurrently, fetching it");
            store.fetch_room(room_id).await.map_err(|e| match e {
                RoomError::NotFound { .. } => RoomError::transient(format!(
                    "room '{room_id}' already exists but could not be read"
                )),
                e => e,
            })
        }
        result => result,
    }
}

pub struct SyncSession {
    client_id: Uuid,
    participant: Participant,
    store: Arc<dyn RoomStore>,
    writer: DebouncedWriter,
    view: Arc<watch::Sender<LocalView>>,
    feed: Option<JoinHandle<()>>,
}

impl SyncSession {
    /// A session in `Initializing`; nothing touches the store until `start`.
    pub fn new(participant: Participant, store: Arc<dyn RoomStore>, writer: DebouncedWriter) -> Self {
        let view = LocalView::initializing(&participant.room_id);
        Self {
            client_id: Uuid::now_v7(),
            participant,
            store,
            writer,
            view: Arc::new(watch::channel(view).0),
            feed: None,
        }
    }

    /// `new` + `start` with a writer of its own. A failed start leaves the
    /// session `Erred` rather than returning the error.
    pub async fn join(participant: Participant, store: Arc<dyn RoomStore>, quiet: Duration) -> Self {
        let writer = DebouncedWriter::new(Arc::clone(&store), quiet);
        let mut session = Self::new(participant, store, writer);
        let _ = session.start().await;
        session
    }

    /// Get-or-create, then attach the change feed. `Ready` on success,
    /// `Erred` otherwise.
    pub async fn start(&mut self) -> RoomResult<()> {
        if self.feed.is_some() {
            return Ok(());
        }

        match self.attach().await {
            Ok(()) => {
                tracing::info!(
                    room_id = %self.participant.room_id,
                    client_id = %self.client_id,
                    role = %self.participant.role,
                    "room session ready"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    room_id = %self.participant.room_id,
                    client_id = %self.client_id,
                    error = %e,
                    "room session failed to start"
                );
                self.view
                    .send_modify(|view| view.status = SyncStatus::Erred(e.to_string()));
                Err(e)
            }
        }
    }

    async fn attach(&mut self) -> RoomResult<()> {
        let room_id = self.participant.room_id.as_str();

        let initial = get_or_create(self.store.as_ref(), room_id).await?;
        self.view.send_if_modified(|view| {
            let changed = view.record != initial;
            view.record = initial;
            changed
        });

        let mut feed = self.store.subscribe(room_id).await?;

        // Patches committed between the first read and the subscription are
        // only visible through a fresh read.
        let latest = self.store.fetch_room(room_id).await?;
        self.view.send_modify(|view| {
            view.record = latest;
            view.status = SyncStatus::Ready;
        });

        let view = Arc::clone(&self.view);
        self.feed = Some(tokio::spawn(async move {
            while let Some(snapshot) = feed.next().await {
                apply_snapshot(&view, snapshot);
            }
        }));
        Ok(())
    }

    /// Current mirror of the room. Always available.
    pub fn view(&self) -> LocalView {
        self.view.borrow().clone()
    }

    /// Notified on every observable change to the view.
    pub fn watch(&self) -> watch::Receiver<LocalView> {
        self.view.subscribe()
    }

    /// Local edit: applied to the view right away, then queued upstream.
    pub fn update_field(&self, field: RoomField, value: impl Into<String>) {
        let value = value.into();
        self.view.send_if_modified(|view| {
            if view.record.get(field) == value {
                return false;
            }
            view.record.set(field, value.as_str());
            true
        });
        self.writer
            .schedule(&self.participant.room_id, RoomPatch::field(field, value));
    }

    /// Remote change: adopts `snapshot` if it is newer and differs from the
    /// view. Returns whether the view changed.
    pub fn apply_remote(&self, snapshot: RoomRecord) -> bool {
        apply_snapshot(&self.view, snapshot)
    }

    /// Judges the view as it is now. The returned future owns everything it
    /// needs, so it can run on its own task while edits keep flowing.
    pub fn request_judgment(
        &self,
        service: Arc<dyn JudgmentService>,
    ) -> impl Future<Output = RoomResult<String>> + Send + use<> {
        let record = self.view.borrow().record.clone();
        let Participant { role, nickname, .. } = self.participant.clone();
        async move { judge::request_judgment(service.as_ref(), &record, role, &nickname).await }
    }

    /// Drops the change subscription. Debounced writes already queued may
    /// still land.
    pub async fn close(mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
            let _ = feed.await;
        }
        tracing::debug!(
            room_id = %self.participant.room_id,
            client_id = %self.client_id,
            "room session closed"
        );
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

fn apply_snapshot(view: &watch::Sender<LocalView>, snapshot: RoomRecord) -> bool {
    view.send_if_modified(|view| {
        let current = &mut view.record;
        if snapshot.id != current.id || snapshot.revision <= current.revision {
            return false;
        }
        if current.same_content(&snapshot) {
            current.revision = snapshot.revision;
            return false;
        }
        *current = snapshot;
        true
    })
}
