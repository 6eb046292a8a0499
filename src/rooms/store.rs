use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::RoomResult;

use super::record::{RoomPatch, RoomRecord};

/// The persistent record store the sync session talks to.
///
/// Uniqueness of room ids is the store's business: `create_room` fails with
/// `Conflict` when the row is already there.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Point lookup. `NotFound` when the room doesn't exist.
    async fn fetch_room(&self, room_id: &str) -> RoomResult<RoomRecord>;

    /// Inserts a room with every text field empty.
    async fn create_room(&self, room_id: &str) -> RoomResult<RoomRecord>;

    /// Merge-updates only the fields in `patch`.
    async fn patch_room(&self, room_id: &str, patch: &RoomPatch) -> RoomResult<()>;

    /// Full post-update snapshots for every accepted patch of `room_id`,
    /// in commit order, including patches sent by the subscriber itself.
    async fn subscribe(&self, room_id: &str) -> RoomResult<RoomSubscription>;
}

/// A live change feed for one room. Dropping it unsubscribes.
pub struct RoomSubscription {
    room_id: String,
    rx: broadcast::Receiver<RoomRecord>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RoomSubscription {
    pub fn new(room_id: impl Into<String>, rx: broadcast::Receiver<RoomRecord>) -> Self {
        Self {
            room_id: room_id.into(),
            rx,
            release: None,
        }
    }

    /// Runs `release` when the subscription is dropped, while its receiver
    /// is still attached.
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Next snapshot, or `None` once the feed is gone.
    ///
    /// Snapshots are full rows, so a lagging receiver just skips ahead.
    pub async fn next(&mut self) -> Option<RoomRecord> {
        loop {
            match self.rx.recv().await {
                Ok(record) => return Some(record),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(room_id = %self.room_id, skipped, "change feed lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
