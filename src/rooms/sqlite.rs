use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::broadcast;

use crate::error::{RoomError, RoomResult};

use super::{
    record::{RoomPatch, RoomRecord},
    store::{RoomStore, RoomSubscription},
};

const COLUMNS: &str = "id,male_story,male_feelings,female_story,female_feelings,revision";
const FEED_CAPACITY: usize = 64;

type Feeds = Mutex<HashMap<String, broadcast::Sender<RoomRecord>>>;

/// `RoomStore` over a SQLite `rooms` table, with an in-process change feed
/// per room.
#[derive(Clone)]
pub struct SqliteRoomStore {
    db_pool: SqlitePool,
    feeds: Arc<Feeds>,
}

impl SqliteRoomStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self {
            db_pool,
            feeds: Arc::default(),
        }
    }

    pub async fn migrate(&self) -> RoomResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY NOT NULL,
                male_story TEXT NOT NULL DEFAULT '',
                male_feelings TEXT NOT NULL DEFAULT '',
                female_story TEXT NOT NULL DEFAULT '',
                female_feelings TEXT NOT NULL DEFAULT '',
                revision INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    fn publish(&self, record: RoomRecord) {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = feeds.get(&record.id) else {
            return;
        };

        if tx.receiver_count() == 0 {
            feeds.remove(&record.id);
            return;
        }

        let _ = tx.send(record);
    }
}

#[async_trait]
impl RoomStore for SqliteRoomStore {
    async fn fetch_room(&self, room_id: &str) -> RoomResult<RoomRecord> {
        sqlx::query_as::<_, RoomRecord>(&format!("SELECT {COLUMNS} FROM rooms WHERE id=?"))
            .bind(room_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| RoomError::not_found(room_id))
    }

    async fn create_room(&self, room_id: &str) -> RoomResult<RoomRecord> {
        let result = sqlx::query_as::<_, RoomRecord>(&format!(
            "INSERT INTO rooms (id) VALUES (?) RETURNING {COLUMNS}"
        ))
        .bind(room_id)
        .fetch_one(&self.db_pool)
        .await;

        match result {
            Ok(record) => {
                tracing::info!(room_id, "created room");
                Ok(record)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RoomError::conflict(room_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_room(&self, room_id: &str, patch: &RoomPatch) -> RoomResult<()> {
        if patch.is_empty() {
            return self.fetch_room(room_id).await.map(|_| ());
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE rooms SET ");
        for (field, value) in patch.iter() {
            query
                .push(field.column())
                .push(" = ")
                .push_bind(value.to_owned())
                .push(", ");
        }
        query
            .push("revision = revision + 1 WHERE id = ")
            .push_bind(room_id.to_owned())
            .push(" RETURNING ")
            .push(COLUMNS);

        let record = query
            .build_query_as::<RoomRecord>()
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| RoomError::not_found(room_id))?;

        tracing::debug!(room_id, revision = record.revision, fields = patch.len(), "patched room");
        self.publish(record);
        Ok(())
    }

    async fn subscribe(&self, room_id: &str) -> RoomResult<RoomSubscription> {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        let rx = feeds
            .entry(room_id.to_owned())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe();
        drop(feeds);

        let weak = Arc::downgrade(&self.feeds);
        let key = room_id.to_owned();
        Ok(RoomSubscription::new(room_id, rx).on_release(move || release_feed(&weak, &key)))
    }
}

/// Drops the room's feed once the departing subscriber is its last receiver.
fn release_feed(feeds: &Weak<Feeds>, room_id: &str) {
    let Some(feeds) = feeds.upgrade() else {
        return;
    };
    let mut feeds = feeds.lock().unwrap_or_else(PoisonError::into_inner);
    if feeds.get(room_id).is_some_and(|tx| tx.receiver_count() <= 1) {
        feeds.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::rooms::{record::RoomField, session::get_or_create};

    /// One connection, never recycled: every connection to `sqlite::memory:`
    /// is its own database.
    async fn memory_store() -> SqliteRoomStore {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteRoomStore::new(db_pool);
        store.migrate().await.unwrap();
        store
    }

    async fn row_count(store: &SqliteRoomStore, room_id: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rooms WHERE id=?")
            .bind(room_id)
            .fetch_one(&store.db_pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn create_then_create_again_conflicts() {
        let store = memory_store().await;

        let created = store.create_room("123456").await.unwrap();
        assert_eq!(created, RoomRecord::empty("123456"));

        let err = store.create_room("123456").await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(row_count(&store, "123456").await, 1);
    }

    #[tokio::test]
    async fn fetch_missing_room_is_not_found() {
        let store = memory_store().await;
        assert!(store.fetch_room("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn patch_leaves_other_fields_alone() {
        let store = memory_store().await;
        store.create_room("r").await.unwrap();
        store
            .patch_room("r", &RoomPatch::field(RoomField::MaleFeelings, "tired"))
            .await
            .unwrap();

        store
            .patch_room("r", &RoomPatch::field(RoomField::MaleStory, "dishes"))
            .await
            .unwrap();

        let record = store.fetch_room("r").await.unwrap();
        assert_eq!(record.male_story, "dishes");
        assert_eq!(record.male_feelings, "tired");
        assert_eq!(record.revision, 2);
    }

    #[tokio::test]
    async fn patch_missing_room_is_not_found() {
        let store = memory_store().await;
        let err = store
            .patch_room("gone", &RoomPatch::field(RoomField::FemaleStory, "x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn independent_writers_both_land() {
        let store = memory_store().await;
        store.create_room("r").await.unwrap();

        store
            .patch_room("r", &RoomPatch::field(RoomField::MaleStory, "A1"))
            .await
            .unwrap();
        store
            .patch_room("r", &RoomPatch::field(RoomField::FemaleStory, "B1"))
            .await
            .unwrap();

        let record = store.fetch_room("r").await.unwrap();
        assert_eq!(record.male_story, "A1");
        assert_eq!(record.female_story, "B1");
    }

    #[tokio::test]
    async fn subscribers_get_full_snapshots_including_their_own_writes() {
        let store = memory_store().await;
        store.create_room("r").await.unwrap();
        let mut feed = store.subscribe("r").await.unwrap();
        let mut other_room = store.subscribe("other").await.unwrap();

        store
            .patch_room("r", &RoomPatch::field(RoomField::MaleStory, "one"))
            .await
            .unwrap();
        store
            .patch_room("r", &RoomPatch::field(RoomField::FemaleFeelings, "two"))
            .await
            .unwrap();

        let first = feed.next().await.unwrap();
        assert_eq!(first.male_story, "one");
        assert_eq!(first.revision, 1);

        let second = feed.next().await.unwrap();
        assert_eq!(second.male_story, "one");
        assert_eq!(second.female_feelings, "two");
        assert_eq!(second.revision, 2);

        let nothing = tokio::time::timeout(Duration::from_millis(20), other_room.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn dropped_feeds_are_pruned() {
        let store = memory_store().await;
        store.create_room("r").await.unwrap();
        drop(store.subscribe("r").await.unwrap());

        store
            .patch_room("r", &RoomPatch::field(RoomField::MaleStory, "x"))
            .await
            .unwrap();

        assert!(store.feeds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn feed_goes_away_with_its_last_subscriber() {
        let store = memory_store().await;

        let first = store.subscribe("r").await.unwrap();
        let second = store.subscribe("r").await.unwrap();
        for room_id in (0..100).map(|n| n.to_string()) {
            drop(store.subscribe(&room_id).await.unwrap());
        }
        assert_eq!(store.feeds.lock().unwrap().len(), 1);

        drop(first);
        assert!(store.feeds.lock().unwrap().contains_key("r"));
        drop(second);
        assert!(store.feeds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_get_or_create_yields_one_row() {
        let store = memory_store().await;

        let (a, b) = tokio::join!(get_or_create(&store, "654321"), get_or_create(&store, "654321"));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(row_count(&store, "654321").await, 1);
    }
}
