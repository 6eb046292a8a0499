pub mod debounce;
pub mod record;
pub mod session;
pub mod sqlite;
pub mod store;

mod join;
mod room;
mod verdict;
mod ws;

#[cfg(test)]
pub(crate) mod testing;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use debounce::DebouncedWriter;
pub use record::{Participant, Role, RoomField, RoomPatch, RoomRecord};
pub use session::{LocalView, SyncSession, SyncStatus, get_or_create};
pub use sqlite::SqliteRoomStore;
pub use store::{RoomStore, RoomSubscription};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/random", get(join::random_room))
        .route("/join", post(join::join))
        .route("/{room_id}", get(room::room))
        .route("/{room_id}/ws", get(ws::room_ws))
        .route("/{room_id}/judge", post(verdict::judge_room))
}

/// Room ids end up in URLs, so keep them to a plain alphabet.
pub(crate) fn valid_room_id(room_id: &str) -> bool {
    !room_id.is_empty()
        && room_id.len() <= 64
        && room_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
