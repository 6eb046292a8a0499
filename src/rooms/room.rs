use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, Json};

use crate::{error::RoomError, AppResult, AppState};

use super::{record::RoomRecord, session::get_or_create, store::RoomStore, valid_room_id};

/// The room's current record, creating it on first visit.
#[debug_handler(state = AppState)]
pub(crate) async fn room(
    State(store): State<Arc<dyn RoomStore>>,
    Path(room_id): Path<String>,
) -> AppResult<Json<RoomRecord>> {
    if !valid_room_id(&room_id) {
        return Err(RoomError::not_found(room_id).into());
    }

    Ok(Json(get_or_create(store.as_ref(), &room_id).await?))
}
