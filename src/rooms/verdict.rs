use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}};
use tower_sessions::Session;

use crate::{judge::{self, JudgmentService}, session::participant_for, AppResult, AppState, Markdown};

use super::store::RoomStore;

/// Judges the room as stored right now and renders the verdict.
#[debug_handler(state = AppState)]
pub(crate) async fn judge_room(
    State(store): State<Arc<dyn RoomStore>>,
    State(service): State<Arc<dyn JudgmentService>>,
    Path(room_id): Path<String>,
    session: Session,
) -> AppResult<Response> {
    let Some(participant) = participant_for(&session, &room_id).await? else {
        return Ok(StatusCode::FORBIDDEN.into_response());
    };

    let record = store.fetch_room(&room_id).await?;
    let verdict = judge::request_judgment(
        service.as_ref(),
        &record,
        participant.role,
        &participant.nickname,
    )
    .await?;

    Ok(Markdown(verdict).into_response())
}
