use axum::{debug_handler, http::StatusCode, response::{IntoResponse, Redirect, Response}, Form, Json};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{session::PARTICIPANT, AppResult};

use super::{record::{Participant, Role}, valid_room_id};

#[derive(Debug, Deserialize)]
pub(crate) struct JoinForm {
    room_id: String,
    nickname: String,
    role: Role,
}

#[derive(Debug, Serialize)]
pub(crate) struct RandomRoom {
    room_id: String,
}

/// A fresh six-digit room number to share with the other party.
#[debug_handler]
pub(crate) async fn random_room() -> Json<RandomRoom> {
    let number: u32 = rand::rng().random_range(100_000..1_000_000);
    Json(RandomRoom {
        room_id: number.to_string(),
    })
}

#[debug_handler]
pub(crate) async fn join(
    session: Session,

    Form(JoinForm { room_id, nickname, role }): Form<JoinForm>,
) -> AppResult<Response> {
    let room_id = room_id.trim();
    let nickname = nickname.trim();

    if room_id.is_empty() || nickname.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "room id and nickname are both required, meow!").into_response());
    }
    if !valid_room_id(room_id) {
        return Ok((StatusCode::BAD_REQUEST, "room ids are letters, digits, '-' and '_' only").into_response());
    }

    let participant = Participant {
        room_id: room_id.to_owned(),
        role,
        nickname: nickname.to_owned(),
    };
    session.insert(PARTICIPANT, &participant).await?;

    tracing::info!(room_id, %role, "participant joined");

    Ok(Redirect::to(&format!("/r/{room_id}")).into_response())
}
