use std::{sync::Arc, time::Duration};

use axum::{debug_handler, extract::{ws::{Message, WebSocket}, Path, State, WebSocketUpgrade}, http::StatusCode, response::{IntoResponse, Response}};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_sessions::Session;

use crate::{judge::JudgmentService, session::participant_for, AppResult, AppState};

use super::{record::RoomField, session::{LocalView, SyncSession}, store::RoomStore};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientMessage {
    Update { field: RoomField, value: String },
    Judge,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerMessage {
    View(LocalView),
    Verdict { text: String },
    Rejected { message: String },
}

/// One socket, one sync session for the participant in the cookie session.
#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<String>,
    State(store): State<Arc<dyn RoomStore>>,
    State(service): State<Arc<dyn JudgmentService>>,
    State(debounce): State<Duration>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(participant) = participant_for(&session, &room_id).await? else {
        return Ok(StatusCode::FORBIDDEN.into_response());
    };

    Ok(ws.on_upgrade(async move |stream| {
        let sync = SyncSession::join(participant, store, debounce).await;
        let mut views = sync.watch();
        let (mut sender, mut receiver) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(8);

        let mut forward_task = tokio::spawn(async move {
            let first = ServerMessage::View(views.borrow_and_update().clone());
            if send(&mut sender, &first).await.is_err() {
                return;
            }

            loop {
                let reply = tokio::select! {
                    changed = views.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        None
                    }
                    Some(reply) = out_rx.recv() => Some(reply),
                    else => break,
                };
                let msg = reply.unwrap_or_else(|| ServerMessage::View(views.borrow_and_update().clone()));

                if send(&mut sender, &msg).await.is_err() {
                    break;
                }
            }
        });

        loop {
            let msg = tokio::select! {
                msg = receiver.next() => msg,
                _ = &mut forward_task => break,
            };
            let Some(Ok(msg)) = msg else {
                break;
            };
            if let Message::Close(_) = msg {
                break;
            }
            let Ok(msg) = serde_json::from_slice::<ClientMessage>(&msg.into_data()) else {
                continue;
            };

            match msg {
                ClientMessage::Update { field, value } => sync.update_field(field, value),
                ClientMessage::Judge => {
                    let judgment = sync.request_judgment(Arc::clone(&service));
                    let out_tx = out_tx.clone();
                    tokio::spawn(async move {
                        let reply = match judgment.await {
                            Ok(text) => ServerMessage::Verdict { text },
                            Err(e) => ServerMessage::Rejected { message: e.to_string() },
                        };
                        let _ = out_tx.send(reply).await;
                    });
                }
            }
        }

        forward_task.abort();
        sync.close().await;
    }))
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(text.into())).await
}
