//! Values kept in the cookie session.

use tower_sessions::Session;

use crate::rooms::record::Participant;

pub const PARTICIPANT: &str = "participant";

/// The participant stored at join time, if they joined `room_id`.
pub async fn participant_for(
    session: &Session,
    room_id: &str,
) -> Result<Option<Participant>, tower_sessions::session::Error> {
    Ok(session
        .get::<Participant>(PARTICIPANT)
        .await?
        .filter(|participant| participant.room_id == room_id))
}
