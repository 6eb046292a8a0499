//! Error types shared by the room store, the sync session and the judge.

use thiserror::Error;

use crate::rooms::record::Role;

/// Failures a room can run into.
///
/// `Conflict` only ever comes out of the store; the get-or-create protocol
/// absorbs it before anything reaches a caller of the sync session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The room does not exist (or vanished after being seen).
    #[error("room '{room_id}' not found")]
    NotFound { room_id: String },

    /// Another client created the room first.
    #[error("room '{room_id}' already exists")]
    Conflict { room_id: String },

    /// Connectivity or driver failure talking to the store.
    #[error("room store unavailable: {0}")]
    Transient(String),

    /// One side of the case has no story and no feelings yet.
    #[error("the {role} side has not written anything yet")]
    InsufficientInput { role: Role },
}

impl RoomError {
    pub fn not_found(room_id: impl Into<String>) -> Self {
        Self::NotFound {
            room_id: room_id.into(),
        }
    }

    pub fn conflict(room_id: impl Into<String>) -> Self {
        Self::Conflict {
            room_id: room_id.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for RoomError {
    fn from(err: sqlx::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

pub type RoomResult<T> = Result<T, RoomError>;
