//! Asking the cat judge for a verdict on a room.

mod canned;
mod gemini;
mod prompt;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    error::{RoomError, RoomResult},
    rooms::record::{Role, RoomRecord},
};

pub use canned::CannedJudge;
pub use gemini::{DEFAULT_GEMINI_MODEL, GeminiJudge};
pub use prompt::{SYSTEM_INSTRUCTION, build_prompt};

pub const NAPPING_VERDICT: &str =
    "The cat judge is napping, please try again later, meow~ (the verdict came back empty)";

/// Both sides of the case as sent to the judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseDetails {
    pub male_name: String,
    pub female_name: String,
    pub male_story: String,
    pub male_feelings: String,
    pub female_story: String,
    pub female_feelings: String,
}

impl CaseDetails {
    /// The local party goes by their nickname. The other party's nickname
    /// never reaches the shared record, so they get the generic label.
    pub fn from_record(record: &RoomRecord, local_role: Role, local_nickname: &str) -> Self {
        let name = |role: Role| {
            let nickname = local_nickname.trim();
            if role == local_role && !nickname.is_empty() {
                nickname.to_owned()
            } else {
                role.generic_label().to_owned()
            }
        };

        Self {
            male_name: name(Role::Male),
            female_name: name(Role::Female),
            male_story: record.male_story.clone(),
            male_feelings: record.male_feelings.clone(),
            female_story: record.female_story.clone(),
            female_feelings: record.female_feelings.clone(),
        }
    }

    pub fn name(&self, role: Role) -> &str {
        match role {
            Role::Male => &self.male_name,
            Role::Female => &self.female_name,
        }
    }
}

/// Turns a case into free-form verdict text.
#[async_trait]
pub trait JudgmentService: Send + Sync {
    async fn judge(&self, case: &CaseDetails) -> anyhow::Result<String>;
}

/// Runs one judgment for `record`.
///
/// Both sides must have written something. The service is called exactly
/// once; if it fails the caller still gets text, just an apologetic one.
pub async fn request_judgment(
    service: &dyn JudgmentService,
    record: &RoomRecord,
    local_role: Role,
    local_nickname: &str,
) -> RoomResult<String> {
    for role in [Role::Male, Role::Female] {
        if record.side_is_empty(role) {
            return Err(RoomError::InsufficientInput { role });
        }
    }

    let case = CaseDetails::from_record(record, local_role, local_nickname);
    match service.judge(&case).await {
        Ok(text) if text.trim().is_empty() => Ok(NAPPING_VERDICT.to_owned()),
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::warn!(room_id = %record.id, error = %e, "judgment service failed");
            Ok(format!(
                "The cat judge lost the connection, please check the network or API key, meow! (error: {e})"
            ))
        }
    }
}
