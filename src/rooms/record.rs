use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Which party a participant speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Male,
    Female,
}

impl Role {
    /// The two fields this side writes.
    pub fn fields(self) -> [RoomField; 2] {
        use RoomField::*;
        match self {
            Role::Male => [MaleStory, MaleFeelings],
            Role::Female => [FemaleStory, FemaleFeelings],
        }
    }

    /// Name used for a party whose nickname we don't know.
    pub fn generic_label(self) -> &'static str {
        match self {
            Role::Male => "Him",
            Role::Female => "Her",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Male => write!(f, "male"),
            Role::Female => write!(f, "female"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomField {
    MaleStory,
    MaleFeelings,
    FemaleStory,
    FemaleFeelings,
}

impl RoomField {
    pub const ALL: [RoomField; 4] = [
        RoomField::MaleStory,
        RoomField::MaleFeelings,
        RoomField::FemaleStory,
        RoomField::FemaleFeelings,
    ];

    /// Column name in the `rooms` table.
    pub fn column(self) -> &'static str {
        use RoomField::*;
        match self {
            MaleStory => "male_story",
            MaleFeelings => "male_feelings",
            FemaleStory => "female_story",
            FemaleFeelings => "female_feelings",
        }
    }
}

/// The shared state of one case room. One row per `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomRecord {
    pub id: String,
    pub male_story: String,
    pub male_feelings: String,
    pub female_story: String,
    pub female_feelings: String,
    /// Bumped by the store on every accepted patch.
    pub revision: i64,
}

impl RoomRecord {
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, field: RoomField) -> &str {
        use RoomField::*;
        match field {
            MaleStory => &self.male_story,
            MaleFeelings => &self.male_feelings,
            FemaleStory => &self.female_story,
            FemaleFeelings => &self.female_feelings,
        }
    }

    pub fn set(&mut self, field: RoomField, value: impl Into<String>) {
        use RoomField::*;
        let slot = match field {
            MaleStory => &mut self.male_story,
            MaleFeelings => &mut self.male_feelings,
            FemaleStory => &mut self.female_story,
            FemaleFeelings => &mut self.female_feelings,
        };
        *slot = value.into();
    }

    /// Merge-patch: only the fields named in `patch` change.
    pub fn apply(&mut self, patch: &RoomPatch) {
        for (field, value) in patch.iter() {
            self.set(field, value);
        }
    }

    /// Same room and same text, ignoring the revision.
    pub fn same_content(&self, other: &RoomRecord) -> bool {
        self.id == other.id && RoomField::ALL.iter().all(|&f| self.get(f) == other.get(f))
    }

    /// True when neither field of `role` has any text.
    pub fn side_is_empty(&self, role: Role) -> bool {
        role.fields().iter().all(|&f| self.get(f).is_empty())
    }
}

/// A field-scoped update. Later values for the same field win when merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomPatch(BTreeMap<RoomField, String>);

impl RoomPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(field: RoomField, value: impl Into<String>) -> Self {
        let mut patch = Self::new();
        patch.set(field, value);
        patch
    }

    pub fn set(&mut self, field: RoomField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn get(&self, field: RoomField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn merge(&mut self, other: RoomPatch) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoomField, &str)> {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Who is on this end of the room. Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub room_id: String,
    pub role: Role,
    pub nickname: String,
}
