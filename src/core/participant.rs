use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single registrant for a single event, as returned by the registration API
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantRecord {
    pub event_name: String,

    /// The participant's email, which keys every mutation on the API
    pub user_email: String,

    pub paid: bool,
    pub checked_in: bool,

    /// One of `car`, `motorcycle` or `quad`
    pub vehicle_type: String,

    pub metadata: Metadata,
}

impl ParticipantRecord {
    /// Whether this record carries a review comment.
    ///
    /// A present but empty comment still counts, only a missing one does not.
    pub fn has_comment(&self) -> bool {
        self.metadata.comment.is_some()
    }

    /// The empty record handed back whenever a lookup or mutation failed
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.user_email.is_empty()
    }

    /// Returns the driver entry from the people list, if there is one
    pub fn driver(&self) -> Option<&Person> {
        self.metadata.people.iter().find(|p| p.kind == "driver")
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub vehicle: Vehicle,
    pub people: Vec<Person>,
    pub phone_number: String,
    pub registered_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub check_in: CheckIn,
    pub payment_info: PaymentInfo,

    /// Free text left by the organisers. Its presence means the participant
    /// needs a manual look before being let in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub change_history: Vec<ChangeHistoryEntry>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Vehicle {
    pub plate: String,
    pub make: String,
    pub model: String,
}

/// A driver or guest travelling with the registrant
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    /// `driver` or `guest`
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub drivers_license: String,
    pub phone_number: String,
    pub cc: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckIn {
    pub check_in_at: Option<DateTime<Utc>>,
    pub by_who: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentInfo {
    pub amount: f64,
    pub by_who: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub payment_file: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChangeHistoryEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub action: String,
    pub description: String,
}

/// How a participant is looked up: by email or by phone number
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Identifier {
    Email(String),
    Phone(String),
}

impl Identifier {
    /// Parses raw scanner or keyboard input.
    ///
    /// Anything with an `@` is an email, everything else is treated as a phone number.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else if raw.contains('@') {
            Some(Identifier::Email(raw.to_owned()))
        } else {
            Some(Identifier::Phone(raw.to_owned()))
        }
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Email(s) | Identifier::Phone(s) => s,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Email(email) => write!(f, "{}", email),
            Identifier::Phone(phone) => write!(f, "phone {}", phone),
        }
    }
}

/// Aggregate registration counters kept by the API for one event
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Counters {
    pub total: u32,
    pub total_car: u32,
    pub total_motorcycle: u32,
    pub total_quad: u32,
    pub total_participants: u32,
    pub paid: u32,
    pub paid_car: u32,
    pub paid_motorcycle: u32,
    pub paid_quad: u32,
    pub checked_in: u32,
    pub checked_in_car: u32,
    pub checked_in_motorcycle: u32,
    pub checked_in_quad: u32,
    pub participants_checked_in: u32,
    pub participants_not_checked_in: u32,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileCountersResponse {
    pub event_id: String,
    pub status: String,
    pub before: Counters,
    pub after: Counters,
    pub message: String,
}
