//! crates/vet_consult_core/src/domain.rs
//!
//! Defines the pure, core data structures for the consultation platform.
//! These structs are independent of any database or wire format; the views
//! sent to clients live in `view.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Welcome prompt seeded into every new consultation.
pub const WELCOME_MESSAGE: &str = "Welcome to ReadyVetGo chat! Please provide information about your animal (Species, Breed, Color, Sex, DOB, Weight and Animal ID) and the issue you are facing.";

/// Notice appended when a consultation is closed.
pub const CLOSED_MESSAGE: &str =
    "This chat has been closed. If you have any further questions, please open a new chat.";

/// Display name used when a participant's profile cannot be resolved.
pub const UNKNOWN_PARTICIPANT: &str = "Unknown User";

/// Author label used for system messages in views and transcripts.
pub const SYSTEM_AUTHOR: &str = "system";

pub fn assignment_message(responder_name: &str) -> String {
    format!("The veterinarian {} has been assigned to this case.", responder_name)
}

//=========================================================================================
// Users & Identity
//=========================================================================================

/// The platform roles relevant to consultations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Opens consultations.
    Farmer,
    /// Gets assigned to and answers consultations.
    Vet,
    /// Administrative override; may act as either side.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Vet => "vet",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "farmer" => Some(Role::Farmer),
            "vet" => Some(Role::Vet),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn can_initiate(&self) -> bool {
        matches!(self, Role::Farmer | Role::Admin)
    }

    pub fn can_respond(&self) -> bool {
        matches!(self, Role::Vet | Role::Admin)
    }
}

/// The identity behind an authenticated session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub role: Role,
    pub is_verified: bool,
}

impl SessionUser {
    /// A responder that has passed verification. Admins always qualify.
    pub fn is_verified_responder(&self) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Vet => self.is_verified,
            Role::Farmer => false,
        }
    }
}

/// The public part of a user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl Profile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

//=========================================================================================
// Consultations
//=========================================================================================

/// Lifecycle of a consultation. Moves strictly `Open -> Ongoing -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatStatus {
    /// No responder assigned yet.
    Open,
    /// A responder has joined.
    Ongoing,
    /// Terminal. No further participant messages.
    Closed,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Open => "OPEN",
            ChatStatus::Ongoing => "ONGOING",
            ChatStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(ChatStatus::Open),
            "ONGOING" => Some(ChatStatus::Ongoing),
            "CLOSED" => Some(ChatStatus::Closed),
            _ => None,
        }
    }
}

/// A single entry in a consultation's message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub is_system_message: bool,
    /// Present only for participant-authored messages.
    pub author_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_system_message: true,
            author_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn from_participant(author_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_system_message: false,
            author_id: Some(author_id),
            timestamp: Utc::now(),
        }
    }
}

/// The consultation aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: Uuid,
    /// The initiator first, responders after.
    pub participants: Vec<Uuid>,
    pub status: ChatStatus,
    pub messages: Vec<Message>,
    pub summary_title: Option<String>,
    pub summary_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Builds a freshly opened consultation seeded with the welcome prompt.
    pub fn open(initiator_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            participants: vec![initiator_id],
            status: ChatStatus::Open,
            messages: vec![Message::system(WELCOME_MESSAGE)],
            summary_title: None,
            summary_text: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn initiator(&self) -> Option<Uuid> {
        self.participants.first().copied()
    }

    pub fn participant_message_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_system_message).count()
    }
}

/// Title and text produced by the advisory bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatSummary {
    pub title: String,
    #[serde(rename = "summary")]
    pub text: String,
}

//=========================================================================================
// Presence
//=========================================================================================

/// Online state of one user, derived from their open live connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub user_id: Uuid,
    /// Zero means offline. Never negative.
    pub online_device_count: u32,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Presence {
    pub fn offline(user_id: Uuid) -> Self {
        Self {
            user_id,
            online_device_count: 0,
            last_seen_at: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online_device_count > 0
    }
}

//=========================================================================================
// Medical Records
//=========================================================================================

/// A structured medical-record draft extracted from a consultation transcript.
/// Every field may be blank; the responder completes the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecordDraft {
    pub animal_id: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub dob: String,
    pub color: String,
    pub weight: Option<f64>,
    pub assessment: String,
    pub treatment: String,
    pub plan: String,
}

impl MedicalRecordDraft {
    /// Reads a draft out of loosely shaped model output. Missing or mistyped
    /// fields stay blank; a weight may arrive as a number or a numeric string.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let text = |key: &str| match value.get(key) {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let weight = match value.get("weight") {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        Self {
            animal_id: text("animalId"),
            species: text("species"),
            breed: text("breed"),
            sex: text("sex"),
            dob: text("dob"),
            color: text("color"),
            weight,
            assessment: text("assessment"),
            treatment: text("treatment"),
            plan: text("plan"),
        }
    }
}

/// A pre-filled medical-record form ready for the record sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecordForm {
    pub farmer_profile_id: Uuid,
    pub created_by_profile_id: Option<Uuid>,
    #[serde(flatten)]
    pub draft: MedicalRecordDraft,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chat_is_open_with_welcome_prompt() {
        let farmer = Uuid::new_v4();
        let chat = Chat::open(farmer);

        assert_eq!(chat.status, ChatStatus::Open);
        assert_eq!(chat.participants, vec![farmer]);
        assert_eq!(chat.messages.len(), 1);
        assert!(chat.messages[0].is_system_message);
        assert_eq!(chat.messages[0].text, WELCOME_MESSAGE);
        assert_eq!(chat.participant_message_count(), 0);
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Farmer.can_initiate());
        assert!(!Role::Farmer.can_respond());
        assert!(Role::Vet.can_respond());
        assert!(!Role::Vet.can_initiate());
        assert!(Role::Admin.can_initiate() && Role::Admin.can_respond());
        assert_eq!(Role::parse("VET"), Some(Role::Vet));
        assert_eq!(Role::parse("nobody"), None);
    }

    #[test]
    fn unverified_vet_is_not_a_verified_responder() {
        let vet = SessionUser {
            user_id: Uuid::new_v4(),
            role: Role::Vet,
            is_verified: false,
        };
        assert!(!vet.is_verified_responder());
        let admin = SessionUser {
            role: Role::Admin,
            ..vet.clone()
        };
        assert!(admin.is_verified_responder());
    }

    #[test]
    fn draft_tolerates_missing_fields() {
        let value = serde_json::json!({"species": "Cow", "weight": "512.5", "breed": null});
        let draft = MedicalRecordDraft::from_json(&value);
        assert_eq!(draft.species, "Cow");
        assert_eq!(draft.weight, Some(512.5));
        assert!(draft.breed.is_empty());
        assert!(draft.plan.is_empty());

        let unparseable = serde_json::json!({"weight": "about 500kg"});
        assert_eq!(MedicalRecordDraft::from_json(&unparseable).weight, None);
    }
}
