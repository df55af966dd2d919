use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit row for a change request transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequestHistory {
    pub id: Uuid,
    pub change_request_id: Uuid,
    pub action: String,
    pub actor_id: String,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeRequestHistory {
    pub fn new(change_request_id: Uuid, action: impl Into<String>, actor: &super::Actor) -> Self {
        Self {
            id: Uuid::new_v4(),
            change_request_id,
            action: action.into(),
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_review(&self) -> bool {
        self.action.starts_with("REVIEWED")
    }

    /// Notes recorded on a review action (`... by <name>. Notes: <notes>`).
    pub fn review_notes(&self) -> Option<&str> {
        if !self.is_review() {
            return None;
        }
        self.action
            .rsplit_once(". Notes: ")
            .map(|(_, notes)| notes.trim())
            .filter(|n| !n.is_empty())
    }
}

/// File attached to a change request, stored in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub change_request_id: Uuid,
    pub file_name: String,
    pub blob_key: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, ActorRole};

    #[test]
    fn test_review_notes_extraction() {
        let actor = Actor::new("u1", "Mina", ActorRole::SalesManager);
        let cr = Uuid::new_v4();

        let reviewed = ChangeRequestHistory::new(
            cr,
            "REVIEWED: approved by Mina. Notes: please confirm rates",
            &actor,
        );
        assert_eq!(reviewed.review_notes(), Some("please confirm rates"));

        let plain = ChangeRequestHistory::new(cr, "REVIEWED: approved by Mina", &actor);
        assert_eq!(plain.review_notes(), None);

        let other = ChangeRequestHistory::new(cr, "Request for Change: Notes: x", &actor);
        assert_eq!(other.review_notes(), None);

        let odd_name = Actor::new("u2", "Notes: Bui", ActorRole::SalesManager);
        let unnoted =
            ChangeRequestHistory::new(cr, "REVIEWED: Change request approved by Notes: Bui", &odd_name);
        assert!(unnoted.is_review());
        assert_eq!(unnoted.review_notes(), None);
    }
}
