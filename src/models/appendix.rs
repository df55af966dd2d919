use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Legal addendum produced once per approved change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAppendix {
    pub id: Uuid,
    /// SOW version the appendix amends.
    pub sow_id: Uuid,
    pub lineage_id: Uuid,
    pub change_request_id: Uuid,
    /// 1-based, contiguous within the lineage.
    pub sequence: u32,
    pub title: String,
    pub summary: String,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ContractAppendix {
    /// Zero-padded token, e.g. `AP-003`.
    pub fn number(&self) -> String {
        appendix_number(self.sequence)
    }

    pub fn is_signed(&self) -> bool {
        self.signed_at.is_some()
    }
}

pub fn appendix_number(sequence: u32) -> String {
    format!("AP-{:03}", sequence)
}
