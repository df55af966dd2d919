use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a master agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MsaStatus {
    #[default]
    Draft,
    Pending,
    Active,
    #[serde(rename = "Request_for_Change")]
    RequestForChange,
    Completed,
    Terminated,
    Cancelled,
}

impl MsaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::RequestForChange => "Request_for_Change",
            Self::Completed => "Completed",
            Self::Terminated => "Terminated",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Terminated | Self::Cancelled)
    }
}

impl std::fmt::Display for MsaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MsaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Pending" => Ok(Self::Pending),
            "Active" => Ok(Self::Active),
            "Request_for_Change" => Ok(Self::RequestForChange),
            "Completed" => Ok(Self::Completed),
            "Terminated" => Ok(Self::Terminated),
            "Cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown MSA status: {}", s)),
        }
    }
}

/// Lifecycle status of a statement of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SowStatus {
    #[default]
    Draft,
    Active,
    Pending,
    #[serde(rename = "Under_Review")]
    UnderReview,
    #[serde(rename = "Request_for_Change")]
    RequestForChange,
    Approved,
    Completed,
    Terminated,
    Cancelled,
}

impl SowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Pending => "Pending",
            Self::UnderReview => "Under_Review",
            Self::RequestForChange => "Request_for_Change",
            Self::Approved => "Approved",
            Self::Completed => "Completed",
            Self::Terminated => "Terminated",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for SowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Active" => Ok(Self::Active),
            "Pending" => Ok(Self::Pending),
            "Under_Review" => Ok(Self::UnderReview),
            "Request_for_Change" => Ok(Self::RequestForChange),
            "Approved" => Ok(Self::Approved),
            "Completed" => Ok(Self::Completed),
            "Terminated" => Ok(Self::Terminated),
            "Cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown SOW status: {}", s)),
        }
    }
}

/// How a statement of work is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementType {
    /// Milestone billing; never versioned.
    FixedPrice,
    /// Periodic billing; every approved change mints a new version.
    Retainer,
}

impl EngagementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedPrice => "FixedPrice",
            Self::Retainer => "Retainer",
        }
    }

    pub fn is_retainer(&self) -> bool {
        matches!(self, Self::Retainer)
    }
}

impl std::fmt::Display for EngagementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngagementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '_', '-'], "").as_str() {
            "fixedprice" => Ok(Self::FixedPrice),
            "retainer" => Ok(Self::Retainer),
            _ => Err(format!("unknown engagement type: {}", s)),
        }
    }
}

/// Master service agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterContract {
    pub id: Uuid,
    pub client_id: String,
    pub status: MsaStatus,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub value: Option<Decimal>,
    /// e.g. "15", "15th", "Last business day"
    pub billing_day: Option<String>,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterContract {
    pub fn new(client_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id: client_id.into(),
            status: MsaStatus::default(),
            period_start: None,
            period_end: None,
            value: None,
            billing_day: None,
            currency: None,
            payment_terms: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One version row of a statement of work.
///
/// Rows sharing a `lineage_id` form the version history of one engagement.
/// Exactly one row per lineage has `is_current` set; superseded rows are
/// kept as an immutable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SowContract {
    pub id: Uuid,
    pub lineage_id: Uuid,
    pub client_id: String,
    pub msa_id: Uuid,
    pub title: Option<String>,
    pub engagement_type: EngagementType,
    pub status: SowStatus,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub base_value: Option<Decimal>,
    pub billing_day: Option<String>,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    pub version: u32,
    pub parent_version_id: Option<Uuid>,
    pub is_current: bool,
    pub superseded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SowContract {
    /// First version of a new engagement under `msa`.
    pub fn new(msa: &MasterContract, engagement_type: EngagementType) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Self {
            id,
            lineage_id: id,
            client_id: msa.client_id.clone(),
            msa_id: msa.id,
            title: None,
            engagement_type,
            status: SowStatus::default(),
            period_start: None,
            period_end: None,
            base_value: None,
            billing_day: None,
            currency: msa.currency.clone(),
            payment_terms: msa.payment_terms.clone(),
            version: 1,
            parent_version_id: None,
            is_current: true,
            superseded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of the contractual terms as the next version in the lineage.
    /// The copy is not current until the engine promotes it.
    pub fn next_version(&self) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            version: self.version + 1,
            parent_version_id: Some(self.id),
            is_current: false,
            superseded_at: None,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_type_parse_variants() {
        assert_eq!("Fixed Price".parse(), Ok(EngagementType::FixedPrice));
        assert_eq!("fixed_price".parse(), Ok(EngagementType::FixedPrice));
        assert_eq!("Retainer_".parse(), Ok(EngagementType::Retainer));
        assert!("hourly".parse::<EngagementType>().is_err());
    }

    #[test]
    fn test_status_labels_roundtrip() {
        for status in [
            SowStatus::UnderReview,
            SowStatus::RequestForChange,
            SowStatus::Approved,
        ] {
            assert_eq!(status.as_str().parse::<SowStatus>(), Ok(status));
        }
        assert_eq!(
            "Request_for_Change".parse::<MsaStatus>(),
            Ok(MsaStatus::RequestForChange)
        );
    }

    #[test]
    fn test_next_version_copies_terms() {
        let mut msa = MasterContract::new("client-1");
        msa.currency = Some("JPY".to_string());
        let mut sow = SowContract::new(&msa, EngagementType::Retainer);
        sow.base_value = Some(Decimal::new(500_000, 0));
        sow.status = SowStatus::Active;

        let next = sow.next_version();
        assert_ne!(next.id, sow.id);
        assert_eq!(next.lineage_id, sow.lineage_id);
        assert_eq!(next.version, 2);
        assert_eq!(next.parent_version_id, Some(sow.id));
        assert_eq!(next.base_value, sow.base_value);
        assert_eq!(next.status, SowStatus::Active);
        assert_eq!(next.currency.as_deref(), Some("JPY"));
        assert!(!next.is_current);
    }
}
