use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The contract a change request is raised against. Exactly one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum ContractRef {
    #[serde(rename = "MSA")]
    Msa(Uuid),
    /// A specific SOW version row.
    #[serde(rename = "SOW")]
    Sow(Uuid),
}

impl ContractRef {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Msa(_) => "MSA",
            Self::Sow(_) => "SOW",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Msa(id) | Self::Sow(id) => *id,
        }
    }

    pub fn sow_id(&self) -> Option<Uuid> {
        match self {
            Self::Sow(id) => Some(*id),
            Self::Msa(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrType {
    Resource,
    Schedule,
    Scope,
    Rate,
}

impl CrType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "RESOURCE_CHANGE",
            Self::Schedule => "SCHEDULE_CHANGE",
            Self::Scope => "SCOPE_ADJUSTMENT",
            Self::Rate => "RATE_ADJUSTMENT",
        }
    }

    /// Human readable label used in appendix titles.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resource => "Resource Change",
            Self::Schedule => "Schedule Change",
            Self::Scope => "Scope Adjustment",
            Self::Rate => "Rate Adjustment",
        }
    }
}

impl std::fmt::Display for CrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CrType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RESOURCE_CHANGE" | "RESOURCE" => Ok(Self::Resource),
            "SCHEDULE_CHANGE" | "SCHEDULE" => Ok(Self::Schedule),
            "SCOPE_ADJUSTMENT" | "SCOPE" => Ok(Self::Scope),
            "RATE_ADJUSTMENT" | "RATE" => Ok(Self::Rate),
            _ => Err(format!("unknown change request type: {}", s)),
        }
    }
}

/// Canonical change request status.
///
/// The "Client_Under_Review" label is not a separate state: it is
/// `UnderReview` with [`ReviewStage::Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CrStatus {
    #[default]
    Draft,
    #[serde(rename = "Under_Review")]
    UnderReview,
    #[serde(rename = "Request_for_Change")]
    RequestForChange,
    Active,
    Terminated,
}

impl CrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::UnderReview => "Under_Review",
            Self::RequestForChange => "Request_for_Change",
            Self::Active => "Active",
            Self::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for CrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Under_Review" => Ok(Self::UnderReview),
            "Request_for_Change" => Ok(Self::RequestForChange),
            "Active" => Ok(Self::Active),
            "Terminated" => Ok(Self::Terminated),
            _ => Err(format!("unknown change request status: {}", s)),
        }
    }
}

/// Who currently holds a CR that is under review. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStage {
    #[default]
    Internal,
    Client,
}

impl ReviewStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "client" => Self::Client,
            _ => Self::Internal,
        }
    }
}

/// Impact fields filled in by the delivery side. Only meaningful for
/// Fixed-Price parents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub dev_hours: Option<u32>,
    pub test_hours: Option<u32>,
    pub new_end_date: Option<NaiveDate>,
    /// Delay in days.
    pub delay_duration: Option<i32>,
    /// Cost estimated internally.
    pub cost_estimated: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub contract: ContractRef,
    /// Human readable code, `CR-YYYY-NN`.
    pub code: String,
    pub cr_type: CrType,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub status: CrStatus,
    pub review_stage: Option<ReviewStage>,
    pub desired_start_date: Option<NaiveDate>,
    pub desired_end_date: Option<NaiveDate>,
    pub effective_from: Option<NaiveDate>,
    /// Extra cost declared by the client.
    pub expected_extra_cost: Option<Decimal>,
    /// Amount counted into the contract value once the CR is Active.
    pub amount: Option<Decimal>,
    pub impact: ImpactAnalysis,
    pub appendix_id: Option<Uuid>,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChangeRequest {
    pub fn new(contract: ContractRef, cr_type: CrType, code: String, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            contract,
            code,
            cr_type,
            title: None,
            summary: None,
            description: None,
            reason: None,
            status: CrStatus::default(),
            review_stage: None,
            desired_start_date: None,
            desired_end_date: None,
            effective_from: None,
            expected_extra_cost: None,
            amount: None,
            impact: ImpactAnalysis::default(),
            appendix_id: None,
            created_by,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Status label as shown to users, including the client review label.
    pub fn display_status(&self) -> &'static str {
        match (self.status, self.review_stage) {
            (CrStatus::UnderReview, Some(ReviewStage::Client)) => "Client_Under_Review",
            (status, _) => status.as_str(),
        }
    }

    /// Cost used for Fixed-Price billing: internal estimate, then the
    /// client's declared extra cost, then the generic amount.
    pub fn billing_cost(&self) -> Option<Decimal> {
        self.impact
            .cost_estimated
            .or(self.expected_extra_cost)
            .or(self.amount)
    }
}

/// Partial update for a Draft change request. `None` leaves a field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeRequestPatch {
    pub cr_type: Option<CrType>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub desired_start_date: Option<NaiveDate>,
    pub desired_end_date: Option<NaiveDate>,
    pub effective_from: Option<NaiveDate>,
    pub expected_extra_cost: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub impact: Option<ImpactAnalysis>,
}

impl ChangeRequestPatch {
    pub fn is_empty(&self) -> bool {
        self.cr_type.is_none()
            && self.title.is_none()
            && self.summary.is_none()
            && self.description.is_none()
            && self.reason.is_none()
            && self.desired_start_date.is_none()
            && self.desired_end_date.is_none()
            && self.effective_from.is_none()
            && self.expected_extra_cost.is_none()
            && self.amount.is_none()
            && self.impact.is_none()
    }

    pub fn apply_to(self, cr: &mut ChangeRequest) {
        if let Some(t) = self.cr_type {
            cr.cr_type = t;
        }
        // A retitled CR without an explicit summary is summarised by its title
        if self.summary.is_none() && self.title.is_some() {
            cr.summary = self.title.clone();
        }
        if let Some(v) = self.title {
            cr.title = Some(v);
        }
        if let Some(v) = self.summary {
            cr.summary = Some(v);
        }
        if let Some(v) = self.description {
            cr.description = Some(v);
        }
        if let Some(v) = self.reason {
            cr.reason = Some(v);
        }
        if let Some(v) = self.desired_start_date {
            cr.desired_start_date = Some(v);
        }
        if let Some(v) = self.desired_end_date {
            cr.desired_end_date = Some(v);
        }
        if let Some(v) = self.effective_from {
            cr.effective_from = Some(v);
        }
        if let Some(v) = self.expected_extra_cost {
            cr.expected_extra_cost = Some(v);
        }
        if let Some(v) = self.amount {
            cr.amount = Some(v);
        }
        if let Some(v) = self.impact {
            cr.impact = v;
        }
        cr.updated_at = Utc::now();
    }
}
