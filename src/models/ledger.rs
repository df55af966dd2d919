use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceAction {
    Add,
    Remove,
    Modify,
}

impl ResourceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Modify => "MODIFY",
        }
    }
}

impl std::str::FromStr for ResourceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADD" => Ok(Self::Add),
            "REMOVE" => Ok(Self::Remove),
            "MODIFY" => Ok(Self::Modify),
            _ => Err(format!("unknown resource action: {}", s)),
        }
    }
}

/// One engineer-assignment change introduced by a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub id: Uuid,
    pub change_request_id: Uuid,
    pub action: ResourceAction,
    /// Assignment slot targeted by MODIFY / REMOVE. ADD mints a new slot.
    pub slot: Option<Uuid>,
    pub engineer: Option<String>,
    pub role: Option<String>,
    pub level: Option<String>,
    pub rate_before: Option<Decimal>,
    pub rate_after: Option<Decimal>,
    pub start_before: Option<NaiveDate>,
    pub start_after: Option<NaiveDate>,
    pub end_before: Option<NaiveDate>,
    pub end_after: Option<NaiveDate>,
    pub effective_from: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl ResourceEvent {
    pub fn new(change_request_id: Uuid, action: ResourceAction, effective_from: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            change_request_id,
            action,
            slot: None,
            engineer: None,
            role: None,
            level: None,
            rate_before: None,
            rate_after: None,
            start_before: None,
            start_after: None,
            end_before: None,
            end_after: None,
            effective_from,
            created_at: Utc::now(),
        }
    }
}

/// Signed month-amount delta introduced by a change request (Retainer only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub id: Uuid,
    pub change_request_id: Uuid,
    /// Always the first day of the month.
    pub billing_month: NaiveDate,
    pub delta_amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BillingEvent {
    pub fn new(change_request_id: Uuid, month: NaiveDate, delta_amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            change_request_id,
            billing_month: first_of_month(month),
            delta_amount,
            description: None,
            created_at: Utc::now(),
        }
    }

    /// Line used in appendix summaries, e.g. `- Month 2025-02-01: +5000`.
    pub fn summary_line(&self) -> String {
        let sign = if self.delta_amount >= Decimal::ZERO { "+" } else { "" };
        format!("- Month {}: {}{}", self.billing_month, sign, self.delta_amount)
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
