use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engineer assignment owned by one SOW version.
///
/// `slot` is stable across versions so change requests can target an
/// assignment regardless of which version they were raised on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub sow_id: Uuid,
    pub slot: Uuid,
    pub engineer: Option<String>,
    pub role: Option<String>,
    pub level: Option<String>,
    pub rate: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Assignment {
    pub fn new(sow_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            sow_id,
            slot: Uuid::new_v4(),
            engineer: None,
            role: None,
            level: None,
            rate: None,
            start_date: None,
            end_date: None,
        }
    }
}

/// The two concrete forms of an invoice schedule row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form")]
pub enum BillingForm {
    /// Fixed-Price milestone billing.
    Milestone {
        name: String,
        planned_date: Option<NaiveDate>,
    },
    /// Retainer periodic billing for one month.
    Retainer { billing_month: NaiveDate },
}

impl BillingForm {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Milestone { .. } => "milestone",
            Self::Retainer { .. } => "retainer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingScheduleEntry {
    pub id: Uuid,
    pub sow_id: Uuid,
    pub form: BillingForm,
    pub amount: Decimal,
    pub invoice_date: NaiveDate,
    pub paid: bool,
    /// Null for originally-contracted entries.
    pub change_request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl BillingScheduleEntry {
    pub fn new(sow_id: Uuid, form: BillingForm, amount: Decimal, invoice_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            sow_id,
            form,
            amount,
            invoice_date,
            paid: false,
            change_request_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn billing_month(&self) -> Option<NaiveDate> {
        match self.form {
            BillingForm::Retainer { billing_month } => Some(billing_month),
            BillingForm::Milestone { .. } => None,
        }
    }
}
