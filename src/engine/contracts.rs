use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::billing::{milestone_entries, retainer_entries, MilestoneSpec, RetainerMonthSpec};
use super::ContractEngine;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, Assignment, BillingScheduleEntry, ChangeRequest, ContractRef, EngagementType,
    MasterContract, MsaStatus, SowContract, SowStatus,
};

/// Input for a new master agreement.
#[derive(Debug, Clone, Default)]
pub struct NewMsa {
    pub client_id: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub value: Option<Decimal>,
    pub billing_day: Option<String>,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
}

/// Engineer placed on a new SOW.
#[derive(Debug, Clone, Default)]
pub struct NewAssignment {
    pub engineer: Option<String>,
    pub role: Option<String>,
    pub level: Option<String>,
    pub rate: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Input for version 1 of a new SOW.
#[derive(Debug, Clone)]
pub struct NewSow {
    pub msa_id: Uuid,
    pub engagement_type: EngagementType,
    pub title: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub base_value: Option<Decimal>,
    pub billing_day: Option<String>,
    /// Fixed-Price only.
    pub milestones: Vec<MilestoneSpec>,
    /// Retainer only.
    pub months: Vec<RetainerMonthSpec>,
    pub assignments: Vec<NewAssignment>,
}

impl NewSow {
    pub fn new(msa_id: Uuid, engagement_type: EngagementType) -> Self {
        Self {
            msa_id,
            engagement_type,
            title: None,
            period_start: None,
            period_end: None,
            base_value: None,
            billing_day: None,
            milestones: Vec::new(),
            months: Vec::new(),
            assignments: Vec::new(),
        }
    }
}

fn require_internal(actor: &Actor, what: &str) -> EngineResult<()> {
    if actor.role.is_internal() {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!("clients cannot {}", what)))
    }
}

fn check_period(start: Option<NaiveDate>, end: Option<NaiveDate>) -> EngineResult<()> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(EngineError::validation(format!(
            "period start {} is after period end {}",
            s, e
        ))),
        _ => Ok(()),
    }
}

impl ContractEngine {
    // ==================== MSA ====================

    pub fn create_msa(&self, actor: &Actor, input: NewMsa) -> EngineResult<MasterContract> {
        require_internal(actor, "create agreements")?;
        if input.client_id.trim().is_empty() {
            return Err(EngineError::validation("client id is required"));
        }
        check_period(input.period_start, input.period_end)?;

        let mut msa = MasterContract::new(input.client_id.trim());
        msa.period_start = input.period_start;
        msa.period_end = input.period_end;
        msa.value = input.value;
        msa.billing_day = input.billing_day;
        msa.currency = input.currency;
        msa.payment_terms = input.payment_terms;
        self.db.insert_msa(&msa)?;

        tracing::info!(msa_id = %msa.id, client = %msa.client_id, "MSA created");
        Ok(msa)
    }

    pub fn get_msa(&self, actor: &Actor, id: Uuid) -> EngineResult<MasterContract> {
        self.load_msa(actor, id)
    }

    fn set_msa_status(
        &self,
        actor: &Actor,
        id: Uuid,
        allowed: &[MsaStatus],
        to: MsaStatus,
    ) -> EngineResult<MasterContract> {
        let tx = self.db.begin_immediate()?;
        let mut msa = self.load_msa(actor, id)?;
        if !allowed.contains(&msa.status) {
            return Err(EngineError::invalid_state(format!(
                "MSA {} is {}, cannot move to {}",
                msa.id, msa.status, to
            )));
        }
        self.db.update_msa_status(msa.id, to)?;
        tx.commit()?;

        tracing::info!(msa_id = %msa.id, from = %msa.status, to = %to, actor = %actor.id, "MSA status changed");
        msa.status = to;
        msa.updated_at = Utc::now();
        Ok(msa)
    }

    /// Sign off the agreement.
    pub fn approve_msa(&self, actor: &Actor, id: Uuid) -> EngineResult<MasterContract> {
        use MsaStatus::*;
        self.set_msa_status(actor, id, &[Draft, Pending, RequestForChange], Active)
    }

    /// Send the agreement back for changes before it is signed.
    pub fn request_msa_change(&self, actor: &Actor, id: Uuid) -> EngineResult<MasterContract> {
        use MsaStatus::*;
        self.set_msa_status(actor, id, &[Draft, Pending], RequestForChange)
    }

    pub fn cancel_msa(&self, actor: &Actor, id: Uuid) -> EngineResult<MasterContract> {
        require_internal(actor, "cancel agreements")?;
        use MsaStatus::*;
        self.set_msa_status(actor, id, &[Draft, Pending, Active, RequestForChange], Cancelled)
    }

    // ==================== SOW ====================

    /// Create version 1 of a SOW with its contracted schedule and team.
    pub fn create_sow(&self, actor: &Actor, input: NewSow) -> EngineResult<SowContract> {
        require_internal(actor, "create statements of work")?;
        check_period(input.period_start, input.period_end)?;
        match input.engagement_type {
            EngagementType::FixedPrice if !input.months.is_empty() => {
                return Err(EngineError::validation(
                    "Fixed-Price SOWs bill by milestone, not by month",
                ));
            }
            EngagementType::Retainer if !input.milestones.is_empty() => {
                return Err(EngineError::validation(
                    "Retainer SOWs bill by month, not by milestone",
                ));
            }
            _ => {}
        }

        let tx = self.db.begin_immediate()?;
        let msa = self.load_msa(actor, input.msa_id)?;
        if msa.status.is_terminal() {
            return Err(EngineError::invalid_state(format!(
                "MSA {} is {}",
                msa.id, msa.status
            )));
        }

        let mut sow = SowContract::new(&msa, input.engagement_type);
        sow.title = input.title;
        sow.status = SowStatus::Active;
        sow.period_start = input.period_start;
        sow.period_end = input.period_end;
        sow.base_value = input.base_value;
        sow.billing_day = input.billing_day;
        self.db.insert_sow(&sow)?;

        let rule = sow.billing_day.as_deref().or(msa.billing_day.as_deref());
        let schedule = match sow.engagement_type {
            EngagementType::FixedPrice => milestone_entries(&sow, &input.milestones, rule),
            EngagementType::Retainer => retainer_entries(&sow, &input.months, rule),
        };
        for entry in &schedule {
            self.db.insert_billing_entry(entry)?;
        }
        for planned in input.assignments {
            let mut a = Assignment::new(sow.id);
            a.engineer = planned.engineer;
            a.role = planned.role;
            a.level = planned.level;
            a.rate = planned.rate;
            a.start_date = planned.start_date;
            a.end_date = planned.end_date;
            self.db.insert_assignment(&a)?;
        }
        tx.commit()?;

        tracing::info!(
            sow_id = %sow.id,
            msa_id = %msa.id,
            engagement = %sow.engagement_type,
            entries = schedule.len(),
            "SOW created"
        );
        Ok(sow)
    }

    pub fn get_sow(&self, actor: &Actor, id: Uuid) -> EngineResult<SowContract> {
        self.load_sow(actor, id)
    }

    /// Every version of the SOW's lineage, oldest first.
    pub fn list_sow_versions(&self, actor: &Actor, sow_id: Uuid) -> EngineResult<Vec<SowContract>> {
        let sow = self.load_sow(actor, sow_id)?;
        self.db.list_sow_versions(sow.lineage_id)
    }

    pub fn get_assignments(&self, actor: &Actor, sow_id: Uuid) -> EngineResult<Vec<Assignment>> {
        let sow = self.load_sow(actor, sow_id)?;
        self.db.list_assignments(sow.id)
    }

    /// Invoice schedule of one SOW version, ordered by invoice date.
    ///
    /// `version` picks a version of the lineage; `None` means the current one.
    pub fn get_billing_schedule(
        &self,
        actor: &Actor,
        sow_id: Uuid,
        version: Option<u32>,
    ) -> EngineResult<Vec<BillingScheduleEntry>> {
        let sow = self.load_sow(actor, sow_id)?;
        let target = match version {
            Some(v) => self
                .db
                .list_sow_versions(sow.lineage_id)?
                .into_iter()
                .find(|s| s.version == v)
                .ok_or_else(|| EngineError::not_found(format!("SOW {} version {}", sow.lineage_id, v)))?,
            None => self.db.get_current_sow(sow.lineage_id)?.ok_or_else(|| {
                EngineError::not_found(format!("current version of SOW {}", sow.lineage_id))
            })?,
        };
        self.db.list_billing_entries(target.id)
    }

    /// Flag an invoice as paid. Superseded versions are immutable.
    pub fn mark_invoice_paid(&self, actor: &Actor, entry_id: Uuid) -> EngineResult<BillingScheduleEntry> {
        require_internal(actor, "record payments")?;
        let tx = self.db.begin_immediate()?;
        let not_found = || EngineError::not_found(format!("billing entry {}", entry_id));
        let mut entry = self.db.get_billing_entry(entry_id)?.ok_or_else(not_found)?;
        let sow = self.load_sow(actor, entry.sow_id).map_err(|_| not_found())?;
        if !sow.is_current {
            return Err(EngineError::invalid_state(format!(
                "billing entry {} belongs to superseded SOW version {}",
                entry_id, sow.version
            )));
        }
        if entry.paid {
            return Err(EngineError::invalid_state(format!(
                "billing entry {} is already paid",
                entry_id
            )));
        }
        self.db.mark_billing_entry_paid(entry_id)?;
        tx.commit()?;

        tracing::info!(entry_id = %entry_id, sow_id = %sow.id, amount = %entry.amount, "invoice marked paid");
        entry.paid = true;
        Ok(entry)
    }

    /// Change requests raised on a contract, newest first.
    ///
    /// For a SOW this covers every version of its lineage.
    pub fn list_change_requests(
        &self,
        actor: &Actor,
        contract: ContractRef,
    ) -> EngineResult<Vec<ChangeRequest>> {
        match contract {
            ContractRef::Msa(id) => {
                let msa = self.load_msa(actor, id)?;
                self.db.list_change_requests_for_msa(msa.id)
            }
            ContractRef::Sow(id) => {
                let sow = self.load_sow(actor, id)?;
                self.db.list_change_requests_for_lineage(sow.lineage_id)
            }
        }
    }
}
