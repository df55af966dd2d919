//! Retainer SOW versioning.
//!
//! Approving a change request on a Retainer SOW never edits the current row.
//! It builds the next version in memory from the current one plus the
//! change request's ledger, then persists it and moves the current flag.

use chrono::NaiveDate;
use uuid::Uuid;

use super::billing;
use crate::db::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Assignment, BillingEvent, BillingScheduleEntry, ChangeRequest, ResourceAction, ResourceEvent,
    SowContract,
};

/// The next version of a SOW, fully built but not yet stored.
#[derive(Debug, Clone)]
pub struct VersionPlan {
    pub sow: SowContract,
    pub assignments: Vec<Assignment>,
    pub schedule: Vec<BillingScheduleEntry>,
}

/// Everything the plan is derived from.
pub struct VersionInputs<'a> {
    pub current: &'a SowContract,
    pub assignments: &'a [Assignment],
    pub schedule: &'a [BillingScheduleEntry],
    pub change_request: &'a ChangeRequest,
    pub resources: &'a [ResourceEvent],
    pub billing: &'a [BillingEvent],
    pub billing_rule: Option<&'a str>,
}

/// Build the next version. Pure; any error here happens before a write.
pub fn plan_version(inputs: &VersionInputs<'_>) -> EngineResult<VersionPlan> {
    let cr = inputs.change_request;
    let mut sow = inputs.current.next_version();
    if let Some(end) = cr.impact.new_end_date {
        sow.period_end = Some(end);
    }

    let mut assignments: Vec<Assignment> = inputs
        .assignments
        .iter()
        .map(|a| Assignment {
            id: Uuid::new_v4(),
            sow_id: sow.id,
            ..a.clone()
        })
        .collect();
    for event in inputs.resources {
        apply_resource_event(&mut assignments, sow.id, event)?;
    }

    let mut schedule: Vec<BillingScheduleEntry> = inputs
        .schedule
        .iter()
        .map(|e| BillingScheduleEntry {
            id: Uuid::new_v4(),
            sow_id: sow.id,
            ..e.clone()
        })
        .collect();
    for event in inputs.billing {
        apply_billing_event(&mut schedule, sow.id, cr.id, event, inputs.billing_rule)?;
    }
    schedule.sort_by_key(|e| e.invoice_date);

    Ok(VersionPlan {
        sow,
        assignments,
        schedule,
    })
}

fn find_slot<'a>(
    assignments: &'a mut [Assignment],
    event: &ResourceEvent,
) -> EngineResult<&'a mut Assignment> {
    let slot = event.slot.ok_or_else(|| {
        EngineError::validation(format!(
            "{} resource event {} has no assignment slot",
            event.action.as_str(),
            event.id
        ))
    })?;
    assignments
        .iter_mut()
        .find(|a| a.slot == slot)
        .ok_or_else(|| {
            EngineError::validation(format!(
                "resource event {} targets unknown assignment slot {}",
                event.id, slot
            ))
        })
}

fn apply_resource_event(
    assignments: &mut Vec<Assignment>,
    sow_id: Uuid,
    event: &ResourceEvent,
) -> EngineResult<()> {
    match event.action {
        ResourceAction::Add => {
            let mut a = Assignment::new(sow_id);
            a.engineer = event.engineer.clone();
            a.role = event.role.clone();
            a.level = event.level.clone();
            a.rate = event.rate_after;
            a.start_date = event.start_after.or(Some(event.effective_from));
            a.end_date = event.end_after;
            assignments.push(a);
        }
        ResourceAction::Modify => {
            let a = find_slot(assignments, event)?;
            if event.engineer.is_some() {
                a.engineer = event.engineer.clone();
            }
            if event.role.is_some() {
                a.role = event.role.clone();
            }
            if event.level.is_some() {
                a.level = event.level.clone();
            }
            if event.rate_after.is_some() {
                a.rate = event.rate_after;
            }
            if event.start_after.is_some() {
                a.start_date = event.start_after;
            }
            if event.end_after.is_some() {
                a.end_date = event.end_after;
            }
        }
        ResourceAction::Remove => {
            let last_day = event.effective_from.pred_opt().unwrap_or(NaiveDate::MIN);
            let a = find_slot(assignments, event)?;
            let slot = a.slot;
            let starts_after_end = a.start_date.map_or(false, |start| start > last_day);
            if starts_after_end {
                assignments.retain(|a| a.slot != slot);
            } else {
                a.end_date = Some(a.end_date.map_or(last_day, |end| end.min(last_day)));
            }
        }
    }
    Ok(())
}

fn apply_billing_event(
    schedule: &mut Vec<BillingScheduleEntry>,
    sow_id: Uuid,
    cr_id: Uuid,
    event: &BillingEvent,
    rule: Option<&str>,
) -> EngineResult<()> {
    let month = event.billing_month;
    match schedule
        .iter_mut()
        .find(|e| e.billing_month() == Some(month))
    {
        Some(entry) if entry.paid => Err(EngineError::validation(format!(
            "billing month {} is already paid and cannot change",
            month
        ))),
        Some(entry) => {
            entry.amount += event.delta_amount;
            entry.change_request_id = Some(cr_id);
            Ok(())
        }
        None => {
            let mut entry = billing::retainer_entry(sow_id, month, event.delta_amount, rule);
            entry.change_request_id = Some(cr_id);
            schedule.push(entry);
            Ok(())
        }
    }
}

/// Store a planned version and make it current.
///
/// Must run inside the caller's write transaction. The new row is inserted
/// first so a racing writer trips the `(lineage, version)` uniqueness, then
/// the old row is superseded only if it is still current.
pub fn persist_version(db: &Database, current: &SowContract, plan: &VersionPlan) -> EngineResult<()> {
    db.insert_sow(&plan.sow)?;
    db.supersede_sow(current.id)?;
    db.promote_sow(plan.sow.id)?;
    for a in &plan.assignments {
        db.insert_assignment(a)?;
    }
    for e in &plan.schedule {
        db.insert_billing_entry(e)?;
    }
    tracing::debug!(
        sow_id = %plan.sow.id,
        lineage = %plan.sow.lineage_id,
        version = plan.sow.version,
        assignments = plan.assignments.len(),
        entries = plan.schedule.len(),
        "persisted SOW version"
    );
    Ok(())
}
