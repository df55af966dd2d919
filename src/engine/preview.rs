//! Before/after view of what approving a SOW change request would change.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::{ContractEngine, Parent};
use crate::error::{EngineError, EngineResult};
use crate::models::{Actor, Assignment, BillingScheduleEntry, CrStatus, ImpactAnalysis};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeforeAfter<T> {
    pub before: T,
    pub after: T,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangePreview {
    /// The next SOW version as approval would mint it.
    Retainer {
        current_version: u32,
        period_end: BeforeAfter<Option<NaiveDate>>,
        resources: BeforeAfter<Vec<Assignment>>,
        billing: BeforeAfter<Vec<BillingScheduleEntry>>,
    },
    /// The current version's schedule plus the invoice approval would add.
    FixedPrice {
        current_version: u32,
        impact: ImpactAnalysis,
        billing: BeforeAfter<Vec<BillingScheduleEntry>>,
    },
}

impl ContractEngine {
    /// Current assignments and schedule next to the ones approval would write.
    ///
    /// Planned against the current version of the SOW, exactly as `approve`
    /// does, so a paid month or an unknown slot fails here the same way.
    /// Ids on the "after" side are provisional.
    pub fn preview_change_request(&self, actor: &Actor, id: Uuid) -> EngineResult<ChangePreview> {
        let (cr, parent) = self.load_change_request(actor, id)?;
        if matches!(parent, Parent::Msa(_)) {
            return Err(EngineError::validation(format!(
                "{} is an MSA change request and changes no SOW",
                cr.code
            )));
        }
        if matches!(cr.status, CrStatus::Active | CrStatus::Terminated) {
            return Err(EngineError::invalid_state(format!(
                "{} is {}",
                cr.code, cr.status
            )));
        }

        let plan = self.plan_approval(&cr, &parent)?;
        let current = plan
            .current
            .ok_or_else(|| EngineError::not_found(format!("SOW of change request {}", cr.code)))?;
        let schedule = self.db.list_billing_entries(current.id)?;

        let preview = match plan.version {
            Some(version) => {
                let mut assignments = version.assignments;
                assignments.sort_by_key(|a| a.start_date);
                ChangePreview::Retainer {
                    current_version: current.version,
                    period_end: BeforeAfter {
                        before: current.period_end,
                        after: version.sow.period_end,
                    },
                    resources: BeforeAfter {
                        before: self.db.list_assignments(current.id)?,
                        after: assignments,
                    },
                    billing: BeforeAfter {
                        before: schedule,
                        after: version.schedule,
                    },
                }
            }
            None => {
                let mut after = schedule.clone();
                after.extend(plan.billing_entry);
                after.sort_by_key(|e| e.invoice_date);

                let mut impact = cr.impact.clone();
                if impact.cost_estimated.is_none() {
                    impact.cost_estimated = cr.billing_cost();
                }
                ChangePreview::FixedPrice {
                    current_version: current.version,
                    impact,
                    billing: BeforeAfter {
                        before: schedule,
                        after,
                    },
                }
            }
        };

        tracing::debug!(cr_id = %cr.id, code = %cr.code, version = current.version, "change request previewed");
        Ok(preview)
    }
}
