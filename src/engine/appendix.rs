use chrono::Utc;
use uuid::Uuid;

use super::{ContractEngine, Parent};
use crate::db::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    appendix_number, Actor, BillingEvent, ChangeRequest, ContractAppendix, CrStatus, SowContract,
};

/// `Appendix AP-001 - Resource Change effective from 2025-03-01`
pub fn appendix_title(cr: &ChangeRequest, sequence: u32) -> String {
    let effective = cr
        .effective_from
        .map(|d| d.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "Appendix {} - {} effective from {}",
        appendix_number(sequence),
        cr.cr_type.label(),
        effective
    )
}

/// Free-text summary of the change request followed by its billing deltas.
pub fn appendix_summary(cr: &ChangeRequest, billing: &[BillingEvent]) -> String {
    let mut summary = cr.summary.clone().unwrap_or_default();
    if !billing.is_empty() {
        summary.push_str("\n\nBilling Changes:\n");
        for ev in billing {
            summary.push_str(&ev.summary_line());
            summary.push('\n');
        }
    }
    summary
}

/// Create the appendix for `cr` against `target`, or return the existing one.
///
/// Runs inside the caller's transaction, which makes read-max-then-insert
/// atomic per lineage.
pub(crate) fn write_appendix(
    db: &Database,
    cr: &ChangeRequest,
    target: &SowContract,
) -> EngineResult<ContractAppendix> {
    if let Some(existing) = db.find_appendix_for_change_request(cr.id)? {
        return Ok(existing);
    }

    let sequence = db.next_appendix_sequence(target.lineage_id)?;
    let billing = db.list_billing_events(cr.id)?;
    let appendix = ContractAppendix {
        id: Uuid::new_v4(),
        sow_id: target.id,
        lineage_id: target.lineage_id,
        change_request_id: cr.id,
        sequence,
        title: appendix_title(cr, sequence),
        summary: appendix_summary(cr, &billing),
        signed_at: None,
        created_at: Utc::now(),
    };
    db.insert_appendix(&appendix)?;
    db.set_change_request_appendix(cr.id, appendix.id)?;

    tracing::info!(
        cr_id = %cr.id,
        sow_id = %target.id,
        appendix = %appendix.number(),
        "appendix created"
    );
    Ok(appendix)
}

impl ContractEngine {
    /// Appendix for an approved SOW change request. Idempotent.
    pub fn generate_appendix(&self, actor: &Actor, cr_id: Uuid) -> EngineResult<ContractAppendix> {
        let tx = self.db.begin_immediate()?;
        let (cr, parent) = self.load_change_request(actor, cr_id)?;
        let Parent::Sow(sow) = parent else {
            return Err(EngineError::validation(format!(
                "change request {} is not raised against a SOW",
                cr.code
            )));
        };
        if let Some(existing) = self.db.find_appendix_for_change_request(cr.id)? {
            return Ok(existing);
        }
        if cr.status != CrStatus::Active {
            return Err(EngineError::invalid_state(format!(
                "change request {} is {}, appendices are issued on approval",
                cr.code,
                cr.display_status()
            )));
        }
        let target = self
            .db
            .get_current_sow(sow.lineage_id)?
            .ok_or_else(|| EngineError::not_found(format!("current version of SOW {}", sow.lineage_id)))?;

        let appendix = write_appendix(&self.db, &cr, &target)?;
        tx.commit()?;
        Ok(appendix)
    }

    /// Appendices of the SOW's lineage, newest first.
    pub fn get_appendices(&self, actor: &Actor, sow_id: Uuid) -> EngineResult<Vec<ContractAppendix>> {
        let sow = self.load_sow(actor, sow_id)?;
        self.db.list_appendices(sow.lineage_id)
    }

    pub fn get_appendix(&self, actor: &Actor, id: Uuid) -> EngineResult<ContractAppendix> {
        let appendix = self
            .db
            .get_appendix(id)?
            .ok_or_else(|| EngineError::not_found(format!("appendix {}", id)))?;
        // Scope through the owning SOW
        self.load_sow(actor, appendix.sow_id)
            .map_err(|_| EngineError::not_found(format!("appendix {}", id)))?;
        Ok(appendix)
    }

    /// Record the signature. An appendix is signed once.
    pub fn sign_appendix(&self, actor: &Actor, id: Uuid) -> EngineResult<ContractAppendix> {
        let tx = self.db.begin_immediate()?;
        let appendix = self.get_appendix(actor, id)?;
        if !self.db.sign_appendix(id, Utc::now())? {
            return Err(EngineError::invalid_state(format!(
                "appendix {} is already signed",
                appendix.number()
            )));
        }
        let signed = self
            .db
            .get_appendix(id)?
            .ok_or_else(|| EngineError::not_found(format!("appendix {}", id)))?;
        tx.commit()?;

        tracing::info!(appendix = %signed.number(), actor = %actor.id, "appendix signed");
        Ok(signed)
    }
}
