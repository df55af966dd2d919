//! Change request lifecycle: drafting, review, approval and termination.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::appendix::write_appendix;
use super::billing::fixed_price_entry;
use super::transitions::{next_status, CrAction, ReviewDecision};
use super::versioning::{persist_version, plan_version, VersionInputs, VersionPlan};
use super::{ContractEngine, Parent};
use crate::collab::NotificationEvent;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, ActorRole, Attachment, BillingEvent, BillingScheduleEntry, ChangeRequest,
    ChangeRequestHistory, ChangeRequestPatch, ContractRef, CrType, ImpactAnalysis, ResourceAction,
    ResourceEvent, SowContract, SowStatus,
};

/// File uploaded alongside a change request.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Input for a new Draft change request.
#[derive(Debug, Clone)]
pub struct NewChangeRequest {
    pub contract: ContractRef,
    pub cr_type: CrType,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub desired_start_date: Option<NaiveDate>,
    pub desired_end_date: Option<NaiveDate>,
    pub effective_from: Option<NaiveDate>,
    pub expected_extra_cost: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub impact: ImpactAnalysis,
    pub attachments: Vec<NewAttachment>,
}

impl NewChangeRequest {
    pub fn new(contract: ContractRef, cr_type: CrType) -> Self {
        Self {
            contract,
            cr_type,
            title: None,
            summary: None,
            description: None,
            reason: None,
            desired_start_date: None,
            desired_end_date: None,
            effective_from: None,
            expected_extra_cost: None,
            amount: None,
            impact: ImpactAnalysis::default(),
            attachments: Vec::new(),
        }
    }
}

/// What an approval produced.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub change_request: ChangeRequest,
    /// Set for Retainer SOWs only.
    pub new_version_id: Option<Uuid>,
    /// Set for SOW change requests.
    pub appendix_id: Option<Uuid>,
    pub appendix_number: Option<String>,
    /// Set for Fixed-Price SOWs when the CR carried a new end date and a cost.
    pub billing_entry_id: Option<Uuid>,
}

/// Writes an approval would make beyond the CR row itself.
#[derive(Debug, Default)]
pub(super) struct ApprovalPlan {
    /// Current SOW version; None for MSA change requests.
    pub current: Option<SowContract>,
    /// Next version of a Retainer SOW.
    pub version: Option<VersionPlan>,
    /// Extra invoice of a Fixed-Price SOW.
    pub billing_entry: Option<BillingScheduleEntry>,
}

fn check_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> EngineResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(EngineError::validation(format!(
                "desired start {} is after desired end {}",
                start, end
            )));
        }
    }
    Ok(())
}

fn event(kind: &str, cr: &ChangeRequest, actor: &Actor) -> NotificationEvent {
    NotificationEvent {
        kind: kind.to_string(),
        change_request_id: cr.id,
        code: cr.code.clone(),
        status: cr.display_status().to_string(),
        actor: actor.name.clone(),
        message: None,
        appendix: None,
    }
}

impl ContractEngine {
    // ==================== DRAFTING ====================

    pub fn create_change_request(
        &self,
        actor: &Actor,
        input: NewChangeRequest,
    ) -> EngineResult<ChangeRequest> {
        check_date_range(input.desired_start_date, input.desired_end_date)?;

        let tx = self.db.begin_immediate()?;
        match self.load_parent(actor, input.contract)? {
            Parent::Msa(msa) if msa.status.is_terminal() => {
                return Err(EngineError::invalid_state(format!(
                    "MSA {} is {}",
                    msa.id, msa.status
                )));
            }
            Parent::Sow(sow) if !sow.is_current => {
                return Err(EngineError::invalid_state(format!(
                    "SOW version {} (v{}) has been superseded",
                    sow.id, sow.version
                )));
            }
            Parent::Sow(sow)
                if matches!(
                    sow.status,
                    SowStatus::Completed | SowStatus::Terminated | SowStatus::Cancelled
                ) =>
            {
                return Err(EngineError::invalid_state(format!(
                    "SOW {} is {}",
                    sow.id, sow.status
                )));
            }
            _ => {}
        }

        let now = Utc::now();
        let seq = self.db.count_change_requests_in_year(now)? + 1;
        let code = format!("CR-{}-{:02}", now.year(), seq);

        let mut cr = ChangeRequest::new(input.contract, input.cr_type, code, actor.id.clone());
        cr.summary = input.summary.or_else(|| input.title.clone());
        cr.title = input.title;
        cr.description = input.description;
        cr.reason = input.reason;
        cr.desired_start_date = input.desired_start_date;
        cr.desired_end_date = input.desired_end_date;
        cr.effective_from = input.effective_from;
        cr.expected_extra_cost = input.expected_extra_cost;
        cr.amount = input.amount;
        cr.impact = input.impact;
        cr.created_at = now;
        cr.updated_at = now;

        self.db.insert_change_request(&cr)?;
        tx.commit()?;

        tracing::info!(cr_id = %cr.id, code = %cr.code, contract = cr.contract.kind(), "change request created");

        for attachment in input.attachments {
            let Some(record) = self.upload_attachment(&cr, attachment) else {
                continue;
            };
            if let Err(e) = self.record_attachment(actor, record) {
                tracing::warn!(cr_id = %cr.id, error = %e, "could not record attachment");
            }
        }
        Ok(cr)
    }

    /// Partial update of a Draft change request.
    pub fn update_change_request(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: ChangeRequestPatch,
    ) -> EngineResult<ChangeRequest> {
        let tx = self.db.begin_immediate()?;
        let (mut cr, _) = self.load_change_request(actor, id)?;
        next_status(cr.status, cr.review_stage, CrAction::Edit)?;
        if patch.is_empty() {
            return Ok(cr);
        }

        patch.apply_to(&mut cr);
        check_date_range(cr.desired_start_date, cr.desired_end_date)?;
        self.db.update_change_request(&cr)?;
        tx.commit()?;

        tracing::info!(cr_id = %cr.id, code = %cr.code, "change request updated");
        Ok(cr)
    }

    /// Upload a file for a Draft change request.
    ///
    /// Returns `None` when the blob store rejected the upload; the failure is
    /// logged.
    pub fn attach_file(
        &self,
        actor: &Actor,
        id: Uuid,
        attachment: NewAttachment,
    ) -> EngineResult<Option<Attachment>> {
        let (cr, _) = self.load_change_request(actor, id)?;
        next_status(cr.status, cr.review_stage, CrAction::Edit)?;
        match self.upload_attachment(&cr, attachment) {
            Some(record) => self.record_attachment(actor, record).map(Some),
            None => Ok(None),
        }
    }

    /// Put the bytes in the blob store. Nothing is written to the database.
    fn upload_attachment(&self, cr: &ChangeRequest, attachment: NewAttachment) -> Option<Attachment> {
        let folder = format!("change-requests/{}", cr.code);
        let key = match self.blobs.put(&attachment.bytes, &folder) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(
                    cr_id = %cr.id,
                    file = %attachment.file_name,
                    error = %e,
                    "attachment upload failed, skipping"
                );
                return None;
            }
        };

        Some(Attachment {
            id: Uuid::new_v4(),
            change_request_id: cr.id,
            file_name: attachment.file_name,
            blob_key: key,
            size_bytes: attachment.bytes.len() as i64,
            uploaded_at: Utc::now(),
        })
    }

    /// Insert an uploaded attachment while the change request is still Draft.
    fn record_attachment(&self, actor: &Actor, record: Attachment) -> EngineResult<Attachment> {
        let tx = self.db.begin_immediate()?;
        let (cr, _) = self.load_change_request(actor, record.change_request_id)?;
        if let Err(e) = next_status(cr.status, cr.review_stage, CrAction::Edit) {
            tracing::warn!(
                cr_id = %cr.id,
                key = %record.blob_key,
                status = %cr.status,
                "change request left Draft during upload, blob not recorded"
            );
            return Err(e);
        }
        self.db.insert_attachment(&record)?;
        tx.commit()?;
        tracing::debug!(cr_id = %cr.id, key = %record.blob_key, "attachment stored");
        Ok(record)
    }

    // ==================== DELTA LEDGER ====================

    /// Record an engineer assignment change on a Draft SOW change request.
    pub fn add_resource_event(
        &self,
        actor: &Actor,
        id: Uuid,
        mut event: ResourceEvent,
    ) -> EngineResult<ResourceEvent> {
        let tx = self.db.begin_immediate()?;
        let (cr, parent) = self.load_change_request(actor, id)?;
        next_status(cr.status, cr.review_stage, CrAction::Edit)?;
        let Parent::Sow(sow) = parent else {
            return Err(EngineError::validation(
                "resource changes apply to SOW change requests only",
            ));
        };

        if event.action != ResourceAction::Add {
            let slot = event.slot.ok_or_else(|| {
                EngineError::validation(format!("{} needs an assignment slot", event.action.as_str()))
            })?;
            let current = self
                .db
                .get_current_sow(sow.lineage_id)?
                .ok_or_else(|| EngineError::not_found(format!("current version of SOW {}", sow.lineage_id)))?;
            let known = self
                .db
                .list_assignments(current.id)?
                .iter()
                .any(|a| a.slot == slot);
            if !known {
                return Err(EngineError::validation(format!(
                    "assignment slot {} is not on the current SOW version",
                    slot
                )));
            }
        }

        event.change_request_id = cr.id;
        self.db.insert_resource_event(&event)?;
        tx.commit()?;

        tracing::info!(cr_id = %cr.id, action = event.action.as_str(), "resource event recorded");
        Ok(event)
    }

    /// Record a monthly billing delta on a Draft Retainer change request.
    pub fn add_billing_event(
        &self,
        actor: &Actor,
        id: Uuid,
        month: NaiveDate,
        delta: Decimal,
        description: Option<String>,
    ) -> EngineResult<BillingEvent> {
        let tx = self.db.begin_immediate()?;
        let (cr, parent) = self.load_change_request(actor, id)?;
        next_status(cr.status, cr.review_stage, CrAction::Edit)?;
        match parent {
            Parent::Sow(sow) if sow.engagement_type.is_retainer() => {}
            _ => {
                return Err(EngineError::validation(
                    "billing deltas apply to Retainer SOW change requests only",
                ))
            }
        }

        let mut event = BillingEvent::new(cr.id, month, delta);
        event.description = description;
        self.db.insert_billing_event(&event)?;
        tx.commit()?;

        tracing::info!(
            cr_id = %cr.id,
            month = %event.billing_month,
            delta = %event.delta_amount,
            "billing event recorded"
        );
        Ok(event)
    }

    // ==================== TRANSITIONS ====================

    /// Move the CR through `action` and append `history` in one transaction.
    fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        action: CrAction,
        history: impl FnOnce(&ChangeRequest) -> String,
    ) -> EngineResult<ChangeRequest> {
        let tx = self.db.begin_immediate()?;
        let (mut cr, _) = self.load_change_request(actor, id)?;
        let (status, stage) = next_status(cr.status, cr.review_stage, action)?;

        cr.status = status;
        cr.review_stage = stage;
        cr.updated_at = Utc::now();
        self.db.update_change_request(&cr)?;
        self.db
            .insert_history(&ChangeRequestHistory::new(cr.id, history(&cr), actor))?;
        tx.commit()?;

        tracing::info!(
            cr_id = %cr.id,
            code = %cr.code,
            status = cr.display_status(),
            actor = %actor.id,
            "change request transitioned"
        );
        Ok(cr)
    }

    /// Draft → Under_Review.
    pub fn submit(&self, actor: &Actor, id: Uuid) -> EngineResult<ChangeRequest> {
        let cr = self.transition(actor, id, CrAction::Submit, |_| "Submitted".to_string())?;
        self.notify(ActorRole::SalesManager, event("cr.submitted", &cr, actor));
        Ok(cr)
    }

    /// Internal review by a sales manager.
    pub fn review(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: ReviewDecision,
        notes: Option<&str>,
    ) -> EngineResult<ChangeRequest> {
        if actor.role != ActorRole::SalesManager {
            return Err(EngineError::Forbidden(
                "only sales managers can review change requests".to_string(),
            ));
        }
        let verb = match decision {
            ReviewDecision::Approve => "approved",
            ReviewDecision::RequestRevision => "requested revision for",
        };
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let cr = self.transition(actor, id, CrAction::Review(decision), |_| {
            let mut action = format!("REVIEWED: Change request {} by {}", verb, actor.name);
            if let Some(notes) = notes {
                action.push_str(". Notes: ");
                action.push_str(notes);
            }
            action
        })?;

        let mut ev = event("cr.reviewed", &cr, actor);
        ev.message = notes.map(String::from);
        self.notify(ActorRole::Client, ev);
        Ok(cr)
    }

    /// Under_Review → Request_for_Change.
    pub fn request_change(
        &self,
        actor: &Actor,
        id: Uuid,
        message: Option<&str>,
    ) -> EngineResult<ChangeRequest> {
        let message = message.map(str::trim).filter(|m| !m.is_empty());
        let cr = self.transition(actor, id, CrAction::RequestChange, |_| match message {
            Some(m) => format!("Request for Change: {}", m),
            None => "Request for Change".to_string(),
        })?;

        let mut ev = event("cr.change_requested", &cr, actor);
        ev.message = message.map(String::from);
        self.notify(ActorRole::Sales, ev);
        Ok(cr)
    }

    /// Abandon a change request that has not been approved.
    pub fn terminate(&self, actor: &Actor, id: Uuid) -> EngineResult<ChangeRequest> {
        let cr = self.transition(actor, id, CrAction::Terminate, |_| "Terminated".to_string())?;
        self.notify(ActorRole::Sales, event("cr.terminated", &cr, actor));
        Ok(cr)
    }

    // ==================== APPROVAL ====================

    /// What approving `cr` would write, computed against the current version
    /// of its SOW. Pure reads; MSA change requests plan nothing.
    pub(super) fn plan_approval(
        &self,
        cr: &ChangeRequest,
        parent: &Parent,
    ) -> EngineResult<ApprovalPlan> {
        let Parent::Sow(sow) = parent else {
            return Ok(ApprovalPlan::default());
        };
        let cur = self.db.get_current_sow(sow.lineage_id)?.ok_or_else(|| {
            EngineError::not_found(format!("current version of SOW {}", sow.lineage_id))
        })?;
        let msa_rule = self.db.get_msa(cur.msa_id)?.and_then(|m| m.billing_day);
        let rule = msa_rule.or_else(|| cur.billing_day.clone());

        let mut plan = ApprovalPlan::default();
        if cur.engagement_type.is_retainer() {
            let assignments = self.db.list_assignments(cur.id)?;
            let schedule = self.db.list_billing_entries(cur.id)?;
            let resources = self.db.list_resource_events(cr.id)?;
            let billing = self.db.list_billing_events(cr.id)?;
            plan.version = Some(plan_version(&VersionInputs {
                current: &cur,
                assignments: &assignments,
                schedule: &schedule,
                change_request: cr,
                resources: &resources,
                billing: &billing,
                billing_rule: rule.as_deref(),
            })?);
        } else {
            plan.billing_entry = fixed_price_entry(&cur, cr, rule.as_deref());
        }
        plan.current = Some(cur);
        Ok(plan)
    }

    /// Under_Review → Active, applying the change to the contract.
    ///
    /// Retainer SOW: a new SOW version is minted first. Fixed-Price SOW: an
    /// extra invoice is scheduled when the CR has a new end date and a cost.
    /// Any SOW CR gets its appendix. All of it commits together.
    pub fn approve(&self, actor: &Actor, id: Uuid) -> EngineResult<ApprovalOutcome> {
        let tx = self.db.begin_immediate()?;
        let (mut cr, parent) = self.load_change_request(actor, id)?;
        let (status, stage) = next_status(cr.status, cr.review_stage, CrAction::Approve)?;

        // Everything that can fail validation is computed before the first write
        let plan = self.plan_approval(&cr, &parent)?;
        let target = match (&plan.current, &plan.version) {
            (Some(cur), Some(version)) => {
                persist_version(&self.db, cur, version)?;
                Some(version.sow.clone())
            }
            (Some(cur), None) => Some(cur.clone()),
            _ => None,
        };

        let now = Utc::now();
        cr.status = status;
        cr.review_stage = stage;
        cr.approved_by = Some(actor.id.clone());
        cr.approved_at = Some(now);
        cr.updated_at = now;
        let fixed_price = matches!(&plan.current, Some(c) if !c.engagement_type.is_retainer());
        if fixed_price && cr.impact.cost_estimated.is_none() {
            cr.impact.cost_estimated = cr.billing_cost();
        }
        self.db.update_change_request(&cr)?;
        self.db
            .insert_history(&ChangeRequestHistory::new(cr.id, "Approved", actor))?;

        if let Some(entry) = &plan.billing_entry {
            self.db.insert_billing_entry(entry)?;
        }
        let appendix = match &target {
            Some(sow) => Some(write_appendix(&self.db, &cr, sow)?),
            None => None,
        };
        tx.commit()?;

        cr.appendix_id = appendix.as_ref().map(|a| a.id);
        let outcome = ApprovalOutcome {
            new_version_id: plan.version.as_ref().map(|v| v.sow.id),
            appendix_id: cr.appendix_id,
            appendix_number: appendix.as_ref().map(|a| a.number()),
            billing_entry_id: plan.billing_entry.as_ref().map(|e| e.id),
            change_request: cr,
        };

        tracing::info!(
            cr_id = %outcome.change_request.id,
            code = %outcome.change_request.code,
            version = ?plan.version.as_ref().map(|v| v.sow.version),
            appendix = ?outcome.appendix_number,
            "change request approved"
        );

        let mut ev = event("cr.approved", &outcome.change_request, actor);
        ev.appendix = outcome.appendix_number.clone();
        self.notify(ActorRole::Sales, ev);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Delivery, RecordingNotifier};
    use crate::db::Database;
    use crate::models::{CrStatus, EngagementType, MasterContract, ReviewStage, SowContract};
    use std::sync::Arc;

    struct Setup {
        engine: ContractEngine,
        recorder: Arc<RecordingNotifier>,
        sow: SowContract,
        client: Actor,
        manager: Actor,
    }

    fn setup(kind: EngagementType) -> Setup {
        let recorder = Arc::new(RecordingNotifier::new());
        let engine = ContractEngine::new(Database::open_memory().unwrap())
            .with_notifier(recorder.clone(), Delivery::Inline);
        let mut msa = MasterContract::new("acme");
        msa.billing_day = Some("15".to_string());
        engine.database().insert_msa(&msa).unwrap();
        let sow = SowContract::new(&msa, kind);
        engine.database().insert_sow(&sow).unwrap();
        Setup {
            engine,
            recorder,
            sow,
            client: Actor::new("acme", "Acme", ActorRole::Client),
            manager: Actor::new("m1", "Mina", ActorRole::SalesManager),
        }
    }

    fn draft(s: &Setup) -> ChangeRequest {
        s.engine
            .create_change_request(
                &s.client,
                NewChangeRequest::new(ContractRef::Sow(s.sow.id), CrType::Resource),
            )
            .unwrap()
    }

    #[test]
    fn test_codes_are_sequential_per_year() {
        let s = setup(EngagementType::FixedPrice);
        let a = draft(&s);
        let b = draft(&s);
        let year = Utc::now().year();
        assert_eq!(a.code, format!("CR-{}-01", year));
        assert_eq!(b.code, format!("CR-{}-02", year));
    }

    #[test]
    fn test_update_only_in_draft() {
        let s = setup(EngagementType::FixedPrice);
        let cr = draft(&s);
        let patch = ChangeRequestPatch {
            reason: Some("New regulation".to_string()),
            ..Default::default()
        };
        let updated = s
            .engine
            .update_change_request(&s.client, cr.id, patch.clone())
            .unwrap();
        assert_eq!(updated.reason.as_deref(), Some("New regulation"));

        s.engine.submit(&s.client, cr.id).unwrap();
        assert!(matches!(
            s.engine.update_change_request(&s.client, cr.id, patch),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_invalid_date_range_rejected() {
        let s = setup(EngagementType::FixedPrice);
        let mut input = NewChangeRequest::new(ContractRef::Sow(s.sow.id), CrType::Schedule);
        input.desired_start_date = NaiveDate::from_ymd_opt(2025, 5, 1);
        input.desired_end_date = NaiveDate::from_ymd_opt(2025, 4, 1);
        assert!(matches!(
            s.engine.create_change_request(&s.client, input),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_review_flow_and_notes() {
        let s = setup(EngagementType::FixedPrice);
        let cr = draft(&s);
        s.engine.submit(&s.client, cr.id).unwrap();

        assert!(matches!(
            s.engine.review(&s.client, cr.id, ReviewDecision::Approve, None),
            Err(EngineError::Forbidden(_))
        ));

        let reviewed = s
            .engine
            .review(&s.manager, cr.id, ReviewDecision::Approve, Some("check rates"))
            .unwrap();
        assert_eq!(reviewed.status, CrStatus::UnderReview);
        assert_eq!(reviewed.review_stage, Some(ReviewStage::Client));

        let history = s.engine.database().list_history(cr.id).unwrap();
        assert_eq!(
            history[0].action,
            "REVIEWED: Change request approved by Mina. Notes: check rates"
        );
        assert_eq!(history[0].review_notes(), Some("check rates"));

        let kinds: Vec<_> = s
            .recorder
            .events()
            .into_iter()
            .map(|(role, ev)| (role, ev.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ActorRole::SalesManager, "cr.submitted".to_string()),
                (ActorRole::Client, "cr.reviewed".to_string()),
            ]
        );
    }

    #[test]
    fn test_revision_returns_to_draft() {
        let s = setup(EngagementType::FixedPrice);
        let cr = draft(&s);
        s.engine.submit(&s.client, cr.id).unwrap();
        let back = s
            .engine
            .review(&s.manager, cr.id, ReviewDecision::RequestRevision, None)
            .unwrap();
        assert_eq!(back.status, CrStatus::Draft);
        assert_eq!(back.review_stage, None);
    }

    #[test]
    fn test_request_change_message_in_history() {
        let s = setup(EngagementType::FixedPrice);
        let cr = draft(&s);
        s.engine.submit(&s.client, cr.id).unwrap();
        let cr = s
            .engine
            .request_change(&s.client, cr.id, Some("Need cheaper option"))
            .unwrap();
        assert_eq!(cr.status, CrStatus::RequestForChange);
        let history = s.engine.database().list_history(cr.id).unwrap();
        assert_eq!(history[0].action, "Request for Change: Need cheaper option");
    }

    #[test]
    fn test_terminate_refused_after_approval() {
        let s = setup(EngagementType::FixedPrice);
        let cr = draft(&s);
        s.engine.submit(&s.client, cr.id).unwrap();
        s.engine.approve(&s.client, cr.id).unwrap();
        assert!(matches!(
            s.engine.terminate(&s.client, cr.id),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_billing_events_need_retainer_parent() {
        let s = setup(EngagementType::FixedPrice);
        let cr = draft(&s);
        let month = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert!(matches!(
            s.engine
                .add_billing_event(&s.client, cr.id, month, Decimal::new(5000, 0), None),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_resource_event_slot_must_exist() {
        let s = setup(EngagementType::Retainer);
        let cr = draft(&s);
        let mut ev = ResourceEvent::new(
            Uuid::nil(),
            ResourceAction::Remove,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        );
        ev.slot = Some(Uuid::new_v4());
        assert!(matches!(
            s.engine.add_resource_event(&s.client, cr.id, ev),
            Err(EngineError::Validation(_))
        ));

        let add = ResourceEvent::new(
            Uuid::nil(),
            ResourceAction::Add,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        );
        let stored = s.engine.add_resource_event(&s.client, cr.id, add).unwrap();
        assert_eq!(stored.change_request_id, cr.id);
    }

    #[test]
    fn test_attachment_upload() {
        let s = setup(EngagementType::FixedPrice);
        let mut input = NewChangeRequest::new(ContractRef::Sow(s.sow.id), CrType::Scope);
        input.attachments.push(NewAttachment {
            file_name: "scope.pdf".to_string(),
            bytes: b"%PDF".to_vec(),
        });
        let cr = s.engine.create_change_request(&s.client, input).unwrap();

        let stored = s.engine.database().list_attachments(cr.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].size_bytes, 4);
        assert!(stored[0]
            .blob_key
            .starts_with(&format!("change-requests/{}/", cr.code)));
    }
}
