use std::sync::Arc;

use anyhow::anyhow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use contractcmd::collab::{Delivery, NotificationEvent, Notifier, RecordingNotifier};
use contractcmd::engine::{
    ChangePreview, ImpactView, MilestoneSpec, NewAssignment, NewChangeRequest, NewMsa, NewSow,
    RetainerMonthSpec, ReviewDecision,
};
use contractcmd::models::{
    Actor, ActorRole, Assignment, BillingForm, BillingScheduleEntry, ContractRef, CrStatus,
    CrType, EngagementType, ImpactAnalysis, MasterContract, ResourceAction, ResourceEvent,
    SowContract,
};
use contractcmd::{ContractEngine, Database, EngineError};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sales() -> Actor {
    Actor::new("s1", "Sam", ActorRole::Sales)
}

fn manager() -> Actor {
    Actor::new("m1", "Mina", ActorRole::SalesManager)
}

fn client() -> Actor {
    Actor::new("acme", "Acme", ActorRole::Client)
}

fn engine() -> (ContractEngine, Arc<RecordingNotifier>) {
    let recorder = Arc::new(RecordingNotifier::new());
    let engine = ContractEngine::new(Database::open_memory().unwrap())
        .with_notifier(recorder.clone(), Delivery::Inline);
    (engine, recorder)
}

fn msa(engine: &ContractEngine, billing_day: &str) -> MasterContract {
    engine
        .create_msa(
            &sales(),
            NewMsa {
                client_id: "acme".to_string(),
                billing_day: Some(billing_day.to_string()),
                ..Default::default()
            },
        )
        .unwrap()
}

fn fixed_price_sow(engine: &ContractEngine, base: i64) -> SowContract {
    let msa = msa(engine, "15");
    let mut input = NewSow::new(msa.id, EngagementType::FixedPrice);
    input.base_value = Some(Decimal::new(base, 0));
    input.milestones.push(MilestoneSpec {
        name: "Kickoff".to_string(),
        amount: Decimal::new(100_000, 0),
        planned_date: Some(d(2025, 1, 10)),
    });
    engine.create_sow(&sales(), input).unwrap()
}

fn retainer_sow(engine: &ContractEngine) -> SowContract {
    let msa = msa(engine, "15");
    let mut input = NewSow::new(msa.id, EngagementType::Retainer);
    input.base_value = Some(Decimal::new(60_000, 0));
    input.months = (1..=3)
        .map(|m| RetainerMonthSpec {
            month: d(2025, m, 1),
            amount: Decimal::new(20_000, 0),
        })
        .collect();
    input.assignments.push(NewAssignment {
        engineer: Some("Linh".to_string()),
        role: Some("Developer".to_string()),
        rate: Some(Decimal::new(20_000, 0)),
        start_date: Some(d(2025, 1, 1)),
        ..Default::default()
    });
    engine.create_sow(&sales(), input).unwrap()
}

fn submitted(engine: &ContractEngine, input: NewChangeRequest) -> Uuid {
    let cr = engine.create_change_request(&client(), input).unwrap();
    engine.submit(&client(), cr.id).unwrap();
    cr.id
}

#[test]
fn submit_moves_draft_under_review_with_one_history_row() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 500_000);
    let cr = engine
        .create_change_request(
            &client(),
            NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Resource),
        )
        .unwrap();
    assert_eq!(cr.status, CrStatus::Draft);

    let cr = engine.submit(&client(), cr.id).unwrap();
    assert_eq!(cr.status, CrStatus::UnderReview);

    let history = engine.database().list_history(cr.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "Submitted");
}

#[test]
fn fixed_price_approval_rolls_invoice_date_and_issues_appendix() {
    let (engine, recorder) = engine();
    let sow = fixed_price_sow(&engine, 500_000);

    let mut input = NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Schedule);
    input.title = Some("Extend delivery".to_string());
    input.impact = ImpactAnalysis {
        new_end_date: Some(d(2025, 3, 20)),
        cost_estimated: Some(Decimal::new(12_000, 0)),
        ..Default::default()
    };
    let id = submitted(&engine, input);

    let outcome = engine.approve(&client(), id).unwrap();
    assert_eq!(outcome.change_request.status, CrStatus::Active);
    assert_eq!(outcome.new_version_id, None);
    assert_eq!(outcome.appendix_number.as_deref(), Some("AP-001"));

    let schedule = engine.get_billing_schedule(&sales(), sow.id, None).unwrap();
    let extra = schedule
        .iter()
        .find(|e| Some(e.id) == outcome.billing_entry_id)
        .unwrap();
    assert_eq!(extra.invoice_date, d(2025, 4, 15));
    assert_eq!(extra.amount, Decimal::new(12_000, 0));
    assert_eq!(extra.change_request_id, Some(id));

    let appendix = engine
        .get_appendix(&client(), outcome.appendix_id.unwrap())
        .unwrap();
    assert_eq!(appendix.sow_id, sow.id);
    assert!(appendix.title.starts_with("Appendix AP-001 - Schedule Change"));

    let history = engine.database().list_history(id).unwrap();
    assert_eq!(history[0].action, "Approved");

    let approved = recorder
        .events()
        .into_iter()
        .find(|(_, ev)| ev.kind == "cr.approved")
        .unwrap();
    assert_eq!(approved.0, ActorRole::Sales);
    assert_eq!(approved.1.appendix.as_deref(), Some("AP-001"));
}

#[test]
fn fixed_price_cost_falls_back_and_is_written_back() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 500_000);

    let mut input = NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Schedule);
    input.expected_extra_cost = Some(Decimal::new(8_000, 0));
    input.impact.new_end_date = Some(d(2025, 5, 2));
    let id = submitted(&engine, input);

    let outcome = engine.approve(&client(), id).unwrap();
    assert_eq!(
        outcome.change_request.impact.cost_estimated,
        Some(Decimal::new(8_000, 0))
    );
    let stored = engine.get_change_request(&client(), id).unwrap();
    assert_eq!(stored.impact.cost_estimated, Some(Decimal::new(8_000, 0)));
    assert_eq!(stored.appendix_id, outcome.appendix_id);
}

#[test]
fn retainer_approval_mints_next_version_and_keeps_the_old_one() {
    let (engine, _) = engine();
    let sow = retainer_sow(&engine);
    let slot = engine.get_assignments(&sales(), sow.id).unwrap()[0].slot;

    // First change: bump February
    let cr1 = engine
        .create_change_request(
            &client(),
            NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Rate),
        )
        .unwrap();
    engine
        .add_billing_event(&client(), cr1.id, d(2025, 2, 20), Decimal::new(5_000, 0), None)
        .unwrap();
    engine.submit(&client(), cr1.id).unwrap();
    let first = engine.approve(&client(), cr1.id).unwrap();
    assert_eq!(first.appendix_number.as_deref(), Some("AP-001"));
    let v2_id = first.new_version_id.unwrap();
    let v2_before = engine.get_sow(&sales(), v2_id).unwrap();
    let v2_schedule = engine.get_billing_schedule(&sales(), sow.id, Some(2)).unwrap();
    assert_eq!(v2_schedule[1].amount, Decimal::new(25_000, 0));

    // Second change: end Linh's assignment
    let mut input = NewChangeRequest::new(ContractRef::Sow(v2_id), CrType::Resource);
    input.effective_from = Some(d(2025, 3, 1));
    let cr2 = engine.create_change_request(&client(), input).unwrap();
    let mut remove = ResourceEvent::new(cr2.id, ResourceAction::Remove, d(2025, 3, 1));
    remove.slot = Some(slot);
    engine.add_resource_event(&client(), cr2.id, remove).unwrap();
    engine.submit(&client(), cr2.id).unwrap();
    let second = engine.approve(&client(), cr2.id).unwrap();
    assert_eq!(second.appendix_number.as_deref(), Some("AP-002"));

    let versions = engine.list_sow_versions(&sales(), sow.id).unwrap();
    assert_eq!(
        versions.iter().map(|v| v.version).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    let v3 = &versions[2];
    assert_eq!(Some(v3.id), second.new_version_id);
    assert_eq!(v3.parent_version_id, Some(v2_id));
    assert!(v3.is_current);
    assert_eq!(versions.iter().filter(|v| v.is_current).count(), 1);

    // Version 2 keeps its terms, assignments and schedule
    let v2_after = &versions[1];
    assert!(!v2_after.is_current);
    assert!(v2_after.superseded_at.is_some());
    assert_eq!(v2_after.period_end, v2_before.period_end);
    assert_eq!(v2_after.base_value, v2_before.base_value);
    assert_eq!(
        engine.get_billing_schedule(&sales(), sow.id, Some(2)).unwrap(),
        v2_schedule
    );
    assert_eq!(
        engine.get_assignments(&sales(), v2_id).unwrap()[0].end_date,
        None
    );
    assert_eq!(
        engine.get_assignments(&sales(), v3.id).unwrap()[0].end_date,
        Some(d(2025, 2, 28))
    );

    // Appendices hang off the version each change produced
    let appendices = engine.get_appendices(&client(), sow.id).unwrap();
    assert_eq!(appendices.len(), 2);
    assert_eq!(appendices[0].number(), "AP-002");
    assert_eq!(appendices[0].sow_id, v3.id);
    assert_eq!(appendices[1].sow_id, v2_id);
}

#[test]
fn new_change_request_on_superseded_version_is_refused() {
    let (engine, _) = engine();
    let sow = retainer_sow(&engine);
    let id = submitted(
        &engine,
        NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope),
    );
    engine.approve(&client(), id).unwrap();

    let err = engine
        .create_change_request(
            &client(),
            NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[test]
fn paid_month_blocks_retainer_approval_without_side_effects() {
    let (engine, _) = engine();
    let sow = retainer_sow(&engine);
    let jan = engine.get_billing_schedule(&sales(), sow.id, None).unwrap()[0].clone();
    engine.mark_invoice_paid(&sales(), jan.id).unwrap();

    let cr = engine
        .create_change_request(
            &client(),
            NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Rate),
        )
        .unwrap();
    engine
        .add_billing_event(&client(), cr.id, d(2025, 1, 1), Decimal::new(1_000, 0), None)
        .unwrap();
    engine.submit(&client(), cr.id).unwrap();

    assert!(matches!(
        engine.approve(&client(), cr.id),
        Err(EngineError::Validation(_))
    ));
    assert_eq!(engine.list_sow_versions(&sales(), sow.id).unwrap().len(), 1);
    assert!(engine.get_appendices(&sales(), sow.id).unwrap().is_empty());
    let cr = engine.get_change_request(&client(), cr.id).unwrap();
    assert_eq!(cr.status, CrStatus::UnderReview);
}

#[test]
fn total_value_counts_only_active_change_requests() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 500_000);

    let mut approved = NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope);
    approved.amount = Some(Decimal::new(50_000, 0));
    let id = submitted(&engine, approved);
    engine.approve(&client(), id).unwrap();

    let mut dropped = NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope);
    dropped.amount = Some(Decimal::new(20_000, 0));
    let id = submitted(&engine, dropped);
    engine.terminate(&client(), id).unwrap();

    assert_eq!(
        engine.total_value(&client(), sow.id).unwrap(),
        Decimal::new(550_000, 0)
    );
}

#[test]
fn approving_twice_fails_without_side_effects() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 500_000);
    let id = submitted(
        &engine,
        NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope),
    );
    engine.approve(&client(), id).unwrap();
    let history_len = engine.database().list_history(id).unwrap().len();

    assert!(matches!(
        engine.approve(&client(), id),
        Err(EngineError::InvalidState(_))
    ));
    assert_eq!(engine.database().list_history(id).unwrap().len(), history_len);
    assert_eq!(engine.get_appendices(&sales(), sow.id).unwrap().len(), 1);
}

#[test]
fn msa_change_request_has_no_appendix() {
    let (engine, _) = engine();
    let msa = msa(&engine, "last day");
    let id = submitted(
        &engine,
        NewChangeRequest::new(ContractRef::Msa(msa.id), CrType::Rate),
    );
    let outcome = engine.approve(&client(), id).unwrap();
    assert_eq!(outcome.appendix_id, None);
    assert_eq!(outcome.billing_entry_id, None);
    assert!(matches!(
        engine.generate_appendix(&client(), id),
        Err(EngineError::Validation(_))
    ));
    assert_eq!(
        engine
            .list_change_requests(&client(), ContractRef::Msa(msa.id))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn generate_appendix_is_idempotent_and_sign_once() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 500_000);
    let id = submitted(
        &engine,
        NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope),
    );
    let outcome = engine.approve(&client(), id).unwrap();

    let again = engine.generate_appendix(&client(), id).unwrap();
    assert_eq!(Some(again.id), outcome.appendix_id);
    assert_eq!(engine.get_appendices(&client(), sow.id).unwrap().len(), 1);

    let signed = engine.sign_appendix(&client(), again.id).unwrap();
    assert!(signed.is_signed());
    assert!(matches!(
        engine.sign_appendix(&client(), again.id),
        Err(EngineError::InvalidState(_))
    ));
}

#[test]
fn detail_shows_review_notes_and_impact() {
    let (engine, recorder) = engine();
    let sow = retainer_sow(&engine);
    let cr = engine
        .create_change_request(
            &client(),
            NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Rate),
        )
        .unwrap();
    engine
        .add_billing_event(&client(), cr.id, d(2025, 3, 1), Decimal::new(-2_000, 0), None)
        .unwrap();
    engine.submit(&client(), cr.id).unwrap();
    engine
        .review(&manager(), cr.id, ReviewDecision::Approve, Some("rates confirmed"))
        .unwrap();

    let detail = engine.get_change_request_detail(&client(), cr.id).unwrap();
    assert_eq!(detail.status_label, "Client_Under_Review");
    assert_eq!(detail.review_notes.as_deref(), Some("rates confirmed"));
    assert_eq!(detail.history.len(), 2);
    match &detail.impact {
        ImpactView::Retainer { billing, resources } => {
            assert_eq!(billing.len(), 1);
            assert!(resources.is_empty());
        }
        other => panic!("unexpected impact {:?}", other),
    }
    assert!(detail.appendix.is_none());

    let roles: Vec<_> = recorder.events().into_iter().map(|(r, _)| r).collect();
    assert_eq!(roles, vec![ActorRole::SalesManager, ActorRole::Client]);
}

#[test]
fn review_notes_come_from_the_latest_review_only() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 500_000);
    let id = submitted(
        &engine,
        NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope),
    );
    engine
        .review(
            &manager(),
            id,
            ReviewDecision::RequestRevision,
            Some("old notes: fix the cost"),
        )
        .unwrap();
    let detail = engine.get_change_request_detail(&client(), id).unwrap();
    assert_eq!(detail.review_notes.as_deref(), Some("old notes: fix the cost"));

    engine.submit(&client(), id).unwrap();
    engine
        .review(&manager(), id, ReviewDecision::Approve, None)
        .unwrap();

    let detail = engine.get_change_request_detail(&client(), id).unwrap();
    assert_eq!(
        detail.history[0].action,
        "REVIEWED: Change request approved by Mina"
    );
    assert_eq!(detail.review_notes, None);
}

#[test]
fn foreign_client_sees_nothing() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 1);
    let cr = engine
        .create_change_request(
            &client(),
            NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope),
        )
        .unwrap();
    let stranger = Actor::new("globex", "Globex", ActorRole::Client);

    assert!(matches!(
        engine.get_change_request_detail(&stranger, cr.id),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.submit(&stranger, cr.id),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.total_value(&stranger, sow.id),
        Err(EngineError::NotFound(_))
    ));
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _recipient: ActorRole, _event: &NotificationEvent) -> anyhow::Result<()> {
        Err(anyhow!("smtp down"))
    }
}

#[test]
fn notifier_failure_does_not_undo_the_transition() {
    let engine = ContractEngine::new(Database::open_memory().unwrap())
        .with_notifier(Arc::new(FailingNotifier), Delivery::Inline);
    let sow = fixed_price_sow(&engine, 1);
    let id = submitted(
        &engine,
        NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Scope),
    );

    let outcome = engine.approve(&client(), id).unwrap();
    assert_eq!(outcome.change_request.status, CrStatus::Active);
    assert_eq!(
        engine.get_change_request(&client(), id).unwrap().status,
        CrStatus::Active
    );
}

#[test]
fn contracted_milestones_keep_their_form() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 1);
    let schedule = engine.get_billing_schedule(&client(), sow.id, None).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(
        schedule[0].form,
        BillingForm::Milestone {
            name: "Kickoff".to_string(),
            planned_date: Some(d(2025, 1, 10)),
        }
    );
    assert_eq!(schedule[0].invoice_date, d(2025, 1, 15));
    assert_eq!(schedule[0].change_request_id, None);
}

type StaffingTerms = (Option<String>, Option<Decimal>, Option<NaiveDate>, Option<NaiveDate>);
type InvoiceTerms = (BillingForm, Decimal, NaiveDate, bool, Option<Uuid>);

/// Assignment terms without row ids.
fn staffing(rows: &[Assignment]) -> Vec<StaffingTerms> {
    rows.iter()
        .map(|a| (a.engineer.clone(), a.rate, a.start_date, a.end_date))
        .collect()
}

/// Schedule terms without row ids.
fn invoices(rows: &[BillingScheduleEntry]) -> Vec<InvoiceTerms> {
    rows.iter()
        .map(|e| (e.form.clone(), e.amount, e.invoice_date, e.paid, e.change_request_id))
        .collect()
}

#[test]
fn retainer_preview_matches_what_approval_persists() {
    let (engine, _) = engine();
    let sow = retainer_sow(&engine);

    let mut input = NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Resource);
    input.impact.new_end_date = Some(d(2025, 6, 30));
    let cr = engine.create_change_request(&client(), input).unwrap();
    let mut add = ResourceEvent::new(cr.id, ResourceAction::Add, d(2025, 2, 1));
    add.engineer = Some("Khoa".to_string());
    add.rate_after = Some(Decimal::new(15_000, 0));
    engine.add_resource_event(&client(), cr.id, add).unwrap();
    engine
        .add_billing_event(&client(), cr.id, d(2025, 2, 1), Decimal::new(15_000, 0), None)
        .unwrap();
    engine.submit(&client(), cr.id).unwrap();

    let ChangePreview::Retainer {
        current_version,
        period_end,
        resources,
        billing,
    } = engine.preview_change_request(&sales(), cr.id).unwrap()
    else {
        panic!("expected a retainer preview");
    };
    assert_eq!(current_version, 1);
    assert_eq!(period_end.after, Some(d(2025, 6, 30)));
    assert_eq!(resources.before.len(), 1);
    assert_eq!(resources.after.len(), 2);
    assert_eq!(billing.before[1].amount, Decimal::new(20_000, 0));
    assert_eq!(billing.after[1].amount, Decimal::new(35_000, 0));

    // Previewing writes nothing
    assert_eq!(engine.list_sow_versions(&sales(), sow.id).unwrap().len(), 1);

    let outcome = engine.approve(&client(), cr.id).unwrap();
    let v2 = outcome.new_version_id.unwrap();
    assert_eq!(engine.get_sow(&sales(), v2).unwrap().period_end, period_end.after);
    assert_eq!(
        staffing(&engine.get_assignments(&sales(), v2).unwrap()),
        staffing(&resources.after)
    );
    assert_eq!(
        invoices(&engine.get_billing_schedule(&sales(), sow.id, Some(2)).unwrap()),
        invoices(&billing.after)
    );
    assert_eq!(
        invoices(&engine.get_billing_schedule(&sales(), sow.id, Some(1)).unwrap()),
        invoices(&billing.before)
    );

    // Once applied there is nothing left to preview
    assert!(matches!(
        engine.preview_change_request(&sales(), cr.id),
        Err(EngineError::InvalidState(_))
    ));
}

#[test]
fn fixed_price_preview_adds_the_approval_invoice() {
    let (engine, _) = engine();
    let sow = fixed_price_sow(&engine, 500_000);
    let mut input = NewChangeRequest::new(ContractRef::Sow(sow.id), CrType::Schedule);
    input.expected_extra_cost = Some(Decimal::new(8_000, 0));
    input.impact.new_end_date = Some(d(2025, 4, 10));
    let id = submitted(&engine, input);

    let ChangePreview::FixedPrice { impact, billing, .. } =
        engine.preview_change_request(&sales(), id).unwrap()
    else {
        panic!("expected a fixed-price preview");
    };
    assert_eq!(impact.cost_estimated, Some(Decimal::new(8_000, 0)));
    assert_eq!(billing.before.len(), 1);
    assert_eq!(billing.after.len(), 2);

    engine.approve(&client(), id).unwrap();
    assert_eq!(
        invoices(&engine.get_billing_schedule(&sales(), sow.id, None).unwrap()),
        invoices(&billing.after)
    );
}

#[test]
fn preview_needs_a_sow_change_request() {
    let (engine, _) = engine();
    let msa = msa(&engine, "15");
    let cr = engine
        .create_change_request(
            &client(),
            NewChangeRequest::new(ContractRef::Msa(msa.id), CrType::Scope),
        )
        .unwrap();
    assert!(matches!(
        engine.preview_change_request(&client(), cr.id),
        Err(EngineError::Validation(_))
    ));
}
