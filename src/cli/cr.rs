use anyhow::{anyhow, Context, Result};
use std::path::Path;

use super::output::print_json;
use super::{CrCommand, CrCreateArgs, CrFields, ResourceArgs};
use crate::config::Config;
use crate::engine::{retry_on_conflict, ContractEngine, NewAttachment, NewChangeRequest};
use crate::models::{Actor, ChangeRequestPatch, ContractRef, ImpactAnalysis, ResourceEvent};

pub fn run_cr(engine: &ContractEngine, config: &Config, actor: &Actor, cmd: CrCommand) -> Result<()> {
    let retries = config.conflict_retries;
    match cmd {
        CrCommand::Create(args) => {
            let input = build_new_change_request(args)?;
            print_json(&retry_on_conflict(retries, || {
                engine.create_change_request(actor, input.clone())
            })?)
        }
        CrCommand::Update(args) => {
            let mut patch = patch_from_fields(args.fields);
            patch.cr_type = args.cr_type;
            print_json(&retry_on_conflict(retries, || {
                engine.update_change_request(actor, args.id, patch.clone())
            })?)
        }
        CrCommand::Show { id } => print_json(&engine.get_change_request_detail(actor, id)?),
        CrCommand::Preview { id } => print_json(&engine.preview_change_request(actor, id)?),
        CrCommand::Submit { id } => {
            print_json(&retry_on_conflict(retries, || engine.submit(actor, id))?)
        }
        CrCommand::Review(args) => print_json(&retry_on_conflict(retries, || {
            engine.review(actor, args.id, args.decision, args.notes.as_deref())
        })?),
        CrCommand::Approve { id } => {
            print_json(&retry_on_conflict(retries, || engine.approve(actor, id))?)
        }
        CrCommand::RequestChange { id, message } => print_json(&retry_on_conflict(retries, || {
            engine.request_change(actor, id, message.as_deref())
        })?),
        CrCommand::Terminate { id } => {
            print_json(&retry_on_conflict(retries, || engine.terminate(actor, id))?)
        }
        CrCommand::AddResource(args) => {
            let id = args.id;
            let event = resource_event(args);
            print_json(&retry_on_conflict(retries, || {
                engine.add_resource_event(actor, id, event.clone())
            })?)
        }
        CrCommand::AddBilling(args) => print_json(&retry_on_conflict(retries, || {
            engine.add_billing_event(actor, args.id, args.month, args.delta, args.description.clone())
        })?),
        CrCommand::Attach { id, file } => {
            let attachment = read_attachment(&file)?;
            match engine.attach_file(actor, id, attachment)? {
                Some(stored) => print_json(&stored),
                None => Err(anyhow!("upload of {} failed; see log", file.display())),
            }
        }
    }
}

fn impact_from_fields(fields: &CrFields) -> Option<ImpactAnalysis> {
    let impact = ImpactAnalysis {
        dev_hours: fields.dev_hours,
        test_hours: fields.test_hours,
        new_end_date: fields.new_end_date,
        delay_duration: fields.delay,
        cost_estimated: fields.cost_estimated,
    };
    (impact != ImpactAnalysis::default()).then_some(impact)
}

fn patch_from_fields(fields: CrFields) -> ChangeRequestPatch {
    let impact = impact_from_fields(&fields);
    ChangeRequestPatch {
        cr_type: None,
        title: fields.title,
        summary: fields.summary,
        description: fields.description,
        reason: fields.reason,
        desired_start_date: fields.desired_start,
        desired_end_date: fields.desired_end,
        effective_from: fields.effective_from,
        expected_extra_cost: fields.expected_extra_cost,
        amount: fields.amount,
        impact,
    }
}

fn build_new_change_request(args: CrCreateArgs) -> Result<NewChangeRequest> {
    let contract = match (args.msa, args.sow) {
        (_, Some(sow)) => ContractRef::Sow(sow),
        (Some(msa), None) => ContractRef::Msa(msa),
        (None, None) => return Err(anyhow!("either --msa or --sow is required")),
    };

    let mut input = NewChangeRequest::new(contract, args.cr_type);
    input.impact = impact_from_fields(&args.fields).unwrap_or_default();
    let f = args.fields;
    input.title = f.title;
    input.summary = f.summary;
    input.description = f.description;
    input.reason = f.reason;
    input.desired_start_date = f.desired_start;
    input.desired_end_date = f.desired_end;
    input.effective_from = f.effective_from;
    input.expected_extra_cost = f.expected_extra_cost;
    input.amount = f.amount;
    input.attachments = args
        .attachments
        .iter()
        .map(|p| read_attachment(p))
        .collect::<Result<_>>()?;
    Ok(input)
}

fn resource_event(args: ResourceArgs) -> ResourceEvent {
    // The engine fills in the change request id
    let mut ev = ResourceEvent::new(uuid::Uuid::nil(), args.action, args.effective_from);
    ev.slot = args.slot;
    ev.engineer = args.engineer;
    ev.role = args.engineer_role;
    ev.level = args.level;
    ev.rate_before = args.rate_before;
    ev.rate_after = args.rate_after;
    ev.start_before = args.start_before;
    ev.start_after = args.start_after;
    ev.end_before = args.end_before;
    ev.end_after = args.end_after;
    ev
}

fn read_attachment(path: &Path) -> Result<NewAttachment> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    Ok(NewAttachment { file_name, bytes })
}
