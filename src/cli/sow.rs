use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::io;

use super::output::{print_json, write_schedule_csv};
use super::{SowCommand, SowCreateArgs};
use crate::config::Config;
use crate::engine::{
    retry_on_conflict, ContractEngine, MilestoneSpec, NewAssignment, NewSow, RetainerMonthSpec,
};
use crate::models::{Actor, ContractRef};

pub fn run_sow(engine: &ContractEngine, config: &Config, actor: &Actor, cmd: SowCommand) -> Result<()> {
    match cmd {
        SowCommand::Create(args) => {
            let input = build_new_sow(args)?;
            print_json(&retry_on_conflict(config.conflict_retries, || {
                engine.create_sow(actor, input.clone())
            })?)
        }
        SowCommand::Show { id } => print_json(&engine.get_sow(actor, id)?),
        SowCommand::Versions { id } => print_json(&engine.list_sow_versions(actor, id)?),
        SowCommand::Assignments { id } => print_json(&engine.get_assignments(actor, id)?),
        SowCommand::Schedule(args) => {
            let entries = engine.get_billing_schedule(actor, args.id, args.version)?;
            if args.csv {
                write_schedule_csv(io::stdout().lock(), &entries)
            } else {
                print_json(&entries)
            }
        }
        SowCommand::Pay { entry_id } => print_json(&retry_on_conflict(config.conflict_retries, || {
            engine.mark_invoice_paid(actor, entry_id)
        })?),
        SowCommand::Value { id } => {
            let value = engine.total_value(actor, id)?;
            print_json(&serde_json::json!({ "sow_id": id, "total_value": value }))
        }
        SowCommand::Crs { id } => {
            print_json(&engine.list_change_requests(actor, ContractRef::Sow(id))?)
        }
    }
}

fn build_new_sow(args: SowCreateArgs) -> Result<NewSow> {
    let mut input = NewSow::new(args.msa, args.engagement_type);
    input.title = args.title;
    input.period_start = args.start;
    input.period_end = args.end;
    input.base_value = args.base_value;
    input.billing_day = args.billing_day;
    input.milestones = args
        .milestones
        .iter()
        .map(|m| parse_milestone(m))
        .collect::<Result<_>>()?;
    input.months = args
        .months
        .iter()
        .map(|m| parse_month(m))
        .collect::<Result<_>>()?;
    input.assignments = args
        .assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<_>>()?;
    Ok(input)
}

fn parse_amount(s: &str) -> Result<Decimal> {
    s.trim()
        .parse()
        .with_context(|| format!("invalid amount '{}'", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}' (expected YYYY-MM-DD)", s))
}

/// `NAME=AMOUNT[@YYYY-MM-DD]`
fn parse_milestone(s: &str) -> Result<MilestoneSpec> {
    let (name, rest) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("milestone '{}' must look like NAME=AMOUNT[@DATE]", s))?;
    let (amount, planned_date) = match rest.split_once('@') {
        Some((amount, date)) => (amount, Some(parse_date(date)?)),
        None => (rest, None),
    };
    Ok(MilestoneSpec {
        name: name.trim().to_string(),
        amount: parse_amount(amount)?,
        planned_date,
    })
}

/// `YYYY-MM=AMOUNT`
fn parse_month(s: &str) -> Result<RetainerMonthSpec> {
    let (month, amount) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("month '{}' must look like YYYY-MM=AMOUNT", s))?;
    Ok(RetainerMonthSpec {
        month: parse_date(&format!("{}-01", month.trim()))?,
        amount: parse_amount(amount)?,
    })
}

/// `engineer=Linh,role=QA,rate=4000,start=2025-01-01`
fn parse_assignment(s: &str) -> Result<NewAssignment> {
    let mut a = NewAssignment::default();
    for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("assignment field '{}' must look like key=value", pair))?;
        let value = value.trim();
        match key.trim() {
            "engineer" => a.engineer = Some(value.to_string()),
            "role" => a.role = Some(value.to_string()),
            "level" => a.level = Some(value.to_string()),
            "rate" => a.rate = Some(parse_amount(value)?),
            "start" => a.start_date = Some(parse_date(value)?),
            "end" => a.end_date = Some(parse_date(value)?),
            other => return Err(anyhow!("unknown assignment field '{}'", other)),
        }
    }
    Ok(a)
}
