use anyhow::Result;

use super::output::print_json;
use super::MsaCommand;
use crate::config::Config;
use crate::engine::{retry_on_conflict, ContractEngine, NewMsa};
use crate::models::{Actor, ContractRef};

pub fn run_msa(engine: &ContractEngine, config: &Config, actor: &Actor, cmd: MsaCommand) -> Result<()> {
    let retries = config.conflict_retries;
    match cmd {
        MsaCommand::Create(args) => {
            let input = NewMsa {
                client_id: args.client,
                period_start: args.start,
                period_end: args.end,
                value: args.value,
                billing_day: args.billing_day,
                currency: args.currency,
                payment_terms: args.payment_terms,
            };
            print_json(&engine.create_msa(actor, input)?)
        }
        MsaCommand::Show { id } => print_json(&engine.get_msa(actor, id)?),
        MsaCommand::Approve { id } => {
            print_json(&retry_on_conflict(retries, || engine.approve_msa(actor, id))?)
        }
        MsaCommand::RequestChange { id } => {
            print_json(&retry_on_conflict(retries, || engine.request_msa_change(actor, id))?)
        }
        MsaCommand::Cancel { id } => {
            print_json(&retry_on_conflict(retries, || engine.cancel_msa(actor, id))?)
        }
        MsaCommand::Crs { id } => {
            print_json(&engine.list_change_requests(actor, ContractRef::Msa(id))?)
        }
    }
}
