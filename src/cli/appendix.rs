use anyhow::Result;

use super::output::print_json;
use super::AppendixCommand;
use crate::config::Config;
use crate::engine::{retry_on_conflict, ContractEngine};
use crate::models::Actor;

pub fn run_appendix(
    engine: &ContractEngine,
    config: &Config,
    actor: &Actor,
    cmd: AppendixCommand,
) -> Result<()> {
    match cmd {
        AppendixCommand::Generate { cr_id } => print_json(&retry_on_conflict(
            config.conflict_retries,
            || engine.generate_appendix(actor, cr_id),
        )?),
        AppendixCommand::List { sow_id } => print_json(&engine.get_appendices(actor, sow_id)?),
        AppendixCommand::Show { id } => print_json(&engine.get_appendix(actor, id)?),
        AppendixCommand::Sign { id } => print_json(&engine.sign_appendix(actor, id)?),
    }
}
