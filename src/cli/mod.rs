use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use uuid::Uuid;

use crate::engine::ReviewDecision;
use crate::models::{Actor, ActorRole, CrType, EngagementType, ResourceAction};

pub mod appendix;
pub mod cr;
pub mod msa;
pub mod output;
pub mod sow;

pub use appendix::run_appendix;
pub use cr::run_cr;
pub use msa::run_msa;
pub use sow::run_sow;

#[derive(Parser)]
#[command(name = "contractcmd")]
#[command(about = "Contract change requests and billing for the command line")]
#[command(version)]
pub struct Cli {
    /// Acting user id; for clients this is the client id
    #[arg(long, global = true, default_value = "sales")]
    pub actor_id: String,
    /// Display name recorded in history (defaults to the id)
    #[arg(long, global = true)]
    pub actor_name: Option<String>,
    /// client, sales or sales_manager
    #[arg(long, global = true, default_value = "sales")]
    pub role: String,
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn actor(&self) -> Actor {
        Actor::new(
            self.actor_id.clone(),
            self.actor_name.clone().unwrap_or_else(|| self.actor_id.clone()),
            ActorRole::parse(&self.role),
        )
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Master service agreements
    #[command(subcommand)]
    Msa(MsaCommand),
    /// Statements of work, versions and billing schedules
    #[command(subcommand)]
    Sow(SowCommand),
    /// Change requests
    #[command(subcommand)]
    Cr(CrCommand),
    /// Contract appendices
    #[command(subcommand)]
    Appendix(AppendixCommand),
}

// ==================== MSA ====================

#[derive(Subcommand)]
pub enum MsaCommand {
    Create(MsaCreateArgs),
    Show { id: Uuid },
    Approve { id: Uuid },
    /// Send a Draft or Pending agreement back for changes
    RequestChange { id: Uuid },
    Cancel { id: Uuid },
    /// Change requests raised on the agreement
    Crs { id: Uuid },
}

#[derive(Args)]
pub struct MsaCreateArgs {
    #[arg(long)]
    pub client: String,
    #[arg(long)]
    pub start: Option<NaiveDate>,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub value: Option<Decimal>,
    /// Day of month invoices are issued, e.g. "15" or "15th"
    #[arg(long)]
    pub billing_day: Option<String>,
    #[arg(long)]
    pub currency: Option<String>,
    #[arg(long)]
    pub payment_terms: Option<String>,
}

// ==================== SOW ====================

#[derive(Subcommand)]
pub enum SowCommand {
    Create(SowCreateArgs),
    Show { id: Uuid },
    /// Every version of the SOW, oldest first
    Versions { id: Uuid },
    Assignments { id: Uuid },
    /// Invoice schedule of the current (or a given) version
    Schedule(ScheduleArgs),
    /// Mark a schedule entry as paid
    Pay { entry_id: Uuid },
    /// Base value plus approved change request amounts
    Value { id: Uuid },
    /// Change requests raised on any version of the SOW
    Crs { id: Uuid },
}

#[derive(Args)]
pub struct SowCreateArgs {
    #[arg(long)]
    pub msa: Uuid,
    /// fixed_price or retainer
    #[arg(long = "type")]
    pub engagement_type: EngagementType,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub start: Option<NaiveDate>,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub base_value: Option<Decimal>,
    #[arg(long)]
    pub billing_day: Option<String>,
    /// Fixed-Price milestone: NAME=AMOUNT[@YYYY-MM-DD] (repeatable)
    #[arg(long = "milestone")]
    pub milestones: Vec<String>,
    /// Retainer month: YYYY-MM=AMOUNT (repeatable)
    #[arg(long = "month")]
    pub months: Vec<String>,
    /// Assignment: key=value pairs separated by commas, keys
    /// engineer, role, level, rate, start, end (repeatable)
    #[arg(long = "assignment")]
    pub assignments: Vec<String>,
}

#[derive(Args)]
pub struct ScheduleArgs {
    pub id: Uuid,
    /// Version number within the lineage
    #[arg(long)]
    pub version: Option<u32>,
    /// Write CSV instead of JSON
    #[arg(long)]
    pub csv: bool,
}

// ==================== CHANGE REQUESTS ====================

#[derive(Subcommand)]
pub enum CrCommand {
    Create(CrCreateArgs),
    Update(CrUpdateArgs),
    Show { id: Uuid },
    /// Current SOW terms next to what approval would change
    Preview { id: Uuid },
    /// Draft → Under_Review
    Submit { id: Uuid },
    /// Internal review (sales managers only)
    Review(ReviewArgs),
    Approve { id: Uuid },
    RequestChange {
        id: Uuid,
        #[arg(long)]
        message: Option<String>,
    },
    Terminate { id: Uuid },
    /// Record an assignment change on a Draft SOW change request
    AddResource(ResourceArgs),
    /// Record a monthly billing delta on a Draft Retainer change request
    AddBilling(BillingArgs),
    Attach {
        id: Uuid,
        file: PathBuf,
    },
}

#[derive(Args, Default)]
pub struct CrFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub summary: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(long)]
    pub desired_start: Option<NaiveDate>,
    #[arg(long)]
    pub desired_end: Option<NaiveDate>,
    #[arg(long)]
    pub effective_from: Option<NaiveDate>,
    #[arg(long)]
    pub expected_extra_cost: Option<Decimal>,
    #[arg(long)]
    pub amount: Option<Decimal>,
    #[arg(long)]
    pub dev_hours: Option<u32>,
    #[arg(long)]
    pub test_hours: Option<u32>,
    #[arg(long)]
    pub new_end_date: Option<NaiveDate>,
    /// Delay in days
    #[arg(long)]
    pub delay: Option<i32>,
    #[arg(long)]
    pub cost_estimated: Option<Decimal>,
}

#[derive(Args)]
pub struct CrCreateArgs {
    #[arg(long, conflicts_with = "sow", required_unless_present = "sow")]
    pub msa: Option<Uuid>,
    #[arg(long)]
    pub sow: Option<Uuid>,
    /// resource, schedule, scope or rate
    #[arg(long = "type")]
    pub cr_type: CrType,
    #[command(flatten)]
    pub fields: CrFields,
    /// File to attach (repeatable)
    #[arg(long = "attach")]
    pub attachments: Vec<PathBuf>,
}

#[derive(Args)]
pub struct CrUpdateArgs {
    pub id: Uuid,
    #[arg(long = "type")]
    pub cr_type: Option<CrType>,
    #[command(flatten)]
    pub fields: CrFields,
}

#[derive(Args)]
pub struct ReviewArgs {
    pub id: Uuid,
    /// approve or request_revision
    #[arg(long)]
    pub decision: ReviewDecision,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct ResourceArgs {
    pub id: Uuid,
    /// add, modify or remove
    #[arg(long)]
    pub action: ResourceAction,
    /// Assignment slot targeted by modify/remove
    #[arg(long)]
    pub slot: Option<Uuid>,
    #[arg(long)]
    pub effective_from: NaiveDate,
    #[arg(long)]
    pub engineer: Option<String>,
    /// Engineer's role on the engagement (`--role` names the actor's role)
    #[arg(long)]
    pub engineer_role: Option<String>,
    #[arg(long)]
    pub level: Option<String>,
    #[arg(long)]
    pub rate_before: Option<Decimal>,
    #[arg(long)]
    pub rate_after: Option<Decimal>,
    #[arg(long)]
    pub start_before: Option<NaiveDate>,
    #[arg(long)]
    pub start_after: Option<NaiveDate>,
    #[arg(long)]
    pub end_before: Option<NaiveDate>,
    #[arg(long)]
    pub end_after: Option<NaiveDate>,
}

#[derive(Args)]
pub struct BillingArgs {
    pub id: Uuid,
    /// Any date in the billed month
    #[arg(long)]
    pub month: NaiveDate,
    #[arg(long, allow_hyphen_values = true)]
    pub delta: Decimal,
    #[arg(long)]
    pub description: Option<String>,
}

// ==================== APPENDICES ====================

#[derive(Subcommand)]
pub enum AppendixCommand {
    /// Issue the appendix for an approved change request
    Generate { cr_id: Uuid },
    /// Appendices of a SOW, newest first
    List { sow_id: Uuid },
    Show { id: Uuid },
    Sign { id: Uuid },
}
