mod actor;
mod appendix;
mod change_request;
mod contract;
mod history;
mod ledger;
mod schedule;

pub use actor::{Actor, ActorRole};
pub use appendix::{appendix_number, ContractAppendix};
pub use change_request::{
    ChangeRequest, ChangeRequestPatch, ContractRef, CrStatus, CrType, ImpactAnalysis, ReviewStage,
};
pub use contract::{EngagementType, MasterContract, MsaStatus, SowContract, SowStatus};
pub use history::{Attachment, ChangeRequestHistory};
pub use ledger::{first_of_month, BillingEvent, ResourceAction, ResourceEvent};
pub use schedule::{Assignment, BillingForm, BillingScheduleEntry};
