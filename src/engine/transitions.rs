//! Change request transition table.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{CrStatus, ReviewStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approve,
    RequestRevision,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::RequestRevision => "REQUEST_REVISION",
        }
    }
}

impl std::str::FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "APPROVE" => Ok(Self::Approve),
            "REQUEST_REVISION" | "REVISE" => Ok(Self::RequestRevision),
            _ => Err(format!("unknown review decision: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrAction {
    /// Field edits and ledger additions.
    Edit,
    Submit,
    Review(ReviewDecision),
    Approve,
    RequestChange,
    Terminate,
}

impl CrAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Submit => "submit",
            Self::Review(_) => "review",
            Self::Approve => "approve",
            Self::RequestChange => "request change on",
            Self::Terminate => "terminate",
        }
    }
}

/// Status and review label after applying `action`, or `InvalidState`.
///
/// An `Under_Review` CR without a recorded stage is treated as internal.
pub fn next_status(
    status: CrStatus,
    stage: Option<ReviewStage>,
    action: CrAction,
) -> EngineResult<(CrStatus, Option<ReviewStage>)> {
    use CrStatus::*;
    let stage = stage.unwrap_or_default();

    let next = match (status, action) {
        (Draft, CrAction::Edit) => Some((Draft, None)),
        (Draft, CrAction::Submit) => Some((UnderReview, Some(ReviewStage::Internal))),
        (UnderReview, CrAction::Review(decision)) if stage == ReviewStage::Internal => {
            Some(match decision {
                ReviewDecision::Approve => (UnderReview, Some(ReviewStage::Client)),
                ReviewDecision::RequestRevision => (Draft, None),
            })
        }
        (UnderReview, CrAction::Approve) => Some((Active, None)),
        (UnderReview, CrAction::RequestChange) => Some((RequestForChange, None)),
        (Draft | UnderReview | RequestForChange, CrAction::Terminate) => Some((Terminated, None)),
        _ => None,
    };

    next.ok_or_else(|| {
        let label = match (status, stage) {
            (UnderReview, ReviewStage::Client) => "Client_Under_Review",
            _ => status.as_str(),
        };
        EngineError::invalid_state(format!(
            "cannot {} a change request in status {}",
            action.name(),
            label
        ))
    })
}
