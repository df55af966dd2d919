use serde::Serialize;
use uuid::Uuid;

use super::{ContractEngine, Parent};
use crate::error::EngineResult;
use crate::models::{
    Actor, Attachment, BillingEvent, ChangeRequest, ChangeRequestHistory, ContractAppendix,
    ImpactAnalysis, ResourceEvent,
};

/// Impact section of a CR detail, shaped by the parent contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpactView {
    /// MSA change requests carry no structured impact.
    None,
    FixedPrice(ImpactAnalysis),
    Retainer {
        resources: Vec<ResourceEvent>,
        billing: Vec<BillingEvent>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    #[serde(flatten)]
    pub attachment: Attachment,
    /// Time-limited download URL; absent when presigning failed.
    pub url: Option<String>,
}

/// Everything shown on the change request page.
#[derive(Debug, Clone, Serialize)]
pub struct CrDetail {
    pub change_request: ChangeRequest,
    /// `Client_Under_Review` while awaiting the client.
    pub status_label: String,
    /// Newest first.
    pub history: Vec<ChangeRequestHistory>,
    pub impact: ImpactView,
    pub attachments: Vec<AttachmentView>,
    pub appendix: Option<ContractAppendix>,
    /// Notes of the latest internal review, if any.
    pub review_notes: Option<String>,
}

impl ContractEngine {
    pub fn get_change_request(&self, actor: &Actor, id: Uuid) -> EngineResult<ChangeRequest> {
        self.load_change_request(actor, id).map(|(cr, _)| cr)
    }

    pub fn get_change_request_detail(&self, actor: &Actor, id: Uuid) -> EngineResult<CrDetail> {
        let (cr, parent) = self.load_change_request(actor, id)?;

        let history = self.db.list_history(cr.id)?;
        let review_notes = history
            .iter()
            .find(|h| h.is_review())
            .and_then(|h| h.review_notes())
            .map(String::from);

        let impact = match &parent {
            Parent::Msa(_) => ImpactView::None,
            Parent::Sow(sow) if sow.engagement_type.is_retainer() => ImpactView::Retainer {
                resources: self.db.list_resource_events(cr.id)?,
                billing: self.db.list_billing_events(cr.id)?,
            },
            Parent::Sow(_) => ImpactView::FixedPrice(cr.impact.clone()),
        };

        let attachments = self
            .db
            .list_attachments(cr.id)?
            .into_iter()
            .map(|attachment| {
                let url = match self
                    .blobs
                    .presigned_url(&attachment.blob_key, self.presign_ttl_minutes)
                {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!(key = %attachment.blob_key, error = %e, "presign failed");
                        None
                    }
                };
                AttachmentView { attachment, url }
            })
            .collect();

        let appendix = self.db.find_appendix_for_change_request(cr.id)?;

        Ok(CrDetail {
            status_label: cr.display_status().to_string(),
            change_request: cr,
            history,
            impact,
            attachments,
            appendix,
            review_notes,
        })
    }
}
