//! Change request workflow engine.
//!
//! [`ContractEngine`] is the operation surface. Every mutating operation runs
//! in one immediate write transaction: validation first, then all writes, then
//! commit. Notifications go out only after commit.

mod appendix;
pub mod billing;
mod contracts;
mod detail;
mod lifecycle;
mod preview;
pub mod transitions;
pub mod versioning;
mod value;

use std::sync::Arc;

use uuid::Uuid;

use crate::collab::{
    dispatch, BlobStore, Delivery, LocalBlobStore, LogNotifier, MemoryBlobStore,
    NotificationEvent, Notifier, WebhookNotifier,
};
use crate::config::{Config, DEFAULT_PRESIGN_TTL_MINUTES};
use crate::db::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{Actor, ActorRole, ChangeRequest, ContractRef, MasterContract, SowContract};

pub use appendix::{appendix_summary, appendix_title};
pub use billing::{rollover, MilestoneSpec, RetainerMonthSpec};
pub use contracts::{NewAssignment, NewMsa, NewSow};
pub use detail::{AttachmentView, CrDetail, ImpactView};
pub use lifecycle::{ApprovalOutcome, NewAttachment, NewChangeRequest};
pub use preview::{BeforeAfter, ChangePreview};
pub use transitions::{CrAction, ReviewDecision};
pub use value::sum_active_amounts;

/// Run `op`, starting it over while it fails with a retryable conflict.
///
/// `retries` counts extra attempts after the first.
pub fn retry_on_conflict<T>(
    retries: u32,
    mut op: impl FnMut() -> EngineResult<T>,
) -> EngineResult<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                tracing::debug!(attempt, error = %e, "conflict, retrying");
            }
            result => return result,
        }
    }
}

/// The contract a change request hangs off, loaded.
#[derive(Debug, Clone)]
pub(crate) enum Parent {
    Msa(MasterContract),
    Sow(SowContract),
}

impl Parent {
    pub(crate) fn client_id(&self) -> &str {
        match self {
            Self::Msa(m) => &m.client_id,
            Self::Sow(s) => &s.client_id,
        }
    }
}

pub struct ContractEngine {
    db: Database,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    delivery: Delivery,
    presign_ttl_minutes: u32,
}

impl ContractEngine {
    /// Engine with in-memory attachments and log-only notifications.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            blobs: Arc::new(MemoryBlobStore::new()),
            notifier: Arc::new(LogNotifier),
            delivery: Delivery::Background,
            presign_ttl_minutes: DEFAULT_PRESIGN_TTL_MINUTES,
        }
    }

    /// Open the configured database and wire the configured collaborators.
    pub fn from_config(config: &Config) -> EngineResult<Self> {
        let db = Database::open_with_timeout(&config.db_path, config.busy_timeout)?;
        // One command per process: deliver before the process exits
        let mut engine = Self::new(db)
            .with_presign_ttl(config.presign_ttl_minutes)
            .with_notifier(Arc::new(LogNotifier), Delivery::Inline);

        if let Some(dir) = &config.blob_dir {
            engine = engine.with_blob_store(Arc::new(LocalBlobStore::new(
                dir.clone(),
                config.presign_secret.clone(),
            )));
        }
        if let Some(url) = &config.webhook_url {
            let notifier = WebhookNotifier::new(url.clone(), Some(config.presign_secret.clone()))
                .map_err(|e| EngineError::validation(format!("webhook: {}", e)))?;
            engine = engine.with_notifier(Arc::new(notifier), Delivery::Inline);
        }
        Ok(engine)
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, delivery: Delivery) -> Self {
        self.notifier = notifier;
        self.delivery = delivery;
        self
    }

    pub fn with_presign_ttl(mut self, minutes: u32) -> Self {
        self.presign_ttl_minutes = minutes;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ==================== SCOPED LOOKUPS ====================
    // Records outside a client actor's scope are reported as missing.

    pub(crate) fn load_msa(&self, actor: &Actor, id: Uuid) -> EngineResult<MasterContract> {
        self.db
            .get_msa(id)?
            .filter(|m| actor.can_access(&m.client_id))
            .ok_or_else(|| EngineError::not_found(format!("MSA {}", id)))
    }

    pub(crate) fn load_sow(&self, actor: &Actor, id: Uuid) -> EngineResult<SowContract> {
        self.db
            .get_sow(id)?
            .filter(|s| actor.can_access(&s.client_id))
            .ok_or_else(|| EngineError::not_found(format!("SOW {}", id)))
    }

    pub(crate) fn load_parent(&self, actor: &Actor, contract: ContractRef) -> EngineResult<Parent> {
        Ok(match contract {
            ContractRef::Msa(id) => Parent::Msa(self.load_msa(actor, id)?),
            ContractRef::Sow(id) => Parent::Sow(self.load_sow(actor, id)?),
        })
    }

    pub(crate) fn load_change_request(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> EngineResult<(ChangeRequest, Parent)> {
        let not_found = || EngineError::not_found(format!("change request {}", id));
        let cr = self.db.get_change_request(id)?.ok_or_else(not_found)?;
        let parent = match cr.contract {
            ContractRef::Msa(msa_id) => Parent::Msa(self.db.get_msa(msa_id)?.ok_or_else(not_found)?),
            ContractRef::Sow(sow_id) => Parent::Sow(self.db.get_sow(sow_id)?.ok_or_else(not_found)?),
        };
        if !actor.can_access(parent.client_id()) {
            return Err(not_found());
        }
        Ok((cr, parent))
    }

    pub(crate) fn notify(&self, recipient: ActorRole, event: NotificationEvent) {
        dispatch(self.notifier.clone(), self.delivery, recipient, event);
    }
}
