use chrono::{DateTime, Datelike, TimeZone, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::convert::*;
use super::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Attachment, ChangeRequest, ChangeRequestHistory, ContractRef, ImpactAnalysis, ReviewStage,
};

const CR_COLUMNS: &str = "cr.id, cr.contract_kind, cr.msa_id, cr.sow_id, cr.code, cr.cr_type,
    cr.title, cr.summary, cr.description, cr.reason, cr.status, cr.review_stage,
    cr.desired_start_date, cr.desired_end_date, cr.effective_from, cr.expected_extra_cost,
    cr.amount, cr.dev_hours, cr.test_hours, cr.new_end_date, cr.delay_duration,
    cr.cost_estimated, cr.appendix_id, cr.created_by, cr.approved_by, cr.approved_at,
    cr.created_at, cr.updated_at";

impl Database {
    // ==================== CHANGE REQUESTS ====================

    pub fn insert_change_request(&self, cr: &ChangeRequest) -> EngineResult<()> {
        let (msa_id, sow_id) = match cr.contract {
            ContractRef::Msa(id) => (Some(id.to_string()), None),
            ContractRef::Sow(id) => (None, Some(id.to_string())),
        };
        self.conn.execute(
            r#"INSERT INTO change_requests (
                id, contract_kind, msa_id, sow_id, code, cr_type, title, summary,
                description, reason, status, review_stage, desired_start_date,
                desired_end_date, effective_from, expected_extra_cost, amount, dev_hours,
                test_hours, new_end_date, delay_duration, cost_estimated, appendix_id,
                created_by, approved_by, approved_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                cr.id.to_string(),
                cr.contract.kind(),
                msa_id,
                sow_id,
                cr.code,
                cr.cr_type.as_str(),
                cr.title,
                cr.summary,
                cr.description,
                cr.reason,
                cr.status.as_str(),
                cr.review_stage.map(|s| s.as_str()),
                opt_str(&cr.desired_start_date),
                opt_str(&cr.desired_end_date),
                opt_str(&cr.effective_from),
                opt_str(&cr.expected_extra_cost),
                opt_str(&cr.amount),
                cr.impact.dev_hours,
                cr.impact.test_hours,
                opt_str(&cr.impact.new_end_date),
                cr.impact.delay_duration,
                opt_str(&cr.impact.cost_estimated),
                opt_str(&cr.appendix_id),
                cr.created_by,
                cr.approved_by,
                cr.approved_at.map(|t| t.to_rfc3339()),
                cr.created_at.to_rfc3339(),
                cr.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Write back every mutable column. The parent reference and code never change.
    pub fn update_change_request(&self, cr: &ChangeRequest) -> EngineResult<()> {
        let rows = self.conn.execute(
            r#"UPDATE change_requests SET
                cr_type = ?, title = ?, summary = ?, description = ?, reason = ?, status = ?,
                review_stage = ?, desired_start_date = ?, desired_end_date = ?,
                effective_from = ?, expected_extra_cost = ?, amount = ?, dev_hours = ?,
                test_hours = ?, new_end_date = ?, delay_duration = ?, cost_estimated = ?,
                appendix_id = ?, approved_by = ?, approved_at = ?, updated_at = ?
            WHERE id = ?"#,
            params![
                cr.cr_type.as_str(),
                cr.title,
                cr.summary,
                cr.description,
                cr.reason,
                cr.status.as_str(),
                cr.review_stage.map(|s| s.as_str()),
                opt_str(&cr.desired_start_date),
                opt_str(&cr.desired_end_date),
                opt_str(&cr.effective_from),
                opt_str(&cr.expected_extra_cost),
                opt_str(&cr.amount),
                cr.impact.dev_hours,
                cr.impact.test_hours,
                opt_str(&cr.impact.new_end_date),
                cr.impact.delay_duration,
                opt_str(&cr.impact.cost_estimated),
                opt_str(&cr.appendix_id),
                cr.approved_by,
                cr.approved_at.map(|t| t.to_rfc3339()),
                cr.updated_at.to_rfc3339(),
                cr.id.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(EngineError::not_found(format!("change request {}", cr.id)));
        }
        Ok(())
    }

    pub fn get_change_request(&self, id: Uuid) -> EngineResult<Option<ChangeRequest>> {
        let cr = self
            .conn
            .query_row(
                &format!("SELECT {} FROM change_requests cr WHERE cr.id = ?", CR_COLUMNS),
                [id.to_string()],
                Self::row_to_change_request,
            )
            .optional()?;
        Ok(cr)
    }

    /// Change requests raised against any version of a SOW lineage, newest first.
    pub fn list_change_requests_for_lineage(
        &self,
        lineage_id: Uuid,
    ) -> EngineResult<Vec<ChangeRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM change_requests cr
             JOIN sow_contracts s ON s.id = cr.sow_id
             WHERE s.lineage_id = ?
             ORDER BY cr.created_at DESC",
            CR_COLUMNS
        ))?;
        let crs = stmt
            .query_map([lineage_id.to_string()], Self::row_to_change_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(crs)
    }

    pub fn list_change_requests_for_msa(&self, msa_id: Uuid) -> EngineResult<Vec<ChangeRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM change_requests cr WHERE cr.msa_id = ? ORDER BY cr.created_at DESC",
            CR_COLUMNS
        ))?;
        let crs = stmt
            .query_map([msa_id.to_string()], Self::row_to_change_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(crs)
    }

    /// Number of change requests created in the calendar year of `at`.
    pub fn count_change_requests_in_year(&self, at: DateTime<Utc>) -> EngineResult<u32> {
        let start = Utc
            .with_ymd_and_hms(at.year(), 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| EngineError::validation("invalid year"))?;
        let end = Utc
            .with_ymd_and_hms(at.year() + 1, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| EngineError::validation("invalid year"))?;
        // RFC3339 strings in UTC sort chronologically
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM change_requests WHERE created_at >= ? AND created_at < ?",
            params![start.to_rfc3339(), end.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_change_request(row: &Row) -> rusqlite::Result<ChangeRequest> {
        let kind: String = row.get(1)?;
        let contract = match kind.as_str() {
            "MSA" => ContractRef::Msa(uuid_col(row, 2)?),
            _ => ContractRef::Sow(uuid_col(row, 3)?),
        };
        Ok(ChangeRequest {
            id: uuid_col(row, 0)?,
            contract,
            code: row.get(4)?,
            cr_type: label_col(row, 5)?,
            title: row.get(6)?,
            summary: row.get(7)?,
            description: row.get(8)?,
            reason: row.get(9)?,
            status: label_col(row, 10)?,
            review_stage: row
                .get::<_, Option<String>>(11)?
                .map(|s| ReviewStage::parse(&s)),
            desired_start_date: opt_date_col(row, 12)?,
            desired_end_date: opt_date_col(row, 13)?,
            effective_from: opt_date_col(row, 14)?,
            expected_extra_cost: opt_decimal_col(row, 15)?,
            amount: opt_decimal_col(row, 16)?,
            impact: ImpactAnalysis {
                dev_hours: row.get(17)?,
                test_hours: row.get(18)?,
                new_end_date: opt_date_col(row, 19)?,
                delay_duration: row.get(20)?,
                cost_estimated: opt_decimal_col(row, 21)?,
            },
            appendix_id: opt_uuid_col(row, 22)?,
            created_by: row.get(23)?,
            approved_by: row.get(24)?,
            approved_at: opt_datetime_col(row, 25)?,
            created_at: datetime_col(row, 26)?,
            updated_at: datetime_col(row, 27)?,
        })
    }

    // ==================== HISTORY ====================

    pub fn insert_history(&self, entry: &ChangeRequestHistory) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO change_request_history (id, change_request_id, action, actor_id, actor_name, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.id.to_string(),
                entry.change_request_id.to_string(),
                entry.action,
                entry.actor_id,
                entry.actor_name,
                entry.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Audit trail, newest first.
    pub fn list_history(&self, change_request_id: Uuid) -> EngineResult<Vec<ChangeRequestHistory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, change_request_id, action, actor_id, actor_name, timestamp
             FROM change_request_history
             WHERE change_request_id = ?
             ORDER BY timestamp DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([change_request_id.to_string()], |row| {
                Ok(ChangeRequestHistory {
                    id: uuid_col(row, 0)?,
                    change_request_id: uuid_col(row, 1)?,
                    action: row.get(2)?,
                    actor_id: row.get(3)?,
                    actor_name: row.get(4)?,
                    timestamp: datetime_col(row, 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ==================== ATTACHMENTS ====================

    pub fn insert_attachment(&self, a: &Attachment) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO cr_attachments (id, change_request_id, file_name, blob_key, size_bytes, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                a.id.to_string(),
                a.change_request_id.to_string(),
                a.file_name,
                a.blob_key,
                a.size_bytes,
                a.uploaded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_attachments(&self, change_request_id: Uuid) -> EngineResult<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, change_request_id, file_name, blob_key, size_bytes, uploaded_at
             FROM cr_attachments WHERE change_request_id = ? ORDER BY uploaded_at ASC",
        )?;
        let rows = stmt
            .query_map([change_request_id.to_string()], |row| {
                Ok(Attachment {
                    id: uuid_col(row, 0)?,
                    change_request_id: uuid_col(row, 1)?,
                    file_name: row.get(2)?,
                    blob_key: row.get(3)?,
                    size_bytes: row.get(4)?,
                    uploaded_at: datetime_col(row, 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, ActorRole, CrStatus, CrType, EngagementType, MasterContract, SowContract};
    use rust_decimal::Decimal;

    fn seed_sow(db: &Database) -> SowContract {
        let msa = MasterContract::new("client-1");
        db.insert_msa(&msa).unwrap();
        let sow = SowContract::new(&msa, EngagementType::FixedPrice);
        db.insert_sow(&sow).unwrap();
        sow
    }

    #[test]
    fn test_change_request_roundtrip() {
        let db = Database::open_memory().unwrap();
        let sow = seed_sow(&db);

        let mut cr = ChangeRequest::new(
            ContractRef::Sow(sow.id),
            CrType::Scope,
            "CR-2025-01".to_string(),
            "client-1".to_string(),
        );
        cr.amount = Some(Decimal::new(50_000, 0));
        cr.impact.dev_hours = Some(40);
        db.insert_change_request(&cr).unwrap();

        let loaded = db.get_change_request(cr.id).unwrap().unwrap();
        assert_eq!(loaded, cr);

        let mut updated = loaded.clone();
        updated.status = CrStatus::UnderReview;
        updated.review_stage = Some(ReviewStage::Client);
        db.update_change_request(&updated).unwrap();
        let reloaded = db.get_change_request(cr.id).unwrap().unwrap();
        assert_eq!(reloaded.display_status(), "Client_Under_Review");
    }

    #[test]
    fn test_parent_must_exist() {
        let db = Database::open_memory().unwrap();
        let cr = ChangeRequest::new(
            ContractRef::Sow(Uuid::new_v4()),
            CrType::Scope,
            "CR-2025-01".to_string(),
            "client-1".to_string(),
        );
        assert!(db.insert_change_request(&cr).is_err());
    }

    #[test]
    fn test_history_is_append_only() {
        let db = Database::open_memory().unwrap();
        let sow = seed_sow(&db);
        let cr = ChangeRequest::new(
            ContractRef::Sow(sow.id),
            CrType::Resource,
            "CR-2025-01".to_string(),
            "client-1".to_string(),
        );
        db.insert_change_request(&cr).unwrap();

        let actor = Actor::new("client-1", "Acme", ActorRole::Client);
        db.insert_history(&ChangeRequestHistory::new(cr.id, "Submitted", &actor))
            .unwrap();
        db.insert_history(&ChangeRequestHistory::new(cr.id, "Approved", &actor))
            .unwrap();

        let history = db.list_history(cr.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "Approved");

        assert!(db
            .conn
            .execute("DELETE FROM change_request_history", [])
            .is_err());
        assert!(db
            .conn
            .execute("UPDATE change_request_history SET action = 'x'", [])
            .is_err());
    }

    #[test]
    fn test_count_in_year() {
        let db = Database::open_memory().unwrap();
        let sow = seed_sow(&db);
        let cr = ChangeRequest::new(
            ContractRef::Sow(sow.id),
            CrType::Resource,
            "CR-X-01".to_string(),
            "client-1".to_string(),
        );
        db.insert_change_request(&cr).unwrap();

        assert_eq!(db.count_change_requests_in_year(cr.created_at).unwrap(), 1);
        let next_year = Utc
            .with_ymd_and_hms(cr.created_at.year() + 1, 6, 1, 0, 0, 0)
            .unwrap();
        assert_eq!(db.count_change_requests_in_year(next_year).unwrap(), 0);
    }
}
