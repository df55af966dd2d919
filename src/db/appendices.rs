use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::convert::*;
use super::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::ContractAppendix;

const APPENDIX_COLUMNS: &str =
    "id, sow_id, lineage_id, change_request_id, sequence, title, summary, signed_at, created_at";

impl Database {
    pub fn insert_appendix(&self, ap: &ContractAppendix) -> EngineResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO contract_appendices ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                APPENDIX_COLUMNS
            ),
            params![
                ap.id.to_string(),
                ap.sow_id.to_string(),
                ap.lineage_id.to_string(),
                ap.change_request_id.to_string(),
                ap.sequence,
                ap.title,
                ap.summary,
                ap.signed_at.map(|t| t.to_rfc3339()),
                ap.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_appendix(&self, id: Uuid) -> EngineResult<Option<ContractAppendix>> {
        let ap = self
            .conn
            .query_row(
                &format!("SELECT {} FROM contract_appendices WHERE id = ?", APPENDIX_COLUMNS),
                [id.to_string()],
                Self::row_to_appendix,
            )
            .optional()?;
        Ok(ap)
    }

    pub fn find_appendix_for_change_request(
        &self,
        change_request_id: Uuid,
    ) -> EngineResult<Option<ContractAppendix>> {
        let ap = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM contract_appendices WHERE change_request_id = ?",
                    APPENDIX_COLUMNS
                ),
                [change_request_id.to_string()],
                Self::row_to_appendix,
            )
            .optional()?;
        Ok(ap)
    }

    /// Next free sequence number in a lineage, starting at 1.
    pub fn next_appendix_sequence(&self, lineage_id: Uuid) -> EngineResult<u32> {
        let next: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM contract_appendices WHERE lineage_id = ?",
            [lineage_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    /// Appendices of a lineage, newest first.
    pub fn list_appendices(&self, lineage_id: Uuid) -> EngineResult<Vec<ContractAppendix>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM contract_appendices WHERE lineage_id = ? ORDER BY sequence DESC",
            APPENDIX_COLUMNS
        ))?;
        let rows = stmt
            .query_map([lineage_id.to_string()], Self::row_to_appendix)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_change_request_appendix(
        &self,
        change_request_id: Uuid,
        appendix_id: Uuid,
    ) -> EngineResult<()> {
        let rows = self.conn.execute(
            "UPDATE change_requests SET appendix_id = ?, updated_at = ? WHERE id = ?",
            params![
                appendix_id.to_string(),
                Utc::now().to_rfc3339(),
                change_request_id.to_string()
            ],
        )?;
        if rows == 0 {
            return Err(EngineError::not_found(format!(
                "change request {}",
                change_request_id
            )));
        }
        Ok(())
    }

    /// Returns false when the appendix was already signed.
    pub fn sign_appendix(&self, id: Uuid, at: DateTime<Utc>) -> EngineResult<bool> {
        let rows = self.conn.execute(
            "UPDATE contract_appendices SET signed_at = ? WHERE id = ? AND signed_at IS NULL",
            params![at.to_rfc3339(), id.to_string()],
        )?;
        Ok(rows == 1)
    }

    fn row_to_appendix(row: &Row) -> rusqlite::Result<ContractAppendix> {
        Ok(ContractAppendix {
            id: uuid_col(row, 0)?,
            sow_id: uuid_col(row, 1)?,
            lineage_id: uuid_col(row, 2)?,
            change_request_id: uuid_col(row, 3)?,
            sequence: row.get(4)?,
            title: row.get(5)?,
            summary: row.get(6)?,
            signed_at: opt_datetime_col(row, 7)?,
            created_at: datetime_col(row, 8)?,
        })
    }
}
