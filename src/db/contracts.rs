use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::convert::*;
use super::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{Assignment, MasterContract, MsaStatus, SowContract};

const SOW_COLUMNS: &str = "id, lineage_id, client_id, msa_id, title, engagement_type, status,
    period_start, period_end, base_value, billing_day, currency, payment_terms, version,
    parent_version_id, is_current, superseded_at, created_at, updated_at";

impl Database {
    // ==================== MSA ====================

    pub fn insert_msa(&self, msa: &MasterContract) -> EngineResult<()> {
        self.conn.execute(
            r#"INSERT INTO master_contracts (
                id, client_id, status, period_start, period_end, value, billing_day,
                currency, payment_terms, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                msa.id.to_string(),
                msa.client_id,
                msa.status.as_str(),
                opt_str(&msa.period_start),
                opt_str(&msa.period_end),
                opt_str(&msa.value),
                msa.billing_day,
                msa.currency,
                msa.payment_terms,
                msa.created_at.to_rfc3339(),
                msa.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_msa(&self, id: Uuid) -> EngineResult<Option<MasterContract>> {
        let msa = self
            .conn
            .query_row(
                "SELECT id, client_id, status, period_start, period_end, value, billing_day,
                        currency, payment_terms, created_at, updated_at
                 FROM master_contracts WHERE id = ?",
                [id.to_string()],
                Self::row_to_msa,
            )
            .optional()?;
        Ok(msa)
    }

    pub fn update_msa_status(&self, id: Uuid, status: MsaStatus) -> EngineResult<()> {
        let rows = self.conn.execute(
            "UPDATE master_contracts SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if rows == 0 {
            return Err(EngineError::not_found(format!("MSA {}", id)));
        }
        Ok(())
    }

    fn row_to_msa(row: &Row) -> rusqlite::Result<MasterContract> {
        Ok(MasterContract {
            id: uuid_col(row, 0)?,
            client_id: row.get(1)?,
            status: label_col(row, 2)?,
            period_start: opt_date_col(row, 3)?,
            period_end: opt_date_col(row, 4)?,
            value: opt_decimal_col(row, 5)?,
            billing_day: row.get(6)?,
            currency: row.get(7)?,
            payment_terms: row.get(8)?,
            created_at: datetime_col(row, 9)?,
            updated_at: datetime_col(row, 10)?,
        })
    }

    // ==================== SOW VERSIONS ====================

    pub fn insert_sow(&self, sow: &SowContract) -> EngineResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO sow_contracts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                SOW_COLUMNS
            ),
            params![
                sow.id.to_string(),
                sow.lineage_id.to_string(),
                sow.client_id,
                sow.msa_id.to_string(),
                sow.title,
                sow.engagement_type.as_str(),
                sow.status.as_str(),
                opt_str(&sow.period_start),
                opt_str(&sow.period_end),
                opt_str(&sow.base_value),
                sow.billing_day,
                sow.currency,
                sow.payment_terms,
                sow.version,
                opt_str(&sow.parent_version_id),
                sow.is_current as i32,
                sow.superseded_at.map(|t| t.to_rfc3339()),
                sow.created_at.to_rfc3339(),
                sow.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_sow(&self, id: Uuid) -> EngineResult<Option<SowContract>> {
        let sow = self
            .conn
            .query_row(
                &format!("SELECT {} FROM sow_contracts WHERE id = ?", SOW_COLUMNS),
                [id.to_string()],
                Self::row_to_sow,
            )
            .optional()?;
        Ok(sow)
    }

    /// The row currently flagged as current for a lineage.
    pub fn get_current_sow(&self, lineage_id: Uuid) -> EngineResult<Option<SowContract>> {
        let sow = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM sow_contracts WHERE lineage_id = ? AND is_current = 1",
                    SOW_COLUMNS
                ),
                [lineage_id.to_string()],
                Self::row_to_sow,
            )
            .optional()?;
        Ok(sow)
    }

    /// All versions of a lineage, oldest first.
    pub fn list_sow_versions(&self, lineage_id: Uuid) -> EngineResult<Vec<SowContract>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sow_contracts WHERE lineage_id = ? ORDER BY version ASC",
            SOW_COLUMNS
        ))?;
        let versions = stmt
            .query_map([lineage_id.to_string()], Self::row_to_sow)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    /// Clear the current flag of `id`, failing with a conflict when another
    /// writer already moved the lineage past it.
    pub fn supersede_sow(&self, id: Uuid) -> EngineResult<()> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE sow_contracts SET is_current = 0, superseded_at = ?, updated_at = ?
             WHERE id = ? AND is_current = 1",
            params![now, now, id.to_string()],
        )?;
        if rows != 1 {
            return Err(EngineError::Conflict(format!(
                "SOW version {} is no longer current",
                id
            )));
        }
        Ok(())
    }

    pub fn promote_sow(&self, id: Uuid) -> EngineResult<()> {
        let rows = self.conn.execute(
            "UPDATE sow_contracts SET is_current = 1, updated_at = ? WHERE id = ? AND is_current = 0",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if rows != 1 {
            return Err(EngineError::Conflict(format!(
                "SOW version {} could not be promoted",
                id
            )));
        }
        Ok(())
    }

    fn row_to_sow(row: &Row) -> rusqlite::Result<SowContract> {
        Ok(SowContract {
            id: uuid_col(row, 0)?,
            lineage_id: uuid_col(row, 1)?,
            client_id: row.get(2)?,
            msa_id: uuid_col(row, 3)?,
            title: row.get(4)?,
            engagement_type: label_col(row, 5)?,
            status: label_col(row, 6)?,
            period_start: opt_date_col(row, 7)?,
            period_end: opt_date_col(row, 8)?,
            base_value: opt_decimal_col(row, 9)?,
            billing_day: row.get(10)?,
            currency: row.get(11)?,
            payment_terms: row.get(12)?,
            version: row.get(13)?,
            parent_version_id: opt_uuid_col(row, 14)?,
            is_current: row.get::<_, i32>(15)? == 1,
            superseded_at: opt_datetime_col(row, 16)?,
            created_at: datetime_col(row, 17)?,
            updated_at: datetime_col(row, 18)?,
        })
    }

    // ==================== ASSIGNMENTS ====================

    pub fn insert_assignment(&self, a: &Assignment) -> EngineResult<()> {
        self.conn.execute(
            r#"INSERT INTO sow_assignments (
                id, sow_id, slot, engineer, role, level, rate, start_date, end_date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                a.id.to_string(),
                a.sow_id.to_string(),
                a.slot.to_string(),
                a.engineer,
                a.role,
                a.level,
                opt_str(&a.rate),
                opt_str(&a.start_date),
                opt_str(&a.end_date),
            ],
        )?;
        Ok(())
    }

    pub fn list_assignments(&self, sow_id: Uuid) -> EngineResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sow_id, slot, engineer, role, level, rate, start_date, end_date
             FROM sow_assignments WHERE sow_id = ? ORDER BY start_date ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map([sow_id.to_string()], |row| {
                Ok(Assignment {
                    id: uuid_col(row, 0)?,
                    sow_id: uuid_col(row, 1)?,
                    slot: uuid_col(row, 2)?,
                    engineer: row.get(3)?,
                    role: row.get(4)?,
                    level: row.get(5)?,
                    rate: opt_decimal_col(row, 6)?,
                    start_date: opt_date_col(row, 7)?,
                    end_date: opt_date_col(row, 8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
