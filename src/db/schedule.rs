use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::convert::*;
use super::Database;
use crate::error::{EngineError, EngineResult};
use crate::models::{BillingForm, BillingScheduleEntry};

const ENTRY_COLUMNS: &str = "id, sow_id, form, name, planned_date, billing_month, amount,
    invoice_date, paid, change_request_id, created_at";

impl Database {
    pub fn insert_billing_entry(&self, entry: &BillingScheduleEntry) -> EngineResult<()> {
        let (name, planned_date, billing_month) = match &entry.form {
            BillingForm::Milestone { name, planned_date } => {
                (Some(name.clone()), opt_str(planned_date), None)
            }
            BillingForm::Retainer { billing_month } => (None, None, Some(billing_month.to_string())),
        };
        self.conn.execute(
            &format!(
                "INSERT INTO billing_schedule ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                ENTRY_COLUMNS
            ),
            params![
                entry.id.to_string(),
                entry.sow_id.to_string(),
                entry.form.kind(),
                name,
                planned_date,
                billing_month,
                entry.amount.to_string(),
                entry.invoice_date.to_string(),
                entry.paid as i32,
                opt_str(&entry.change_request_id),
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Schedule of one SOW version ordered by invoice date.
    pub fn list_billing_entries(&self, sow_id: Uuid) -> EngineResult<Vec<BillingScheduleEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM billing_schedule WHERE sow_id = ? ORDER BY invoice_date ASC, rowid ASC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt
            .query_map([sow_id.to_string()], Self::row_to_billing_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_billing_entry(&self, id: Uuid) -> EngineResult<Option<BillingScheduleEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {} FROM billing_schedule WHERE id = ?", ENTRY_COLUMNS),
                [id.to_string()],
                Self::row_to_billing_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Flip the paid flag. The only mutation a schedule entry allows.
    pub fn mark_billing_entry_paid(&self, id: Uuid) -> EngineResult<()> {
        let rows = self.conn.execute(
            "UPDATE billing_schedule SET paid = 1 WHERE id = ?",
            [id.to_string()],
        )?;
        if rows == 0 {
            return Err(EngineError::not_found(format!("billing entry {}", id)));
        }
        Ok(())
    }

    fn row_to_billing_entry(row: &Row) -> rusqlite::Result<BillingScheduleEntry> {
        let kind: String = row.get(2)?;
        let form = match kind.as_str() {
            "retainer" => BillingForm::Retainer {
                billing_month: date_col(row, 5)?,
            },
            _ => BillingForm::Milestone {
                name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                planned_date: opt_date_col(row, 4)?,
            },
        };
        Ok(BillingScheduleEntry {
            id: uuid_col(row, 0)?,
            sow_id: uuid_col(row, 1)?,
            form,
            amount: decimal_col(row, 6)?,
            invoice_date: date_col(row, 7)?,
            paid: row.get::<_, i32>(8)? == 1,
            change_request_id: opt_uuid_col(row, 9)?,
            created_at: datetime_col(row, 10)?,
        })
    }
}
