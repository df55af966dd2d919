use rusqlite::params;
use uuid::Uuid;

use super::convert::*;
use super::Database;
use crate::error::EngineResult;
use crate::models::{BillingEvent, ResourceEvent};

impl Database {
    pub fn insert_resource_event(&self, ev: &ResourceEvent) -> EngineResult<()> {
        self.conn.execute(
            r#"INSERT INTO cr_resource_events (
                id, change_request_id, action, slot, engineer, role, level,
                rate_before, rate_after, start_before, start_after, end_before, end_after,
                effective_from, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                ev.id.to_string(),
                ev.change_request_id.to_string(),
                ev.action.as_str(),
                opt_str(&ev.slot),
                ev.engineer,
                ev.role,
                ev.level,
                opt_str(&ev.rate_before),
                opt_str(&ev.rate_after),
                opt_str(&ev.start_before),
                opt_str(&ev.start_after),
                opt_str(&ev.end_before),
                opt_str(&ev.end_after),
                ev.effective_from.to_string(),
                ev.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Resource events of a change request in the order they were recorded.
    pub fn list_resource_events(&self, change_request_id: Uuid) -> EngineResult<Vec<ResourceEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, change_request_id, action, slot, engineer, role, level,
                    rate_before, rate_after, start_before, start_after, end_before, end_after,
                    effective_from, created_at
             FROM cr_resource_events WHERE change_request_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map([change_request_id.to_string()], |row| {
                Ok(ResourceEvent {
                    id: uuid_col(row, 0)?,
                    change_request_id: uuid_col(row, 1)?,
                    action: label_col(row, 2)?,
                    slot: opt_uuid_col(row, 3)?,
                    engineer: row.get(4)?,
                    role: row.get(5)?,
                    level: row.get(6)?,
                    rate_before: opt_decimal_col(row, 7)?,
                    rate_after: opt_decimal_col(row, 8)?,
                    start_before: opt_date_col(row, 9)?,
                    start_after: opt_date_col(row, 10)?,
                    end_before: opt_date_col(row, 11)?,
                    end_after: opt_date_col(row, 12)?,
                    effective_from: date_col(row, 13)?,
                    created_at: datetime_col(row, 14)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn insert_billing_event(&self, ev: &BillingEvent) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO cr_billing_events (id, change_request_id, billing_month, delta_amount, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                ev.id.to_string(),
                ev.change_request_id.to_string(),
                ev.billing_month.to_string(),
                ev.delta_amount.to_string(),
                ev.description,
                ev.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Billing deltas of a change request, by month.
    pub fn list_billing_events(&self, change_request_id: Uuid) -> EngineResult<Vec<BillingEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, change_request_id, billing_month, delta_amount, description, created_at
             FROM cr_billing_events WHERE change_request_id = ?
             ORDER BY billing_month ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map([change_request_id.to_string()], |row| {
                Ok(BillingEvent {
                    id: uuid_col(row, 0)?,
                    change_request_id: uuid_col(row, 1)?,
                    billing_month: date_col(row, 2)?,
                    delta_amount: decimal_col(row, 3)?,
                    description: row.get(4)?,
                    created_at: datetime_col(row, 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChangeRequest, ContractRef, CrType, EngagementType, MasterContract, ResourceAction,
        SowContract,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn seed_cr(db: &Database) -> ChangeRequest {
        let msa = MasterContract::new("client-1");
        db.insert_msa(&msa).unwrap();
        let sow = SowContract::new(&msa, EngagementType::Retainer);
        db.insert_sow(&sow).unwrap();
        let cr = ChangeRequest::new(
            ContractRef::Sow(sow.id),
            CrType::Resource,
            "CR-2025-01".to_string(),
            "client-1".to_string(),
        );
        db.insert_change_request(&cr).unwrap();
        cr
    }

    #[test]
    fn test_resource_events_in_order() {
        let db = Database::open_memory().unwrap();
        let cr = seed_cr(&db);
        let from = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let mut add = ResourceEvent::new(cr.id, ResourceAction::Add, from);
        add.engineer = Some("Linh".to_string());
        add.rate_after = Some(Decimal::new(7000, 0));
        db.insert_resource_event(&add).unwrap();

        let mut remove = ResourceEvent::new(cr.id, ResourceAction::Remove, from);
        remove.slot = Some(Uuid::new_v4());
        db.insert_resource_event(&remove).unwrap();

        let events = db.list_resource_events(cr.id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], add);
        assert_eq!(events[1].action, ResourceAction::Remove);
    }

    #[test]
    fn test_billing_events_by_month() {
        let db = Database::open_memory().unwrap();
        let cr = seed_cr(&db);

        let march = BillingEvent::new(
            cr.id,
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            Decimal::new(-2000, 0),
        );
        let feb = BillingEvent::new(
            cr.id,
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            Decimal::new(5000, 0),
        );
        db.insert_billing_event(&march).unwrap();
        db.insert_billing_event(&feb).unwrap();

        let events = db.list_billing_events(cr.id).unwrap();
        assert_eq!(events[0].id, feb.id);
        assert_eq!(events[1].billing_month, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(events[1].delta_amount, Decimal::new(-2000, 0));
    }
}
