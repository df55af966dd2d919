use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};

use crate::models::{BillingForm, BillingScheduleEntry};

/// Pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Billing schedule as CSV, one row per invoice.
pub fn write_schedule_csv<W: Write>(writer: W, entries: &[BillingScheduleEntry]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "id",
        "form",
        "name",
        "billing_month",
        "amount",
        "invoice_date",
        "paid",
        "change_request_id",
    ])?;

    for entry in entries {
        let (name, month) = match &entry.form {
            BillingForm::Milestone { name, .. } => (name.clone(), String::new()),
            BillingForm::Retainer { billing_month } => (String::new(), billing_month.to_string()),
        };
        csv_writer.write_record([
            entry.id.to_string(),
            entry.form.kind().to_string(),
            name,
            month,
            entry.amount.to_string(),
            entry.invoice_date.to_string(),
            entry.paid.to_string(),
            entry
                .change_request_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}
