//! Billing schedule generation and billing-day rollover.

use chrono::{Datelike, Local, Months, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

use crate::models::{
    first_of_month, BillingForm, BillingScheduleEntry, ChangeRequest, SowContract,
};

fn first_number() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = first.and_then(|d| d.checked_add_months(Months::new(1)));
    match (first, next) {
        (Some(a), Some(b)) => (b - a).num_days() as u32,
        _ => 31,
    }
}

fn clamp_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Map a planned date and a billing-day rule to a concrete invoice date.
///
/// * no planned date: `today`
/// * blank rule: the planned date
/// * a rule mentioning "last": last calendar day of the planned month
/// * otherwise the first integer in the rule is the target day, or the planned
///   day when the rule has none. A planned day past the target rolls into the
///   next month. The target is clamped to the length of the month it lands in.
pub fn rollover(planned: Option<NaiveDate>, rule: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(planned) = planned else {
        return today;
    };
    let rule = match rule.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_lowercase(),
        _ => return planned,
    };

    let target = if rule.contains("last") {
        days_in_month(planned.year(), planned.month())
    } else {
        first_number()
            .and_then(|re| re.find(&rule))
            .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
            .unwrap_or_else(|| planned.day())
    };
    let target = target.max(1);

    let base = if planned.day() > target {
        planned
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(1)))
            .unwrap_or(planned)
    } else {
        planned
    };
    clamp_day(base.year(), base.month(), target).unwrap_or(planned)
}

/// [`rollover`] against the local calendar date.
pub fn rollover_today(planned: Option<NaiveDate>, rule: Option<&str>) -> NaiveDate {
    rollover(planned, rule, Local::now().date_naive())
}

/// Contracted milestone of a new Fixed-Price SOW.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneSpec {
    pub name: String,
    pub amount: Decimal,
    pub planned_date: Option<NaiveDate>,
}

/// Contracted monthly amount of a new Retainer SOW.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainerMonthSpec {
    pub month: NaiveDate,
    pub amount: Decimal,
}

pub fn milestone_entries(
    sow: &SowContract,
    milestones: &[MilestoneSpec],
    rule: Option<&str>,
) -> Vec<BillingScheduleEntry> {
    milestones
        .iter()
        .map(|m| {
            BillingScheduleEntry::new(
                sow.id,
                BillingForm::Milestone {
                    name: m.name.clone(),
                    planned_date: m.planned_date,
                },
                m.amount,
                rollover_today(m.planned_date, rule),
            )
        })
        .collect()
}

pub fn retainer_entries(
    sow: &SowContract,
    months: &[RetainerMonthSpec],
    rule: Option<&str>,
) -> Vec<BillingScheduleEntry> {
    months
        .iter()
        .map(|m| retainer_entry(sow.id, first_of_month(m.month), m.amount, rule))
        .collect()
}

pub(crate) fn retainer_entry(
    sow_id: uuid::Uuid,
    month: NaiveDate,
    amount: Decimal,
    rule: Option<&str>,
) -> BillingScheduleEntry {
    let month = first_of_month(month);
    BillingScheduleEntry::new(
        sow_id,
        BillingForm::Retainer {
            billing_month: month,
        },
        amount,
        rollover_today(Some(month), rule),
    )
}

/// Extra invoice produced by approving a Fixed-Price change request.
///
/// Needs both a new end date and a cost; returns None otherwise.
pub fn fixed_price_entry(
    sow: &SowContract,
    cr: &ChangeRequest,
    rule: Option<&str>,
) -> Option<BillingScheduleEntry> {
    let end = cr.impact.new_end_date?;
    let cost = cr.billing_cost()?;
    let name = match &cr.title {
        Some(title) => format!("{} {}", cr.code, title),
        None => format!("{} {}", cr.code, cr.cr_type.label()),
    };
    let mut entry = BillingScheduleEntry::new(
        sow.id,
        BillingForm::Milestone {
            name,
            planned_date: Some(end),
        },
        cost,
        rollover_today(Some(end), rule),
    );
    entry.change_request_id = Some(cr.id);
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContractRef, CrType, EngagementType, MasterContract};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn today() -> NaiveDate {
        d(2025, 1, 10)
    }

    #[test]
    fn test_rollover_past_target_goes_to_next_month() {
        assert_eq!(rollover(Some(d(2025, 3, 20)), Some("15"), today()), d(2025, 4, 15));
        assert_eq!(rollover(Some(d(2025, 12, 20)), Some("15th"), today()), d(2026, 1, 15));
    }

    #[test]
    fn test_rollover_same_month() {
        assert_eq!(rollover(Some(d(2025, 3, 10)), Some("15"), today()), d(2025, 3, 15));
        assert_eq!(rollover(Some(d(2025, 3, 15)), Some("Day 15"), today()), d(2025, 3, 15));
    }

    #[test]
    fn test_rollover_clamps_to_month_length() {
        assert_eq!(rollover(Some(d(2025, 1, 31)), Some("30"), today()), d(2025, 2, 28));
        assert_eq!(rollover(Some(d(2024, 2, 10)), Some("31"), today()), d(2024, 2, 29));
        assert_eq!(rollover(Some(d(2025, 4, 2)), Some("99"), today()), d(2025, 4, 30));
        assert_eq!(rollover(Some(d(2025, 4, 2)), Some("0"), today()), d(2025, 5, 1));
    }

    #[test]
    fn test_rollover_last_business_day() {
        assert_eq!(
            rollover(Some(d(2025, 2, 3)), Some("Last business day"), today()),
            d(2025, 2, 28)
        );
        assert_eq!(rollover(Some(d(2025, 2, 28)), Some("LAST"), today()), d(2025, 2, 28));
    }

    #[test]
    fn test_rollover_rule_without_number_keeps_day() {
        assert_eq!(rollover(Some(d(2025, 6, 7)), Some("monthly"), today()), d(2025, 6, 7));
    }

    #[test]
    fn test_rollover_null_inputs() {
        assert_eq!(rollover(None, Some("15"), today()), today());
        assert_eq!(rollover(None, None, today()), today());
        assert_eq!(rollover(Some(d(2025, 3, 20)), None, today()), d(2025, 3, 20));
        assert_eq!(rollover(Some(d(2025, 3, 20)), Some("   "), today()), d(2025, 3, 20));
    }

    #[test]
    fn test_fixed_price_entry_needs_date_and_cost() {
        let msa = MasterContract::new("c1");
        let sow = SowContract::new(&msa, EngagementType::FixedPrice);
        let mut cr = ChangeRequest::new(
            ContractRef::Sow(sow.id),
            CrType::Schedule,
            "CR-2025-03".to_string(),
            "c1".to_string(),
        );
        assert!(fixed_price_entry(&sow, &cr, Some("15")).is_none());

        cr.impact.new_end_date = Some(d(2025, 3, 20));
        assert!(fixed_price_entry(&sow, &cr, Some("15")).is_none());

        cr.expected_extra_cost = Some(Decimal::new(80_000, 0));
        cr.impact.cost_estimated = Some(Decimal::new(75_000, 0));
        let entry = fixed_price_entry(&sow, &cr, Some("15")).unwrap();
        assert_eq!(entry.amount, Decimal::new(75_000, 0));
        assert_eq!(entry.invoice_date, d(2025, 4, 15));
        assert_eq!(entry.change_request_id, Some(cr.id));
        assert_eq!(entry.form.kind(), "milestone");
    }

    #[test]
    fn test_initial_retainer_entries_use_rule() {
        let msa = MasterContract::new("c1");
        let sow = SowContract::new(&msa, EngagementType::Retainer);
        let entries = retainer_entries(
            &sow,
            &[RetainerMonthSpec {
                month: d(2025, 3, 9),
                amount: Decimal::new(100_000, 0),
            }],
            Some("last business day"),
        );
        assert_eq!(entries[0].billing_month(), Some(d(2025, 3, 1)));
        assert_eq!(entries[0].invoice_date, d(2025, 3, 31));
        assert!(entries[0].change_request_id.is_none());
    }
}
