use rust_decimal::Decimal;
use uuid::Uuid;

use super::ContractEngine;
use crate::error::EngineResult;
use crate::models::{Actor, ChangeRequest, CrStatus};

/// Base value plus the amounts of Active change requests.
///
/// A missing base counts as zero and CRs without an amount are skipped.
pub fn sum_active_amounts(base: Option<Decimal>, crs: &[ChangeRequest]) -> Decimal {
    crs.iter()
        .filter(|cr| cr.status == CrStatus::Active)
        .filter_map(|cr| cr.amount)
        .fold(base.unwrap_or(Decimal::ZERO), |acc, amount| acc + amount)
}

impl ContractEngine {
    /// Current total value of a SOW. Recomputed on every read.
    ///
    /// Change requests raised on any version of the lineage count. A failed
    /// change request lookup degrades to the base value.
    pub fn total_value(&self, actor: &Actor, sow_id: Uuid) -> EngineResult<Decimal> {
        let sow = self.load_sow(actor, sow_id)?;
        match self.db.list_change_requests_for_lineage(sow.lineage_id) {
            Ok(crs) => Ok(sum_active_amounts(sow.base_value, &crs)),
            Err(e) => {
                tracing::warn!(
                    sow_id = %sow.id,
                    error = %e,
                    "change request lookup failed, reporting base value"
                );
                Ok(sow.base_value.unwrap_or(Decimal::ZERO))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContractRef, CrType};

    fn cr(status: CrStatus, amount: Option<i64>) -> ChangeRequest {
        let mut cr = ChangeRequest::new(
            ContractRef::Sow(Uuid::new_v4()),
            CrType::Scope,
            "CR".to_string(),
            "c1".to_string(),
        );
        cr.status = status;
        cr.amount = amount.map(|a| Decimal::new(a, 0));
        cr
    }

    #[test]
    fn test_only_active_amounts_count() {
        let crs = vec![
            cr(CrStatus::Active, Some(50_000)),
            cr(CrStatus::Terminated, Some(20_000)),
            cr(CrStatus::UnderReview, Some(1_000)),
            cr(CrStatus::Active, None),
        ];
        assert_eq!(
            sum_active_amounts(Some(Decimal::new(500_000, 0)), &crs),
            Decimal::new(550_000, 0)
        );
    }

    #[test]
    fn test_missing_base_is_zero() {
        assert_eq!(sum_active_amounts(None, &[]), Decimal::ZERO);
        assert_eq!(
            sum_active_amounts(None, &[cr(CrStatus::Active, Some(7))]),
            Decimal::new(7, 0)
        );
    }
}
