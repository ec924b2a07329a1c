use crate::audit::{AuditEvent, AuditSink, LogSink};
use crate::error::{NoiAnalyzerError, Result};
use crate::schema::{FinancialRecord, LineItem};
use crate::utils::within_tolerance;

/// Largest difference, in currency units, treated as a rounding artifact.
pub const TOLERANCE: f64 = 1.0;

/// Reported/itemized revenue ratios accepted as a unit mismatch.
pub const UNIT_RATIO_MIN: f64 = 10.0;
pub const UNIT_RATIO_MAX: f64 = 10_000.0;

/// Best-effort repair of a coerced record so its totals agree with its line
/// items. Nothing here rejects input; every correction and every
/// discrepancy left in place is reported to the sink.
pub struct ConsistencyReconciler<'a> {
    sink: &'a dyn AuditSink,
}

impl<'a> ConsistencyReconciler<'a> {
    pub fn new(sink: &'a dyn AuditSink) -> Self {
        Self { sink }
    }

    pub fn reconcile(&self, mut record: FinancialRecord) -> FinancialRecord {
        self.reconcile_in_place(&mut record);
        record
    }

    pub fn reconcile_in_place(&self, record: &mut FinancialRecord) {
        self.reconcile_revenue(record);
        self.reconcile_expenses(record);
        self.reconcile_noi(record);
    }

    fn reconcile_revenue(&self, record: &mut FinancialRecord) {
        let calculated = record.itemized_revenue();
        let reported = record.total_revenue;

        if within_tolerance(calculated, reported, TOLERANCE) {
            return;
        }

        if !calculated.is_finite() {
            self.sink.emit(AuditEvent::RevenueDiscrepancyKept {
                calculated,
                reported,
            });
            return;
        }

        let multiplier = unit_multiplier(calculated, reported).filter(|&k| {
            LineItem::REVENUE_ITEMS
                .iter()
                .all(|&item| (record.get(item) * k).is_finite())
        });

        if let Some(multiplier) = multiplier {
            for item in LineItem::REVENUE_ITEMS {
                *record.get_mut(item) *= multiplier;
            }
            self.sink.emit(AuditEvent::UnitMismatchCorrected {
                calculated,
                reported,
                multiplier,
            });
        } else if reported == 0.0 {
            record.total_revenue = calculated;
            self.sink.emit(AuditEvent::RevenueTotalFilled { calculated });
        } else {
            self.sink.emit(AuditEvent::RevenueDiscrepancyKept {
                calculated,
                reported,
            });
        }
    }

    /// The itemized expense sum wins unless it overflowed; there is no unit
    /// heuristic here.
    fn reconcile_expenses(&self, record: &mut FinancialRecord) {
        let calculated = record.itemized_expenses();
        let reported = record.total_expenses;

        if !calculated.is_finite() {
            self.sink.emit(AuditEvent::ExpenseDiscrepancyKept {
                calculated,
                reported,
            });
        } else if !within_tolerance(calculated, reported, TOLERANCE) {
            record.total_expenses = calculated;
            self.sink.emit(AuditEvent::ExpenseTotalOverwritten {
                calculated,
                reported,
            });
        }
    }

    fn reconcile_noi(&self, record: &mut FinancialRecord) {
        let calculated = record.total_revenue - record.total_expenses;
        let reported = record.net_operating_income;

        if within_tolerance(calculated, reported, TOLERANCE) {
            return;
        }

        if reported == 0.0 && calculated.is_finite() {
            record.net_operating_income = calculated;
            self.sink.emit(AuditEvent::NoiFilled { calculated });
        } else {
            self.sink.emit(AuditEvent::NoiDiscrepancyKept {
                calculated,
                reported,
            });
        }
    }

    /// Checks the three record invariants without changing anything. The
    /// pipeline never calls this; it is for callers that want to reject
    /// records instead of repairing them.
    pub fn verify(&self, record: &FinancialRecord, tolerance: f64) -> Result<()> {
        let checks = [
            (
                "total_revenue",
                record.itemized_revenue(),
                record.total_revenue,
            ),
            (
                "total_expenses",
                record.itemized_expenses(),
                record.total_expenses,
            ),
            (
                "net_operating_income",
                record.total_revenue - record.total_expenses,
                record.net_operating_income,
            ),
        ];

        for (check, calculated, reported) in checks {
            let difference = (calculated - reported).abs();
            if difference > tolerance {
                return Err(NoiAnalyzerError::ConsistencyViolation {
                    check: check.to_string(),
                    calculated,
                    reported,
                    difference,
                });
            }
        }

        Ok(())
    }
}

/// Detects line items reported in a smaller unit than the total (e.g. items
/// in thousands). The ratio must fall in [10, 10000] and the reported total
/// must be a whole multiple of 10. Ties round to even.
fn unit_multiplier(calculated: f64, reported: f64) -> Option<f64> {
    if calculated <= 0.0 {
        return None;
    }

    let ratio = reported / calculated;
    if (UNIT_RATIO_MIN..=UNIT_RATIO_MAX).contains(&ratio) && reported % 10.0 == 0.0 {
        Some(ratio.round_ties_even())
    } else {
        None
    }
}

pub fn reconcile(record: FinancialRecord) -> FinancialRecord {
    ConsistencyReconciler::new(&LogSink).reconcile(record)
}

pub fn verify_consistency(record: &FinancialRecord, tolerance: f64) -> Result<()> {
    ConsistencyReconciler::new(&LogSink).verify(record, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;

    fn consistent_record() -> FinancialRecord {
        FinancialRecord {
            rental_income: 100_000.0,
            laundry_income: 2_000.0,
            parking_income: 5_000.0,
            other_revenue: 1_000.0,
            application_fees: 500.0,
            total_revenue: 108_500.0,
            repairs_maintenance: 10_000.0,
            utilities: 8_000.0,
            property_management_fees: 5_000.0,
            property_taxes: 12_000.0,
            insurance: 3_000.0,
            admin_office_costs: 1_500.0,
            marketing_advertising: 500.0,
            total_expenses: 40_000.0,
            net_operating_income: 68_500.0,
        }
    }

    #[test]
    fn test_consistent_record_is_untouched() {
        let sink = MemorySink::new();
        let record = consistent_record();
        let reconciled = ConsistencyReconciler::new(&sink).reconcile(record.clone());

        assert_eq!(reconciled, record);
        assert!(sink.events().is_empty());
        assert!(verify_consistency(&reconciled, TOLERANCE).is_ok());
    }

    #[test]
    fn test_unit_mismatch_scales_revenue_items() {
        let sink = MemorySink::new();
        let record = FinancialRecord {
            rental_income: 100.0,
            laundry_income: 4.0,
            parking_income: 20.0,
            other_revenue: 5.0,
            total_revenue: 1_290.0,
            ..Default::default()
        };

        let reconciled = ConsistencyReconciler::new(&sink).reconcile(record);

        assert_eq!(reconciled.rental_income, 1_000.0);
        assert_eq!(reconciled.laundry_income, 40.0);
        assert_eq!(reconciled.parking_income, 200.0);
        assert_eq!(reconciled.other_revenue, 50.0);
        assert_eq!(reconciled.total_revenue, 1_290.0);
        assert_eq!(reconciled.net_operating_income, 1_290.0);
        assert!(sink.events().contains(&AuditEvent::UnitMismatchCorrected {
            calculated: 129.0,
            reported: 1_290.0,
            multiplier: 10.0,
        }));
    }

    #[test]
    fn test_unit_mismatch_requires_multiple_of_ten() {
        let sink = MemorySink::new();
        let record = FinancialRecord {
            rental_income: 129.0,
            total_revenue: 1_295.0,
            ..Default::default()
        };

        let reconciled = ConsistencyReconciler::new(&sink).reconcile(record);

        assert_eq!(reconciled.rental_income, 129.0);
        assert_eq!(reconciled.total_revenue, 1_295.0);
        assert!(sink.events().contains(&AuditEvent::RevenueDiscrepancyKept {
            calculated: 129.0,
            reported: 1_295.0,
        }));
    }

    #[test]
    fn test_unit_ratio_outside_range_keeps_reported_total() {
        let sink = MemorySink::new();
        let record = FinancialRecord {
            rental_income: 1.0,
            total_revenue: 20_000.0,
            ..Default::default()
        };

        let reconciled = ConsistencyReconciler::new(&sink).reconcile(record);
        assert_eq!(reconciled.rental_income, 1.0);
        assert_eq!(reconciled.total_revenue, 20_000.0);
    }

    #[test]
    fn test_unit_multiplier_rounds_ties_to_even() {
        assert_eq!(unit_multiplier(100.0, 1_050.0), Some(10.0));
        assert_eq!(unit_multiplier(100.0, 1_150.0), Some(12.0));
        assert_eq!(unit_multiplier(0.0, 1_000.0), None);
        assert_eq!(unit_multiplier(-10.0, -1_000.0), None);
    }

    #[test]
    fn test_missing_revenue_total_uses_itemized_sum() {
        let sink = MemorySink::new();
        let record = FinancialRecord {
            rental_income: 900.0,
            parking_income: 100.0,
            ..Default::default()
        };

        let reconciled = ConsistencyReconciler::new(&sink).reconcile(record);

        assert_eq!(reconciled.total_revenue, 1_000.0);
        assert_eq!(reconciled.net_operating_income, 1_000.0);
        assert_eq!(
            sink.events()[0],
            AuditEvent::RevenueTotalFilled { calculated: 1_000.0 }
        );
    }

    #[test]
    fn test_expense_total_always_overwritten() {
        let sink = MemorySink::new();
        let mut record = consistent_record();
        record.total_expenses = 400_000.0;
        record.net_operating_income = 0.0;

        let reconciled = ConsistencyReconciler::new(&sink).reconcile(record);

        assert_eq!(reconciled.total_expenses, 40_000.0);
        assert_eq!(reconciled.net_operating_income, 68_500.0);
        assert!(sink.events().contains(&AuditEvent::ExpenseTotalOverwritten {
            calculated: 40_000.0,
            reported: 400_000.0,
        }));
    }

    #[test]
    fn test_expense_within_tolerance_is_kept() {
        let mut record = consistent_record();
        record.total_expenses = 40_000.75;
        record.net_operating_income = 68_499.25;

        let reconciled = reconcile(record);
        assert_eq!(reconciled.total_expenses, 40_000.75);
    }

    #[test]
    fn test_reported_noi_is_kept_when_nonzero() {
        let sink = MemorySink::new();
        let mut record = consistent_record();
        record.net_operating_income = 70_000.0;

        let reconciled = ConsistencyReconciler::new(&sink).reconcile(record);

        assert_eq!(reconciled.net_operating_income, 70_000.0);
        assert!(sink.events().contains(&AuditEvent::NoiDiscrepancyKept {
            calculated: 68_500.0,
            reported: 70_000.0,
        }));
        assert!(matches!(
            verify_consistency(&reconciled, TOLERANCE),
            Err(NoiAnalyzerError::ConsistencyViolation { ref check, .. }) if check == "net_operating_income"
        ));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let records = vec![
            consistent_record(),
            FinancialRecord {
                rental_income: 100.0,
                laundry_income: 4.0,
                parking_income: 20.0,
                other_revenue: 5.0,
                total_revenue: 1_300.0,
                utilities: 7.0,
                total_expenses: 99.0,
                ..Default::default()
            },
            FinancialRecord {
                rental_income: -50.0,
                total_revenue: 0.0,
                insurance: 10.0,
                net_operating_income: 12.0,
                ..Default::default()
            },
            FinancialRecord::default(),
        ];

        for record in records {
            let once = reconcile(record);
            let twice = reconcile(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_overflowing_sums_keep_reported_totals() {
        let sink = MemorySink::new();
        let record = FinancialRecord {
            rental_income: 1e308,
            laundry_income: 1e308,
            utilities: 1e308,
            insurance: 1e308,
            ..Default::default()
        };

        let once = ConsistencyReconciler::new(&sink).reconcile(record);

        assert_eq!(once.total_revenue, 0.0);
        assert_eq!(once.total_expenses, 0.0);
        assert_eq!(once.net_operating_income, 0.0);
        assert!(sink.events().iter().any(|e| matches!(
            e,
            AuditEvent::ExpenseDiscrepancyKept { calculated, reported }
                if calculated.is_infinite() && *reported == 0.0
        )));

        assert_eq!(reconcile(once.clone()), once);
        let json = serde_json::to_string(&once).unwrap();
        let back: FinancialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, once);
    }

    #[test]
    fn test_unit_scaling_skipped_when_items_would_overflow() {
        let record = FinancialRecord {
            rental_income: 1e305,
            laundry_income: -1e305,
            parking_income: 100.0,
            total_revenue: 1_000_000.0,
            ..Default::default()
        };

        let reconciled = reconcile(record);
        assert_eq!(reconciled.rental_income, 1e305);
        assert_eq!(reconciled.total_revenue, 1_000_000.0);
    }

    #[test]
    fn test_overflowing_noi_is_not_filled() {
        let record = FinancialRecord {
            rental_income: 1.5e308,
            total_revenue: 1.5e308,
            insurance: -1.5e308,
            total_expenses: -1.5e308,
            ..Default::default()
        };

        let reconciled = reconcile(record);
        assert_eq!(reconciled.net_operating_income, 0.0);
        assert_eq!(reconcile(reconciled.clone()), reconciled);
    }

    #[test]
    fn test_verify_reports_first_violation() {
        let mut record = consistent_record();
        record.total_revenue = 1.0;

        let err = verify_consistency(&record, TOLERANCE).unwrap_err();
        match err {
            NoiAnalyzerError::ConsistencyViolation {
                check, difference, ..
            } => {
                assert_eq!(check, "total_revenue");
                assert_eq!(difference, 108_499.0);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
