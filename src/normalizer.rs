use crate::audit::{AuditEvent, AuditSink, LogSink};
use crate::period::PeriodSlot;
use crate::schema::{FinancialRecord, PeriodSummary};

/// Reduces a record to the three summary figures the comparisons use.
pub struct PeriodNormalizer<'a> {
    sink: &'a dyn AuditSink,
}

impl<'a> PeriodNormalizer<'a> {
    pub fn new(sink: &'a dyn AuditSink) -> Self {
        Self { sink }
    }

    /// `slot` only labels the audit trail; which slot a document fills is
    /// the caller's decision.
    pub fn normalize(&self, record: &FinancialRecord, slot: PeriodSlot) -> PeriodSummary {
        let revenue = record.total_revenue;
        let expense = record.total_expenses;
        let mut noi = record.net_operating_income;

        // Records that skipped reconciliation may still lack NOI.
        if noi == 0.0 && revenue != 0.0 && expense != 0.0 {
            let recomputed = revenue - expense;
            if recomputed.is_finite() {
                noi = recomputed;
                self.sink.emit(AuditEvent::NoiRecomputed { slot, noi });
            }
        }

        PeriodSummary {
            revenue,
            expense,
            noi,
        }
    }
}

pub fn normalize(record: &FinancialRecord, slot: PeriodSlot) -> PeriodSummary {
    PeriodNormalizer::new(&LogSink).normalize(record, slot)
}
