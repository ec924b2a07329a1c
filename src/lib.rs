//! # NOI Analyzer
//!
//! Reconciles financial statements extracted from property documents by a
//! language model and compares Net Operating Income across periods.
//!
//! ## Core Concepts
//!
//! - **Raw extraction**: whatever the model returned, field name to any JSON value
//! - **Coercion**: a fixed-schema [`FinancialRecord`], 0 for anything missing or malformed
//! - **Reconciliation**: totals repaired against their line items, including a
//!   unit-mismatch heuristic for revenue reported in a different scale
//! - **Slots**: each document fills one of current month, prior month, budget or prior year
//! - **Comparison**: current month against each filled slot, with absolute and
//!   percent deltas
//!
//! Nothing in the core fails. Every substitution, correction and unresolved
//! discrepancy is reported to an [`AuditSink`] instead.
//!
//! ## Example
//!
//! ```rust,ignore
//! use noi_analyzer::*;
//! use serde_json::json;
//!
//! let current = json!({
//!     "rental_income": 120000, "parking_income": 9000, "total_revenue": 129000,
//!     "utilities": 21500, "property_taxes": 30000, "total_expenses": 51500,
//! });
//! let prior = json!({
//!     "rental_income": 118000, "parking_income": 8300, "total_revenue": 126300,
//!     "utilities": 22000, "property_taxes": 30000, "total_expenses": 52000,
//! });
//!
//! let report = analyze_extractions(vec![
//!     (PeriodSlot::Current, current.as_object().unwrap().clone()),
//!     (PeriodSlot::PriorMonth, prior.as_object().unwrap().clone()),
//! ]);
//!
//! let mom = report.comparison.month_vs_prior.unwrap();
//! assert_eq!(mom.metric(Metric::Noi).unwrap().delta, 3200.0);
//! ```

pub mod audit;
pub mod coercion;
pub mod comparison;
pub mod error;
pub mod insights;
pub mod normalizer;
pub mod period;
pub mod pipeline;
pub mod reconciler;
pub mod schema;
pub mod utils;

#[cfg(feature = "llm")]
pub mod llm;

pub use audit::{AuditEvent, AuditSink, LogSink, MemorySink};
pub use coercion::{coerce, parse_raw_extraction, parse_raw_extraction_lenient, FieldCoercer};
pub use comparison::{
    compare, safe_percent_change, Comparison, ComparisonEngine, ComparisonKind, ComparisonResult,
    Metric, MetricComparison, MetricMode,
};
pub use error::{NoiAnalyzerError, Result};
pub use insights::{generate_insights, InsightNarrator, Insights, MarginBand};
pub use normalizer::{normalize, PeriodNormalizer};
pub use period::{infer_slot, parse_period_label, period_end, PeriodSlot, PeriodSlotMap};
pub use pipeline::{
    analyze_extractions, AnalysisPipeline, AnalysisReport, DocumentExtractor, ExtractedDocument,
    NoiAnalyzer, SourceDocument,
};
pub use reconciler::{reconcile, verify_consistency, ConsistencyReconciler, TOLERANCE};
pub use schema::*;
pub use utils::*;

use log::debug;

/// Single-document entry points: raw extraction in, reconciled record out.
pub struct StatementProcessor;

impl StatementProcessor {
    pub fn process(raw: &RawExtraction, sink: &dyn AuditSink) -> FinancialRecord {
        let record = FieldCoercer::new(sink).coerce(raw);
        let reconciled = ConsistencyReconciler::new(sink).reconcile(record);

        debug!(
            "Reconciled statement: revenue={}, expenses={}, noi={}",
            reconciled.total_revenue, reconciled.total_expenses, reconciled.net_operating_income
        );

        reconciled
    }

    /// Like [`Self::process`] but rejects records whose totals still
    /// disagree after reconciliation.
    pub fn process_with_verification(
        raw: &RawExtraction,
        sink: &dyn AuditSink,
        tolerance: f64,
    ) -> Result<FinancialRecord> {
        let record = Self::process(raw, sink);
        ConsistencyReconciler::new(sink).verify(&record, tolerance)?;
        Ok(record)
    }
}

pub fn process_statement(raw: &RawExtraction) -> FinancialRecord {
    StatementProcessor::process(raw, &LogSink)
}

pub fn process_statement_with_verification(
    raw: &RawExtraction,
    tolerance: f64,
) -> Result<FinancialRecord> {
    StatementProcessor::process_with_verification(raw, &LogSink, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawExtraction {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_process_statement_repairs_totals() {
        let record = process_statement(&raw(json!({
            "rental_income": "50000",
            "laundry_income": 500,
            "repairs_maintenance": 4000,
            "insurance": 1000,
            "total_expenses": 0,
        })));

        assert_eq!(record.total_revenue, 50_500.0);
        assert_eq!(record.total_expenses, 5_000.0);
        assert_eq!(record.net_operating_income, 45_500.0);
        assert!(verify_consistency(&record, TOLERANCE).is_ok());
    }

    #[test]
    fn test_verification_rejects_kept_discrepancy() {
        let sink = MemorySink::new();
        let result = StatementProcessor::process_with_verification(
            &raw(json!({
                "rental_income": 1000,
                "total_revenue": 1234,
                "net_operating_income": 1234,
            })),
            &sink,
            TOLERANCE,
        );

        assert!(matches!(
            result,
            Err(NoiAnalyzerError::ConsistencyViolation { ref check, .. }) if check == "total_revenue"
        ));
        assert!(sink.events().contains(&AuditEvent::RevenueDiscrepancyKept {
            calculated: 1000.0,
            reported: 1234.0,
        }));
    }
}
