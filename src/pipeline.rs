//! End-to-end analysis run: extract every document concurrently, then
//! coerce, reconcile and normalize each one, fill the period slots, compare
//! and narrate.
//!
//! A run never fails. Extraction errors are reported to the audit sink and
//! leave the document's slot empty.

use crate::audit::{AuditEvent, AuditSink, LogSink};
use crate::coercion::FieldCoercer;
use crate::comparison::{ComparisonEngine, ComparisonResult, MetricMode};
use crate::error::Result;
use crate::insights::{InsightNarrator, Insights};
use crate::normalizer::PeriodNormalizer;
use crate::period::{infer_slot, period_end, PeriodSlot, PeriodSlotMap};
use crate::reconciler::ConsistencyReconciler;
use crate::schema::{DetailedMetrics, FinancialRecord, PeriodData, PeriodSummary, RawExtraction};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A document handed to the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    /// Target slot; when `None` the slot is inferred from the name and the
    /// extracted document type.
    pub slot: Option<PeriodSlot>,
    pub text: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: None,
            text: text.into(),
        }
    }

    pub fn with_slot(mut self, slot: PeriodSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Uses an upload-form label such as `prior_month_actuals`; unknown
    /// labels fall back to the current month.
    pub fn with_label(self, label: &str) -> Self {
        self.with_slot(PeriodSlot::from_label_or_current(label))
    }
}

/// Produces a raw extraction for one document. The model transport lives
/// behind this seam.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &SourceDocument) -> Result<RawExtraction>;
}

/// One document after coercion, reconciliation and normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub name: String,
    pub slot: PeriodSlot,
    pub document_type: Option<String>,
    pub period: Option<String>,
    pub period_end: Option<NaiveDate>,
    pub record: FinancialRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailedMetrics>,
    pub summary: PeriodSummary,
}

impl ExtractedDocument {
    pub fn period_data(&self) -> PeriodData {
        PeriodData {
            summary: self.summary,
            detail: self.detail,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub documents: Vec<ExtractedDocument>,
    pub slots: PeriodSlotMap,
    pub comparison: ComparisonResult,
    pub insights: Insights,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn string_field(raw: &RawExtraction, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The synchronous part of a run. Holds the audit sink and the comparison
/// and narration settings.
#[derive(Clone)]
pub struct NoiAnalyzer {
    sink: Arc<dyn AuditSink>,
    engine: ComparisonEngine,
    narrator: InsightNarrator,
}

impl Default for NoiAnalyzer {
    fn default() -> Self {
        Self {
            sink: Arc::new(LogSink),
            engine: ComparisonEngine::new(),
            narrator: InsightNarrator::new(),
        }
    }
}

impl NoiAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_mode(mut self, mode: MetricMode) -> Self {
        self.engine = ComparisonEngine::with_mode(mode);
        self
    }

    pub fn with_property_name(mut self, name: impl Into<String>) -> Self {
        self.narrator = self.narrator.with_property_name(name);
        self
    }

    pub fn process_document(
        &self,
        name: &str,
        slot: Option<PeriodSlot>,
        raw: &RawExtraction,
    ) -> ExtractedDocument {
        let sink = self.sink.as_ref();
        let coercer = FieldCoercer::new(sink);

        let record = ConsistencyReconciler::new(sink).reconcile(coercer.coerce(raw));
        let detail = coercer.coerce_detail(raw, &record);

        let document_type = string_field(raw, "document_type");
        let period = string_field(raw, "period");
        let slot = slot.unwrap_or_else(|| infer_slot(name, document_type.as_deref()));
        let summary = PeriodNormalizer::new(sink).normalize(&record, slot);

        debug!(
            "Processed '{}' into slot {}: revenue={}, expense={}, noi={}",
            name, slot, summary.revenue, summary.expense, summary.noi
        );

        ExtractedDocument {
            name: name.to_string(),
            slot,
            document_type,
            period_end: period_end(period.as_deref()),
            period,
            record,
            detail: (!detail.is_empty()).then_some(detail),
            summary,
        }
    }

    /// Fills the slot map in document order; the first document for a slot
    /// wins.
    pub fn analyze(&self, documents: Vec<ExtractedDocument>) -> AnalysisReport {
        let mut slots = PeriodSlotMap::new();
        for doc in &documents {
            if !slots.fill(doc.slot, doc.period_data()) {
                self.sink.emit(AuditEvent::DuplicateSlotIgnored {
                    slot: doc.slot,
                    document: doc.name.clone(),
                });
            }
        }

        let comparison = self.engine.compare(&slots);
        let insights = self.narrator.narrate(&comparison);

        info!(
            "Analyzed {} document(s), {} slot(s) filled",
            documents.len(),
            slots.filled().count()
        );

        AnalysisReport {
            documents,
            slots,
            comparison,
            insights,
        }
    }

    /// For callers that already hold raw extractions; document names are the
    /// slot keys.
    pub fn analyze_extractions(
        &self,
        extractions: Vec<(PeriodSlot, RawExtraction)>,
    ) -> AnalysisReport {
        let documents = extractions
            .iter()
            .map(|(slot, raw)| self.process_document(slot.key(), Some(*slot), raw))
            .collect();
        self.analyze(documents)
    }
}

pub fn analyze_extractions(extractions: Vec<(PeriodSlot, RawExtraction)>) -> AnalysisReport {
    NoiAnalyzer::new().analyze_extractions(extractions)
}

pub struct AnalysisPipeline<E: DocumentExtractor> {
    extractor: E,
    analyzer: NoiAnalyzer,
}

impl<E: DocumentExtractor> AnalysisPipeline<E> {
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            analyzer: NoiAnalyzer::new(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: NoiAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn analyzer(&self) -> &NoiAnalyzer {
        &self.analyzer
    }

    pub async fn run(&self, documents: Vec<SourceDocument>) -> AnalysisReport {
        info!("Extracting {} document(s)", documents.len());

        let outcomes = join_all(documents.iter().map(|doc| self.extractor.extract(doc))).await;

        let mut extracted = Vec::with_capacity(documents.len());
        for (doc, outcome) in documents.into_iter().zip(outcomes) {
            match outcome {
                Ok(raw) => {
                    extracted.push(self.analyzer.process_document(&doc.name, doc.slot, &raw))
                }
                Err(e) => self.analyzer.sink.emit(AuditEvent::ExtractionFailed {
                    document: doc.name,
                    reason: e.to_string(),
                }),
            }
        }

        self.analyzer.analyze(extracted)
    }
}

#[cfg(feature = "llm")]
impl SourceDocument {
    /// Reads a text export of a statement. A `None` slot is left for inference.
    pub async fn from_path(
        path: impl AsRef<std::path::Path>,
        slot: Option<PeriodSlot>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        Ok(Self {
            slot,
            ..Self::new(name, text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::comparison::Metric;
    use crate::error::NoiAnalyzerError;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    struct CannedExtractor {
        replies: HashMap<String, Value>,
    }

    impl CannedExtractor {
        fn new(replies: Vec<(&str, Value)>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|(name, v)| (name.to_string(), v))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl DocumentExtractor for CannedExtractor {
        async fn extract(&self, document: &SourceDocument) -> Result<RawExtraction> {
            match self.replies.get(&document.name) {
                Some(Value::Object(map)) => Ok(map.clone()),
                _ => Err(NoiAnalyzerError::ExtractionFailed(format!(
                    "no reply for {}",
                    document.name
                ))),
            }
        }
    }

    fn raw(value: Value) -> RawExtraction {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_process_document_reconciles_and_infers_slot() {
        let analyzer = NoiAnalyzer::new();
        let doc = analyzer.process_document(
            "statement.pdf",
            None,
            &raw(json!({
                "document_type": "Budget",
                "period": "March 2024",
                "rental_income": 9000,
                "other_revenue": 1000,
                "utilities": 2500,
                "insurance": 500,
                "total_expenses": 9999,
            })),
        );

        assert_eq!(doc.slot, PeriodSlot::Budget);
        assert_eq!(doc.document_type.as_deref(), Some("Budget"));
        assert_eq!(doc.period_end, NaiveDate::from_ymd_opt(2024, 3, 31));
        assert_eq!(doc.record.total_revenue, 10_000.0);
        assert_eq!(doc.record.total_expenses, 3_000.0);
        assert_eq!(
            doc.summary,
            PeriodSummary {
                revenue: 10_000.0,
                expense: 3_000.0,
                noi: 7_000.0,
            }
        );
        assert!(doc.detail.is_none());
    }

    #[test]
    fn test_duplicate_slot_keeps_first_document() {
        let sink = Arc::new(MemorySink::new());
        let analyzer = NoiAnalyzer::new().with_sink(sink.clone());

        let report = analyzer.analyze_extractions(vec![
            (PeriodSlot::Current, raw(json!({"total_revenue": 100, "rental_income": 100}))),
            (PeriodSlot::Current, raw(json!({"total_revenue": 999, "rental_income": 999}))),
        ]);

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.slots.current.as_ref().unwrap().summary.revenue, 100.0);
        assert!(sink.events().contains(&AuditEvent::DuplicateSlotIgnored {
            slot: PeriodSlot::Current,
            document: "current".to_string(),
        }));
    }

    #[test]
    fn test_empty_extractions_give_empty_report() {
        let report = analyze_extractions(Vec::new());
        assert!(report.slots.is_empty());
        assert_eq!(report.comparison, ComparisonResult::default());
        assert_eq!(report.insights.recommendations.len(), 3);
    }

    #[tokio::test]
    async fn test_pipeline_runs_all_documents_and_survives_failures() {
        let extractor = CannedExtractor::new(vec![
            (
                "march.pdf",
                json!({
                    "rental_income": 120000, "parking_income": 9000,
                    "total_revenue": 129000,
                    "utilities": 21500, "property_taxes": 30000,
                    "total_expenses": 51500, "net_operating_income": 77500,
                }),
            ),
            (
                "february.pdf",
                json!({
                    "rental_income": 118000, "parking_income": 8300,
                    "total_revenue": 126300,
                    "utilities": 22000, "property_taxes": 30000,
                    "total_expenses": 52000, "net_operating_income": 74300,
                }),
            ),
        ]);

        let sink = Arc::new(MemorySink::new());
        let pipeline = AnalysisPipeline::new(extractor)
            .with_analyzer(NoiAnalyzer::new().with_sink(sink.clone()));

        let report = pipeline
            .run(vec![
                SourceDocument::new("march.pdf", "...").with_label("current_month_actuals"),
                SourceDocument::new("february.pdf", "...").with_slot(PeriodSlot::PriorMonth),
                SourceDocument::new("budget.pdf", "...").with_slot(PeriodSlot::Budget),
            ])
            .await;

        assert_eq!(report.documents.len(), 2);
        assert!(report.slots.budget.is_none());
        assert!(report.comparison.actual_vs_budget.is_none());

        let mom = report.comparison.month_vs_prior.as_ref().unwrap();
        assert_eq!(mom.metric(Metric::Noi).unwrap().delta, 3_200.0);

        assert!(sink.events().iter().any(|e| matches!(
            e,
            AuditEvent::ExtractionFailed { document, .. } if document == "budget.pdf"
        )));
        assert!(report.to_json().unwrap().contains("noi_percent_change"));
    }

    #[test]
    fn test_detailed_mode_through_analyzer() {
        let analyzer = NoiAnalyzer::new().with_mode(MetricMode::Detailed);
        let detailed = |gpr: f64, vacancy: f64| {
            raw(json!({
                "rental_income": gpr - vacancy, "other_revenue": 100,
                "utilities": 400,
                "gpr": gpr, "vacancy_loss": vacancy, "other_income": 100,
            }))
        };

        let report = analyzer.analyze_extractions(vec![
            (PeriodSlot::Current, detailed(1000.0, 50.0)),
            (PeriodSlot::PriorYear, detailed(1000.0, 120.0)),
        ]);

        let yoy = report.comparison.year_vs_year.as_ref().unwrap();
        assert!(yoy.is_detailed());
        assert_eq!(yoy.metric(Metric::VacancyLoss).unwrap().delta, -70.0);
        assert_eq!(yoy.metric(Metric::Egi).unwrap().delta, 70.0);
        assert_eq!(yoy.metric(Metric::Noi).unwrap().delta, 70.0);
    }

    #[cfg(feature = "llm")]
    #[tokio::test]
    async fn test_from_path_reads_text_and_slot() -> Result<()> {
        let path = std::env::temp_dir().join("noi_analyzer_budget_2024.txt");
        tokio::fs::write(&path, "Total Revenue 125,000").await?;

        let labelled = SourceDocument::from_path(&path, Some(PeriodSlot::Budget)).await?;
        assert_eq!(labelled.name, "noi_analyzer_budget_2024.txt");
        assert_eq!(labelled.slot, Some(PeriodSlot::Budget));
        assert_eq!(labelled.text, "Total Revenue 125,000");

        let inferred = SourceDocument::from_path(&path, None).await?;
        assert_eq!(inferred.slot, None);

        let missing = SourceDocument::from_path(path.with_extension("missing"), None).await;
        assert!(matches!(missing, Err(NoiAnalyzerError::Io(_))));
        Ok(())
    }
}
