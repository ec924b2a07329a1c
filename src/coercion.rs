//! Turns whatever the model returned into a [`FinancialRecord`].
//!
//! Coercion never fails: a field that is absent, `null`, or not a finite
//! number becomes `0.0` and an [`AuditEvent::FieldSubstituted`] is emitted.

use crate::audit::{AuditEvent, AuditSink, LogSink};
use crate::error::{NoiAnalyzerError, Result};
use crate::schema::{DetailedMetrics, FinancialRecord, LineItem, RawExtraction};
use log::warn;
use serde_json::Value;

pub struct FieldCoercer<'a> {
    sink: &'a dyn AuditSink,
}

impl<'a> FieldCoercer<'a> {
    pub fn new(sink: &'a dyn AuditSink) -> Self {
        Self { sink }
    }

    pub fn coerce(&self, raw: &RawExtraction) -> FinancialRecord {
        let mut record = FinancialRecord::default();

        for item in LineItem::ALL {
            let value = match raw.get(item.key()) {
                None => Err("missing from extraction".to_string()),
                Some(value) => numeric_value(value),
            };

            match value {
                Ok(v) => record.set(item, v),
                Err(reason) => self
                    .sink
                    .emit(AuditEvent::FieldSubstituted { field: item, reason }),
            }
        }

        record
    }

    /// Reads the optional rent-roll metrics. Unlike [`Self::coerce`], absent
    /// values stay `None`; the reconciled `record` supplies opex and NOI once
    /// any rent-roll figure was found.
    pub fn coerce_detail(&self, raw: &RawExtraction, record: &FinancialRecord) -> DetailedMetrics {
        let read = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| raw.get(*k).and_then(|v| numeric_value(v).ok()))
        };

        let gpr = read(&["gpr", "gross_potential_rent"]);
        let vacancy_loss = read(&["vacancy_loss", "vacancy_credit_loss"]);
        let other_income = read(&["other_income"]);
        let derived_egi = match (gpr, vacancy_loss, other_income) {
            (Some(g), Some(v), Some(o)) => Some(g - v + o).filter(|egi| egi.is_finite()),
            _ => None,
        };
        let egi = read(&["egi", "effective_gross_income"]).or(derived_egi);

        if gpr.is_none() && vacancy_loss.is_none() && other_income.is_none() && egi.is_none() {
            return DetailedMetrics::default();
        }

        DetailedMetrics {
            gpr,
            vacancy_loss,
            other_income,
            egi,
            opex: read(&["opex", "operating_expenses"]).or(Some(record.total_expenses)),
            noi: read(&["noi"]).or(Some(record.net_operating_income)),
        }
    }
}

/// Coerces with the default log sink.
pub fn coerce(raw: &RawExtraction) -> FinancialRecord {
    FieldCoercer::new(&LogSink).coerce(raw)
}

fn numeric_value(value: &Value) -> std::result::Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return Err("null value".to_string()),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(format!("non-numeric value {}", value)),
    }
}

/// Parses the model's reply into a raw extraction. Accepts a bare JSON
/// object or one wrapped in prose / code fences.
pub fn parse_raw_extraction(response: &str) -> Result<RawExtraction> {
    let response = response.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(response) {
        return Ok(map);
    }

    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            match serde_json::from_str::<Value>(json_str) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(NoiAnalyzerError::InvalidExtraction(
                    "JSON payload is not an object".to_string(),
                )),
                Err(e) => Err(NoiAnalyzerError::InvalidExtraction(format!(
                    "Invalid JSON from model: {} | Raw: {}",
                    e,
                    truncate(json_str, 200)
                ))),
            }
        }
        _ => Err(NoiAnalyzerError::InvalidExtraction(format!(
            "No JSON object found in model response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

/// Never fails; an unparseable reply becomes an empty extraction, which
/// coerces to the all-zero record.
pub fn parse_raw_extraction_lenient(response: &str) -> RawExtraction {
    parse_raw_extraction(response).unwrap_or_else(|e| {
        warn!("{}; continuing with an empty extraction", e);
        RawExtraction::new()
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
