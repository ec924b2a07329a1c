use crate::schema::FinancialRecord;

pub const SYSTEM_PROMPT: &str =
    "You are a senior real estate accountant specializing in NOI analysis.";

const EXTRACTION_INSTRUCTIONS: &str = r#"
Extract the figures below from the property financial statement that follows.

Rules:
- Return ONLY a JSON object, no prose.
- Use plain numbers without currency symbols or thousands separators.
- Use 0 for any line item the statement does not report.
- Report totals exactly as stated in the document; do not recompute them.
- Also include "document_type" (e.g. "Actual", "Budget", "Prior Year Actual")
  and "period" (e.g. "March 2024") when the statement states them.
- If the statement reports rent-roll figures, include "gpr",
  "vacancy_loss", "other_income" and "egi" as well.

JSON schema of the expected object:
"#;

/// Builds the user message: instructions, the record schema and the
/// (already truncated) document text.
pub fn build_extraction_prompt(document_text: &str) -> String {
    let schema = FinancialRecord::schema_as_json().unwrap_or_default();
    format!(
        "{}{}\n\nDocument:\n{}",
        EXTRACTION_INSTRUCTIONS, schema, document_text
    )
}
