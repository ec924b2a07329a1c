use crate::error::{NoiAnalyzerError, Result};
use crate::schema::PeriodData;
use crate::utils::last_day_of_month;
use chrono::{Datelike, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four canonical roles a document can play in an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSlot {
    Current,
    PriorMonth,
    Budget,
    PriorYear,
}

impl PeriodSlot {
    pub const ALL: [PeriodSlot; 4] = [
        PeriodSlot::Current,
        PeriodSlot::PriorMonth,
        PeriodSlot::Budget,
        PeriodSlot::PriorYear,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PeriodSlot::Current => "current",
            PeriodSlot::PriorMonth => "prior_month",
            PeriodSlot::Budget => "budget",
            PeriodSlot::PriorYear => "prior_year",
        }
    }

    /// Maps the document-type labels used by upload forms and the batch
    /// extraction API onto a slot.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_lowercase().as_str() {
            "current_month_actuals" | "current_month" | "current" | "actuals" => {
                Ok(PeriodSlot::Current)
            }
            "prior_month_actuals" | "prior_month" | "previous_month" => Ok(PeriodSlot::PriorMonth),
            "current_month_budget" | "budget" => Ok(PeriodSlot::Budget),
            "prior_year_actuals" | "prior_year" | "previous_year" => Ok(PeriodSlot::PriorYear),
            _ => Err(NoiAnalyzerError::UnknownPeriodLabel(label.to_string())),
        }
    }

    pub fn from_label_or_current(label: &str) -> Self {
        Self::from_label(label).unwrap_or_else(|_| {
            warn!("Unknown document type: {}, defaulting to current", label);
            PeriodSlot::Current
        })
    }
}

impl fmt::Display for PeriodSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fallback slot guess from a file name and the extracted `document_type`
/// string, for uploads that arrive without a label.
pub fn infer_slot(filename: &str, document_type: Option<&str>) -> PeriodSlot {
    let name = filename.to_lowercase();

    if name.contains("budget") {
        return PeriodSlot::Budget;
    }
    if name.contains("prior") || name.contains("previous") {
        return if name.contains("year") {
            PeriodSlot::PriorYear
        } else {
            PeriodSlot::PriorMonth
        };
    }
    if name.contains("current") || name.contains("actual") {
        return PeriodSlot::Current;
    }

    let doc_type = document_type.unwrap_or_default().to_lowercase();
    if doc_type.contains("budget") {
        PeriodSlot::Budget
    } else if doc_type.contains("prior year") || doc_type.contains("previous year") {
        PeriodSlot::PriorYear
    } else if doc_type.contains("prior") || doc_type.contains("previous") {
        PeriodSlot::PriorMonth
    } else {
        PeriodSlot::Current
    }
}

/// Exactly four slots, each optionally filled. Built once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSlotMap {
    pub current: Option<PeriodData>,
    pub prior_month: Option<PeriodData>,
    pub budget: Option<PeriodData>,
    pub prior_year: Option<PeriodData>,
}

impl PeriodSlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: PeriodSlot) -> Option<&PeriodData> {
        match slot {
            PeriodSlot::Current => self.current.as_ref(),
            PeriodSlot::PriorMonth => self.prior_month.as_ref(),
            PeriodSlot::Budget => self.budget.as_ref(),
            PeriodSlot::PriorYear => self.prior_year.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: PeriodSlot) -> &mut Option<PeriodData> {
        match slot {
            PeriodSlot::Current => &mut self.current,
            PeriodSlot::PriorMonth => &mut self.prior_month,
            PeriodSlot::Budget => &mut self.budget,
            PeriodSlot::PriorYear => &mut self.prior_year,
        }
    }

    /// Replaces whatever the slot held.
    pub fn set(&mut self, slot: PeriodSlot, data: PeriodData) {
        *self.slot_mut(slot) = Some(data);
    }

    /// Fills the slot only if empty; returns `false` when it was taken.
    pub fn fill(&mut self, slot: PeriodSlot, data: PeriodData) -> bool {
        let entry = self.slot_mut(slot);
        if entry.is_some() {
            return false;
        }
        *entry = Some(data);
        true
    }

    pub fn is_empty(&self) -> bool {
        PeriodSlot::ALL.iter().all(|&s| self.get(s).is_none())
    }

    pub fn filled(&self) -> impl Iterator<Item = (PeriodSlot, &PeriodData)> {
        PeriodSlot::ALL
            .into_iter()
            .filter_map(move |s| self.get(s).map(|d| (s, d)))
    }
}

/// Parses a statement period label ("2024-03", "2024-03-15", "March 2024",
/// "Mar 2024") into the month-end date of that period.
pub fn parse_period_label(label: &str) -> Result<NaiveDate> {
    let invalid = || {
        NoiAnalyzerError::InvalidPeriod(format!(
            "'{}' is not 'YYYY-MM', 'YYYY-MM-DD', 'Month YYYY', 'Qn YYYY' or 'YYYY'",
            label
        ))
    };

    // "Mar, 2024" and "Mar  2024" read as "Mar 2024"
    let normalized = label
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if normalized.len() == 4 && normalized.chars().all(|c| c.is_ascii_digit()) {
        let year = normalized.parse::<i32>().map_err(|_| invalid())?;
        return last_day_of_month(year, 12).ok_or_else(invalid);
    }

    if let Some((quarter, year)) = parse_quarter(&normalized) {
        return last_day_of_month(year, quarter * 3).ok_or_else(invalid);
    }

    let parsed = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", normalized), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("1 {}", normalized), "%d %B %Y"))
        .map_err(|_| invalid())?;

    last_day_of_month(parsed.year(), parsed.month()).ok_or_else(invalid)
}

/// `Q1 2025` or `2025 Q1`, quarter in 1..=4.
fn parse_quarter(label: &str) -> Option<(u32, i32)> {
    let (first, second) = label.split_once(' ')?;
    let (quarter, year) = if first.starts_with(['Q', 'q']) {
        (first, second)
    } else {
        (second, first)
    };

    let quarter: u32 = quarter.strip_prefix(['Q', 'q'])?.parse().ok()?;
    if !(1..=4).contains(&quarter) || year.len() != 4 {
        return None;
    }
    Some((quarter, year.parse().ok()?))
}

/// Like [`parse_period_label`] but treats missing, "Unknown" and malformed
/// labels as no period.
pub fn period_end(label: Option<&str>) -> Option<NaiveDate> {
    let label = label?.trim();
    if label.is_empty() || label.eq_ignore_ascii_case("unknown") {
        return None;
    }
    parse_period_label(label).ok()
}
