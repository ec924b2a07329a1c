//! Period-over-period comparisons: current month against prior month,
//! budget and prior year.
//!
//! The engine is pure. A comparison is present in the result only when both
//! of its slots are filled; an absent slot is not an error.

use crate::period::{PeriodSlot, PeriodSlotMap};
use crate::schema::{DetailedMetrics, PeriodData, PeriodSummary};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    Expense,
    Noi,
    Gpr,
    VacancyLoss,
    OtherIncome,
    Egi,
    Opex,
}

impl Metric {
    pub const SUMMARY: [Metric; 3] = [Metric::Revenue, Metric::Expense, Metric::Noi];

    pub const DETAILED: [Metric; 6] = [
        Metric::Gpr,
        Metric::VacancyLoss,
        Metric::OtherIncome,
        Metric::Egi,
        Metric::Opex,
        Metric::Noi,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::Expense => "expense",
            Metric::Noi => "noi",
            Metric::Gpr => "gpr",
            Metric::VacancyLoss => "vacancy_loss",
            Metric::OtherIncome => "other_income",
            Metric::Egi => "egi",
            Metric::Opex => "opex",
        }
    }

    fn summary_value(self, summary: &PeriodSummary) -> Option<f64> {
        match self {
            Metric::Revenue => Some(summary.revenue),
            Metric::Expense => Some(summary.expense),
            Metric::Noi => Some(summary.noi),
            _ => None,
        }
    }

    fn detail_value(self, detail: &DetailedMetrics) -> Option<f64> {
        match self {
            Metric::Gpr => detail.gpr,
            Metric::VacancyLoss => detail.vacancy_loss,
            Metric::OtherIncome => detail.other_income,
            Metric::Egi => detail.egi,
            Metric::Opex => detail.opex,
            Metric::Noi => detail.noi,
            Metric::Revenue | Metric::Expense => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricMode {
    /// Revenue, expense and NOI.
    #[default]
    Summary,
    /// GPR, vacancy loss, other income, EGI, opex and NOI, for pairs where
    /// both periods carry complete detail. Other pairs use `Summary`.
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    MonthVsPrior,
    ActualVsBudget,
    YearVsYear,
}

impl ComparisonKind {
    pub const ALL: [ComparisonKind; 3] = [
        ComparisonKind::MonthVsPrior,
        ComparisonKind::ActualVsBudget,
        ComparisonKind::YearVsYear,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ComparisonKind::MonthVsPrior => "month_vs_prior",
            ComparisonKind::ActualVsBudget => "actual_vs_budget",
            ComparisonKind::YearVsYear => "year_vs_year",
        }
    }

    /// The slot compared against `current`.
    pub fn baseline(self) -> PeriodSlot {
        match self {
            ComparisonKind::MonthVsPrior => PeriodSlot::PriorMonth,
            ComparisonKind::ActualVsBudget => PeriodSlot::Budget,
            ComparisonKind::YearVsYear => PeriodSlot::PriorYear,
        }
    }

    /// Field suffixes: (current, baseline, delta, percent).
    fn suffixes(self) -> (&'static str, &'static str, &'static str, &'static str) {
        match self {
            ComparisonKind::MonthVsPrior => ("current", "prior", "change", "percent_change"),
            ComparisonKind::ActualVsBudget => {
                ("actual", "budget", "variance", "percent_variance")
            }
            ComparisonKind::YearVsYear => {
                ("current", "prior_year", "change", "percent_change")
            }
        }
    }
}

/// Percent change with the sign of `current - previous`.
///
/// `None` when there is no previous value. A zero baseline yields ±100 (or
/// 0 when both are zero). The denominator is `|previous|` so a negative
/// baseline does not flip the sign.
pub fn safe_percent_change(current: f64, previous: Option<f64>) -> Option<f64> {
    let previous = previous?;

    if previous == 0.0 {
        return Some(if current > 0.0 {
            100.0
        } else if current < 0.0 {
            -100.0
        } else {
            0.0
        });
    }

    Some((current - previous) / previous.abs() * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub current: f64,
    pub baseline: f64,
    pub delta: f64,
    pub percent: Option<f64>,
}

impl MetricComparison {
    pub fn between(current: f64, baseline: f64) -> Self {
        Self {
            current,
            baseline,
            delta: current - baseline,
            percent: safe_percent_change(current, Some(baseline)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub kind: ComparisonKind,
    pub metrics: Vec<(Metric, MetricComparison)>,
}

impl Comparison {
    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, c)| c)
    }

    pub fn is_detailed(&self) -> bool {
        self.metric(Metric::Gpr).is_some()
    }
}

/// Serialized flat, e.g. `noi_current`, `noi_prior`, `noi_change`,
/// `noi_percent_change` for month-over-month, `noi_actual`, `noi_budget`,
/// `noi_variance`, `noi_percent_variance` against budget.
impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (cur, base, delta, pct) = self.kind.suffixes();
        let mut map = serializer.serialize_map(Some(self.metrics.len() * 4))?;
        for (metric, c) in &self.metrics {
            let key = metric.key();
            map.serialize_entry(&format!("{}_{}", key, cur), &c.current)?;
            map.serialize_entry(&format!("{}_{}", key, base), &c.baseline)?;
            map.serialize_entry(&format!("{}_{}", key, delta), &c.delta)?;
            map.serialize_entry(&format!("{}_{}", key, pct), &c.percent)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<PeriodSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month_vs_prior: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_vs_budget: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_vs_year: Option<Comparison>,
}

impl ComparisonResult {
    pub fn get(&self, kind: ComparisonKind) -> Option<&Comparison> {
        match kind {
            ComparisonKind::MonthVsPrior => self.month_vs_prior.as_ref(),
            ComparisonKind::ActualVsBudget => self.actual_vs_budget.as_ref(),
            ComparisonKind::YearVsYear => self.year_vs_year.as_ref(),
        }
    }

    fn set(&mut self, comparison: Comparison) {
        let slot = match comparison.kind {
            ComparisonKind::MonthVsPrior => &mut self.month_vs_prior,
            ComparisonKind::ActualVsBudget => &mut self.actual_vs_budget,
            ComparisonKind::YearVsYear => &mut self.year_vs_year,
        };
        *slot = Some(comparison);
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEngine {
    mode: MetricMode,
}

impl ComparisonEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: MetricMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MetricMode {
        self.mode
    }

    pub fn compare(&self, slots: &PeriodSlotMap) -> ComparisonResult {
        let mut result = ComparisonResult::default();

        let Some(current) = slots.current.as_ref() else {
            return result;
        };
        result.current = Some(current.summary);

        for kind in ComparisonKind::ALL {
            if let Some(baseline) = slots.get(kind.baseline()) {
                result.set(self.compare_pair(kind, current, baseline));
            }
        }

        result
    }

    fn compare_pair(
        &self,
        kind: ComparisonKind,
        current: &PeriodData,
        baseline: &PeriodData,
    ) -> Comparison {
        let detail = match self.mode {
            MetricMode::Detailed => current.complete_detail().zip(baseline.complete_detail()),
            MetricMode::Summary => None,
        };

        let metrics = match detail {
            Some((cur, base)) => measure(&Metric::DETAILED, |m| {
                Some((m.detail_value(cur)?, m.detail_value(base)?))
            }),
            None => measure(&Metric::SUMMARY, |m| {
                Some((m.summary_value(&current.summary)?, m.summary_value(&baseline.summary)?))
            }),
        };

        Comparison { kind, metrics }
    }
}

fn measure<F>(metrics: &[Metric], values: F) -> Vec<(Metric, MetricComparison)>
where
    F: Fn(Metric) -> Option<(f64, f64)>,
{
    metrics
        .iter()
        .filter_map(|&m| values(m).map(|(c, b)| (m, MetricComparison::between(c, b))))
        .collect()
}

pub fn compare(slots: &PeriodSlotMap) -> ComparisonResult {
    ComparisonEngine::new().compare(slots)
}
