//! Rule-based narrative over a [`ComparisonResult`].
//!
//! Works only from the comparison output; a comparison that is absent simply
//! contributes no sentences.

use crate::comparison::{Comparison, ComparisonResult, Metric};
use crate::schema::PeriodSummary;
use crate::utils::{format_currency, format_optional_percent};
use serde::{Deserialize, Serialize};

/// Recommendations are padded with the general ones below this count.
const MIN_SPECIFIC_RECOMMENDATIONS: usize = 3;
const MAX_RECOMMENDATIONS: usize = 5;

const GENERAL_RECOMMENDATIONS: [&str; 3] = [
    "Reforecast the budget quarterly so plans track current market and operating conditions.",
    "Set up a preventative maintenance program to balance routine repairs against capital spending and extend asset life.",
    "Evaluate energy efficiency upgrades (LED lighting, smart thermostats, water conservation) to reduce utility costs and lift NOI.",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub performance: Vec<String>,
    pub recommendations: Vec<String>,
}

/// NOI margin classification used in the summary paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginBand {
    Excellent,
    Strong,
    IndustryStandard,
    BelowStandard,
}

impl MarginBand {
    pub fn from_margin(margin: f64) -> Self {
        if margin > 65.0 {
            MarginBand::Excellent
        } else if margin > 55.0 {
            MarginBand::Strong
        } else if margin > 45.0 {
            MarginBand::IndustryStandard
        } else {
            MarginBand::BelowStandard
        }
    }

    fn describe(self) -> &'static str {
        match self {
            MarginBand::Excellent => "indicating excellent operational efficiency",
            MarginBand::Strong => "reflecting strong operational performance",
            MarginBand::IndustryStandard => "within industry standard parameters",
            MarginBand::BelowStandard => "suggesting room for operational improvement",
        }
    }
}

/// NOI as a percentage of revenue; `None` without positive revenue.
pub fn noi_margin(summary: &PeriodSummary) -> Option<f64> {
    (summary.revenue > 0.0).then(|| summary.noi / summary.revenue * 100.0)
}

#[derive(Debug, Clone, Default)]
pub struct InsightNarrator {
    property_name: Option<String>,
}

impl InsightNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.property_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    pub fn narrate(&self, result: &ComparisonResult) -> Insights {
        let mut insights = Insights::default();

        if let Some(current) = &result.current {
            insights.summary = self.summary(current);
        }

        if let Some(budget) = &result.actual_vs_budget {
            budget_performance(budget, &mut insights.performance);
        }
        if let Some(mom) = &result.month_vs_prior {
            trend_performance(
                mom,
                "Month-over-Month",
                "the prior month",
                &mut insights.performance,
            );
        }
        if let Some(yoy) = &result.year_vs_year {
            trend_performance(
                yoy,
                "Year-over-Year",
                "the same period last year",
                &mut insights.performance,
            );
        }

        insights.recommendations = recommendations(result);
        insights
    }

    fn summary(&self, current: &PeriodSummary) -> String {
        let subject = match &self.property_name {
            Some(name) => format!("Property {}", name),
            None => "The subject property".to_string(),
        };

        let mut text = format!(
            "{} reports a Net Operating Income (NOI) of {} for the current period, on total operating revenue of {} against total operating expenses of {}.",
            subject,
            format_currency(current.noi),
            format_currency(current.revenue),
            format_currency(current.expense),
        );

        if let Some(margin) = noi_margin(current) {
            text.push_str(&format!(
                " The NOI margin stands at {:.1}%, {}.",
                margin,
                MarginBand::from_margin(margin).describe()
            ));
        }

        text
    }
}

fn delta(comparison: &Comparison, metric: Metric) -> Option<f64> {
    comparison.metric(metric).map(|m| m.delta)
}

fn abs_percent(comparison: &Comparison, metric: Metric) -> String {
    format_optional_percent(
        comparison
            .metric(metric)
            .and_then(|m| m.percent)
            .map(f64::abs),
    )
}

fn budget_performance(budget: &Comparison, out: &mut Vec<String>) {
    let Some(noi) = delta(budget, Metric::Noi) else {
        return;
    };
    let revenue = delta(budget, Metric::Revenue).unwrap_or(0.0);
    let expense = delta(budget, Metric::Expense).unwrap_or(0.0);

    if noi >= 0.0 {
        out.push(format!(
            "Budget Variance: NOI exceeds budget by {} ({} favorable).",
            format_currency(noi),
            abs_percent(budget, Metric::Noi)
        ));

        if revenue > 0.0 && expense < 0.0 {
            out.push(format!(
                "The favorable variance comes from both revenue outperformance ({} above budget) and expense containment ({} below budget).",
                format_currency(revenue),
                format_currency(expense.abs())
            ));
        } else if revenue > 0.0 {
            out.push(format!(
                "The favorable variance is driven mainly by revenue {} above budget ({} favorable).",
                format_currency(revenue),
                abs_percent(budget, Metric::Revenue)
            ));
        } else if expense < 0.0 {
            out.push(format!(
                "The favorable variance is driven mainly by operating costs {} below budget ({} favorable).",
                format_currency(expense.abs()),
                abs_percent(budget, Metric::Expense)
            ));
        }
    } else {
        out.push(format!(
            "Budget Variance: NOI falls short of budget by {} ({} unfavorable).",
            format_currency(noi.abs()),
            abs_percent(budget, Metric::Noi)
        ));

        if revenue < 0.0 && expense > 0.0 {
            out.push(format!(
                "The shortfall stems from both revenue underperformance ({} below budget) and expense overruns ({} above budget).",
                format_currency(revenue.abs()),
                format_currency(expense)
            ));
        } else if revenue < 0.0 {
            out.push(format!(
                "The shortfall is driven mainly by revenue {} below budget ({} unfavorable).",
                format_currency(revenue.abs()),
                abs_percent(budget, Metric::Revenue)
            ));
        } else if expense > 0.0 {
            out.push(format!(
                "The shortfall is driven mainly by expenses {} above budget ({} unfavorable).",
                format_currency(expense),
                abs_percent(budget, Metric::Expense)
            ));
        }
    }
}

fn trend_performance(comparison: &Comparison, label: &str, baseline: &str, out: &mut Vec<String>) {
    let Some(change) = delta(comparison, Metric::Noi) else {
        return;
    };
    let direction = if change >= 0.0 { "increased" } else { "declined" };

    out.push(format!(
        "{}: NOI {} by {} ({}) compared to {}.",
        label,
        direction,
        format_currency(change.abs()),
        abs_percent(comparison, Metric::Noi),
        baseline
    ));
}

fn recommendations(result: &ComparisonResult) -> Vec<String> {
    let mut recs = Vec::new();

    if let Some(budget) = &result.actual_vs_budget {
        if delta(budget, Metric::Noi).is_some_and(|d| d < 0.0) {
            if delta(budget, Metric::Revenue).is_some_and(|d| d < 0.0) {
                recs.push(
                    "Review rental rates against market comparables, renewal incentives and ancillary income (parking, laundry, application fees) to close the revenue shortfall against budget."
                        .to_string(),
                );
            }
            if delta(budget, Metric::Expense).is_some_and(|d| d > 0.0) {
                recs.push(
                    "Target the expense categories with the largest overruns: renegotiate service contracts, audit utility consumption and review staffing."
                        .to_string(),
                );
            }
        }
    }

    if let Some(mom) = &result.month_vs_prior {
        if delta(mom, Metric::Noi).is_some_and(|d| d < 0.0) {
            recs.push(
                "Break down the month-over-month NOI decline by revenue and expense category and correct any operational issues before the next close."
                    .to_string(),
            );
        }
    }

    if let Some(yoy) = &result.year_vs_year {
        if delta(yoy, Metric::Noi).is_some_and(|d| d < 0.0) {
            recs.push(
                "Run a strategic asset review to address the year-over-year NOI decline, including market positioning and a capital improvement plan."
                    .to_string(),
            );
        }
    }

    if recs.len() < MIN_SPECIFIC_RECOMMENDATIONS {
        recs.extend(GENERAL_RECOMMENDATIONS.iter().map(|s| s.to_string()));
    }

    recs.truncate(MAX_RECOMMENDATIONS);
    recs
}

pub fn generate_insights(result: &ComparisonResult) -> Insights {
    InsightNarrator::new().narrate(result)
}
