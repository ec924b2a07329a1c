use noi_analyzer::*;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;

fn main() -> std::result::Result<(), Box<dyn Error>> {
    // As a model might return them: numeric strings, a missing NOI, items in thousands.
    let extractions = vec![
        (
            PeriodSlot::Current,
            json!({
                "document_type": "Actual", "period": "March 2024",
                "rental_income": "118000", "laundry_income": 1500, "parking_income": 6500,
                "other_revenue": 2000, "total_revenue": 129000,
                "repairs_maintenance": 9000, "utilities": 11000, "property_management_fees": 7500,
                "property_taxes": 15000, "insurance": 4500, "admin_office_costs": 3000,
                "marketing_advertising": 1500, "total_expenses": 51500
            }),
        ),
        (
            PeriodSlot::PriorMonth,
            json!({
                "rental_income": 118.0, "other_revenue": 8.3, "total_revenue": 126300,
                "utilities": 12000, "property_taxes": 40000, "total_expenses": 52000,
                "net_operating_income": 74300
            }),
        ),
        (
            PeriodSlot::Budget,
            json!({
                "rental_income": 125000, "total_revenue": 125000,
                "property_taxes": 50000, "total_expenses": 50000
            }),
        ),
    ];

    let extractions = extractions
        .into_iter()
        .filter_map(|(slot, v)| v.as_object().cloned().map(|raw| (slot, raw)))
        .collect();

    let sink = Arc::new(MemorySink::new());
    let report = NoiAnalyzer::new()
        .with_sink(sink.clone())
        .with_property_name("Cedar Heights")
        .analyze_extractions(extractions);

    println!("=== Audit trail ===");
    for event in sink.events() {
        println!("[{}] {}", event.level(), event);
    }

    println!("\n=== Summary ===\n{}", report.insights.summary);
    println!("\n=== Performance ===");
    for line in &report.insights.performance {
        println!("- {}", line);
    }
    println!("\n=== Recommendations ===");
    for (i, rec) in report.insights.recommendations.iter().enumerate() {
        println!("{}. {}", i + 1, rec);
    }

    if let Some(margin) = report
        .comparison
        .current
        .as_ref()
        .and_then(noi_analyzer::insights::noi_margin)
    {
        println!("\nNOI margin: {}", format_percent(margin));
    }

    if let Some(mom) = &report.comparison.month_vs_prior {
        if let Some(noi) = mom.metric(Metric::Noi) {
            println!(
                "\nNOI vs prior month: {} ({})",
                format_currency(noi.delta),
                format_optional_percent(noi.percent)
            );
        }
    }

    println!("\n=== Comparison JSON ===\n{}", report.comparison.to_json()?);
    Ok(())
}
