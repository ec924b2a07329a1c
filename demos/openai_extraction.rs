//! Usage: cargo run --example openai_extraction --features llm -- \
//!     current_month_actuals=march.txt prior_month_actuals=feb.txt budget=budget.txt
//!
//! A bare path (no `label=`) lets the slot be inferred from the file name.

use dotenv::dotenv;
use noi_analyzer::llm::OpenAiExtractor;
use noi_analyzer::{AnalysisPipeline, MemorySink, NoiAnalyzer, PeriodSlot, SourceDocument};
use std::error::Error;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let mut documents = Vec::new();
    for arg in std::env::args().skip(1) {
        let (label, path) = match arg.split_once('=') {
            Some((label, path)) => (Some(label.to_string()), path.to_string()),
            None => (None, arg),
        };

        let slot = label.map(|label| PeriodSlot::from_label_or_current(&label));
        documents.push(SourceDocument::from_path(&path, slot).await?);
    }

    if documents.is_empty() {
        return Err("pass at least one statement text file".into());
    }

    let extractor = OpenAiExtractor::from_env()?;
    println!(
        "Extracting {} document(s) with {}...",
        documents.len(),
        extractor.config().model
    );

    let sink = Arc::new(MemorySink::new());
    let analyzer = NoiAnalyzer::new()
        .with_sink(sink.clone())
        .with_property_name(std::env::var("PROPERTY_NAME").unwrap_or_default());
    let report = AnalysisPipeline::new(extractor)
        .with_analyzer(analyzer)
        .run(documents)
        .await;

    for event in sink.events() {
        println!("[{}] {}", event.level(), event);
    }
    println!();

    for doc in &report.documents {
        println!(
            "{} -> {} (NOI {})",
            doc.name,
            doc.slot,
            noi_analyzer::format_currency(doc.summary.noi)
        );
    }

    println!("\n{}", report.insights.summary);
    for line in &report.insights.performance {
        println!("- {}", line);
    }

    let out = "noi_report.json";
    std::fs::write(out, report.to_json()?)?;
    println!("\nFull report written to {}", out);
    Ok(())
}
