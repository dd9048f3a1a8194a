use anyhow::Context;
use serde_json::Value;
use trial_balance_builder::{process_trial_balance, IssueCategory, RatioKind, RawRow};

fn read_rows(path: &str) -> anyhow::Result<Vec<RawRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/trial_balance.csv".to_string());
    let rows = read_rows(&path)?;

    let output = process_trial_balance(&rows)?;

    println!("Chart of accounts ({} nodes):", output.tree.len());
    for node in output.tree.walk() {
        let indent = "  ".repeat(node.level.saturating_sub(1) as usize);
        let marker = if node.is_synthesized { " *" } else { "" };
        println!(
            "{}{} {}{}  Dr {:>14.2}  Cr {:>14.2}",
            indent, node.code, node.name, marker, node.agg_debit, node.agg_credit
        );
    }

    let summary = &output.summary;
    println!();
    println!("Total assets:      {:>14.2}", summary.total_assets);
    println!("Total liabilities: {:>14.2}", summary.total_liabilities);
    println!("Equity:            {:>14.2}", summary.equity);
    println!("Net income:        {:>14.2}", summary.net_income);
    println!("Balanced:          {}", summary.is_balanced);

    println!();
    for kind in [
        RatioKind::CurrentRatio,
        RatioKind::DebtRatio,
        RatioKind::EquityRatio,
        RatioKind::ProfitMargin,
    ] {
        let rating = output
            .ratios
            .rating(kind)
            .map(|r| r.to_string())
            .unwrap_or_default();
        println!("{:?}: {:.2} ({})", kind, output.ratios.value(kind), rating);
    }

    let report = &output.report;
    println!();
    println!(
        "Quality score {:.1} ({} issues over {} records)",
        report.quality_score, report.total_issues, report.total_records
    );
    for diagnostic in report.items(IssueCategory::MissingParent) {
        println!("  {}", diagnostic);
    }

    Ok(())
}
