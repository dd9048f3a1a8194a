//! # Trial Balance Builder
//!
//! A library for reconstructing a multi-level chart-of-accounts tree from a
//! flat trial balance export (rows of account code, name, debit, credit),
//! with rolled-up balances, structural diagnostics and a data-quality score.
//!
//! ## Pipeline
//!
//! - **Row normalization**: columns are found under any of their known
//!   headers, amounts are parsed from spreadsheet formats, legacy codes are
//!   remapped, and level/parent are derived from the code.
//! - **Name validation**: names are compared with the canonical chart of
//!   accounts. Unknown codes are dropped with a diagnostic; a known code with
//!   a wrong name rejects the whole batch.
//! - **Hierarchy building**: missing ancestors are synthesized, nodes are
//!   linked under their parents, and totals are aggregated bottom-up.
//! - **Quality analysis**: duplicates, missing parents, rollup mismatches and
//!   imbalance are counted into a 0-100 score.
//! - **Summary and ratios**: sector totals are folded into statement buckets
//!   and the usual liquidity, solvency and profitability ratios.
//!
//! Every call is a pure rebuild from the rows it is given.
//!
//! ## Example
//!
//! ```rust,ignore
//! use trial_balance_builder::*;
//! use serde_json::json;
//!
//! let rows: Vec<RawRow> = vec![
//!     json!({"code": "010101010101", "name": "الصندوق الرئيسي - عملة محلية", "debit": 500, "credit": 0}),
//!     json!({"code": "0501", "name": "رأس المال", "debit": 0, "credit": 500}),
//! ]
//! .into_iter()
//! .filter_map(|v| v.as_object().cloned())
//! .collect();
//!
//! let output = process_trial_balance(&rows).unwrap();
//! assert!(output.summary.is_balanced);
//! ```

pub mod diagnostics;
pub mod error;
pub mod hierarchy;
pub mod ingestion;
pub mod quality;
pub mod reference;
pub mod schema;
pub mod session;
pub mod summary;
pub mod utils;
pub mod validation;

pub use diagnostics::{Diagnostic, IssueCategory};
pub use error::{NameMismatch, Result, TrialBalanceError};
pub use hierarchy::{build_hierarchy, ChartTree, HierarchyBuilder, HierarchyNode, TreeNodeView};
pub use ingestion::{normalize_rows, FieldResolver, LedgerField, RowNormalizer};
pub use quality::{QualityAnalyzer, QualityReport};
pub use reference::{CanonicalAccount, ReferenceTable};
pub use schema::*;
pub use session::TrialBalanceSession;
pub use summary::{FinancialSummary, RatioKind, Rating, Ratios, StatementBucket};
pub use validation::{validate_names, NameValidator, ValidatedBatch};

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Everything one computation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineOutput {
    pub tree: ChartTree,
    pub report: QualityReport,
    pub summary: FinancialSummary,
    pub ratios: Ratios,
    /// Soft findings from validation and tree building, in pipeline order.
    pub diagnostics: Vec<Diagnostic>,
}

impl EngineOutput {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineOutput)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

pub struct TrialBalanceProcessor;

impl TrialBalanceProcessor {
    pub fn process(
        rows: &[RawRow],
        table: &ReferenceTable,
        config: &EngineConfig,
    ) -> Result<EngineOutput> {
        config.validate()?;

        info!("Processing trial balance of {} rows", rows.len());

        let entries = RowNormalizer::new(table).normalize_rows(rows);
        let batch = NameValidator::new(table).validate(entries.clone())?;
        let tree = HierarchyBuilder::new(table, config).build(&batch.entries);
        let report = QualityAnalyzer::analyze(&entries, &tree, &batch.diagnostics);

        let summary = FinancialSummary::from_tree(&tree, config.balance_tolerance);
        let ratios = Ratios::from_summary(&summary);

        let mut diagnostics = batch.diagnostics;
        diagnostics.extend(tree.diagnostics().iter().cloned());

        debug!(
            "Trial balance: {} nodes, {} roots, quality score {:.1}, balanced: {}",
            tree.len(),
            tree.root_codes().len(),
            report.quality_score,
            summary.is_balanced
        );

        Ok(EngineOutput {
            tree,
            report,
            summary,
            ratios,
            diagnostics,
        })
    }
}

/// Runs the pipeline against the embedded standard chart with default settings.
pub fn process_trial_balance(rows: &[RawRow]) -> Result<EngineOutput> {
    let table = ReferenceTable::standard()?;
    TrialBalanceProcessor::process(rows, table, &EngineConfig::default())
}

pub fn process_with_config(
    rows: &[RawRow],
    table: &ReferenceTable,
    config: &EngineConfig,
) -> Result<EngineOutput> {
    TrialBalanceProcessor::process(rows, table, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rows(value: Value) -> Vec<RawRow> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_end_to_end_processing() {
        let output = process_trial_balance(&rows(json!([
            {"code": "01", "debit": 0, "credit": 0},
            {"code": "0101", "debit": 0, "credit": 0},
            {"code": "010101010101", "name": "الصندوق الرئيسي - عملة محلية", "debit": 500, "credit": 0},
        ])))
        .unwrap();

        assert_eq!(output.tree.root_codes(), &["01".to_string()]);
        let root = output.tree.get("01").unwrap();
        assert_eq!(root.agg_debit, 500.0);
        assert_eq!(root.name, "الأصول المتداولة");

        let leaf = output.tree.get("010101010101").unwrap();
        assert!(leaf.is_posting);
        assert_eq!(leaf.level, 5);

        // 010101, 01010101 and 0101010101 had no rows of their own.
        assert_eq!(output.report.count(IssueCategory::MissingParent), 3);
        assert_eq!(output.report.count(IssueCategory::Imbalance), 1);
        assert!(!output.summary.is_balanced);
        assert_eq!(output.summary.current_assets, 500.0);
    }

    #[test]
    fn test_wrong_name_aborts_without_tree() {
        let result = process_trial_balance(&rows(json!([
            {"code": "01", "debit": 0},
            {"code": "0101", "name": "Completely Wrong Name", "debit": 10},
        ])));

        match result {
            Err(TrialBalanceError::NameMismatch(mismatches)) => {
                assert_eq!(mismatches.len(), 1);
                assert_eq!(mismatches[0].code, "0101");
                assert_eq!(mismatches[0].row, 2);
                assert_eq!(mismatches[0].actual_name, "Completely Wrong Name");
            }
            other => panic!("expected a name mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let table = ReferenceTable::standard().unwrap();
        let config = EngineConfig {
            balance_tolerance: f64::NAN,
            ..EngineConfig::default()
        };
        let result = TrialBalanceProcessor::process(&[], table, &config);
        assert!(matches!(result, Err(TrialBalanceError::InvalidConfig(_))));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = EngineOutput::schema_as_json().unwrap();
        assert!(schema_json.contains("quality_score"));
        assert!(schema_json.contains("agg_balance"));
    }
}
