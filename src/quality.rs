use crate::diagnostics::{Diagnostic, IssueCategory};
use crate::hierarchy::ChartTree;
use crate::schema::LedgerEntry;
use crate::utils::round1;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityReport {
    pub total_records: usize,
    /// Findings that lower the score. Informational categories are excluded.
    pub total_issues: usize,
    /// `max(0, 100 - total_issues / total_records * 100)`, one decimal place.
    pub quality_score: f64,
    pub issues_by_category: BTreeMap<IssueCategory, usize>,
    pub items_by_category: BTreeMap<IssueCategory, Vec<Diagnostic>>,
}

impl QualityReport {
    pub fn items(&self, category: IssueCategory) -> &[Diagnostic] {
        self.items_by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, category: IssueCategory) -> usize {
        self.issues_by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn is_clean(&self) -> bool {
        self.total_issues == 0
    }
}

/// Scores a batch by the structural problems found in it.
///
/// Duplicate codes and zero-balance rows are detected here from the row set.
/// Everything else (unknown and invalid codes, missing parents, rollup
/// mismatches, imbalance) was already recorded by earlier stages and is only
/// tallied. The penalty is linear and unweighted: each finding costs the same
/// share of the score.
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    pub fn analyze(
        entries: &[LedgerEntry],
        tree: &ChartTree,
        upstream: &[Diagnostic],
    ) -> QualityReport {
        let mut findings: Vec<Diagnostic> = upstream.to_vec();
        findings.extend(tree.diagnostics().iter().cloned());
        findings.extend(find_duplicates(entries));
        findings.extend(find_zero_balances(entries));

        let mut issues_by_category: BTreeMap<IssueCategory, usize> = BTreeMap::new();
        let mut items_by_category: BTreeMap<IssueCategory, Vec<Diagnostic>> = BTreeMap::new();
        let mut total_issues = 0;

        for finding in findings {
            let category = finding.category();
            if !category.is_informational() {
                total_issues += 1;
            }
            *issues_by_category.entry(category).or_insert(0) += 1;
            items_by_category.entry(category).or_default().push(finding);
        }

        let total_records = entries.len();
        let quality_score = quality_score(total_issues, total_records);

        debug!(
            "Quality: {} issues across {} records, score {:.1}",
            total_issues, total_records, quality_score
        );

        QualityReport {
            total_records,
            total_issues,
            quality_score,
            issues_by_category,
            items_by_category,
        }
    }
}

pub fn quality_score(total_issues: usize, total_records: usize) -> f64 {
    if total_records == 0 {
        return 100.0;
    }
    let penalty = total_issues as f64 / total_records as f64 * 100.0;
    round1((100.0 - penalty).max(0.0))
}

/// One finding per code that occurs on more than one row, in code order.
pub fn find_duplicates(entries: &[LedgerEntry]) -> Vec<Diagnostic> {
    let mut rows_by_code: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for entry in entries {
        rows_by_code
            .entry(entry.code.as_str())
            .or_default()
            .push(entry.row_number());
    }

    rows_by_code
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(code, rows)| Diagnostic::DuplicateCode {
            code: code.to_string(),
            count: rows.len(),
            rows,
        })
        .collect()
}

pub fn find_zero_balances(entries: &[LedgerEntry]) -> Vec<Diagnostic> {
    entries
        .iter()
        .filter(|e| e.is_zero_balance())
        .map(|e| Diagnostic::ZeroBalance {
            code: e.code.clone(),
            row: e.row_number(),
        })
        .collect()
}
