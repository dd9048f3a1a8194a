use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Groups diagnostics for the quality report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    InvalidCode,
    UnknownCode,
    DuplicateCode,
    MissingParent,
    AggregationMismatch,
    Imbalance,
    ZeroBalance,
}

impl IssueCategory {
    /// Informational categories are listed in the report but do not lower
    /// the quality score.
    pub fn is_informational(self) -> bool {
        matches!(self, Self::ZeroBalance)
    }
}

/// A soft finding about the input or the reconstructed tree. Row numbers are
/// 1-based positions in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Code shape cannot be placed in the hierarchy; the row was excluded.
    InvalidCode { code: String, row: usize },

    /// Code is not in the chart of accounts; the row was excluded.
    UnknownCode {
        code: String,
        row: usize,
        name: String,
    },

    DuplicateCode {
        code: String,
        count: usize,
        rows: Vec<usize>,
    },

    /// `parent_code` had no row and was synthesized, or (when `cyclic`) the
    /// link to it was refused because it would close a loop.
    MissingParent {
        code: String,
        parent_code: String,
        row: Option<usize>,
        cyclic: bool,
    },

    /// A rollup row's own totals disagree with the sum of its children.
    /// The computed totals are the ones kept in the tree.
    AggregationMismatch {
        code: String,
        row: Option<usize>,
        reported_debit: f64,
        reported_credit: f64,
        computed_debit: f64,
        computed_credit: f64,
    },

    Imbalance {
        total_debit: f64,
        total_credit: f64,
        difference: f64,
    },

    ZeroBalance { code: String, row: usize },
}

impl Diagnostic {
    pub fn category(&self) -> IssueCategory {
        match self {
            Self::InvalidCode { .. } => IssueCategory::InvalidCode,
            Self::UnknownCode { .. } => IssueCategory::UnknownCode,
            Self::DuplicateCode { .. } => IssueCategory::DuplicateCode,
            Self::MissingParent { .. } => IssueCategory::MissingParent,
            Self::AggregationMismatch { .. } => IssueCategory::AggregationMismatch,
            Self::Imbalance { .. } => IssueCategory::Imbalance,
            Self::ZeroBalance { .. } => IssueCategory::ZeroBalance,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::InvalidCode { code, .. }
            | Self::UnknownCode { code, .. }
            | Self::DuplicateCode { code, .. }
            | Self::MissingParent { code, .. }
            | Self::AggregationMismatch { code, .. }
            | Self::ZeroBalance { code, .. } => Some(code),
            Self::Imbalance { .. } => None,
        }
    }

    pub fn rows(&self) -> Vec<usize> {
        match self {
            Self::InvalidCode { row, .. }
            | Self::UnknownCode { row, .. }
            | Self::ZeroBalance { row, .. } => vec![*row],
            Self::DuplicateCode { rows, .. } => rows.clone(),
            Self::MissingParent { row, .. } | Self::AggregationMismatch { row, .. } => {
                row.iter().copied().collect()
            }
            Self::Imbalance { .. } => Vec::new(),
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCode { code, row } => write!(
                f,
                "Row {}: code '{}' is not an even-length numeric account code and was skipped",
                row, code
            ),
            Self::UnknownCode { code, row, name } => write!(
                f,
                "Row {}: code {} ('{}') is not in the chart of accounts and was skipped",
                row, code, name
            ),
            Self::DuplicateCode { code, count, rows } => write!(
                f,
                "Code {} appears {} times (rows {})",
                code,
                count,
                rows.iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::MissingParent {
                code,
                parent_code,
                cyclic: true,
                ..
            } => write!(
                f,
                "Parent chain of {} loops back through {}; {} was kept as a root",
                code, parent_code, code
            ),
            Self::MissingParent {
                code, parent_code, ..
            } => write!(
                f,
                "Parent account {} of {} is missing from the export and was created",
                parent_code, code
            ),
            Self::AggregationMismatch {
                code,
                reported_debit,
                reported_credit,
                computed_debit,
                computed_credit,
                ..
            } => write!(
                f,
                "Account {} reports {:.2} / {:.2} but its children sum to {:.2} / {:.2}",
                code, reported_debit, reported_credit, computed_debit, computed_credit
            ),
            Self::Imbalance {
                total_debit,
                total_credit,
                difference,
            } => write!(
                f,
                "Trial balance is out of balance: debit {:.2}, credit {:.2}, difference {:.2}",
                total_debit, total_credit, difference
            ),
            Self::ZeroBalance { code, row } => {
                write!(f, "Row {}: account {} has no debit or credit", row, code)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_lists_rows() {
        let diagnostic = Diagnostic::DuplicateCode {
            code: "0101".to_string(),
            count: 2,
            rows: vec![1, 4],
        };
        assert_eq!(diagnostic.category(), IssueCategory::DuplicateCode);
        assert_eq!(diagnostic.rows(), vec![1, 4]);
        assert_eq!(diagnostic.message(), "Code 0101 appears 2 times (rows 1, 4)");
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let diagnostic = Diagnostic::InvalidCode {
            code: "010".to_string(),
            row: 7,
        };
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "invalid_code");
        assert_eq!(json["row"], 7);
    }

    #[test]
    fn test_imbalance_has_no_code_or_rows() {
        let diagnostic = Diagnostic::Imbalance {
            total_debit: 10.0,
            total_credit: 9.0,
            difference: 1.0,
        };
        assert_eq!(diagnostic.code(), None);
        assert!(diagnostic.rows().is_empty());
        assert!(!diagnostic.category().is_informational());
        assert!(IssueCategory::ZeroBalance.is_informational());
    }
}
