use crate::error::{Result, TrialBalanceError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded spreadsheet row: column header -> cell value.
pub type RawRow = Map<String, Value>;

/// A normalized trial balance row. Immutable once produced by the row
/// normalizer, except that name validation replaces `name` with the
/// canonical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerEntry {
    pub code: String,
    pub name: String,
    pub debit: f64,
    pub credit: f64,
    /// Always `debit - credit`.
    pub balance: f64,
    pub level: u8,
    pub parent_code: Option<String>,
    /// 0-based position of the source row in the input.
    pub original_row_index: usize,
    /// Posting hint from the export. The hierarchy builder decides the final
    /// value from the tree shape.
    pub is_posting: bool,
    /// Level column of the export, if it had one. Informational only.
    pub declared_level: Option<u8>,
}

impl LedgerEntry {
    /// 1-based row number, as shown in diagnostics.
    pub fn row_number(&self) -> usize {
        self.original_row_index + 1
    }

    pub fn is_zero_balance(&self) -> bool {
        self.debit == 0.0 && self.credit == 0.0
    }
}

/// What the builder does when several rows share one account code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DuplicatePolicy {
    #[schemars(description = "The row appearing last in the export supplies the node's debit and credit")]
    #[default]
    KeepLast,

    #[schemars(description = "The row appearing first in the export supplies the node's debit and credit")]
    KeepFirst,

    #[schemars(description = "Debits and credits of all rows sharing the code are added together")]
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    #[schemars(
        description = "Largest |total debit - total credit| still considered balanced. Absorbs rounding noise from currency inputs."
    )]
    pub balance_tolerance: f64,

    #[schemars(
        description = "Largest difference between a rollup row's own totals and the sum of its children before an aggregation mismatch is reported."
    )]
    pub aggregation_tolerance: f64,

    #[schemars(description = "How rows that share an account code are combined into one node")]
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            balance_tolerance: 0.05,
            aggregation_tolerance: 0.01,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("balance_tolerance", self.balance_tolerance),
            ("aggregation_tolerance", self.aggregation_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TrialBalanceError::InvalidConfig(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
