use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A known account code whose supplied name could not be reconciled with the
/// canonical chart. Row numbers are 1-based positions in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NameMismatch {
    pub code: String,
    pub row: usize,
    pub expected_name: String,
    pub actual_name: String,
}

impl fmt::Display for NameMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: account {} should be named '{}' but the export says '{}'",
            self.row, self.code, self.expected_name, self.actual_name
        )
    }
}

#[derive(Error, Debug)]
pub enum TrialBalanceError {
    #[error("{} account name(s) do not match the chart of accounts; first: {}", .0.len(), first_mismatch(.0))]
    NameMismatch(Vec<NameMismatch>),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Reference chart of accounts is malformed: {0}")]
    ReferenceData(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TrialBalanceError {
    /// The offending rows of a fatal name validation failure, if this is one.
    pub fn name_mismatches(&self) -> Option<&[NameMismatch]> {
        match self {
            Self::NameMismatch(mismatches) => Some(mismatches),
            _ => None,
        }
    }
}

fn first_mismatch(mismatches: &[NameMismatch]) -> String {
    mismatches
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "none".to_string())
}

pub type Result<T> = std::result::Result<T, TrialBalanceError>;
