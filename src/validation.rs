use crate::diagnostics::Diagnostic;
use crate::error::{NameMismatch, Result, TrialBalanceError};
use crate::reference::ReferenceTable;
use crate::schema::LedgerEntry;
use crate::utils::{has_structural_shape, normalize_account_name};
use log::{debug, warn};

/// Entries that survived name validation, plus the soft findings about the
/// ones that did not.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub entries: Vec<LedgerEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Checks supplied account names against the chart of accounts.
///
/// Unknown codes are tolerated (dropped with an [`Diagnostic::UnknownCode`]),
/// since they are usually accounts added after the chart was published. A
/// known code carrying a name that cannot be reconciled is fatal for the whole
/// batch: it means the export's columns are shifted or corrupted, and
/// aggregating it would produce a plausible but wrong tree.
pub struct NameValidator<'a> {
    table: &'a ReferenceTable,
}

impl<'a> NameValidator<'a> {
    pub fn new(table: &'a ReferenceTable) -> Self {
        Self { table }
    }

    /// Whether `supplied` names account `code`, either by its official name
    /// or by one of its accepted aliases. Unknown codes never match.
    pub fn names_match(&self, code: &str, supplied: &str) -> bool {
        let Some(account) = self.table.account(code) else {
            return false;
        };

        let supplied = normalize_account_name(supplied);
        normalize_account_name(&account.official_name) == supplied
            || account
                .accepted_aliases
                .iter()
                .any(|alias| normalize_account_name(alias) == supplied)
    }

    /// Validates the whole batch.
    ///
    /// Accepted entries get their canonical name. Codes whose shape cannot be
    /// placed in a tree pass through untouched; the hierarchy builder reports
    /// them. Every mismatch in the batch is collected before failing, in row
    /// order.
    pub fn validate(&self, entries: Vec<LedgerEntry>) -> Result<ValidatedBatch> {
        let mut batch = ValidatedBatch::default();
        let mut mismatches = Vec::new();

        for mut entry in entries {
            let Some(official) = self.table.official_name(&entry.code) else {
                if has_structural_shape(&entry.code) {
                    let row = entry.row_number();
                    warn!(
                        "Row {}: account code {} is not in the chart of accounts, skipping",
                        row, entry.code
                    );
                    batch.diagnostics.push(Diagnostic::UnknownCode {
                        code: entry.code,
                        row,
                        name: entry.name,
                    });
                } else {
                    batch.entries.push(entry);
                }
                continue;
            };

            if normalize_account_name(&entry.name).is_empty()
                || self.names_match(&entry.code, &entry.name)
            {
                entry.name = official.to_string();
                batch.entries.push(entry);
            } else {
                mismatches.push(NameMismatch {
                    code: entry.code.clone(),
                    row: entry.row_number(),
                    expected_name: official.to_string(),
                    actual_name: entry.name.clone(),
                });
            }
        }

        if !mismatches.is_empty() {
            warn!(
                "Rejecting batch: {} account name(s) contradict the chart of accounts",
                mismatches.len()
            );
            return Err(TrialBalanceError::NameMismatch(mismatches));
        }

        debug!(
            "Name validation accepted {} entries, dropped {} unknown codes",
            batch.entries.len(),
            batch.diagnostics.len()
        );
        Ok(batch)
    }
}

pub fn validate_names(entries: Vec<LedgerEntry>, table: &ReferenceTable) -> Result<ValidatedBatch> {
    NameValidator::new(table).validate(entries)
}
