use crate::reference::ReferenceTable;
use crate::schema::{LedgerEntry, RawRow};
use crate::utils::{ascii_digits, level_for_code, parse_amount};
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;

/// Logical columns of a trial balance export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LedgerField {
    Code,
    Name,
    Debit,
    Credit,
    Level,
    Posting,
}

/// Maps each logical field to an ordered list of column headers it may
/// appear under. The first candidate present in a row wins; a candidate
/// matches exactly, or failing that after trimming and case folding.
#[derive(Debug, Clone)]
pub struct FieldResolver {
    candidates: BTreeMap<LedgerField, Vec<String>>,
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self::new()
            .with_candidates(
                LedgerField::Code,
                &[
                    "code",
                    "account_code",
                    "accountCode",
                    "account code",
                    "رقم الحساب",
                    "كود الحساب",
                    "رمز الحساب",
                    "الكود",
                    "الرقم",
                    "رقم",
                ],
            )
            .with_candidates(
                LedgerField::Name,
                &[
                    "name",
                    "account_name",
                    "accountName",
                    "account name",
                    "اسم الحساب",
                    "إسم الحساب",
                    "الاسم",
                    "البيان",
                    "الحساب",
                ],
            )
            .with_candidates(
                LedgerField::Debit,
                &["debit", "dr", "مدين", "المدين", "رصيد مدين", "الرصيد المدين"],
            )
            .with_candidates(
                LedgerField::Credit,
                &["credit", "cr", "دائن", "الدائن", "رصيد دائن", "الرصيد الدائن"],
            )
            .with_candidates(LedgerField::Level, &["level", "المستوى", "مستوى"])
            .with_candidates(
                LedgerField::Posting,
                &["is_posting", "isPosting", "posting", "حساب ترحيلي", "ترحيلي", "نوع الحساب"],
            )
    }
}

impl FieldResolver {
    /// A resolver with no candidates at all.
    pub fn new() -> Self {
        Self {
            candidates: BTreeMap::new(),
        }
    }

    /// Replaces the candidate headers for `field`.
    pub fn with_candidates(mut self, field: LedgerField, keys: &[&str]) -> Self {
        self.candidates
            .insert(field, keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn candidates(&self, field: LedgerField) -> &[String] {
        self.candidates
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn resolve<'r>(&self, row: &'r RawRow, field: LedgerField) -> Option<&'r Value> {
        for candidate in self.candidates(field) {
            if let Some(value) = row.get(candidate).filter(|v| !v.is_null()) {
                return Some(value);
            }

            let folded = candidate.trim().to_lowercase();
            let loose = row
                .iter()
                .find(|(key, value)| !value.is_null() && key.trim().to_lowercase() == folded)
                .map(|(_, value)| value);
            if loose.is_some() {
                return loose;
            }
        }
        None
    }
}

/// Turns decoded spreadsheet rows into [`LedgerEntry`] values.
pub struct RowNormalizer<'a> {
    table: &'a ReferenceTable,
    resolver: FieldResolver,
}

impl<'a> RowNormalizer<'a> {
    pub fn new(table: &'a ReferenceTable) -> Self {
        Self {
            table,
            resolver: FieldResolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: FieldResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Normalizes one row. Rows without a code yield `None` and leave no trace.
    pub fn normalize_row(&self, row: &RawRow, index: usize) -> Option<LedgerEntry> {
        let code_value = self.resolver.resolve(row, LedgerField::Code)?;
        let raw_code = code_from_value(code_value)?;
        if raw_code.is_empty() {
            return None;
        }

        let code = match self.legacy_code(code_value, &raw_code) {
            Some(official) => {
                debug!("Row {}: remapped legacy code {} to {}", index + 1, raw_code, official);
                official.to_string()
            }
            None => raw_code,
        };

        let name = self
            .resolver
            .resolve(row, LedgerField::Name)
            .map(text_from_value)
            .unwrap_or_default();

        let debit = self.amount(row, LedgerField::Debit, index, &code);
        let credit = self.amount(row, LedgerField::Credit, index, &code);

        let is_posting = self
            .resolver
            .resolve(row, LedgerField::Posting)
            .and_then(flag_from_value)
            .unwrap_or(true);
        let declared_level = self
            .resolver
            .resolve(row, LedgerField::Level)
            .and_then(level_from_value);

        let level = level_for_code(&code);
        if let Some(declared) = declared_level.filter(|d| *d != level) {
            debug!(
                "Row {}: declared level {} for {} differs from derived level {}",
                index + 1,
                declared,
                code,
                level
            );
        }

        Some(LedgerEntry {
            parent_code: self.table.parent_of(&code),
            level,
            name,
            debit,
            credit,
            balance: debit - credit,
            original_row_index: index,
            is_posting,
            declared_level,
            code,
        })
    }

    /// Looks the code up in the legacy remap table. A numeric cell of even
    /// width may be an odd-width legacy code that lost its leading zero.
    fn legacy_code(&self, value: &Value, code: &str) -> Option<&'a str> {
        let table = self.table;
        table.remap_code(code).or_else(|| {
            if value.is_number() && code.len() % 2 == 0 {
                table.remap_code(&format!("0{}", code))
            } else {
                None
            }
        })
    }

    pub fn normalize_rows(&self, rows: &[RawRow]) -> Vec<LedgerEntry> {
        let entries: Vec<LedgerEntry> = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| self.normalize_row(row, index))
            .collect();

        debug!(
            "Normalized {} of {} rows ({} without an account code)",
            entries.len(),
            rows.len(),
            rows.len() - entries.len()
        );
        entries
    }

    fn amount(&self, row: &RawRow, field: LedgerField, index: usize, code: &str) -> f64 {
        match self.resolver.resolve(row, field) {
            None => 0.0,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => parse_amount(s).unwrap_or_else(|| {
                warn!(
                    "Row {} ({}): could not parse {:?} amount '{}', using 0",
                    index + 1,
                    code,
                    field,
                    s
                );
                0.0
            }),
            Some(other) => {
                warn!(
                    "Row {} ({}): unexpected {:?} value {}, using 0",
                    index + 1,
                    code,
                    field,
                    other
                );
                0.0
            }
        }
    }
}

pub fn normalize_rows(rows: &[RawRow], table: &ReferenceTable) -> Vec<LedgerEntry> {
    RowNormalizer::new(table).normalize_rows(rows)
}

fn code_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(
            ascii_digits(s)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
        ),
        Value::Number(n) => {
            let digits = match n.as_u64() {
                Some(u) => u.to_string(),
                None => match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 => format!("{:.0}", f),
                    _ => return Some(n.to_string()),
                },
            };
            // Spreadsheets store codes as numbers and drop the sector's leading zero.
            if digits.len() % 2 == 1 {
                Some(format!("0{}", digits))
            } else {
                Some(digits)
            }
        }
        _ => None,
    }
}

fn text_from_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "نعم" | "ترحيلي" | "فرعي" | "posting" => Some(true),
            "false" | "no" | "n" | "0" | "لا" | "تجميعي" | "رئيسي" | "header" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn level_from_value(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|u| u8::try_from(u).ok()),
        Value::String(s) => ascii_digits(s.trim()).parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CanonicalAccount;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        value.as_object().cloned().unwrap()
    }

    fn table() -> ReferenceTable {
        ReferenceTable::from_accounts(vec![
            CanonicalAccount::new("01", "Assets"),
            CanonicalAccount::new("0101", "Cash"),
            CanonicalAccount::new("0199", "Moved").with_parent("0101"),
        ])
        .unwrap()
        .with_code_remap("0111", "0101")
    }

    #[test]
    fn test_resolves_alias_columns() {
        let table = table();
        let normalizer = RowNormalizer::new(&table);
        let entry = normalizer
            .normalize_row(
                &row(json!({"رقم الحساب": "0101", "اسم الحساب": "Cash", "مدين": "1,500.25", "دائن": 0})),
                3,
            )
            .unwrap();

        assert_eq!(entry.code, "0101");
        assert_eq!(entry.name, "Cash");
        assert_eq!(entry.debit, 1500.25);
        assert_eq!(entry.credit, 0.0);
        assert_eq!(entry.balance, 1500.25);
        assert_eq!(entry.level, 2);
        assert_eq!(entry.parent_code.as_deref(), Some("01"));
        assert_eq!(entry.row_number(), 4);
    }

    #[test]
    fn test_case_insensitive_headers_and_parenthesized_negative() {
        let table = table();
        let entry = RowNormalizer::new(&table)
            .normalize_row(&row(json!({" Code ": "01", "CREDIT": "(200.00)"})), 0)
            .unwrap();
        assert_eq!(entry.code, "01");
        assert_eq!(entry.credit, -200.0);
        assert_eq!(entry.parent_code, None);
    }

    #[test]
    fn test_row_without_code_is_dropped() {
        let table = table();
        let normalizer = RowNormalizer::new(&table);
        assert!(normalizer.normalize_row(&row(json!({"name": "Cash", "debit": 10})), 0).is_none());
        assert!(normalizer.normalize_row(&row(json!({"code": "  "})), 1).is_none());
        assert!(normalizer.normalize_row(&row(json!({"code": null})), 2).is_none());

        let entries = normalizer.normalize_rows(&[
            row(json!({"name": "no code"})),
            row(json!({"code": "01"})),
        ]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].original_row_index, 1);
    }

    #[test]
    fn test_legacy_code_is_remapped_before_derivation() {
        let table = table();
        let entry = RowNormalizer::new(&table)
            .normalize_row(&row(json!({"code": "0111"})), 0)
            .unwrap();
        assert_eq!(entry.code, "0101");
        assert_eq!(entry.parent_code.as_deref(), Some("01"));
    }

    #[test]
    fn test_numeric_legacy_code_without_leading_zero_is_remapped() {
        let table = table().with_code_remap("01011", "0101");
        let normalizer = RowNormalizer::new(&table);

        let entry = normalizer
            .normalize_row(&row(json!({"code": 1011, "debit": 75})), 0)
            .unwrap();
        assert_eq!(entry.code, "0101");
        assert_eq!(entry.parent_code.as_deref(), Some("01"));

        // The same digits as text are taken as written.
        let entry = normalizer
            .normalize_row(&row(json!({"code": "1011"})), 1)
            .unwrap();
        assert_eq!(entry.code, "1011");
    }

    #[test]
    fn test_parent_override_from_reference() {
        let table = table();
        let entry = RowNormalizer::new(&table)
            .normalize_row(&row(json!({"code": "0199"})), 0)
            .unwrap();
        assert_eq!(entry.parent_code.as_deref(), Some("0101"));
    }

    #[test]
    fn test_numeric_code_restores_leading_zero() {
        let table = table();
        let entry = RowNormalizer::new(&table)
            .normalize_row(&row(json!({"code": 101, "debit": 5})), 0)
            .unwrap();
        assert_eq!(entry.code, "0101");
        assert_eq!(entry.debit, 5.0);
    }

    #[test]
    fn test_unparseable_amount_is_zero() {
        let table = table();
        let entry = RowNormalizer::new(&table)
            .normalize_row(&row(json!({"code": "01", "debit": "n/a", "credit": true})), 0)
            .unwrap();
        assert_eq!(entry.debit, 0.0);
        assert_eq!(entry.credit, 0.0);
    }

    #[test]
    fn test_posting_and_level_hints() {
        let table = table();
        let entry = RowNormalizer::new(&table)
            .normalize_row(&row(json!({"code": "01", "is_posting": "لا", "level": "1"})), 0)
            .unwrap();
        assert!(!entry.is_posting);
        assert_eq!(entry.declared_level, Some(1));
    }

    #[test]
    fn test_custom_resolver() {
        let table = table();
        let resolver = FieldResolver::default().with_candidates(LedgerField::Code, &["Konto"]);
        let entry = RowNormalizer::new(&table)
            .with_resolver(resolver)
            .normalize_row(&row(json!({"Konto": "01", "code": "0101"})), 0)
            .unwrap();
        assert_eq!(entry.code, "01");
    }
}
