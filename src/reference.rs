use crate::error::{Result, TrialBalanceError};
use crate::utils::truncated_parent;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const STANDARD_CHART: &str = include_str!("../data/chart_of_accounts.json");

static STANDARD_TABLE: Lazy<std::result::Result<ReferenceTable, String>> =
    Lazy::new(|| ReferenceTable::from_json(STANDARD_CHART).map_err(|e| e.to_string()));

/// One account of the official chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalAccount {
    pub code: String,
    pub official_name: String,
    /// Explicit parent. When absent the parent is derived by dropping the
    /// last two digits of the code.
    pub official_parent_code: Option<String>,
    #[serde(default)]
    pub accepted_aliases: BTreeSet<String>,
}

impl CanonicalAccount {
    pub fn new(code: impl Into<String>, official_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            official_name: official_name.into(),
            official_parent_code: None,
            accepted_aliases: BTreeSet::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.official_parent_code = Some(parent.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.accepted_aliases.insert(alias.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChartDocument {
    sectors: Vec<ChartNode>,
    #[serde(default)]
    code_remaps: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ChartNode {
    code: String,
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    children: Vec<ChartNode>,
}

/// Immutable chart of accounts: official names, parents, aliases and the
/// legacy code remap table.
///
/// The standard chart is embedded in the crate and parsed once per process
/// (see [`ReferenceTable::standard`]); tests and callers with their own chart
/// build one with [`ReferenceTable::from_accounts`] or
/// [`ReferenceTable::from_json`] and pass it explicitly.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    accounts: BTreeMap<String, CanonicalAccount>,
    code_remaps: BTreeMap<String, String>,
}

impl ReferenceTable {
    pub fn standard() -> Result<&'static ReferenceTable> {
        STANDARD_TABLE
            .as_ref()
            .map_err(|e| TrialBalanceError::ReferenceData(e.clone()))
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = CanonicalAccount>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for account in accounts {
            if account.official_name.trim().is_empty() {
                return Err(TrialBalanceError::ReferenceData(format!(
                    "account {} has an empty official name",
                    account.code
                )));
            }
            if table.contains_key(&account.code) {
                return Err(TrialBalanceError::ReferenceData(format!(
                    "account code {} is listed more than once",
                    account.code
                )));
            }
            table.insert(account.code.clone(), account);
        }

        Ok(Self {
            accounts: table,
            code_remaps: BTreeMap::new(),
        })
    }

    /// Parses a nested chart document: `{"sectors": [...], "code_remaps": {...}}`
    /// where every node is `{"code", "name", "aliases"?, "children"?}` and a
    /// node's official parent is the node it is nested under.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ChartDocument = serde_json::from_str(json)?;

        let mut accounts = Vec::new();
        let mut stack: Vec<(Option<String>, ChartNode)> =
            document.sectors.into_iter().rev().map(|n| (None, n)).collect();

        while let Some((parent, node)) = stack.pop() {
            for child in node.children.into_iter().rev() {
                stack.push((Some(node.code.clone()), child));
            }
            accounts.push(CanonicalAccount {
                code: node.code,
                official_name: node.name,
                official_parent_code: parent,
                accepted_aliases: node.aliases.into_iter().collect(),
            });
        }

        let mut table = Self::from_accounts(accounts)?;
        for (legacy, official) in document.code_remaps {
            table = table.with_code_remap(legacy, official);
        }
        Ok(table)
    }

    pub fn with_code_remap(mut self, legacy: impl Into<String>, official: impl Into<String>) -> Self {
        self.code_remaps.insert(legacy.into(), official.into());
        self
    }

    pub fn account(&self, code: &str) -> Option<&CanonicalAccount> {
        self.accounts.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.accounts.contains_key(code)
    }

    pub fn official_name(&self, code: &str) -> Option<&str> {
        self.accounts.get(code).map(|a| a.official_name.as_str())
    }

    pub fn official_parent_code(&self, code: &str) -> Option<&str> {
        self.accounts
            .get(code)
            .and_then(|a| a.official_parent_code.as_deref())
    }

    pub fn aliases(&self, code: &str) -> Option<&BTreeSet<String>> {
        self.accounts.get(code).map(|a| &a.accepted_aliases)
    }

    /// Official replacement for a known mis-entered or legacy code.
    pub fn remap_code(&self, code: &str) -> Option<&str> {
        self.code_remaps.get(code).map(String::as_str)
    }

    /// The parent-derivation rule shared by normalization and tree building:
    /// the official parent when the chart names one, else prefix truncation.
    pub fn parent_of(&self, code: &str) -> Option<String> {
        match self.official_parent_code(code) {
            Some(parent) => Some(parent.to_string()),
            None => truncated_parent(code),
        }
    }

    pub fn sectors(&self) -> impl Iterator<Item = &CanonicalAccount> {
        self.accounts
            .values()
            .filter(|a| a.official_parent_code.is_none() && a.code.len() == 2)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalAccount> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
