use crate::error::Result;
use crate::reference::ReferenceTable;
use crate::schema::{EngineConfig, RawRow};
use crate::{EngineOutput, TrialBalanceProcessor};
use log::warn;

/// Holds the latest successful computation for an interactive view.
///
/// Every [`recompute`](Self::recompute) rebuilds everything from the given
/// rows. When a batch is rejected the previous output stays available, so a
/// single bad upload does not blank the working view.
pub struct TrialBalanceSession<'a> {
    table: &'a ReferenceTable,
    config: EngineConfig,
    current: Option<EngineOutput>,
}

impl<'a> TrialBalanceSession<'a> {
    pub fn new(table: &'a ReferenceTable, config: EngineConfig) -> Self {
        Self {
            table,
            config,
            current: None,
        }
    }

    pub fn recompute(&mut self, rows: &[RawRow]) -> Result<&EngineOutput> {
        match TrialBalanceProcessor::process(rows, self.table, &self.config) {
            Ok(output) => Ok(&*self.current.insert(output)),
            Err(e) => {
                if self.current.is_some() {
                    warn!("Recomputation failed, keeping the previous result: {}", e);
                }
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<&EngineOutput> {
        self.current.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CanonicalAccount;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Vec<RawRow> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_failed_recompute_keeps_previous_output() {
        let table = ReferenceTable::from_accounts(vec![
            CanonicalAccount::new("01", "Assets"),
            CanonicalAccount::new("0101", "Cash"),
        ])
        .unwrap();
        let mut session = TrialBalanceSession::new(&table, EngineConfig::default());
        assert!(session.current().is_none());

        session
            .recompute(&rows(json!([{"code": "0101", "name": "Cash", "debit": 10}])))
            .unwrap();
        assert_eq!(session.current().unwrap().tree.get("01").unwrap().agg_debit, 10.0);

        let result = session.recompute(&rows(json!([{"code": "0101", "name": "Wrong", "debit": 99}])));
        assert!(result.is_err());
        assert_eq!(session.current().unwrap().tree.get("01").unwrap().agg_debit, 10.0);

        session.clear();
        assert!(session.current().is_none());
    }
}
