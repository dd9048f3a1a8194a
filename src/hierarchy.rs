use crate::diagnostics::Diagnostic;
use crate::reference::ReferenceTable;
use crate::schema::{DuplicatePolicy, EngineConfig, LedgerEntry};
use crate::utils::{has_structural_shape, level_for_code};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

/// One account in the reconstructed chart. Either backed by one or more
/// input rows, or synthesized to connect rows whose ancestors were missing
/// from the export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HierarchyNode {
    pub code: String,
    pub name: String,
    pub level: u8,
    pub parent_code: Option<String>,
    /// Child codes in ascending order. Resolve them through the tree.
    pub children: Vec<String>,
    /// Own totals as exported. Zero for synthesized nodes.
    pub debit: f64,
    pub credit: f64,
    pub agg_debit: f64,
    pub agg_credit: f64,
    /// Always `agg_debit - agg_credit`.
    pub agg_balance: f64,
    /// True iff the node has no children once the tree is complete.
    pub is_posting: bool,
    pub is_synthesized: bool,
    /// 1-based input rows that contributed to this node.
    pub source_rows: Vec<usize>,
}

impl HierarchyNode {
    fn from_entry(entry: &LedgerEntry, parent_code: Option<String>) -> Self {
        Self {
            code: entry.code.clone(),
            name: entry.name.clone(),
            level: entry.level,
            parent_code,
            children: Vec::new(),
            debit: entry.debit,
            credit: entry.credit,
            agg_debit: 0.0,
            agg_credit: 0.0,
            agg_balance: 0.0,
            is_posting: true,
            is_synthesized: false,
            source_rows: vec![entry.row_number()],
        }
    }

    fn synthesized(code: &str, name: &str, parent_code: Option<String>) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            level: level_for_code(code),
            parent_code,
            children: Vec::new(),
            debit: 0.0,
            credit: 0.0,
            agg_debit: 0.0,
            agg_credit: 0.0,
            agg_balance: 0.0,
            is_posting: true,
            is_synthesized: true,
            source_rows: Vec::new(),
        }
    }

    pub fn own_balance(&self) -> f64 {
        self.debit - self.credit
    }
}

/// Owned, nested rendition of a subtree for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TreeNodeView {
    pub code: String,
    pub name: String,
    pub level: u8,
    pub debit: f64,
    pub credit: f64,
    pub agg_debit: f64,
    pub agg_credit: f64,
    pub agg_balance: f64,
    pub is_posting: bool,
    pub is_synthesized: bool,
    pub children: Vec<TreeNodeView>,
}

/// The reconstructed chart: an arena of nodes keyed by code, the ordered
/// root codes, and the soft diagnostics raised while building it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChartTree {
    nodes: BTreeMap<String, HierarchyNode>,
    roots: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl ChartTree {
    pub fn get(&self, code: &str) -> Option<&HierarchyNode> {
        self.nodes.get(code)
    }

    /// Every node by code, for cross-referencing ("jump to this account").
    pub fn node_index(&self) -> &BTreeMap<String, HierarchyNode> {
        &self.nodes
    }

    pub fn root_codes(&self) -> &[String] {
        &self.roots
    }

    pub fn roots(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.roots.iter().filter_map(|code| self.nodes.get(code))
    }

    pub fn children<'t>(&'t self, node: &'t HierarchyNode) -> impl Iterator<Item = &'t HierarchyNode> {
        node.children.iter().filter_map(|code| self.nodes.get(code))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn posting_nodes(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.values().filter(|n| n.is_posting)
    }

    pub fn total_debit(&self) -> f64 {
        self.roots().map(|n| n.agg_debit).sum()
    }

    pub fn total_credit(&self) -> f64 {
        self.roots().map(|n| n.agg_credit).sum()
    }

    /// Depth-first pre-order over all nodes reachable from the roots.
    pub fn walk(&self) -> Vec<&HierarchyNode> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self.roots.iter().rev().map(String::as_str).collect();

        while let Some(code) = stack.pop() {
            if !seen.insert(code) {
                continue;
            }
            if let Some(node) = self.nodes.get(code) {
                ordered.push(node);
                stack.extend(node.children.iter().rev().map(String::as_str));
            }
        }
        ordered
    }

    pub fn to_nested(&self) -> Vec<TreeNodeView> {
        let mut visiting = HashSet::new();
        self.roots
            .iter()
            .filter_map(|code| self.view(code, &mut visiting))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_nested())
    }

    fn view(&self, code: &str, visiting: &mut HashSet<String>) -> Option<TreeNodeView> {
        let node = self.nodes.get(code)?;
        if !visiting.insert(code.to_string()) {
            return None;
        }
        let children = node
            .children
            .iter()
            .filter_map(|child| self.view(child, visiting))
            .collect();
        visiting.remove(code);

        Some(TreeNodeView {
            code: node.code.clone(),
            name: node.name.clone(),
            level: node.level,
            debit: node.debit,
            credit: node.credit,
            agg_debit: node.agg_debit,
            agg_credit: node.agg_credit,
            agg_balance: node.agg_balance,
            is_posting: node.is_posting,
            is_synthesized: node.is_synthesized,
            children,
        })
    }
}

/// Rebuilds the account hierarchy from validated entries.
///
/// Construction runs in three phases: one node per entry, then every missing
/// ancestor is synthesized and each node is linked under its parent, then
/// totals are rolled up from the leaves. Nothing here fails; every anomaly
/// becomes a [`Diagnostic`] on the returned tree.
pub struct HierarchyBuilder<'a> {
    table: &'a ReferenceTable,
    config: &'a EngineConfig,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(table: &'a ReferenceTable, config: &'a EngineConfig) -> Self {
        Self { table, config }
    }

    pub fn build(&self, entries: &[LedgerEntry]) -> ChartTree {
        let mut diagnostics = Vec::new();

        let mut nodes = self.instantiate(entries, &mut diagnostics);
        self.synthesize_ancestors(&mut nodes, &mut diagnostics);
        let roots = self.link(&mut nodes, &mut diagnostics);

        let mut visiting = HashSet::new();
        for root in &roots {
            aggregate(&mut nodes, root, &mut visiting);
        }

        self.check_rollups(&nodes, &mut diagnostics);

        let mut tree = ChartTree {
            nodes,
            roots,
            diagnostics,
        };
        self.check_balance(&mut tree);

        debug!(
            "Built chart with {} nodes under {} roots ({} diagnostics)",
            tree.nodes.len(),
            tree.roots.len(),
            tree.diagnostics.len()
        );
        tree
    }

    fn instantiate(
        &self,
        entries: &[LedgerEntry],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BTreeMap<String, HierarchyNode> {
        let mut nodes: BTreeMap<String, HierarchyNode> = BTreeMap::new();

        for entry in entries {
            let has_override = self.table.official_parent_code(&entry.code).is_some();
            if !has_structural_shape(&entry.code) && !has_override {
                warn!(
                    "Row {}: '{}' is not a valid account code, excluding it from the tree",
                    entry.row_number(),
                    entry.code
                );
                diagnostics.push(Diagnostic::InvalidCode {
                    code: entry.code.clone(),
                    row: entry.row_number(),
                });
                continue;
            }

            match nodes.entry(entry.code.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(HierarchyNode::from_entry(entry, self.table.parent_of(&entry.code)));
                }
                Entry::Occupied(mut slot) => {
                    let node = slot.get_mut();
                    node.source_rows.push(entry.row_number());
                    match self.config.duplicate_policy {
                        DuplicatePolicy::KeepFirst => {}
                        DuplicatePolicy::KeepLast => {
                            node.debit = entry.debit;
                            node.credit = entry.credit;
                        }
                        DuplicatePolicy::Sum => {
                            node.debit += entry.debit;
                            node.credit += entry.credit;
                        }
                    }
                }
            }
        }

        nodes
    }

    /// Creates every ancestor on each node's parent chain that has no row of
    /// its own. The chain follows the same parent rule as normalization, so
    /// for plain codes it visits exactly the even-length proper prefixes.
    fn synthesize_ancestors(
        &self,
        nodes: &mut BTreeMap<String, HierarchyNode>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let codes: Vec<String> = nodes
            .values()
            .filter(|n| !n.is_synthesized)
            .map(|n| n.code.clone())
            .collect();

        for code in codes {
            let row = nodes.get(&code).and_then(|n| n.source_rows.first().copied());
            let mut chain = HashSet::from([code.clone()]);
            let mut current = code;

            while let Some(parent) = self.table.parent_of(&current) {
                if !chain.insert(parent.clone()) {
                    // Loop in the chart's parent overrides; linking reports it.
                    break;
                }

                if !nodes.contains_key(&parent) {
                    let name = self.table.official_name(&parent).unwrap_or(&parent).to_string();
                    debug!("Synthesizing missing parent {} ({}) for {}", parent, name, current);
                    nodes.insert(
                        parent.clone(),
                        HierarchyNode::synthesized(&parent, &name, self.table.parent_of(&parent)),
                    );
                    diagnostics.push(Diagnostic::MissingParent {
                        code: current.clone(),
                        parent_code: parent.clone(),
                        row,
                        cyclic: false,
                    });
                }

                current = parent;
            }
        }
    }

    /// Attaches every node to its parent and returns the root codes in
    /// ascending order. A link that would close a loop is refused; that node
    /// stays a root.
    fn link(
        &self,
        nodes: &mut BTreeMap<String, HierarchyNode>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<String> {
        let mut links: BTreeMap<String, String> = BTreeMap::new();
        let mut roots = Vec::new();
        let mut cut = Vec::new();

        for node in nodes.values() {
            let Some(parent) = node.parent_code.as_ref().filter(|p| nodes.contains_key(*p)) else {
                roots.push(node.code.clone());
                continue;
            };

            if closes_loop(&links, &node.code, parent) {
                warn!(
                    "Parent chain of {} loops back through {}; keeping it as a root",
                    node.code, parent
                );
                diagnostics.push(Diagnostic::MissingParent {
                    code: node.code.clone(),
                    parent_code: parent.clone(),
                    row: node.source_rows.first().copied(),
                    cyclic: true,
                });
                roots.push(node.code.clone());
                cut.push(node.code.clone());
                continue;
            }

            links.insert(node.code.clone(), parent.clone());
        }

        for code in cut {
            if let Some(node) = nodes.get_mut(&code) {
                node.parent_code = None;
            }
        }

        for (child, parent) in links {
            if let Some(node) = nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }

        roots
    }

    fn check_rollups(
        &self,
        nodes: &BTreeMap<String, HierarchyNode>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let tolerance = self.config.aggregation_tolerance;

        for node in nodes.values() {
            // Rollup rows left at zero were simply not filled in by the export.
            let reported = node.debit != 0.0 || node.credit != 0.0;
            if node.is_posting || node.is_synthesized || !reported {
                continue;
            }

            if (node.debit - node.agg_debit).abs() > tolerance
                || (node.credit - node.agg_credit).abs() > tolerance
            {
                diagnostics.push(Diagnostic::AggregationMismatch {
                    code: node.code.clone(),
                    row: node.source_rows.first().copied(),
                    reported_debit: node.debit,
                    reported_credit: node.credit,
                    computed_debit: node.agg_debit,
                    computed_credit: node.agg_credit,
                });
            }
        }
    }

    fn check_balance(&self, tree: &mut ChartTree) {
        let total_debit = tree.total_debit();
        let total_credit = tree.total_credit();
        let difference = (total_debit - total_credit).abs();

        if difference >= self.config.balance_tolerance {
            debug!(
                "Trial balance out of balance by {:.2} (debit {:.2}, credit {:.2})",
                difference, total_debit, total_credit
            );
            tree.diagnostics.push(Diagnostic::Imbalance {
                total_debit,
                total_credit,
                difference,
            });
        }
    }
}

pub fn build_hierarchy(
    entries: &[LedgerEntry],
    table: &ReferenceTable,
    config: &EngineConfig,
) -> ChartTree {
    HierarchyBuilder::new(table, config).build(entries)
}

/// Whether linking `child` under `parent` would make `child` its own ancestor.
fn closes_loop(links: &BTreeMap<String, String>, child: &str, parent: &str) -> bool {
    let mut current = parent;
    loop {
        if current == child {
            return true;
        }
        match links.get(current) {
            Some(next) => current = next,
            None => return false,
        }
    }
}

/// Rolls totals up from the leaves. `visiting` holds the codes on the active
/// path; a node met again on that path contributes its own totals and is not
/// descended into.
fn aggregate(
    nodes: &mut BTreeMap<String, HierarchyNode>,
    code: &str,
    visiting: &mut HashSet<String>,
) -> (f64, f64) {
    let Some(node) = nodes.get(code) else {
        return (0.0, 0.0);
    };
    if !visiting.insert(code.to_string()) {
        return (node.debit, node.credit);
    }

    let children = node.children.clone();
    let (debit, credit) = if children.is_empty() {
        (node.debit, node.credit)
    } else {
        children.iter().fold((0.0, 0.0), |(d, c), child| {
            let (child_debit, child_credit) = aggregate(nodes, child, visiting);
            (d + child_debit, c + child_credit)
        })
    };

    if let Some(node) = nodes.get_mut(code) {
        node.is_posting = children.is_empty();
        node.agg_debit = debit;
        node.agg_credit = credit;
        node.agg_balance = debit - credit;
    }

    visiting.remove(code);
    (debit, credit)
}
