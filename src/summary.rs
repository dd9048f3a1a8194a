use crate::hierarchy::ChartTree;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Statement bucket of a sector, keyed by the first two digits of its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum StatementBucket {
    CurrentAssets,
    FixedAssets,
    CurrentLiabilities,
    LongTermLiabilities,
    Equity,
    Costs,
    Revenue,
}

impl StatementBucket {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.get(..2)? {
            "01" => Some(Self::CurrentAssets),
            "02" => Some(Self::FixedAssets),
            "03" => Some(Self::CurrentLiabilities),
            "04" => Some(Self::LongTermLiabilities),
            "05" => Some(Self::Equity),
            "06" => Some(Self::Costs),
            "07" => Some(Self::Revenue),
            _ => None,
        }
    }

    /// Asset sectors keep their signed balance. The others are credit-natured
    /// (or, for costs, reported as a positive magnitude) and are summed as
    /// absolute values.
    pub fn is_signed(self) -> bool {
        matches!(self, Self::CurrentAssets | Self::FixedAssets)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialSummary {
    pub current_assets: f64,
    pub fixed_assets: f64,
    pub current_liabilities: f64,
    pub long_term_liabilities: f64,
    pub equity: f64,
    pub costs: f64,
    pub revenue: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub total_debit: f64,
    pub total_credit: f64,
    pub net_income: f64,
    pub is_balanced: bool,
}

impl FinancialSummary {
    pub fn from_tree(tree: &ChartTree, tolerance: f64) -> Self {
        let mut buckets: BTreeMap<StatementBucket, f64> = BTreeMap::new();

        for root in tree.roots() {
            let Some(bucket) = StatementBucket::from_code(&root.code) else {
                debug!("Root {} does not belong to a statement bucket", root.code);
                continue;
            };
            let amount = if bucket.is_signed() {
                root.agg_balance
            } else {
                root.agg_balance.abs()
            };
            *buckets.entry(bucket).or_insert(0.0) += amount;
        }

        let bucket = |b: StatementBucket| buckets.get(&b).copied().unwrap_or(0.0);
        let current_assets = bucket(StatementBucket::CurrentAssets);
        let fixed_assets = bucket(StatementBucket::FixedAssets);
        let current_liabilities = bucket(StatementBucket::CurrentLiabilities);
        let long_term_liabilities = bucket(StatementBucket::LongTermLiabilities);
        let costs = bucket(StatementBucket::Costs);
        let revenue = bucket(StatementBucket::Revenue);
        let total_debit = tree.total_debit();
        let total_credit = tree.total_credit();

        Self {
            current_assets,
            fixed_assets,
            current_liabilities,
            long_term_liabilities,
            equity: bucket(StatementBucket::Equity),
            costs,
            revenue,
            total_assets: current_assets + fixed_assets,
            total_liabilities: current_liabilities + long_term_liabilities,
            total_debit,
            total_credit,
            net_income: revenue - costs,
            is_balanced: is_balanced(total_debit, total_credit, tolerance),
        }
    }
}

/// `|debit - credit| < tolerance`.
pub fn is_balanced(total_debit: f64, total_credit: f64, tolerance: f64) -> bool {
    (total_debit - total_credit).abs() < tolerance
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    CurrentRatio,
    WorkingCapital,
    DebtRatio,
    SolvencyRatio,
    EquityRatio,
    DebtToEquity,
    ProfitMargin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Acceptable,
    Weak,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Weak => "weak",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ratios {
    pub current_ratio: f64,
    pub working_capital: f64,
    pub debt_ratio: f64,
    pub solvency_ratio: f64,
    pub equity_ratio: f64,
    pub debt_to_equity: f64,
    /// Net income as a percentage of revenue.
    pub profit_margin: f64,
    pub evaluation: BTreeMap<RatioKind, Rating>,
}

impl Ratios {
    pub fn from_summary(summary: &FinancialSummary) -> Self {
        let mut ratios = Self {
            current_ratio: safe_div(summary.current_assets, summary.current_liabilities),
            working_capital: summary.current_assets - summary.current_liabilities,
            debt_ratio: safe_div(summary.total_liabilities, summary.total_assets),
            solvency_ratio: safe_div(summary.total_assets, summary.total_liabilities),
            equity_ratio: safe_div(summary.equity, summary.total_assets),
            debt_to_equity: safe_div(summary.total_liabilities, summary.equity),
            profit_margin: safe_div(summary.net_income, summary.revenue) * 100.0,
            evaluation: BTreeMap::new(),
        };

        for kind in [
            RatioKind::CurrentRatio,
            RatioKind::WorkingCapital,
            RatioKind::DebtRatio,
            RatioKind::SolvencyRatio,
            RatioKind::EquityRatio,
            RatioKind::DebtToEquity,
            RatioKind::ProfitMargin,
        ] {
            let rating = evaluate(kind, ratios.value(kind));
            ratios.evaluation.insert(kind, rating);
        }
        ratios
    }

    pub fn value(&self, kind: RatioKind) -> f64 {
        match kind {
            RatioKind::CurrentRatio => self.current_ratio,
            RatioKind::WorkingCapital => self.working_capital,
            RatioKind::DebtRatio => self.debt_ratio,
            RatioKind::SolvencyRatio => self.solvency_ratio,
            RatioKind::EquityRatio => self.equity_ratio,
            RatioKind::DebtToEquity => self.debt_to_equity,
            RatioKind::ProfitMargin => self.profit_margin,
        }
    }

    pub fn rating(&self, kind: RatioKind) -> Option<Rating> {
        self.evaluation.get(&kind).copied()
    }
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() < f64::EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

/// Fixed thresholds per ratio. Higher is better except for the two leverage
/// ratios, where lower is better.
pub fn evaluate(kind: RatioKind, value: f64) -> Rating {
    let higher_is_better = |excellent: f64, good: f64, acceptable: f64| {
        if value >= excellent {
            Rating::Excellent
        } else if value >= good {
            Rating::Good
        } else if value >= acceptable {
            Rating::Acceptable
        } else {
            Rating::Weak
        }
    };
    let lower_is_better = |excellent: f64, good: f64, acceptable: f64| {
        if value <= excellent {
            Rating::Excellent
        } else if value <= good {
            Rating::Good
        } else if value <= acceptable {
            Rating::Acceptable
        } else {
            Rating::Weak
        }
    };

    match kind {
        RatioKind::CurrentRatio => higher_is_better(2.0, 1.5, 1.0),
        RatioKind::SolvencyRatio => higher_is_better(2.0, 1.5, 1.0),
        RatioKind::EquityRatio => higher_is_better(0.5, 0.3, 0.2),
        RatioKind::ProfitMargin => higher_is_better(20.0, 10.0, 0.0),
        RatioKind::DebtRatio => lower_is_better(0.3, 0.5, 0.7),
        RatioKind::DebtToEquity => lower_is_better(0.5, 1.0, 2.0),
        RatioKind::WorkingCapital => {
            if value > 0.0 {
                Rating::Good
            } else {
                Rating::Weak
            }
        }
    }
}
