use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub nps_rate: f64,
    pub index_rate: f64,
    pub default_inflation: f64,
    pub retirement_age: u32,
    pub min_investment_years: u32,
    pub max_amount: f64,
    pub rounding_multiple: f64,
    pub nps_max_deduction: f64,
    pub nps_deduction_percent: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nps_rate: 0.0711,
            index_rate: 0.1449,
            default_inflation: 0.055,
            retirement_age: 60,
            min_investment_years: 5,
            max_amount: 500_000.0,
            rounding_multiple: 100.0,
            nps_max_deduction: 200_000.0,
            nps_deduction_percent: 0.10,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Nps,
    Index,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub timestamp: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: String,
    pub amount: f64,
    pub ceiling: f64,
    pub remanent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidTransaction {
    pub date: String,
    pub amount: f64,
    pub ceiling: f64,
    pub remanent: f64,
    pub message: String,
}

impl InvalidTransaction {
    pub fn new(transaction: Transaction, message: impl Into<String>) -> Self {
        Self {
            date: transaction.date,
            amount: transaction.amount,
            ceiling: transaction.ceiling,
            remanent: transaction.remanent,
            message: message.into(),
        }
    }
}

/// Override window: a matching transaction's remanent becomes `fixed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QPeriod {
    pub fixed: f64,
    pub start: String,
    pub end: String,
}

/// Addition window: `extra` is stacked on top of the (possibly overridden)
/// remanent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PPeriod {
    pub extra: f64,
    pub start: String,
    pub end: String,
}

/// Evaluation window over which adjusted remanents are summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KPeriod {
    pub start: String,
    pub end: String,
}

/// The q, p and k windows supplied with one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodRules {
    pub q: Vec<QPeriod>,
    pub p: Vec<PPeriod>,
    pub k: Vec<KPeriod>,
}

/// Investor profile shared by the returns, simulation and readiness
/// computations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub principal: f64,
    pub age: u32,
    pub annual_income: f64,
    pub inflation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub transactions: Vec<Transaction>,
    pub total_expense: f64,
    pub total_ceiling: f64,
    pub total_remanent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    pub valid: Vec<Transaction>,
    pub invalid: Vec<InvalidTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotal {
    pub start: String,
    pub end: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentReturn {
    pub amount: f64,
    pub profits: f64,
    pub tax_benefit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsByDate {
    pub start: String,
    pub end: String,
    pub amount: f64,
    pub profits: f64,
    pub tax_benefit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnsReport {
    pub transactions_total_amount: f64,
    pub transactions_total_ceiling: f64,
    pub savings_by_dates: Vec<SavingsByDate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub simulations: u32,
    pub rate_variance: f64,
    pub inflation_variance: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            simulations: 1_000,
            rate_variance: 0.02,
            inflation_variance: 0.015,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileOutcome {
    pub nps: f64,
    pub index: f64,
    pub combined: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileSet {
    pub p10: PercentileOutcome,
    pub p25: PercentileOutcome,
    pub p50: PercentileOutcome,
    pub p75: PercentileOutcome,
    pub p90: PercentileOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MedianProfits {
    pub nps: f64,
    pub index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub simulations: u32,
    pub principal: f64,
    pub percentiles: PercentileSet,
    pub best_case: PercentileOutcome,
    pub worst_case: PercentileOutcome,
    pub median_profits: MedianProfits,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => Grade::APlus,
            80..=89 => Grade::A,
            65..=79 => Grade::B,
            50..=64 => Grade::C,
            35..=49 => Grade::D,
            _ => Grade::F,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub savings_ratio: f64,
    pub years_to_retirement: u32,
    pub projected_corpus_nps: f64,
    pub projected_corpus_index: f64,
    pub required_corpus: f64,
    pub funded_ratio_nps: f64,
    pub funded_ratio_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub score: u32,
    pub grade: Grade,
    pub summary: String,
    pub breakdown: ScoreBreakdown,
    pub recommendation: String,
}
