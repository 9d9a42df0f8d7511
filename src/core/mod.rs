mod datetime;
mod engine;
mod error;
mod readiness;
mod tax;
mod temporal;
mod transactions;
mod types;

pub use datetime::{format_datetime, normalize_datetime, parse_datetime};
pub use engine::{
    adjust_for_inflation, compound_interest, index_return, instrument_return, investment_years,
    monte_carlo_simulate, nps_return, projected_principal, real_value, returns_report,
    run_simulation,
};
pub use error::{CoreError, CoreResult};
pub use readiness::{default_monthly_target, readiness_score, required_corpus};
pub use tax::{income_tax, nps_deduction, tax_benefit};
pub use temporal::{
    apply_adjustments, filter_transactions, group_by_k_periods, normalize_dates,
    partition_by_k_periods,
};
pub use transactions::{
    build_transaction, ceiling, parse_expenses, remanent, round_currency, validate_transactions,
};
pub use types::{
    Expense, Grade, Instrument, InstrumentReturn, InvalidTransaction, KPeriod, MedianProfits,
    PPeriod, ParseResult, Partition, PercentileOutcome, PercentileSet, PeriodRules, PeriodTotal,
    Projection, QPeriod, ReturnsReport, SavingsByDate, ScoreBreakdown, ScoreReport, Settings,
    SimulationParams, SimulationReport, Transaction,
};
