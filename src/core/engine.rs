use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::datetime::normalize_datetime;
use super::error::CoreResult;
use super::tax::tax_benefit;
use super::temporal::{apply_adjustments, group_by_k_periods, partition_by_k_periods};
use super::transactions::round_currency;
use super::types::{
    Instrument, InstrumentReturn, MedianProfits, PercentileOutcome, PercentileSet, PeriodRules,
    Projection, ReturnsReport, SavingsByDate, Settings, SimulationParams, SimulationReport,
    Transaction,
};

/// Floor applied to jittered instrument rates.
const MIN_SAMPLED_RATE: f64 = 0.001;

/// Compounding horizon: years left until retirement, or a fixed minimum for
/// investors already at or past retirement age.
pub fn investment_years(age: u32, settings: &Settings) -> u32 {
    if age < settings.retirement_age {
        settings.retirement_age - age
    } else {
        settings.min_investment_years
    }
}

pub fn compound_interest(principal: f64, rate: f64, years: u32) -> f64 {
    principal * (1.0 + rate).powi(years as i32)
}

/// Deflates `amount` by `years` of inflation. Non-positive inflation or a
/// zero horizon leaves the amount untouched.
pub fn adjust_for_inflation(amount: f64, inflation: f64, years: u32) -> f64 {
    if inflation <= 0.0 || years == 0 {
        return amount;
    }
    amount / (1.0 + inflation).powi(years as i32)
}

pub fn real_value(principal: f64, rate: f64, inflation: f64, years: u32) -> f64 {
    adjust_for_inflation(compound_interest(principal, rate, years), inflation, years)
}

pub fn nps_return(projection: &Projection, settings: &Settings) -> InstrumentReturn {
    let years = investment_years(projection.age, settings);
    let real = real_value(
        projection.principal,
        settings.nps_rate,
        projection.inflation,
        years,
    );
    InstrumentReturn {
        amount: round_currency(projection.principal),
        profits: round_currency(real - projection.principal),
        tax_benefit: tax_benefit(projection.annual_income, projection.principal, settings),
    }
}

pub fn index_return(projection: &Projection, settings: &Settings) -> InstrumentReturn {
    let years = investment_years(projection.age, settings);
    let real = real_value(
        projection.principal,
        settings.index_rate,
        projection.inflation,
        years,
    );
    InstrumentReturn {
        amount: round_currency(projection.principal),
        profits: round_currency(real - projection.principal),
        tax_benefit: 0.0,
    }
}

pub fn instrument_return(
    instrument: Instrument,
    projection: &Projection,
    settings: &Settings,
) -> InstrumentReturn {
    match instrument {
        Instrument::Nps => nps_return(projection, settings),
        Instrument::Index => index_return(projection, settings),
    }
}

/// Runs the q/p/k pipeline and projects every k-period total with the chosen
/// instrument. Totals cover the transactions that fall inside at least one
/// k period.
pub fn returns_report(
    transactions: &[Transaction],
    rules: &PeriodRules,
    age: u32,
    wage: f64,
    inflation: f64,
    instrument: Instrument,
    settings: &Settings,
) -> CoreResult<ReturnsReport> {
    let adjusted = adjusted_transactions(transactions, rules)?;
    let groups = group_by_k_periods(&adjusted, &rules.k)?;
    let members = partition_by_k_periods(&adjusted, &rules.k)?.valid;

    let annual_income = wage * 12.0;
    let savings_by_dates = groups
        .into_iter()
        .map(|group| {
            let projection = Projection {
                principal: group.amount,
                age,
                annual_income,
                inflation,
            };
            let result = instrument_return(instrument, &projection, settings);
            SavingsByDate {
                start: group.start,
                end: group.end,
                amount: result.amount,
                profits: result.profits,
                tax_benefit: result.tax_benefit,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        ?instrument,
        periods = savings_by_dates.len(),
        members = members.len(),
        "computed returns"
    );
    Ok(ReturnsReport {
        transactions_total_amount: round_currency(members.iter().map(|t| t.amount).sum()),
        transactions_total_ceiling: round_currency(members.iter().map(|t| t.ceiling).sum()),
        savings_by_dates,
    })
}

/// Canonical dates plus q/p adjustments. Every date must parse: a single
/// unreadable date fails the whole projection.
fn adjusted_transactions(
    transactions: &[Transaction],
    rules: &PeriodRules,
) -> CoreResult<Vec<Transaction>> {
    let normalized = transactions
        .iter()
        .map(|txn| {
            let date = normalize_datetime(&txn.date).inspect_err(|_| {
                warn!(date = %txn.date, "rejected transaction with unreadable date");
            })?;
            Ok(Transaction {
                date,
                ..txn.clone()
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;
    apply_adjustments(&normalized, &rules.q, &rules.p)
}

/// Investable principal for simulation and scoring: the largest k-period
/// total, or every adjusted remanent when no k period is given.
pub fn projected_principal(transactions: &[Transaction], rules: &PeriodRules) -> CoreResult<f64> {
    let adjusted = adjusted_transactions(transactions, rules)?;
    if rules.k.is_empty() {
        return Ok(round_currency(adjusted.iter().map(|t| t.remanent).sum()));
    }
    let groups = group_by_k_periods(&adjusted, &rules.k)?;
    Ok(groups
        .iter()
        .map(|group| group.amount)
        .fold(f64::NEG_INFINITY, f64::max))
}

/// Runs the simulation on a request-local generator, seeded when `seed` is
/// given and from the OS otherwise.
pub fn run_simulation(
    projection: &Projection,
    params: &SimulationParams,
    settings: &Settings,
    seed: Option<u64>,
) -> SimulationReport {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    monte_carlo_simulate(projection, params, settings, &mut rng)
}

pub fn monte_carlo_simulate<R: Rng + ?Sized>(
    projection: &Projection,
    params: &SimulationParams,
    settings: &Settings,
    rng: &mut R,
) -> SimulationReport {
    let simulations = params.simulations.max(1);
    let years = investment_years(projection.age, settings);
    let principal = projection.principal;

    let mut nps_results = Vec::with_capacity(simulations as usize);
    let mut index_results = Vec::with_capacity(simulations as usize);
    for _ in 0..simulations {
        let nps_rate = (settings.nps_rate + jitter(rng, params.rate_variance)).max(MIN_SAMPLED_RATE);
        let index_rate =
            (settings.index_rate + jitter(rng, params.rate_variance)).max(MIN_SAMPLED_RATE);
        let inflation = (projection.inflation + jitter(rng, params.inflation_variance)).max(0.0);

        nps_results.push(round_currency(real_value(principal, nps_rate, inflation, years)));
        index_results.push(round_currency(real_value(
            principal, index_rate, inflation, years,
        )));
    }

    nps_results.sort_by(|a, b| a.total_cmp(b));
    index_results.sort_by(|a, b| a.total_cmp(b));

    let outcome = |nps: f64, index: f64| PercentileOutcome {
        nps,
        index,
        combined: round_currency(nps + index),
    };
    let at = |p: f64| outcome(percentile(&nps_results, p), percentile(&index_results, p));

    let last = nps_results.len() - 1;
    let median_nps = percentile(&nps_results, 0.50);
    let median_index = percentile(&index_results, 0.50);

    SimulationReport {
        simulations,
        principal: round_currency(principal),
        percentiles: PercentileSet {
            p10: at(0.10),
            p25: at(0.25),
            p50: at(0.50),
            p75: at(0.75),
            p90: at(0.90),
        },
        best_case: outcome(nps_results[last], index_results[last]),
        worst_case: outcome(nps_results[0], index_results[0]),
        median_profits: MedianProfits {
            nps: round_currency(median_nps - principal),
            index: round_currency(median_index - principal),
        },
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, variance: f64) -> f64 {
    if variance > 0.0 {
        rng.random_range(-variance..=variance)
    } else {
        0.0
    }
}

/// Nearest-rank percentile over an ascending slice: `sorted[floor(n * p)]`,
/// clamped to the last element. No interpolation.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * p).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
