use chrono::NaiveDateTime;
use tracing::debug;

use super::datetime::{format_datetime, normalize_datetime, parse_datetime};
use super::error::CoreResult;
use super::transactions::round_currency;
use super::types::{
    InvalidTransaction, KPeriod, PPeriod, Partition, PeriodTotal, QPeriod, Transaction,
};

const OUTSIDE_ALL_PERIODS: &str = "Transaction date does not fall within any evaluation (k) period";

/// Inclusive `[start, end]` window with parsed bounds.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Window {
    fn parse(start: &str, end: &str) -> CoreResult<Self> {
        Ok(Self {
            start: parse_datetime(start)?,
            end: parse_datetime(end)?,
        })
    }

    fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Applies q overrides then p additions to every transaction's remanent.
///
/// For q, the matching window with the latest start wins and ties go to the
/// earliest-listed period. Every matching p extra is summed and stacked on
/// the post-q value. Transactions whose date cannot be parsed match no
/// period and pass through unchanged; malformed period bounds fail the call.
pub fn apply_adjustments(
    transactions: &[Transaction],
    q_periods: &[QPeriod],
    p_periods: &[PPeriod],
) -> CoreResult<Vec<Transaction>> {
    let q_windows = q_periods
        .iter()
        .map(|q| Window::parse(&q.start, &q.end).map(|window| (window, q.fixed)))
        .collect::<CoreResult<Vec<_>>>()?;
    let p_windows = p_periods
        .iter()
        .map(|p| Window::parse(&p.start, &p.end).map(|window| (window, p.extra)))
        .collect::<CoreResult<Vec<_>>>()?;

    let adjusted = transactions
        .iter()
        .map(|txn| {
            let Ok(at) = parse_datetime(&txn.date) else {
                return txn.clone();
            };
            let base = resolve_override(at, &q_windows).unwrap_or(txn.remanent);
            let extra: f64 = p_windows
                .iter()
                .filter(|(window, _)| window.contains(at))
                .map(|(_, extra)| extra)
                .sum();
            Transaction {
                remanent: round_currency(base + extra),
                ..txn.clone()
            }
        })
        .collect();
    Ok(adjusted)
}

fn resolve_override(at: NaiveDateTime, q_windows: &[(Window, f64)]) -> Option<f64> {
    let mut best: Option<&(Window, f64)> = None;
    for candidate in q_windows.iter().filter(|(window, _)| window.contains(at)) {
        match best {
            Some((winner, _)) if candidate.0.start <= winner.start => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|(_, fixed)| *fixed)
}

/// Sums remanents per k period, in input order. Periods are independent, so a
/// transaction may count toward several of them.
pub fn group_by_k_periods(
    transactions: &[Transaction],
    k_periods: &[KPeriod],
) -> CoreResult<Vec<PeriodTotal>> {
    let dated: Vec<(NaiveDateTime, f64)> = transactions
        .iter()
        .filter_map(|txn| parse_datetime(&txn.date).ok().map(|at| (at, txn.remanent)))
        .collect();

    k_periods
        .iter()
        .map(|k| -> CoreResult<PeriodTotal> {
            let window = Window::parse(&k.start, &k.end)?;
            let total: f64 = dated
                .iter()
                .filter(|(at, _)| window.contains(*at))
                .map(|(_, remanent)| remanent)
                .sum();
            Ok(PeriodTotal {
                start: format_datetime(&window.start),
                end: format_datetime(&window.end),
                amount: round_currency(total),
            })
        })
        .collect()
}

/// Splits transactions into those inside at least one k period and those
/// that are not (or whose date cannot be read).
pub fn partition_by_k_periods(
    transactions: &[Transaction],
    k_periods: &[KPeriod],
) -> CoreResult<Partition> {
    let windows = k_periods
        .iter()
        .map(|k| Window::parse(&k.start, &k.end))
        .collect::<CoreResult<Vec<_>>>()?;

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for txn in transactions {
        match parse_datetime(&txn.date) {
            Err(_) => {
                let message = format!("Invalid date format: {}", txn.date);
                invalid.push(InvalidTransaction::new(txn.clone(), message));
            }
            Ok(at) if windows.iter().any(|w| w.contains(at)) => valid.push(txn.clone()),
            Ok(_) => invalid.push(InvalidTransaction::new(txn.clone(), OUTSIDE_ALL_PERIODS)),
        }
    }
    Ok(Partition { valid, invalid })
}

/// Dates are canonicalised where possible before the q/p rules run.
pub fn normalize_dates(transactions: &[Transaction]) -> Vec<Transaction> {
    transactions
        .iter()
        .map(|txn| match normalize_datetime(&txn.date) {
            Ok(date) => Transaction {
                date,
                ..txn.clone()
            },
            Err(_) => txn.clone(),
        })
        .collect()
}

/// Filter pathway: normalise, adjust with q/p, then partition by k membership.
pub fn filter_transactions(
    transactions: &[Transaction],
    q_periods: &[QPeriod],
    p_periods: &[PPeriod],
    k_periods: &[KPeriod],
) -> CoreResult<Partition> {
    let normalized = normalize_dates(transactions);
    let adjusted = apply_adjustments(&normalized, q_periods, p_periods)?;
    let partition = partition_by_k_periods(&adjusted, k_periods)?;
    debug!(
        valid = partition.valid.len(),
        invalid = partition.invalid.len(),
        "filtered transactions"
    );
    Ok(partition)
}
