use std::collections::HashSet;

use tracing::debug;

use super::datetime::normalize_datetime;
use super::error::{CoreError, CoreResult};
use super::types::{Expense, InvalidTransaction, ParseResult, Partition, Settings, Transaction};

const REL_TOLERANCE: f64 = 1e-9;

/// Rounds a monetary value to two decimal places, exact halves to even.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Smallest multiple of `multiple` that is >= `amount`; zero for non-positive
/// amounts.
pub fn ceiling(amount: f64, multiple: f64) -> f64 {
    if amount <= 0.0 || multiple <= 0.0 {
        return 0.0;
    }
    (amount / multiple).ceil() * multiple
}

pub fn remanent(amount: f64, ceiling: f64) -> f64 {
    round_currency(ceiling - amount)
}

pub fn build_transaction(expense: &Expense, settings: &Settings) -> CoreResult<Transaction> {
    let date = normalize_datetime(&expense.timestamp)?;
    let ceil = ceiling(expense.amount, settings.rounding_multiple);
    Ok(Transaction {
        date,
        amount: round_currency(expense.amount),
        ceiling: round_currency(ceil),
        remanent: remanent(expense.amount, ceil),
    })
}

/// Enriches every expense and totals the batch. A single unparsable timestamp
/// fails the whole batch.
pub fn parse_expenses(expenses: &[Expense], settings: &Settings) -> CoreResult<ParseResult> {
    let transactions = expenses
        .iter()
        .map(|expense| build_transaction(expense, settings))
        .collect::<CoreResult<Vec<_>>>()?;

    let total_expense = round_currency(transactions.iter().map(|t| t.amount).sum());
    let total_ceiling = round_currency(transactions.iter().map(|t| t.ceiling).sum());
    let total_remanent = round_currency(transactions.iter().map(|t| t.remanent).sum());
    debug!(count = transactions.len(), total_remanent, "parsed expenses");

    Ok(ParseResult {
        transactions,
        total_expense,
        total_ceiling,
        total_remanent,
    })
}

fn is_close(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

/// Checks each transaction against integrity and business rules, collecting
/// every failing reason. Later repeats of an already-seen date are flagged as
/// duplicates.
pub fn validate_transactions(
    wage: f64,
    transactions: &[Transaction],
    settings: &Settings,
) -> Partition {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    let mut seen_dates: HashSet<String> = HashSet::new();

    for txn in transactions {
        let mut errors: Vec<CoreError> = Vec::new();
        let mut checked = txn.clone();

        match normalize_datetime(&txn.date) {
            Ok(date) => checked.date = date,
            Err(e) => errors.push(CoreError::Validation(format!("Invalid date format: {e}"))),
        }

        if checked.amount <= 0.0 {
            errors.push(CoreError::Validation(format!(
                "Amount must be positive, got {}",
                checked.amount
            )));
        }
        if checked.amount >= settings.max_amount {
            errors.push(CoreError::Validation(format!(
                "Amount {} exceeds maximum {}",
                checked.amount, settings.max_amount
            )));
        }

        let expected_ceiling = ceiling(checked.amount, settings.rounding_multiple);
        if !is_close(checked.ceiling, expected_ceiling) {
            errors.push(CoreError::Validation(format!(
                "Ceiling mismatch: got {}, expected {}",
                checked.ceiling, expected_ceiling
            )));
        }

        let expected_remanent = remanent(checked.amount, checked.ceiling);
        if !is_close(checked.remanent, expected_remanent) {
            errors.push(CoreError::Validation(format!(
                "Remanent mismatch: got {}, expected {}",
                checked.remanent, expected_remanent
            )));
        }

        if checked.amount > wage {
            errors.push(CoreError::Validation(format!(
                "Amount {} exceeds monthly wage {}",
                checked.amount, wage
            )));
        }

        if !seen_dates.insert(checked.date.clone()) {
            errors.push(CoreError::Validation(format!(
                "Duplicate transaction date: {}",
                checked.date
            )));
        }

        if errors.is_empty() {
            valid.push(checked);
        } else {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            invalid.push(InvalidTransaction::new(checked, message));
        }
    }

    debug!(
        valid = valid.len(),
        invalid = invalid.len(),
        "validated transactions"
    );
    Partition { valid, invalid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CoreError;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn txn(date: &str, amount: f64, ceiling: f64, remanent: f64) -> Transaction {
        Transaction {
            date: date.to_string(),
            amount,
            ceiling,
            remanent,
        }
    }

    fn expense(timestamp: &str, amount: f64) -> Expense {
        Expense {
            timestamp: timestamp.to_string(),
            amount,
        }
    }

    #[test]
    fn ceiling_rounds_up_to_next_hundred() {
        assert_approx(ceiling(250.0, 100.0), 300.0);
        assert_approx(ceiling(1.0, 100.0), 100.0);
        assert_approx(ceiling(100.01, 100.0), 200.0);
    }

    #[test]
    fn exact_multiples_map_to_themselves() {
        assert_approx(ceiling(300.0, 100.0), 300.0);
        assert_approx(remanent(300.0, 300.0), 0.0);
    }

    #[test]
    fn non_positive_amounts_have_zero_ceiling() {
        assert_approx(ceiling(0.0, 100.0), 0.0);
        assert_approx(ceiling(-50.0, 100.0), 0.0);
    }

    #[test]
    fn remanent_is_rounded_to_cents() {
        assert_approx(remanent(123.456, 200.0), 76.54);
    }

    #[test]
    fn exact_half_cents_round_to_even() {
        assert_approx(round_currency(0.125), 0.12);
        assert_approx(round_currency(0.375), 0.38);
        assert_approx(remanent(99.875, 100.0), 0.12);
    }

    #[test]
    fn build_transaction_normalizes_and_enriches() {
        let t = build_transaction(&expense("2023-10-12T20:15", 250.0), &Settings::default())
            .expect("valid expense");
        assert_eq!(t.date, "2023-10-12 20:15:00");
        assert_approx(t.amount, 250.0);
        assert_approx(t.ceiling, 300.0);
        assert_approx(t.remanent, 50.0);
    }

    #[test]
    fn parse_expenses_totals_the_batch() {
        let expenses = vec![
            expense("2023-10-12 20:15:00", 250.0),
            expense("2023-02-28 15:49:00", 375.0),
            expense("2023-07-01 21:59:00", 620.0),
            expense("2023-12-17 08:09:00", 480.0),
        ];
        let parsed = parse_expenses(&expenses, &Settings::default()).expect("valid batch");
        let ceilings: Vec<f64> = parsed.transactions.iter().map(|t| t.ceiling).collect();
        let remanents: Vec<f64> = parsed.transactions.iter().map(|t| t.remanent).collect();
        assert_eq!(ceilings, vec![300.0, 400.0, 700.0, 500.0]);
        assert_eq!(remanents, vec![50.0, 25.0, 80.0, 20.0]);
        assert_approx(parsed.total_expense, 1725.0);
        assert_approx(parsed.total_ceiling, 1900.0);
        assert_approx(parsed.total_remanent, 175.0);
    }

    #[test]
    fn parse_expenses_of_empty_batch_is_all_zero() {
        let parsed = parse_expenses(&[], &Settings::default()).expect("empty batch");
        assert!(parsed.transactions.is_empty());
        assert_approx(parsed.total_expense, 0.0);
        assert_approx(parsed.total_remanent, 0.0);
    }

    #[test]
    fn parse_expenses_propagates_format_error() {
        let expenses = vec![
            expense("2023-10-12 20:15:00", 250.0),
            expense("12/10/2023", 375.0),
        ];
        let err = parse_expenses(&expenses, &Settings::default()).expect_err("bad timestamp");
        assert_eq!(err, CoreError::format("12/10/2023"));
    }

    #[test]
    fn validate_accepts_consistent_transactions() {
        let txns = vec![
            txn("2023-10-12 20:15:00", 250.0, 300.0, 50.0),
            txn("2023-02-28T15:49", 375.0, 400.0, 25.0),
        ];
        let out = validate_transactions(50_000.0, &txns, &Settings::default());
        assert_eq!(out.valid.len(), 2);
        assert!(out.invalid.is_empty());
        assert_eq!(out.valid[1].date, "2023-02-28 15:49:00");
    }

    #[test]
    fn validate_flags_repeats_but_keeps_first_occurrence() {
        let txns = vec![
            txn("2023-10-12 20:15:00", 250.0, 300.0, 50.0),
            txn("2023-10-12 20:15", 150.0, 200.0, 50.0),
            txn("2023-10-12T20:15:00", 350.0, 400.0, 50.0),
        ];
        let out = validate_transactions(50_000.0, &txns, &Settings::default());
        assert_eq!(out.valid.len(), 1);
        assert_approx(out.valid[0].amount, 250.0);
        assert_eq!(out.invalid.len(), 2);
        for bad in &out.invalid {
            assert_eq!(
                bad.message,
                "Duplicate transaction date: 2023-10-12 20:15:00"
            );
        }
    }

    #[test]
    fn validate_accumulates_every_failing_reason() {
        let txns = vec![txn("2023-10-12 20:15:00", 600_000.0, 500.0, 3.0)];
        let out = validate_transactions(50_000.0, &txns, &Settings::default());
        assert!(out.valid.is_empty());
        let message = &out.invalid[0].message;
        assert!(message.contains("exceeds maximum"), "{message}");
        assert!(message.contains("Ceiling mismatch"), "{message}");
        assert!(message.contains("Remanent mismatch"), "{message}");
        assert!(message.contains("exceeds monthly wage"), "{message}");
        assert_eq!(message.matches("; ").count(), 3);
    }

    #[test]
    fn validate_reports_bad_dates_without_aborting_batch() {
        let txns = vec![
            txn("yesterday", 250.0, 300.0, 50.0),
            txn("2023-10-12 20:15:00", 250.0, 300.0, 50.0),
        ];
        let out = validate_transactions(50_000.0, &txns, &Settings::default());
        assert_eq!(out.valid.len(), 1);
        assert_eq!(out.invalid.len(), 1);
        assert!(out.invalid[0].message.starts_with("Invalid date format:"));
        assert!(out.invalid[0].message.contains("yesterday"));
        assert_eq!(out.invalid[0].date, "yesterday");
    }

    #[test]
    fn validate_rejects_non_positive_amounts() {
        let txns = vec![txn("2023-10-12 20:15:00", 0.0, 0.0, 0.0)];
        let out = validate_transactions(50_000.0, &txns, &Settings::default());
        assert_eq!(out.invalid[0].message, "Amount must be positive, got 0");
    }

    proptest! {
        #[test]
        fn prop_ceiling_bounds_amount_and_is_a_multiple(amount in 0.01f64..499_999.99) {
            let c = ceiling(amount, 100.0);
            prop_assert!(c >= amount);
            prop_assert!(c % 100.0 == 0.0);
            prop_assert!(remanent(amount, c) >= 0.0);
            prop_assert!(c - amount < 100.0);
        }
    }
}
