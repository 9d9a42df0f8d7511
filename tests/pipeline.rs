use remanent::core::{
    Expense, Grade, Instrument, KPeriod, PPeriod, PeriodRules, Projection, QPeriod, Settings,
    apply_adjustments, group_by_k_periods, index_return, nps_return, parse_expenses,
    projected_principal, readiness_score, returns_report, validate_transactions,
};

fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn expenses() -> Vec<Expense> {
    [
        ("2023-10-12 20:15:00", 250.0),
        ("2023-02-28 15:49:00", 375.0),
        ("2023-07-01 21:59:00", 620.0),
        ("2023-12-17 08:09:00", 480.0),
    ]
    .into_iter()
    .map(|(timestamp, amount)| Expense {
        timestamp: timestamp.to_string(),
        amount,
    })
    .collect()
}

fn rules() -> PeriodRules {
    PeriodRules {
        q: vec![QPeriod {
            fixed: 0.0,
            start: "2023-07-01 00:00:00".to_string(),
            end: "2023-07-31 23:59:00".to_string(),
        }],
        p: vec![PPeriod {
            extra: 25.0,
            start: "2023-10-01 08:00:00".to_string(),
            end: "2023-12-31 19:59:00".to_string(),
        }],
        k: vec![
            KPeriod {
                start: "2023-03-01 00:00:00".to_string(),
                end: "2023-11-30 23:59:00".to_string(),
            },
            KPeriod {
                start: "2023-01-01 00:00:00".to_string(),
                end: "2023-12-31 23:59:00".to_string(),
            },
        ],
    }
}

#[test]
fn expenses_flow_through_rules_into_returns_and_score() {
    let settings = Settings::default();

    let parsed = parse_expenses(&expenses(), &settings).expect("valid expenses");
    let ceilings: Vec<f64> = parsed.transactions.iter().map(|t| t.ceiling).collect();
    assert_eq!(ceilings, vec![300.0, 400.0, 700.0, 500.0]);
    assert_approx(parsed.total_remanent, 175.0);

    let checked = validate_transactions(50_000.0, &parsed.transactions, &settings);
    assert_eq!(checked.valid.len(), 4);
    assert!(checked.invalid.is_empty());

    let rules = rules();
    let adjusted = apply_adjustments(&checked.valid, &rules.q, &rules.p).expect("valid periods");
    let remanents: Vec<f64> = adjusted.iter().map(|t| t.remanent).collect();
    assert_eq!(remanents, vec![75.0, 25.0, 0.0, 45.0]);

    let groups = group_by_k_periods(&adjusted, &rules.k).expect("valid periods");
    assert_approx(groups[0].amount, 75.0);
    assert_approx(groups[1].amount, 145.0);

    let principal = projected_principal(&checked.valid, &rules).expect("valid periods");
    assert_approx(principal, 145.0);

    let projection = Projection {
        principal,
        age: 29,
        annual_income: 600_000.0,
        inflation: 0.055,
    };
    let nps = nps_return(&projection, &settings);
    assert_approx(nps.profits, 86.88);
    assert_approx(nps.tax_benefit, 0.0);
    let index = index_return(&projection, &settings);
    assert_approx(index.profits, 1_684.51);
    assert_approx(index.tax_benefit, 0.0);

    let report = returns_report(
        &checked.valid,
        &rules,
        29,
        50_000.0,
        0.055,
        Instrument::Index,
        &settings,
    )
    .expect("valid periods");
    assert_approx(report.savings_by_dates[1].profits, index.profits);

    let score = readiness_score(&projection, 0.0, &settings);
    assert_eq!(score.breakdown.years_to_retirement, 31);
    assert_eq!(score.score, 13);
    assert_eq!(score.grade, Grade::F);
}
