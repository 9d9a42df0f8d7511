use super::transactions::round_currency;
use super::types::Settings;

/// `(lower, upper, marginal_rate)`; the last slab is open-ended.
const SLABS: [(f64, f64, f64); 5] = [
    (0.0, 700_000.0, 0.00),
    (700_000.0, 1_000_000.0, 0.10),
    (1_000_000.0, 1_200_000.0, 0.15),
    (1_200_000.0, 1_500_000.0, 0.20),
    (1_500_000.0, f64::INFINITY, 0.30),
];

pub fn income_tax(income: f64) -> f64 {
    if income <= 0.0 {
        return 0.0;
    }

    let tax: f64 = SLABS
        .iter()
        .take_while(|(lower, _, _)| income > *lower)
        .map(|(lower, upper, rate)| (income.min(*upper) - lower) * rate)
        .sum();
    round_currency(tax)
}

pub fn nps_deduction(invested: f64, annual_income: f64, settings: &Settings) -> f64 {
    invested
        .min(settings.nps_deduction_percent * annual_income)
        .min(settings.nps_max_deduction)
}

/// Tax saved by deducting the eligible NPS contribution from income.
pub fn tax_benefit(annual_income: f64, invested: f64, settings: &Settings) -> f64 {
    let deduction = nps_deduction(invested, annual_income, settings);
    let without = income_tax(annual_income);
    let with = income_tax(annual_income - deduction);
    round_currency(without - with)
}
