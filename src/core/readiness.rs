use super::engine::{investment_years, real_value};
use super::transactions::round_currency;
use super::types::{Grade, Projection, ScoreBreakdown, ScoreReport, Settings};

const FUNDED_POINTS: f64 = 60.0;
const SAVINGS_POINTS: f64 = 25.0;
const SAVINGS_WEIGHT: f64 = 250.0;
const HORIZON_POINTS: f64 = 15.0;
const FULL_HORIZON_YEARS: f64 = 35.0;
const RETIREMENT_YEARS: f64 = 25.0;
const INCOME_REPLACEMENT: f64 = 0.5;

/// Monthly spending target implied by `annual_income` when none is supplied.
pub fn default_monthly_target(annual_income: f64) -> f64 {
    annual_income * INCOME_REPLACEMENT / 12.0
}

/// Corpus that funds `RETIREMENT_YEARS` of spending at `monthly_target`.
pub fn required_corpus(monthly_target: f64) -> f64 {
    monthly_target * 12.0 * RETIREMENT_YEARS
}

/// Scores retirement readiness on a 0-100 scale.
///
/// Up to 60 points come from the better funded ratio of the two instruments,
/// up to 25 from the savings ratio and up to 15 from the investment horizon.
/// A non-positive `monthly_expense_target` falls back to half of income.
pub fn readiness_score(
    projection: &Projection,
    monthly_expense_target: f64,
    settings: &Settings,
) -> ScoreReport {
    let years = investment_years(projection.age, settings);
    let principal = projection.principal;
    let annual_income = projection.annual_income;

    let corpus_nps = real_value(principal, settings.nps_rate, projection.inflation, years);
    let corpus_index = real_value(principal, settings.index_rate, projection.inflation, years);

    let savings_ratio = if annual_income > 0.0 {
        principal / annual_income
    } else {
        0.0
    };

    let target = if monthly_expense_target > 0.0 {
        monthly_expense_target
    } else {
        default_monthly_target(annual_income)
    };
    let required = required_corpus(target);
    let funded = |corpus: f64| if required > 0.0 { corpus / required } else { 0.0 };
    let funded_nps = funded(corpus_nps);
    let funded_index = funded(corpus_index);

    let funded_score = (funded_nps.max(funded_index) * FUNDED_POINTS).min(FUNDED_POINTS);
    let savings_score = (savings_ratio * SAVINGS_WEIGHT).min(SAVINGS_POINTS);
    let horizon_score = (years as f64 / FULL_HORIZON_YEARS * HORIZON_POINTS).min(HORIZON_POINTS);
    let raw = funded_score + savings_score + horizon_score;
    let score = raw.round_ties_even().clamp(0.0, 100.0) as u32;

    let (summary, recommendation) = narrative(score, years);
    ScoreReport {
        score,
        grade: Grade::from_score(score),
        summary,
        breakdown: ScoreBreakdown {
            savings_ratio: round_currency(savings_ratio),
            years_to_retirement: years,
            projected_corpus_nps: round_currency(corpus_nps),
            projected_corpus_index: round_currency(corpus_index),
            required_corpus: round_currency(required),
            funded_ratio_nps: round_currency(funded_nps),
            funded_ratio_index: round_currency(funded_index),
        },
        recommendation: recommendation.to_string(),
    }
}

fn narrative(score: u32, years: u32) -> (String, &'static str) {
    match score {
        80.. => (
            format!(
                "Excellent! Your micro-savings strategy is projected to build a strong \
                 retirement corpus over {years} years."
            ),
            "Stay the course. Consider increasing expense frequency to boost remanents further.",
        ),
        50..=79 => (
            format!(
                "Moderate readiness. Your current savings will partially fund retirement \
                 over {years} years."
            ),
            "Try to increase your savings rate or start additional SIP investments alongside \
             micro-savings.",
        ),
        _ => (
            format!(
                "Needs attention. Current micro-savings alone may not be sufficient for a \
                 {years}-year investment horizon."
            ),
            "Consider supplementing with voluntary NPS contributions and reducing \
             discretionary expenses.",
        ),
    }
}
