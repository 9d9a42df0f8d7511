mod error;
mod telemetry;

use axum::{
    Router,
    extract::{Json, State},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::core::{
    Expense, Instrument, KPeriod, PPeriod, PeriodRules, Projection, QPeriod, Settings,
    SimulationParams, Transaction, filter_transactions, parse_expenses, projected_principal,
    readiness_score, returns_report, run_simulation, validate_transactions,
};

pub use error::{ApiError, ApiJson, ApiResult};
pub use telemetry::{PerformanceReport, RESPONSE_TIME_HEADER, Telemetry, format_clock};

pub const API_PREFIX: &str = "/blackrock/challenge/v1";

const MIN_SIMULATIONS: u32 = 100;
const MAX_SIMULATIONS: u32 = 10_000;
const MAX_VARIANCE: f64 = 0.10;

#[derive(Parser, Debug)]
#[command(
    name = "remanent",
    about = "Retirement micro-savings service: expense round-ups, period rules and projected returns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,
    #[arg(long, env = "APP_PORT", default_value_t = 5477)]
    pub port: u16,
    #[arg(long, env = "NPS_RATE", default_value_t = 0.0711)]
    pub nps_rate: f64,
    #[arg(long, env = "INDEX_RATE", default_value_t = 0.1449)]
    pub index_rate: f64,
    #[arg(
        long,
        env = "DEFAULT_INFLATION",
        default_value_t = 0.055,
        help = "Inflation rate used when a request omits one"
    )]
    pub default_inflation: f64,
    #[arg(long, env = "RETIREMENT_AGE", default_value_t = 60)]
    pub retirement_age: u32,
    #[arg(
        long,
        env = "MIN_INVESTMENT_YEARS",
        default_value_t = 5,
        help = "Horizon used for investors at or past retirement age"
    )]
    pub min_investment_years: u32,
    #[arg(long, env = "MAX_AMOUNT", default_value_t = 500_000.0)]
    pub max_amount: f64,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn settings(&self) -> Result<Settings, String> {
        for (flag, rate) in [
            ("--nps-rate", self.nps_rate),
            ("--index-rate", self.index_rate),
            ("--default-inflation", self.default_inflation),
        ] {
            if !rate.is_finite() || rate <= -1.0 {
                return Err(format!("{flag} must be a finite rate > -1"));
            }
        }
        if self.retirement_age == 0 {
            return Err("--retirement-age must be > 0".to_string());
        }
        if !self.max_amount.is_finite() || self.max_amount <= 0.0 {
            return Err("--max-amount must be > 0".to_string());
        }

        Ok(Settings {
            nps_rate: self.nps_rate,
            index_rate: self.index_rate,
            default_inflation: self.default_inflation,
            retirement_age: self.retirement_age,
            min_investment_years: self.min_investment_years,
            max_amount: self.max_amount,
            ..Settings::default()
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AppState {
    pub settings: Settings,
    pub port: u16,
}

/// Transaction as accepted over the wire: `date` or its alias `timestamp`.
#[derive(Debug, Deserialize)]
struct TransactionPayload {
    date: Option<String>,
    timestamp: Option<String>,
    amount: f64,
    ceiling: f64,
    remanent: f64,
}

impl TransactionPayload {
    fn into_transaction(self) -> ApiResult<Transaction> {
        let date = self.date.or(self.timestamp).ok_or_else(|| {
            ApiError::BadRequest("Either 'date' or 'timestamp' must be provided".to_string())
        })?;
        Ok(Transaction {
            date,
            amount: self.amount,
            ceiling: self.ceiling,
            remanent: self.remanent,
        })
    }
}

fn into_transactions(payloads: Vec<TransactionPayload>) -> ApiResult<Vec<Transaction>> {
    payloads
        .into_iter()
        .map(TransactionPayload::into_transaction)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ParsePayload {
    expenses: Vec<Expense>,
}

#[derive(Debug, Deserialize)]
struct ValidatorPayload {
    wage: f64,
    transactions: Vec<TransactionPayload>,
}

#[derive(Debug, Deserialize)]
struct FilterPayload {
    #[serde(default)]
    q: Vec<QPeriod>,
    #[serde(default)]
    p: Vec<PPeriod>,
    #[serde(default)]
    k: Vec<KPeriod>,
    transactions: Vec<TransactionPayload>,
}

/// Fields shared by the returns, simulate and score requests.
#[derive(Debug, Deserialize)]
struct InvestorPayload {
    age: i64,
    wage: f64,
    inflation: Option<f64>,
    #[serde(default)]
    q: Vec<QPeriod>,
    #[serde(default)]
    p: Vec<PPeriod>,
    #[serde(default)]
    k: Vec<KPeriod>,
    #[serde(default)]
    transactions: Vec<TransactionPayload>,
}

#[derive(Debug)]
struct InvestorRequest {
    age: u32,
    wage: f64,
    inflation: f64,
    rules: PeriodRules,
    transactions: Vec<Transaction>,
}

impl InvestorPayload {
    fn into_request(self, settings: &Settings) -> ApiResult<InvestorRequest> {
        let age = u32::try_from(self.age)
            .ok()
            .filter(|age| *age >= 1)
            .ok_or_else(|| ApiError::validation("age", "must be >= 1"))?;
        if self.wage <= 0.0 {
            return Err(ApiError::validation("wage", "must be > 0"));
        }
        let inflation = self.inflation.unwrap_or(settings.default_inflation);
        if inflation < 0.0 {
            return Err(ApiError::validation("inflation", "must be >= 0"));
        }

        Ok(InvestorRequest {
            age,
            wage: self.wage,
            inflation,
            rules: PeriodRules {
                q: self.q,
                p: self.p,
                k: self.k,
            },
            transactions: into_transactions(self.transactions)?,
        })
    }
}

impl InvestorRequest {
    fn projection(&self) -> ApiResult<Projection> {
        Ok(Projection {
            principal: projected_principal(&self.transactions, &self.rules)?,
            age: self.age,
            annual_income: self.wage * 12.0,
            inflation: self.inflation,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(flatten)]
    investor: InvestorPayload,
    simulations: Option<u32>,
    rate_variance: Option<f64>,
    inflation_variance: Option<f64>,
    seed: Option<u64>,
}

impl SimulatePayload {
    fn params(&self) -> ApiResult<SimulationParams> {
        let defaults = SimulationParams::default();
        let simulations = self.simulations.unwrap_or(defaults.simulations);
        if !(MIN_SIMULATIONS..=MAX_SIMULATIONS).contains(&simulations) {
            return Err(ApiError::validation(
                "simulations",
                format!("must be between {MIN_SIMULATIONS} and {MAX_SIMULATIONS}"),
            ));
        }
        let rate_variance = self.rate_variance.unwrap_or(defaults.rate_variance);
        if !(0.0..=MAX_VARIANCE).contains(&rate_variance) {
            return Err(ApiError::validation(
                "rateVariance",
                format!("must be between 0 and {MAX_VARIANCE}"),
            ));
        }
        let inflation_variance = self
            .inflation_variance
            .unwrap_or(defaults.inflation_variance);
        if !(0.0..=MAX_VARIANCE).contains(&inflation_variance) {
            return Err(ApiError::validation(
                "inflationVariance",
                format!("must be between 0 and {MAX_VARIANCE}"),
            ));
        }

        Ok(SimulationParams {
            simulations,
            rate_variance,
            inflation_variance,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScorePayload {
    #[serde(flatten)]
    investor: InvestorPayload,
    #[serde(default)]
    monthly_expense_target: f64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    port: u16,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/transactions:parse", post(parse_handler))
        .route("/transactions:validator", post(validator_handler))
        .route("/transactions:filter", post(filter_handler))
        .route("/returns:nps", post(nps_handler))
        .route("/returns:index", post(index_handler))
        .route("/returns:simulate", post(simulate_handler))
        .route("/returns:score", post(score_handler))
        .route("/performance", get(performance_handler))
        .method_not_allowed_fallback(method_not_allowed_handler);

    Router::new()
        .route("/health", get(health_handler))
        .method_not_allowed_fallback(method_not_allowed_handler)
        .nest(API_PREFIX, api)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(telemetry::record_timing))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn run_http_server(addr: SocketAddr, settings: Settings) -> std::io::Result<()> {
    Telemetry::init();
    let app = router(AppState {
        settings,
        port: addr.port(),
    });

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "remanent HTTP API listening");
    info!("Local access: http://127.0.0.1:{}/health", addr.port());

    axum::serve(listener, app).await
}

async fn health_handler(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            port: state.port,
        },
    )
}

async fn performance_handler() -> Response {
    let threads = tokio::runtime::Handle::current().metrics().num_workers();
    json_response(StatusCode::OK, Telemetry::global().report(threads))
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed_handler() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn parse_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ParsePayload>,
) -> ApiResult<Response> {
    let result = parse_expenses(&payload.expenses, &state.settings)?;
    info!(
        transactions = result.transactions.len(),
        total_remanent = result.total_remanent,
        "parsed expenses"
    );
    Ok(json_response(StatusCode::OK, result))
}

async fn validator_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ValidatorPayload>,
) -> ApiResult<Response> {
    let transactions = into_transactions(payload.transactions)?;
    let partition = validate_transactions(payload.wage, &transactions, &state.settings);
    if !partition.invalid.is_empty() {
        warn!(
            invalid = partition.invalid.len(),
            "validator rejected transactions"
        );
    }
    Ok(json_response(StatusCode::OK, partition))
}

async fn filter_handler(ApiJson(payload): ApiJson<FilterPayload>) -> ApiResult<Response> {
    let transactions = into_transactions(payload.transactions)?;
    let partition = filter_transactions(&transactions, &payload.q, &payload.p, &payload.k)?;
    if !partition.invalid.is_empty() {
        warn!(
            invalid = partition.invalid.len(),
            "filter rejected transactions"
        );
    }
    Ok(json_response(StatusCode::OK, partition))
}

async fn nps_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<InvestorPayload>,
) -> ApiResult<Response> {
    returns_response(&state.settings, payload, Instrument::Nps)
}

async fn index_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<InvestorPayload>,
) -> ApiResult<Response> {
    returns_response(&state.settings, payload, Instrument::Index)
}

fn returns_response(
    settings: &Settings,
    payload: InvestorPayload,
    instrument: Instrument,
) -> ApiResult<Response> {
    let request = payload.into_request(settings)?;
    let report = returns_report(
        &request.transactions,
        &request.rules,
        request.age,
        request.wage,
        request.inflation,
        instrument,
        settings,
    )?;
    info!(
        ?instrument,
        periods = report.savings_by_dates.len(),
        "computed returns"
    );
    Ok(json_response(StatusCode::OK, report))
}

async fn simulate_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SimulatePayload>,
) -> ApiResult<Response> {
    let params = payload.params()?;
    let seed = payload.seed;
    let settings = state.settings;
    let projection = payload.investor.into_request(&settings)?.projection()?;

    let report =
        tokio::task::spawn_blocking(move || run_simulation(&projection, &params, &settings, seed))
            .await
            .map_err(|_| ApiError::Internal)?;
    info!(
        simulations = report.simulations,
        principal = report.principal,
        "simulation finished"
    );
    Ok(json_response(StatusCode::OK, report))
}

async fn score_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ScorePayload>,
) -> ApiResult<Response> {
    if payload.monthly_expense_target < 0.0 {
        return Err(ApiError::validation("monthlyExpenseTarget", "must be >= 0"));
    }
    let projection = payload
        .investor
        .into_request(&state.settings)?
        .projection()?;
    let report = readiness_score(&projection, payload.monthly_expense_target, &state.settings);
    info!(score = report.score, grade = ?report.grade, "scored readiness");
    Ok(json_response(StatusCode::OK, report))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
