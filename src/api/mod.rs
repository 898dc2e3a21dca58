use axum::{
    Router,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    BatchEntry, BatchOutcome, CashAccrualTiming, ColumnSpec, DiscountMethod, EconLimitCriteria,
    EvaluationOptions, ReportingPeriod, TaxBracketTable, WellInputs, column_registry, evaluate,
    evaluate_batch, validate_options,
};

const DEFAULT_BATCH_TIMEOUT_MS: u64 = 300_000;

#[derive(Parser, Debug)]
#[command(name = "welleco", about = "Monthly oil and gas well economics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Evaluate the wells in a JSON file (one object or an array) and print JSON.
    Evaluate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, help = "TOML file overriding the default evaluation options")]
        options: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputKind::Full)]
        output: OutputKind,
    },
    /// Print the output column registry as JSON.
    Columns,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputKind {
    Full,
    Summary,
    Report,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiReportingPeriod {
    Monthly,
    #[serde(alias = "calendar_year", alias = "calendarYear")]
    Calendar,
    #[serde(alias = "fiscal_year", alias = "fiscalYear")]
    Fiscal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiEconLimitCriteria {
    #[serde(alias = "no_cut", alias = "noCut")]
    NoCut,
    #[serde(alias = "max_cumulative_cash_flow", alias = "maxCumulativeCashFlow")]
    MaxCumulativeCashFlow,
    #[serde(alias = "first_negative_cash_flow", alias = "firstNegativeCashFlow")]
    FirstNegativeCashFlow,
    #[serde(alias = "last_positive_cash_flow", alias = "lastPositiveCashFlow")]
    LastPositiveCashFlow,
}

impl From<ApiEconLimitCriteria> for EconLimitCriteria {
    fn from(value: ApiEconLimitCriteria) -> Self {
        match value {
            ApiEconLimitCriteria::NoCut => EconLimitCriteria::NoCut,
            ApiEconLimitCriteria::MaxCumulativeCashFlow => EconLimitCriteria::MaxCumulativeCashFlow,
            ApiEconLimitCriteria::FirstNegativeCashFlow => EconLimitCriteria::FirstNegativeCashFlow,
            ApiEconLimitCriteria::LastPositiveCashFlow => EconLimitCriteria::LastPositiveCashFlow,
        }
    }
}

/// Partial evaluation options. Every field left out keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsOverride {
    first_discount: Option<f64>,
    second_discount: Option<f64>,
    discount_rates: Option<Vec<f64>>,
    discount_method: Option<DiscountMethod>,
    cash_accrual_time: Option<CashAccrualTiming>,
    gas_mcf_per_boe: Option<f64>,
    ngl_bbl_per_boe: Option<f64>,
    drip_condensate_bbl_per_boe: Option<f64>,
    income_tax: Option<bool>,
    fifteen_percent_depletion: Option<bool>,
    carry_forward: Option<bool>,
    federal_deducts_state_tax: Option<bool>,
    state_tax: Option<TaxBracketTable>,
    federal_tax: Option<TaxBracketTable>,
    econ_limit_criteria: Option<ApiEconLimitCriteria>,
    econ_limit_threshold: Option<f64>,
    econ_limit_include_capex: Option<bool>,
    min_life_months: Option<usize>,
    reporting_period: Option<ApiReportingPeriod>,
    fiscal_year_start_month: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EvaluatePayload {
    well: WellInputs,
    #[serde(default)]
    options: OptionsOverride,
}

#[derive(Debug, Deserialize)]
struct BatchPayload {
    wells: Vec<WellInputs>,
    #[serde(default)]
    options: OptionsOverride,
    timeout_ms: Option<u64>,
}

#[derive(Debug)]
struct EvaluateRequest {
    well: WellInputs,
    options: EvaluationOptions,
}

#[derive(Debug)]
struct BatchRequest {
    wells: Vec<WellInputs>,
    options: EvaluationOptions,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    evaluated: usize,
    failed: usize,
    wells: Vec<BatchOutcome>,
}

impl From<Vec<BatchOutcome>> for BatchResponse {
    fn from(wells: Vec<BatchOutcome>) -> Self {
        let failed = wells
            .iter()
            .filter(|w| matches!(w.outcome, BatchEntry::Failed { .. }))
            .count();
        Self {
            evaluated: wells.len() - failed,
            failed,
            wells,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_options(overrides: OptionsOverride) -> Result<EvaluationOptions, String> {
    let mut options = EvaluationOptions::default();

    if let Some(v) = overrides.first_discount {
        options.discount.first_discount = v;
    }
    if let Some(v) = overrides.second_discount {
        options.discount.second_discount = v;
    }
    if let Some(v) = overrides.discount_rates {
        options.discount.rates = v;
    }
    if let Some(v) = overrides.discount_method {
        options.discount.method = v;
    }
    if let Some(v) = overrides.cash_accrual_time {
        options.discount.cash_accrual_time = v;
    }
    if let Some(v) = overrides.gas_mcf_per_boe {
        options.boe.gas_mcf_per_boe = v;
    }
    if let Some(v) = overrides.ngl_bbl_per_boe {
        options.boe.ngl_bbl_per_boe = v;
    }
    if let Some(v) = overrides.drip_condensate_bbl_per_boe {
        options.boe.drip_condensate_bbl_per_boe = v;
    }
    if let Some(v) = overrides.income_tax {
        options.income_tax.enabled = v;
    }
    if let Some(v) = overrides.fifteen_percent_depletion {
        options.income_tax.fifteen_percent_depletion = v;
    }
    if let Some(v) = overrides.carry_forward {
        options.income_tax.carry_forward = v;
    }
    if let Some(v) = overrides.federal_deducts_state_tax {
        options.income_tax.federal_deducts_state_tax = v;
    }
    if let Some(v) = overrides.state_tax {
        options.income_tax.state = v;
    }
    if let Some(v) = overrides.federal_tax {
        options.income_tax.federal = v;
    }
    if let Some(v) = overrides.econ_limit_criteria {
        options.econ_limit.criteria = v.into();
    }
    if let Some(v) = overrides.econ_limit_threshold {
        options.econ_limit.threshold = v;
    }
    if let Some(v) = overrides.econ_limit_include_capex {
        options.econ_limit.include_capex = v;
    }
    if let Some(v) = overrides.min_life_months {
        options.econ_limit.min_life_months = v;
    }

    options.reporting = match (overrides.reporting_period, overrides.fiscal_year_start_month) {
        (Some(ApiReportingPeriod::Monthly), _) => ReportingPeriod::Monthly,
        (Some(ApiReportingPeriod::Calendar), _) => ReportingPeriod::Calendar,
        (Some(ApiReportingPeriod::Fiscal), Some(start_month)) => {
            ReportingPeriod::Fiscal { start_month }
        }
        (Some(ApiReportingPeriod::Fiscal), None) => {
            return Err("fiscal_year_start_month is required for fiscal reporting".to_string());
        }
        (None, Some(start_month)) => ReportingPeriod::Fiscal { start_month },
        (None, None) => options.reporting,
    };

    validate_options(&options).map_err(|e| e.to_string())?;
    Ok(options)
}

pub fn options_from_toml(contents: &str) -> Result<EvaluationOptions, String> {
    let overrides: OptionsOverride =
        toml::from_str(contents).map_err(|e| format!("Invalid options file: {e}"))?;
    build_options(overrides)
}

fn evaluate_request_from_json(json: &str) -> Result<EvaluateRequest, String> {
    let payload = serde_json::from_str::<EvaluatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(EvaluateRequest {
        well: payload.well,
        options: build_options(payload.options)?,
    })
}

fn batch_request_from_json(json: &str) -> Result<BatchRequest, String> {
    let payload = serde_json::from_str::<BatchPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    let timeout_ms = payload.timeout_ms.unwrap_or(DEFAULT_BATCH_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err("timeout_ms must be > 0".to_string());
    }
    Ok(BatchRequest {
        wells: payload.wells,
        options: build_options(payload.options)?,
        timeout: Duration::from_millis(timeout_ms),
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/evaluate", post(evaluate_handler))
        .route("/api/batch", post(batch_handler))
        .route("/api/columns", get(columns_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "well economics HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn columns_handler() -> Response {
    json_response(StatusCode::OK, column_registry())
}

async fn evaluate_handler(body: String) -> Response {
    let request = match evaluate_request_from_json(&body) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let task = tokio::task::spawn_blocking(move || evaluate(&request.well, &request.options));
    match task.await {
        Ok(Ok(result)) => json_response(StatusCode::OK, result),
        Ok(Err(err)) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("evaluation task failed: {err}"),
        ),
    }
}

async fn batch_handler(body: String) -> Response {
    let request = match batch_request_from_json(&body) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let timeout = request.timeout;
    let wells = request.wells.len();
    let task = tokio::task::spawn_blocking(move || {
        evaluate_batch(&request.wells, &request.options, &flag)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(outcomes)) => json_response(StatusCode::OK, BatchResponse::from(outcomes)),
        Ok(Err(err)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("batch task failed: {err}"),
        ),
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            warn!(wells, timeout_ms = timeout.as_millis() as u64, "batch evaluation timed out");
            error_response(StatusCode::GATEWAY_TIMEOUT, "batch evaluation timed out")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("cannot serialize output: {e}"))
}

fn evaluate_file(
    input: &Path,
    options: Option<&Path>,
    output: OutputKind,
) -> Result<String, String> {
    let options = match options {
        Some(path) => options_from_toml(&read_file(path)?)?,
        None => EvaluationOptions::default(),
    };
    let raw: serde_json::Value = serde_json::from_str(&read_file(input)?)
        .map_err(|e| format!("Invalid input JSON: {e}"))?;

    if raw.is_array() {
        let wells: Vec<WellInputs> =
            serde_json::from_value(raw).map_err(|e| format!("Invalid well inputs: {e}"))?;
        let outcomes = evaluate_batch(&wells, &options, &AtomicBool::new(false));
        return match output {
            OutputKind::Full => to_json(&BatchResponse::from(outcomes)),
            OutputKind::Summary | OutputKind::Report => {
                let rows: Vec<serde_json::Value> = outcomes
                    .iter()
                    .map(|o| match &o.outcome {
                        BatchEntry::Ok { result } if output == OutputKind::Summary => {
                            serde_json::json!(result.summary.one_liner())
                        }
                        BatchEntry::Ok { result } => serde_json::json!({
                            "well_id": o.well_id,
                            "report": result.report,
                        }),
                        BatchEntry::Failed { error } => serde_json::json!({
                            "well_id": o.well_id,
                            "error": error,
                        }),
                    })
                    .collect();
                to_json(&rows)
            }
        };
    }

    let well: WellInputs =
        serde_json::from_value(raw).map_err(|e| format!("Invalid well inputs: {e}"))?;
    let result = evaluate(&well, &options).map_err(|e| e.to_string())?;
    match output {
        OutputKind::Full => to_json(&result),
        OutputKind::Summary => to_json(&result.summary.one_liner()),
        OutputKind::Report => to_json(&result.report),
    }
}

fn columns_json() -> Result<String, String> {
    let columns: &[ColumnSpec] = column_registry();
    to_json(&columns)
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Evaluate {
            input,
            options,
            output,
        } => {
            let json = evaluate_file(&input, options.as_deref(), output)?;
            println!("{json}");
            Ok(())
        }
        Command::Columns => {
            println!("{}", columns_json()?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    const WELL_JSON: &str = r#"{
        "well_id": "api-1",
        "as_of_date": "2024-01-01",
        "first_production_date": "2024-01-01",
        "forecast": { "oil": [100, 90, 80, 70] },
        "pricing": { "oil": { "price": 75.0 } },
        "ownership": {
            "initial": { "working_interest": 1.0, "net_revenue_interest": 0.8 }
        },
        "expenses": {
            "fixed": [{ "category": "well_cost", "monthly_cost": 500.0 }]
        },
        "capex": [{
            "category": "drilling",
            "tangible": 10000.0,
            "timing": { "type": "offset_to_as_of", "months": 0 }
        }]
    }"#;

    fn evaluate_body(options: &str) -> String {
        format!(r#"{{ "well": {WELL_JSON}, "options": {options} }}"#)
    }

    #[test]
    fn evaluate_request_applies_option_overrides() {
        let body = evaluate_body(
            r#"{
                "first_discount": 0.08,
                "discount_rates": [0.0, 0.1],
                "econ_limit_criteria": "noCut",
                "income_tax": true,
                "reporting_period": "fiscal",
                "fiscal_year_start_month": 10
            }"#,
        );
        let request = evaluate_request_from_json(&body).expect("valid payload");

        assert_eq!(request.well.well_id, "api-1");
        assert_approx(request.options.discount.first_discount, 0.08);
        assert_approx(request.options.discount.second_discount, 0.15);
        assert_eq!(request.options.discount.rates, vec![0.0, 0.1]);
        assert_eq!(request.options.econ_limit.criteria, EconLimitCriteria::NoCut);
        assert!(request.options.income_tax.enabled);
        assert_eq!(
            request.options.reporting,
            ReportingPeriod::Fiscal { start_month: 10 }
        );
    }

    #[test]
    fn missing_options_keep_defaults() {
        let body = format!(r#"{{ "well": {WELL_JSON} }}"#);
        let request = evaluate_request_from_json(&body).expect("valid payload");
        assert_eq!(request.options, EvaluationOptions::default());
    }

    #[test]
    fn invalid_options_are_rejected_with_messages() {
        let err = evaluate_request_from_json(&evaluate_body(r#"{ "gas_mcf_per_boe": 0.0 }"#))
            .expect_err("must reject zero boe factor");
        assert!(err.contains("gas_mcf_per_boe"));

        let err = evaluate_request_from_json(&evaluate_body(r#"{ "reporting_period": "fiscal" }"#))
            .expect_err("fiscal reporting needs a start month");
        assert!(err.contains("fiscal_year_start_month"));

        let err = evaluate_request_from_json(&evaluate_body(r#"{ "fiscal_year_start_month": 13 }"#))
            .expect_err("month out of range");
        assert!(err.contains("1-12"));

        let rates = format!("{:?}", vec![0.1; 17]);
        let err = evaluate_request_from_json(&evaluate_body(&format!(
            r#"{{ "discount_rates": {rates} }}"#
        )))
        .expect_err("too many rates");
        assert!(err.contains("at most 16"));

        let err = evaluate_request_from_json(&evaluate_body(r#"{ "bogus": 1 }"#))
            .expect_err("unknown option key");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn batch_request_defaults_timeout() {
        let body = format!(r#"{{ "wells": [{WELL_JSON}, {WELL_JSON}] }}"#);
        let request = batch_request_from_json(&body).expect("valid payload");
        assert_eq!(request.wells.len(), 2);
        assert_eq!(request.timeout, Duration::from_millis(DEFAULT_BATCH_TIMEOUT_MS));

        let body = r#"{ "wells": [], "timeout_ms": 0 }"#;
        let err = batch_request_from_json(body).expect_err("zero timeout");
        assert!(err.contains("timeout_ms"));
    }

    #[test]
    fn options_file_parses_toml_overrides() {
        let options = options_from_toml(
            r#"
            second_discount = 0.2
            econ_limit_criteria = "first-negative-cash-flow"
            reporting_period = "monthly"
            carry_forward = true
            "#,
        )
        .expect("valid toml");
        assert_approx(options.discount.second_discount, 0.2);
        assert_eq!(
            options.econ_limit.criteria,
            EconLimitCriteria::FirstNegativeCashFlow
        );
        assert_eq!(options.reporting, ReportingPeriod::Monthly);
        assert!(options.income_tax.carry_forward);

        let err = options_from_toml("first_discount = \"ten\"").expect_err("wrong type");
        assert!(err.contains("Invalid options file"));
    }

    #[test]
    fn evaluation_response_serializes_expected_fields() {
        let request = evaluate_request_from_json(&evaluate_body("{}")).expect("valid payload");
        let result = evaluate(&request.well, &request.options).expect("valid inputs");
        let json = serde_json::to_string(&result).expect("result should serialize");

        assert!(json.contains("\"well_id\":\"api-1\""));
        assert!(json.contains("\"afit_cash_flow\""));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"report\""));
        assert!(json.contains("\"first_discount_npv\""));
    }

    #[test]
    fn batch_response_counts_failures() {
        let good: WellInputs = serde_json::from_str(WELL_JSON).expect("valid well");
        let mut bad = good.clone();
        bad.well_id = "bad".to_string();
        bad.net_profit_interest = 2.0;
        let outcomes = evaluate_batch(
            &[good, bad],
            &EvaluationOptions::default(),
            &AtomicBool::new(false),
        );
        let response = BatchResponse::from(outcomes);
        assert_eq!(response.evaluated, 1);
        assert_eq!(response.failed, 1);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn column_listing_serializes_registry() {
        let json = columns_json().expect("registry serializes");
        assert!(json.contains("\"afit_irr\""));
        assert!(json.contains("\"aggregation\": \"sum\""));
    }
}
