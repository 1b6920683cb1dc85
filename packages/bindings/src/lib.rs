use napi::Result as NapiResult;
use napi_derive::napi;

use serde::Deserialize;

use structured_cashflows_core::cashflows::{
    CashflowEngine, CashflowPeriod, InterestConfig, LoanCharacteristics, ScenarioAssumptions,
};
use structured_cashflows_core::pricing::{PricingConfig, PricingEngine};
use structured_cashflows_core::scenarios::{ScenarioConfig, ScenarioEngine, ScenarioGenerator};
use structured_cashflows_core::timing::{TimingConfig, TimingEngine};
use structured_cashflows_core::types::{DayCount, Money};
use structured_cashflows_core::waterfall::{WaterfallConfig, WaterfallEngine};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Cashflows
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CashflowRequest {
    loan: LoanCharacteristics,
    assumptions: ScenarioAssumptions,
    interest_config: InterestConfig,
}

#[napi]
pub fn generate_cashflows(input_json: String) -> NapiResult<String> {
    let request: CashflowRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = CashflowEngine::new(request.loan, request.assumptions, request.interest_config)
        .map_err(to_napi_error)?;
    let output = engine.generate_cashflows().map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PriceRequest {
    cashflows: Vec<CashflowPeriod>,
    config: PricingConfig,
    day_count: DayCount,
}

#[napi]
pub fn price_cashflows(input_json: String) -> NapiResult<String> {
    let request: PriceRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = PricingEngine::new(&request.cashflows, request.config, request.day_count)
        .map_err(to_napi_error)?;
    let output = engine.calculate().map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Waterfall
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PeriodCollections {
    #[serde(default)]
    principal: Money,
    #[serde(default)]
    interest: Money,
    #[serde(default)]
    prepayment: Money,
    #[serde(default)]
    recovery: Money,
}

#[derive(Deserialize)]
struct WaterfallRequest {
    config: WaterfallConfig,
    collections: Vec<PeriodCollections>,
}

#[napi]
pub fn run_waterfall(input_json: String) -> NapiResult<String> {
    let request: WaterfallRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut engine = WaterfallEngine::new(request.config).map_err(to_napi_error)?;

    let mut results = Vec::with_capacity(request.collections.len());
    for period in &request.collections {
        let result = engine
            .process_period(
                period.principal,
                period.interest,
                period.prepayment,
                period.recovery,
            )
            .map_err(to_napi_error)?;
        results.push(result);
    }

    serde_json::to_string(&results).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ScenarioRequest {
    config: ScenarioConfig,
    horizon: u32,
}

#[napi]
pub fn generate_scenario_vector(input_json: String) -> NapiResult<String> {
    let request: ScenarioRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let vector = ScenarioEngine::new(request.config, request.horizon)
        .map_err(to_napi_error)?
        .generate_vector()
        .map_err(to_napi_error)?;
    serde_json::to_string(&vector).map_err(to_napi_error)
}

#[napi]
pub fn generate_standard_scenarios(horizon: u32) -> NapiResult<String> {
    let scenarios = ScenarioGenerator::new(horizon)
        .generate_standard_scenarios()
        .map_err(to_napi_error)?;
    serde_json::to_string(&scenarios).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TimingRequest {
    config: TimingConfig,
    periods: Vec<u32>,
}

#[napi]
pub fn calculate_timing_factors(input_json: String) -> NapiResult<String> {
    let request: TimingRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = TimingEngine::new(request.config).map_err(to_napi_error)?;

    let factors: Vec<_> = request
        .periods
        .iter()
        .map(|&period| engine.calculate_timing_factors(period))
        .collect();
    serde_json::to_string(&factors).map_err(to_napi_error)
}
