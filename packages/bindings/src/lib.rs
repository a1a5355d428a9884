use napi::Result as NapiResult;
use napi_derive::napi;

use invest_estimate_core::estimate;
use invest_estimate_core::fee_schedule::FeeTables;
use invest_estimate_core::indicators;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Estimate
// ---------------------------------------------------------------------------

#[napi]
pub fn estimate_investment(input_json: String) -> NapiResult<String> {
    let input: estimate::EstimateInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = estimate::estimate_investment(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn ancillary_fees(input_json: String) -> NapiResult<String> {
    let input: estimate::AncillaryFeeInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = estimate::ancillary_fees(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// The statutory fee schedules, as a starting point for custom tables.
#[napi]
pub fn default_fee_tables() -> NapiResult<String> {
    serde_json::to_string(&FeeTables::default()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Financing
// ---------------------------------------------------------------------------

#[napi]
pub fn construction_interest(input_json: String) -> NapiResult<String> {
    let input: estimate::ConstructionInterestInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = estimate::construction_interest(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn repayment_schedule(input_json: String) -> NapiResult<String> {
    let input: estimate::RepaymentInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = estimate::repayment_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

#[napi]
pub fn financial_indicators(input_json: String) -> NapiResult<String> {
    let input: indicators::IndicatorInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = indicators::financial_indicators(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(serde::Deserialize)]
struct CashFlowBindingInput {
    cash_flows: Vec<rust_decimal::Decimal>,
    #[serde(default)]
    rate: Option<rust_decimal::Decimal>,
}

/// NPV at `rate` of a yearly series, first flow discounted one period.
#[napi]
pub fn npv(input_json: String) -> NapiResult<String> {
    let binding_input: CashFlowBindingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rate = binding_input
        .rate
        .ok_or_else(|| to_napi_error("rate is required"))?;
    let value = indicators::npv(rate, &binding_input.cash_flows).map_err(to_napi_error)?;
    serde_json::to_string(&value).map_err(to_napi_error)
}

/// IRR of a yearly series; `rate` is used as the starting guess.
#[napi]
pub fn irr(input_json: String) -> NapiResult<String> {
    let binding_input: CashFlowBindingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let guess = binding_input.rate.unwrap_or(indicators::DEFAULT_IRR_GUESS);
    let estimate = indicators::irr(&binding_input.cash_flows, guess);
    serde_json::to_string(&estimate).map_err(to_napi_error)
}
