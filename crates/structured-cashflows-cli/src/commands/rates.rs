use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use structured_cashflows_core::rates::{ForwardRates, RateCurve, RateEngine};

use crate::input;

#[derive(Args)]
pub struct DiscountArgs {
    /// JSON file with curve, date, and reference_date.
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Args)]
pub struct ForwardArgs {
    /// JSON file with rates, date, and optional fallback_rate.
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
struct DiscountRequest {
    curve: RateCurve,
    date: NaiveDate,
    reference_date: NaiveDate,
}

#[derive(Deserialize)]
struct ForwardRequest {
    rates: ForwardRates,
    date: NaiveDate,
    #[serde(default)]
    fallback_rate: Option<Decimal>,
}

pub fn run_discount(args: DiscountArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: DiscountRequest = input::read_input(&args.input)?;
    let curve_name = request.curve.name.clone();

    let mut engine = RateEngine::new();
    engine.add_curve(request.curve)?;
    let discount_factor =
        engine.get_discount_factor(&curve_name, request.date, request.reference_date)?;

    Ok(serde_json::json!({ "discount_factor": discount_factor }))
}

pub fn run_forward(args: ForwardArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ForwardRequest = input::read_input(&args.input)?;
    let (index, tenor) = (request.rates.index.clone(), request.rates.tenor.clone());

    let mut engine = RateEngine::new();
    engine.add_forward_rates(request.rates)?;
    let rate = engine.get_forward_rate(&index, &tenor, request.date, request.fallback_rate)?;

    Ok(serde_json::json!({ "rate": rate }))
}
