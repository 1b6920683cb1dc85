use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use structured_cashflows_core::cashflows::CashflowPeriod;
use structured_cashflows_core::pricing::{PricingConfig, PricingEngine};
use structured_cashflows_core::types::DayCount;

use crate::input;

#[derive(Args)]
pub struct PriceArgs {
    /// JSON file with cashflows, config, and day_count.
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
struct PriceRequest {
    cashflows: Vec<CashflowPeriod>,
    config: PricingConfig,
    day_count: DayCount,
}

pub fn run_price(args: PriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: PriceRequest = input::read_input(&args.input)?;
    let engine = PricingEngine::new(&request.cashflows, request.config, request.day_count)?;
    let output = engine.calculate()?;
    Ok(serde_json::to_value(output)?)
}
