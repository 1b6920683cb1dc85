use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use structured_cashflows_core::timing::{TimingConfig, TimingEngine};

use crate::input;

#[derive(Args)]
pub struct TimingArgs {
    /// JSON file with config and the periods to evaluate.
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
struct TimingRequest {
    config: TimingConfig,
    periods: Vec<u32>,
}

pub fn run_timing(args: TimingArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: TimingRequest = input::read_input(&args.input)?;
    let engine = TimingEngine::new(request.config)?;

    let rows: Vec<Value> = request
        .periods
        .iter()
        .map(|&period| {
            let factors = engine.calculate_timing_factors(period);
            serde_json::json!({
                "period": period,
                "prepayment_factor": factors.prepayment_factor,
                "default_factor": factors.default_factor,
                "recovery_factor": factors.recovery_factor,
                "liquidation_factor": factors.liquidation_factor,
            })
        })
        .collect();

    Ok(Value::Array(rows))
}
