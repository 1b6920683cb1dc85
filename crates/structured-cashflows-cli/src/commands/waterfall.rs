use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use structured_cashflows_core::types::Money;
use structured_cashflows_core::waterfall::{WaterfallConfig, WaterfallEngine};

use crate::input;

#[derive(Args)]
pub struct WaterfallArgs {
    /// JSON file with config and per-period collections.
    #[arg(long)]
    pub input: Option<String>,
}

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

/// Run every collection period through one engine instance, so account and
/// trigger state carries across periods.
pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: WaterfallRequest = input::read_input(&args.input)?;
    let mut engine = WaterfallEngine::new(request.config)?;

    let mut results = Vec::with_capacity(request.collections.len());
    for period in &request.collections {
        let result = engine.process_period(
            period.principal,
            period.interest,
            period.prepayment,
            period.recovery,
        )?;
        results.push(result);
    }

    Ok(serde_json::to_value(results)?)
}
