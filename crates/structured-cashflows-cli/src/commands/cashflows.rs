use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use structured_cashflows_core::cashflows::{
    CashflowEngine, InterestConfig, LoanCharacteristics, ScenarioAssumptions,
};

use crate::input;

#[derive(Args)]
pub struct CashflowsArgs {
    /// JSON file with loan, assumptions, and interest_config.
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
struct CashflowRequest {
    loan: LoanCharacteristics,
    assumptions: ScenarioAssumptions,
    interest_config: InterestConfig,
}

pub fn run_cashflows(args: CashflowsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: CashflowRequest = input::read_input(&args.input)?;
    let engine = CashflowEngine::new(request.loan, request.assumptions, request.interest_config)?;
    let output = engine.generate_cashflows()?;
    Ok(serde_json::to_value(output)?)
}
