use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use structured_cashflows_core::scenarios::{ScenarioConfig, ScenarioEngine, ScenarioGenerator};

use crate::input;

#[derive(Args)]
pub struct ScenarioArgs {
    /// JSON file with config and horizon.
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Args)]
pub struct StandardScenariosArgs {
    /// Projection horizon in periods.
    #[arg(long, default_value_t = 60)]
    pub horizon: u32,
}

#[derive(Deserialize)]
struct ScenarioRequest {
    config: ScenarioConfig,
    horizon: u32,
}

pub fn run_scenario(args: ScenarioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ScenarioRequest = input::read_input(&args.input)?;
    let vector = ScenarioEngine::new(request.config, request.horizon)?.generate_vector()?;
    Ok(serde_json::json!({ "vector": vector }))
}

pub fn run_standard_scenarios(
    args: StandardScenariosArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let scenarios = ScenarioGenerator::new(args.horizon).generate_standard_scenarios()?;
    Ok(serde_json::to_value(scenarios)?)
}
