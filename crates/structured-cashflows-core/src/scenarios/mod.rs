pub mod engine;
pub mod generator;
pub mod logic;

pub use engine::{
    ScenarioConfig, ScenarioEngine, ScenarioPoint, ScenarioRamp, ScenarioShock, ScenarioType,
};
pub use generator::{default_seasonal_adjustments, ScenarioGenerator};
pub use logic::ConditionalRule;
