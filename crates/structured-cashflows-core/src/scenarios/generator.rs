//! Standard scenario catalogue: base case, prepayment/default/severity
//! stresses, recovery shapes, and rate paths, each expressed as a
//! [`ScenarioConfig`] and expanded through the scenario engine.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::scenarios::engine::{
    ScenarioConfig, ScenarioEngine, ScenarioRamp, ScenarioShock, ScenarioType,
};
use crate::ScfResult;

/// Spring/summer purchase-season multipliers (March through September).
pub fn default_seasonal_adjustments() -> BTreeMap<u32, Decimal> {
    BTreeMap::from([
        (3, dec!(1.2)),
        (4, dec!(1.3)),
        (5, dec!(1.3)),
        (6, dec!(1.4)),
        (7, dec!(1.3)),
        (8, dec!(1.2)),
        (9, dec!(1.1)),
    ])
}

pub struct ScenarioGenerator {
    horizon: u32,
}

impl ScenarioGenerator {
    pub fn new(horizon: u32) -> Self {
        ScenarioGenerator { horizon }
    }

    /// Expand the whole named catalogue.
    pub fn generate_standard_scenarios(&self) -> ScfResult<BTreeMap<String, Vec<Decimal>>> {
        let mut scenarios = BTreeMap::new();

        scenarios.insert("Base".to_string(), self.expand(base_case())?);
        scenarios.insert("High Prepay".to_string(), self.expand(high_prepayment())?);
        scenarios.insert("High Default".to_string(), self.expand(high_default())?);
        scenarios.insert("High Severity".to_string(), self.expand(high_severity())?);
        scenarios.insert("Combined Stress".to_string(), self.expand(combined_stress())?);
        scenarios.insert("Fast Recovery".to_string(), self.expand(fast_recovery())?);
        scenarios.insert("Slow Recovery".to_string(), self.expand(slow_recovery())?);
        scenarios.insert("Rising Rates".to_string(), self.expand(rising_rates())?);
        scenarios.insert("Falling Rates".to_string(), self.expand(falling_rates())?);

        Ok(scenarios)
    }

    fn expand(&self, config: ScenarioConfig) -> ScfResult<Vec<Decimal>> {
        ScenarioEngine::new(config, self.horizon)?.generate_vector()
    }
}

fn empty(scenario_type: ScenarioType) -> ScenarioConfig {
    ScenarioConfig {
        scenario_type,
        initial_value: None,
        ramps: vec![],
        vectors: vec![],
        conditional_logic: None,
        seasonal_adjustments: BTreeMap::new(),
        shock: None,
    }
}

fn base_case() -> ScenarioConfig {
    ScenarioConfig {
        initial_value: Some(dec!(8)),
        seasonal_adjustments: default_seasonal_adjustments(),
        ..empty(ScenarioType::Cpr)
    }
}

fn high_prepayment() -> ScenarioConfig {
    ScenarioConfig {
        ramps: vec![ScenarioRamp {
            start_value: dec!(10),
            end_value: dec!(25),
            ramp_periods: 12,
            hold_periods: Some(24),
        }],
        seasonal_adjustments: BTreeMap::from([
            (3, dec!(1.3)),
            (4, dec!(1.4)),
            (5, dec!(1.4)),
            (6, dec!(1.5)),
            (7, dec!(1.4)),
            (8, dec!(1.3)),
            (9, dec!(1.2)),
        ]),
        ..empty(ScenarioType::Cpr)
    }
}

fn high_default() -> ScenarioConfig {
    ScenarioConfig {
        ramps: vec![ScenarioRamp {
            start_value: dec!(1),
            end_value: dec!(5),
            ramp_periods: 12,
            hold_periods: Some(24),
        }],
        shock: Some(ScenarioShock {
            timing: 36,
            magnitude: dec!(2),
            duration: Some(6),
        }),
        ..empty(ScenarioType::Cdr)
    }
}

fn high_severity() -> ScenarioConfig {
    ScenarioConfig {
        initial_value: Some(dec!(35)),
        ramps: vec![ScenarioRamp {
            start_value: dec!(35),
            end_value: dec!(60),
            ramp_periods: 18,
            hold_periods: None,
        }],
        ..empty(ScenarioType::LossSeverity)
    }
}

fn combined_stress() -> ScenarioConfig {
    ScenarioConfig {
        ramps: vec![ScenarioRamp {
            start_value: dec!(2),
            end_value: dec!(8),
            ramp_periods: 12,
            hold_periods: Some(18),
        }],
        shock: Some(ScenarioShock {
            timing: 24,
            magnitude: dec!(3),
            duration: Some(6),
        }),
        conditional_logic: Some(
            "if period > 36 and value > 5 then value = value * 0.9".to_string(),
        ),
        ..empty(ScenarioType::Cdr)
    }
}

fn fast_recovery() -> ScenarioConfig {
    ScenarioConfig {
        ramps: vec![
            ScenarioRamp {
                start_value: dec!(5),
                end_value: dec!(8),
                ramp_periods: 6,
                hold_periods: Some(6),
            },
            ScenarioRamp {
                start_value: dec!(8),
                end_value: dec!(1),
                ramp_periods: 12,
                hold_periods: Some(24),
            },
        ],
        ..empty(ScenarioType::Cdr)
    }
}

fn slow_recovery() -> ScenarioConfig {
    ScenarioConfig {
        ramps: vec![
            ScenarioRamp {
                start_value: dec!(5),
                end_value: dec!(8),
                ramp_periods: 6,
                hold_periods: Some(12),
            },
            ScenarioRamp {
                start_value: dec!(8),
                end_value: dec!(2),
                ramp_periods: 24,
                hold_periods: Some(12),
            },
        ],
        conditional_logic: Some("if period > 48 then value = max(1, value)".to_string()),
        ..empty(ScenarioType::Cdr)
    }
}

fn rising_rates() -> ScenarioConfig {
    ScenarioConfig {
        initial_value: Some(dec!(3)),
        ramps: vec![ScenarioRamp {
            start_value: dec!(3),
            end_value: dec!(6),
            ramp_periods: 24,
            hold_periods: Some(12),
        }],
        shock: Some(ScenarioShock {
            timing: 30,
            magnitude: dec!(1),
            duration: Some(3),
        }),
        ..empty(ScenarioType::InterestRate)
    }
}

fn falling_rates() -> ScenarioConfig {
    ScenarioConfig {
        initial_value: Some(dec!(5)),
        ramps: vec![ScenarioRamp {
            start_value: dec!(5),
            end_value: dec!(2),
            ramp_periods: 18,
            hold_periods: Some(12),
        }],
        shock: Some(ScenarioShock {
            timing: 24,
            magnitude: dec!(-0.5),
            duration: Some(3),
        }),
        ..empty(ScenarioType::InterestRate)
    }
}
