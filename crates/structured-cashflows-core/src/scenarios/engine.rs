//! Scenario engine: expands a declarative scenario specification into a
//! bounded numeric vector over the projection horizon.
//!
//! Construction validates the whole configuration and reports *every*
//! violation at once. Generation applies, in order: initial fill, ramps,
//! explicit points, seasonal multipliers, one additive shock, the conditional
//! override rule, and finally the per-type bound clamp.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{ScfError, ValidationError};
use crate::scenarios::logic::ConditionalRule;
use crate::types::Percent;
use crate::ScfResult;

/// What quantity a scenario vector drives. Bounds are in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioType {
    #[serde(rename = "CPR")]
    Cpr,
    #[serde(rename = "CDR")]
    Cdr,
    #[serde(rename = "Loss Severity")]
    LossSeverity,
    #[serde(rename = "Delinquency")]
    Delinquency,
    #[serde(rename = "Interest Rate")]
    InterestRate,
    #[serde(rename = "Draw Rate")]
    DrawRate,
}

impl ScenarioType {
    pub fn min_value(self) -> Decimal {
        match self {
            ScenarioType::InterestRate => dec!(-10),
            _ => Decimal::ZERO,
        }
    }

    pub fn max_value(self) -> Decimal {
        match self {
            ScenarioType::InterestRate => dec!(50),
            _ => dec!(100),
        }
    }
}

/// An explicit period/value override.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenarioPoint {
    pub period: u32,
    pub value: Percent,
}

/// A linear ramp followed by an optional hold at the end value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenarioRamp {
    pub start_value: Percent,
    pub end_value: Percent,
    pub ramp_periods: u32,
    #[serde(default)]
    pub hold_periods: Option<u32>,
}

/// A one-off additive shock over `[timing, timing + duration)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenarioShock {
    pub timing: u32,
    pub magnitude: Decimal,
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    #[serde(default)]
    pub initial_value: Option<Percent>,
    #[serde(default)]
    pub ramps: Vec<ScenarioRamp>,
    #[serde(default)]
    pub vectors: Vec<ScenarioPoint>,
    #[serde(default)]
    pub conditional_logic: Option<String>,
    /// Multipliers keyed by calendar month 1–12.
    #[serde(default)]
    pub seasonal_adjustments: BTreeMap<u32, Decimal>,
    #[serde(default)]
    pub shock: Option<ScenarioShock>,
}

#[derive(Debug)]
pub struct ScenarioEngine {
    config: ScenarioConfig,
    rule: Option<ConditionalRule>,
    horizon: usize,
}

impl ScenarioEngine {
    /// Validate the configuration against the scenario type's bounds,
    /// collecting every violation before failing.
    pub fn new(config: ScenarioConfig, horizon: u32) -> ScfResult<Self> {
        let mut errors: Vec<ValidationError> = Vec::new();
        let min = config.scenario_type.min_value();
        let max = config.scenario_type.max_value();
        let out_of_bounds = |v: Decimal| v < min || v > max;
        let bounds_message = format!("must be between {min} and {max}");

        if let Some(initial) = config.initial_value {
            if out_of_bounds(initial) {
                errors.push(ValidationError::new("initial_value", bounds_message.as_str()));
            }
        }

        for (index, ramp) in config.ramps.iter().enumerate() {
            if out_of_bounds(ramp.start_value) {
                errors.push(ValidationError::new(
                    format!("ramps[{index}].start_value"),
                    bounds_message.as_str(),
                ));
            }
            if out_of_bounds(ramp.end_value) {
                errors.push(ValidationError::new(
                    format!("ramps[{index}].end_value"),
                    bounds_message.as_str(),
                ));
            }
            if ramp.ramp_periods == 0 {
                errors.push(ValidationError::new(
                    format!("ramps[{index}].ramp_periods"),
                    "must be positive",
                ));
            }
        }

        for (index, point) in config.vectors.iter().enumerate() {
            if out_of_bounds(point.value) {
                errors.push(ValidationError::new(
                    format!("vectors[{index}].value"),
                    bounds_message.as_str(),
                ));
            }
        }

        for (month, adjustment) in &config.seasonal_adjustments {
            if !(1..=12).contains(month) {
                errors.push(ValidationError::new(
                    format!("seasonal_adjustments[{month}]"),
                    "month must be between 1 and 12",
                ));
            }
            if *adjustment <= Decimal::ZERO {
                errors.push(ValidationError::new(
                    format!("seasonal_adjustments[{month}]"),
                    "adjustment must be positive",
                ));
            }
        }

        if let Some(shock) = &config.shock {
            if shock.duration == Some(0) {
                errors.push(ValidationError::new("shock.duration", "must be positive"));
            }
        }

        let rule = match &config.conditional_logic {
            Some(source) => match ConditionalRule::parse(source) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    errors.push(ValidationError::new("conditional_logic", e.to_string()));
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(ScfError::InvalidConfiguration(errors));
        }

        Ok(ScenarioEngine {
            config,
            rule,
            horizon: horizon as usize,
        })
    }

    /// Expand the configuration into one value per period, clamped to the
    /// scenario type's bounds.
    pub fn generate_vector(&self) -> ScfResult<Vec<Decimal>> {
        let initial = self.config.initial_value.unwrap_or(Decimal::ZERO);
        let mut vector = vec![initial; self.horizon];

        self.apply_ramps(&mut vector);
        self.apply_vector_points(&mut vector);
        self.apply_seasonal_adjustments(&mut vector);
        self.apply_shock(&mut vector);
        self.apply_conditional_rule(&mut vector)?;

        let min = self.config.scenario_type.min_value();
        let max = self.config.scenario_type.max_value();
        for value in &mut vector {
            *value = (*value).clamp(min, max);
        }

        Ok(vector)
    }

    /// Ramps advance a shared cursor: each ramp interpolates linearly over its
    /// ramp periods, then holds its end value.
    fn apply_ramps(&self, vector: &mut [Decimal]) {
        let mut cursor = 0usize;

        for ramp in &self.config.ramps {
            let increment =
                (ramp.end_value - ramp.start_value) / Decimal::from(ramp.ramp_periods);

            for i in 0..ramp.ramp_periods {
                if cursor >= vector.len() {
                    return;
                }
                vector[cursor] = ramp.start_value + increment * Decimal::from(i);
                cursor += 1;
            }

            for _ in 0..ramp.hold_periods.unwrap_or(0) {
                if cursor >= vector.len() {
                    return;
                }
                vector[cursor] = ramp.end_value;
                cursor += 1;
            }
        }
    }

    fn apply_vector_points(&self, vector: &mut [Decimal]) {
        for point in &self.config.vectors {
            if (point.period as usize) < vector.len() {
                vector[point.period as usize] = point.value;
            }
        }
    }

    fn apply_seasonal_adjustments(&self, vector: &mut [Decimal]) {
        if self.config.seasonal_adjustments.is_empty() {
            return;
        }
        for (i, value) in vector.iter_mut().enumerate() {
            let month = (i % 12) as u32 + 1;
            if let Some(adjustment) = self.config.seasonal_adjustments.get(&month) {
                *value *= *adjustment;
            }
        }
    }

    fn apply_shock(&self, vector: &mut [Decimal]) {
        let shock = match &self.config.shock {
            Some(shock) => shock,
            None => return,
        };
        let start = (shock.timing as usize).min(vector.len());
        let end = match shock.duration {
            Some(duration) => (shock.timing as usize).saturating_add(duration as usize),
            None => vector.len(),
        }
        .min(vector.len());

        for value in &mut vector[start..end] {
            *value += shock.magnitude;
        }
    }

    fn apply_conditional_rule(&self, vector: &mut [Decimal]) -> ScfResult<()> {
        let rule = match &self.rule {
            Some(rule) => rule,
            None => return Ok(()),
        };
        for (i, value) in vector.iter_mut().enumerate() {
            *value = rule.apply(Decimal::from(i as u64), *value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(scenario_type: ScenarioType) -> ScenarioConfig {
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

    #[test]
    fn test_initial_value_fills_horizon() {
        let mut cfg = config(ScenarioType::Cpr);
        cfg.initial_value = Some(dec!(8));
        let vector = ScenarioEngine::new(cfg, 36).unwrap().generate_vector().unwrap();
        assert_eq!(vector.len(), 36);
        assert!(vector.iter().all(|v| *v == dec!(8)));
    }

    #[test]
    fn test_default_initial_value_is_zero() {
        let vector = ScenarioEngine::new(config(ScenarioType::Cdr), 12)
            .unwrap()
            .generate_vector()
            .unwrap();
        assert!(vector.iter().all(|v| v.is_zero()));
    }

    #[test]
    fn test_ramp_interpolates_then_holds() {
        let mut cfg = config(ScenarioType::Cpr);
        cfg.ramps = vec![ScenarioRamp {
            start_value: dec!(10),
            end_value: dec!(20),
            ramp_periods: 10,
            hold_periods: Some(5),
        }];
        let vector = ScenarioEngine::new(cfg, 24).unwrap().generate_vector().unwrap();

        // i-th ramp element = start + (end - start)/n * i
        for i in 0..10usize {
            assert_eq!(vector[i], dec!(10) + Decimal::from(i as u64));
        }
        for i in 10..15usize {
            assert_eq!(vector[i], dec!(20));
        }
        // After the hold the base value (0) remains.
        assert_eq!(vector[15], Decimal::ZERO);
    }

    #[test]
    fn test_ramps_share_a_cursor() {
        let mut cfg = config(ScenarioType::Cdr);
        cfg.ramps = vec![
            ScenarioRamp {
                start_value: dec!(5),
                end_value: dec!(8),
                ramp_periods: 6,
                hold_periods: Some(6),
            },
            ScenarioRamp {
                start_value: dec!(8),
                end_value: dec!(2),
                ramp_periods: 6,
                hold_periods: None,
            },
        ];
        let vector = ScenarioEngine::new(cfg, 24).unwrap().generate_vector().unwrap();
        // Second ramp starts at period 12 (6 ramp + 6 hold).
        assert_eq!(vector[12], dec!(8));
        assert_eq!(vector[13], dec!(7));
    }

    #[test]
    fn test_explicit_points_override() {
        let mut cfg = config(ScenarioType::Cpr);
        cfg.initial_value = Some(dec!(5));
        cfg.vectors = vec![
            ScenarioPoint {
                period: 3,
                value: dec!(12),
            },
            // Beyond the horizon: ignored.
            ScenarioPoint {
                period: 99,
                value: dec!(50),
            },
        ];
        let vector = ScenarioEngine::new(cfg, 12).unwrap().generate_vector().unwrap();
        assert_eq!(vector[3], dec!(12));
        assert_eq!(vector[2], dec!(5));
    }

    #[test]
    fn test_seasonal_adjustments_keyed_by_month() {
        let mut cfg = config(ScenarioType::Cpr);
        cfg.initial_value = Some(dec!(10));
        cfg.seasonal_adjustments = BTreeMap::from([(3, dec!(1.2))]);
        let vector = ScenarioEngine::new(cfg, 24).unwrap().generate_vector().unwrap();
        // Periods 2 and 14 are month 3.
        assert_eq!(vector[2], dec!(12));
        assert_eq!(vector[14], dec!(12));
        assert_eq!(vector[3], dec!(10));
    }

    #[test]
    fn test_shock_window() {
        let mut cfg = config(ScenarioType::Cdr);
        cfg.initial_value = Some(dec!(2));
        cfg.shock = Some(ScenarioShock {
            timing: 6,
            magnitude: dec!(3),
            duration: Some(2),
        });
        let vector = ScenarioEngine::new(cfg, 12).unwrap().generate_vector().unwrap();
        assert_eq!(vector[5], dec!(2));
        assert_eq!(vector[6], dec!(5));
        assert_eq!(vector[7], dec!(5));
        assert_eq!(vector[8], dec!(2));
    }

    #[test]
    fn test_open_ended_shock_runs_to_horizon() {
        let mut cfg = config(ScenarioType::Cdr);
        cfg.shock = Some(ScenarioShock {
            timing: 10,
            magnitude: dec!(1),
            duration: None,
        });
        let vector = ScenarioEngine::new(cfg, 15).unwrap().generate_vector().unwrap();
        assert_eq!(vector[9], Decimal::ZERO);
        assert!(vector[10..].iter().all(|v| *v == dec!(1)));
    }

    #[test]
    fn test_conditional_rule_applies_per_period() {
        let mut cfg = config(ScenarioType::Cdr);
        cfg.initial_value = Some(dec!(8));
        cfg.conditional_logic = Some("if period > 5 then value = value * 0.5".into());
        let vector = ScenarioEngine::new(cfg, 10).unwrap().generate_vector().unwrap();
        assert_eq!(vector[5], dec!(8));
        assert_eq!(vector[6], dec!(4));
    }

    #[test]
    fn test_values_clamped_to_type_bounds() {
        let mut cfg = config(ScenarioType::Cpr);
        cfg.initial_value = Some(dec!(95));
        cfg.shock = Some(ScenarioShock {
            timing: 0,
            magnitude: dec!(20),
            duration: None,
        });
        let vector = ScenarioEngine::new(cfg, 6).unwrap().generate_vector().unwrap();
        assert!(vector.iter().all(|v| *v == dec!(100)));
    }

    #[test]
    fn test_interest_rate_allows_negative_values() {
        let mut cfg = config(ScenarioType::InterestRate);
        cfg.initial_value = Some(dec!(-5));
        let engine = ScenarioEngine::new(cfg, 6).unwrap();
        assert!(engine.generate_vector().unwrap().iter().all(|v| *v == dec!(-5)));

        let mut cfg = config(ScenarioType::Cpr);
        cfg.initial_value = Some(dec!(-5));
        assert!(ScenarioEngine::new(cfg, 6).is_err());
    }

    #[test]
    fn test_validation_collects_all_violations() {
        let mut cfg = config(ScenarioType::Cpr);
        cfg.initial_value = Some(dec!(150));
        cfg.seasonal_adjustments = BTreeMap::from([(13, dec!(-1))]);
        cfg.shock = Some(ScenarioShock {
            timing: 0,
            magnitude: dec!(1),
            duration: Some(0),
        });
        cfg.conditional_logic = Some("nonsense here".into());

        let err = ScenarioEngine::new(cfg, 12).unwrap_err();
        match err {
            ScfError::InvalidConfiguration(errors) => {
                // initial_value, month out of range, non-positive adjustment,
                // zero shock duration, unparseable rule.
                assert_eq!(errors.len(), 5);
            }
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_reject_zero_ramp_periods() {
        let mut cfg = config(ScenarioType::Cpr);
        cfg.ramps = vec![ScenarioRamp {
            start_value: dec!(1),
            end_value: dec!(2),
            ramp_periods: 0,
            hold_periods: None,
        }];
        assert!(ScenarioEngine::new(cfg, 12).is_err());
    }
}
