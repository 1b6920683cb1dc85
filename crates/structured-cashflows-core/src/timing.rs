//! Timing engine: converts configured prepayment/default/recovery/liquidation
//! timing vectors into per-period factors.
//!
//! Interpolation policy matches the rate engine: flat before the first point,
//! flat after the last, linear between bracketing points. Recovery factors are
//! shifted by the configured lag and are zero until the lag has elapsed.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ScfError;
use crate::ScfResult;

/// A timing vector: period markers with the factor applying at each.
///
/// Invariants (checked at engine construction): equal-length arrays, at least
/// one point, strictly increasing periods, values in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingVector {
    pub periods: Vec<u32>,
    pub values: Vec<Decimal>,
}

impl TimingVector {
    /// Everything at period 0.
    pub fn immediate() -> Self {
        TimingVector {
            periods: vec![0],
            values: vec![Decimal::ONE],
        }
    }

    /// Nothing until the period closes.
    pub fn end_of_period() -> Self {
        TimingVector {
            periods: vec![0],
            values: vec![Decimal::ZERO],
        }
    }

    pub fn mid_period() -> Self {
        TimingVector {
            periods: vec![0],
            values: vec![dec!(0.5)],
        }
    }

    /// The conventional 20/50/30 spread over three periods.
    pub fn gradual() -> Self {
        TimingVector {
            periods: vec![0, 1, 2],
            values: vec![dec!(0.2), dec!(0.5), dec!(0.3)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub prepayment_timing: TimingVector,
    pub default_timing: TimingVector,
    /// Periods between default and recovery receipt.
    pub recovery_lag: u32,
    pub recovery_timing: TimingVector,
    pub liquidation_timing: TimingVector,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            prepayment_timing: TimingVector::end_of_period(),
            default_timing: TimingVector::mid_period(),
            recovery_lag: 12,
            recovery_timing: TimingVector::gradual(),
            liquidation_timing: TimingVector::end_of_period(),
        }
    }
}

/// The four interpolated factors for one period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingFactors {
    pub prepayment_factor: Decimal,
    pub default_factor: Decimal,
    pub recovery_factor: Decimal,
    pub liquidation_factor: Decimal,
}

#[derive(Debug, Clone)]
pub struct TimingEngine {
    config: TimingConfig,
}

impl TimingEngine {
    pub fn new(config: TimingConfig) -> ScfResult<Self> {
        validate_vector(&config.prepayment_timing, "prepayment_timing")?;
        validate_vector(&config.default_timing, "default_timing")?;
        validate_vector(&config.recovery_timing, "recovery_timing")?;
        validate_vector(&config.liquidation_timing, "liquidation_timing")?;
        Ok(TimingEngine { config })
    }

    pub fn calculate_timing_factors(&self, period: u32) -> TimingFactors {
        TimingFactors {
            prepayment_factor: interpolate_timing(period, &self.config.prepayment_timing),
            default_factor: interpolate_timing(period, &self.config.default_timing),
            recovery_factor: self.recovery_factor(period),
            liquidation_factor: interpolate_timing(period, &self.config.liquidation_timing),
        }
    }

    fn recovery_factor(&self, period: u32) -> Decimal {
        if period < self.config.recovery_lag {
            return Decimal::ZERO;
        }
        interpolate_timing(period - self.config.recovery_lag, &self.config.recovery_timing)
    }
}

fn interpolate_timing(period: u32, vector: &TimingVector) -> Decimal {
    let periods = &vector.periods;
    let values = &vector.values;

    if period <= periods[0] {
        return values[0];
    }
    if period >= periods[periods.len() - 1] {
        return values[values.len() - 1];
    }

    // period lies strictly inside the range, so a bracketing point exists.
    let i = match periods.iter().position(|p| *p > period) {
        Some(i) => i,
        None => return values[values.len() - 1],
    };

    let p1 = Decimal::from(periods[i - 1]);
    let p2 = Decimal::from(periods[i]);
    let v1 = values[i - 1];
    let v2 = values[i];

    v1 + (v2 - v1) * (Decimal::from(period) - p1) / (p2 - p1)
}

fn validate_vector(vector: &TimingVector, name: &str) -> ScfResult<()> {
    let invalid = |reason: &str| ScfError::InvalidInput {
        field: name.into(),
        reason: reason.into(),
    };

    if vector.periods.len() != vector.values.len() {
        return Err(invalid("periods and values arrays must have the same length"));
    }
    if vector.periods.is_empty() {
        return Err(invalid("vector must have at least one point"));
    }
    for pair in vector.periods.windows(2) {
        if pair[1] <= pair[0] {
            return Err(invalid("periods must be strictly increasing"));
        }
    }
    for value in &vector.values {
        if *value < Decimal::ZERO || *value > Decimal::ONE {
            return Err(invalid("values must be between 0 and 1"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_config() -> TimingConfig {
        TimingConfig {
            prepayment_timing: TimingVector {
                periods: vec![0, 12, 24],
                values: vec![dec!(0.0), dec!(0.6), dec!(1.0)],
            },
            default_timing: TimingVector::mid_period(),
            recovery_lag: 6,
            recovery_timing: TimingVector {
                periods: vec![0, 4],
                values: vec![dec!(0.25), dec!(0.75)],
            },
            liquidation_timing: TimingVector::end_of_period(),
        }
    }

    #[test]
    fn test_factors_at_listed_points() {
        let engine = TimingEngine::new(sample_config()).unwrap();
        assert_eq!(engine.calculate_timing_factors(12).prepayment_factor, dec!(0.6));
        assert_eq!(engine.calculate_timing_factors(24).prepayment_factor, dec!(1.0));
    }

    #[test]
    fn test_flat_extrapolation_outside_range() {
        let engine = TimingEngine::new(sample_config()).unwrap();
        assert_eq!(engine.calculate_timing_factors(0).prepayment_factor, dec!(0.0));
        assert_eq!(engine.calculate_timing_factors(60).prepayment_factor, dec!(1.0));
    }

    #[test]
    fn test_linear_interpolation_between_points() {
        let engine = TimingEngine::new(sample_config()).unwrap();
        assert_eq!(engine.calculate_timing_factors(6).prepayment_factor, dec!(0.3));
        assert_eq!(engine.calculate_timing_factors(18).prepayment_factor, dec!(0.8));
    }

    #[test]
    fn test_recovery_zero_before_lag() {
        let engine = TimingEngine::new(sample_config()).unwrap();
        for period in 0..6 {
            assert_eq!(
                engine.calculate_timing_factors(period).recovery_factor,
                Decimal::ZERO
            );
        }
    }

    #[test]
    fn test_recovery_shifted_by_lag() {
        let engine = TimingEngine::new(sample_config()).unwrap();
        // Period 6 maps to recovery period 0, period 8 to recovery period 2.
        assert_eq!(engine.calculate_timing_factors(6).recovery_factor, dec!(0.25));
        assert_eq!(engine.calculate_timing_factors(8).recovery_factor, dec!(0.5));
        assert_eq!(engine.calculate_timing_factors(10).recovery_factor, dec!(0.75));
    }

    #[test]
    fn test_default_config_is_valid() {
        let engine = TimingEngine::new(TimingConfig::default()).unwrap();
        let factors = engine.calculate_timing_factors(0);
        assert_eq!(factors.prepayment_factor, Decimal::ZERO);
        assert_eq!(factors.default_factor, dec!(0.5));
        assert_eq!(factors.recovery_factor, Decimal::ZERO);
    }

    #[test]
    fn test_reject_length_mismatch() {
        let mut config = sample_config();
        config.prepayment_timing.values.pop();
        assert!(TimingEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_empty_vector() {
        let mut config = sample_config();
        config.default_timing = TimingVector {
            periods: vec![],
            values: vec![],
        };
        assert!(TimingEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_non_increasing_periods() {
        let mut config = sample_config();
        config.recovery_timing = TimingVector {
            periods: vec![0, 0],
            values: vec![dec!(0.5), dec!(0.5)],
        };
        assert!(TimingEngine::new(config).is_err());
    }

    #[test]
    fn test_reject_out_of_range_values() {
        let mut config = sample_config();
        config.liquidation_timing = TimingVector {
            periods: vec![0],
            values: vec![dec!(1.5)],
        };
        assert!(TimingEngine::new(config).is_err());
    }
}
