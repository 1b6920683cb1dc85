//! Rate engine: named discount curves, forward-rate series, and index
//! definitions, with date-interpolated lookups.
//!
//! Registration validates the series invariants once (equal-length arrays,
//! non-decreasing dates); queries then only fail on unknown keys.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::dates::{sub_days, year_fraction};
use crate::error::ScfError;
use crate::types::{DayCount, Rate};
use crate::ScfResult;

/// A named zero-rate curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCurve {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub rates: Vec<Rate>,
    pub day_count: DayCount,
}

/// Forward rates for one index/tenor pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardRates {
    pub index: String,
    pub tenor: String,
    pub dates: Vec<NaiveDate>,
    pub rates: Vec<Rate>,
}

/// A floating-rate index definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateIndex {
    pub name: String,
    /// Calendar days between fixing and accrual start.
    pub fixing_days: u32,
    pub tenor: String,
    pub day_count: DayCount,
}

/// Owns the curve/forward/index registries for one pricing context.
#[derive(Debug, Default)]
pub struct RateEngine {
    curves: BTreeMap<String, RateCurve>,
    forward_rates: BTreeMap<String, ForwardRates>,
    indices: BTreeMap<String, RateIndex>,
}

impl RateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a curve, replacing any existing curve of the same name.
    pub fn add_curve(&mut self, curve: RateCurve) -> ScfResult<()> {
        validate_series(&format!("curve '{}'", curve.name), &curve.dates, &curve.rates)?;
        self.curves.insert(curve.name.clone(), curve);
        Ok(())
    }

    /// Register forward rates, keyed by `index_tenor`, replacing any existing
    /// series for the same pair.
    pub fn add_forward_rates(&mut self, rates: ForwardRates) -> ScfResult<()> {
        let key = forward_key(&rates.index, &rates.tenor);
        validate_series(&format!("forward rates '{key}'"), &rates.dates, &rates.rates)?;
        self.forward_rates.insert(key, rates);
        Ok(())
    }

    /// Register an index definition, replacing any existing one of the same name.
    pub fn add_index(&mut self, index: RateIndex) {
        self.indices.insert(index.name.clone(), index);
    }

    /// Continuously-compounded discount factor off a named curve:
    /// `exp(-rate × year_fraction)` at the linearly interpolated zero rate.
    pub fn get_discount_factor(
        &self,
        curve_name: &str,
        date: NaiveDate,
        reference_date: NaiveDate,
    ) -> ScfResult<Decimal> {
        let curve = self
            .curves
            .get(curve_name)
            .ok_or_else(|| ScfError::not_found("Curve", curve_name))?;

        let yf = year_fraction(reference_date, date, curve.day_count);
        let rate = interpolate_rate(date, &curve.dates, &curve.rates);
        Ok((-rate * yf).exp())
    }

    /// Interpolated forward rate for an index/tenor pair, or the fallback
    /// when the pair is unregistered and a fallback is supplied.
    pub fn get_forward_rate(
        &self,
        index: &str,
        tenor: &str,
        date: NaiveDate,
        fallback_rate: Option<Rate>,
    ) -> ScfResult<Rate> {
        let key = forward_key(index, tenor);
        match self.forward_rates.get(&key) {
            Some(series) => Ok(interpolate_rate(date, &series.dates, &series.rates)),
            None => fallback_rate.ok_or_else(|| ScfError::not_found("Forward rates", &key)),
        }
    }

    /// Fixing date for an index: accrual start minus the index's fixing days.
    pub fn get_fixing_date(&self, index: &str, accrual_start: NaiveDate) -> ScfResult<NaiveDate> {
        let config = self
            .indices
            .get(index)
            .ok_or_else(|| ScfError::not_found("Index", index))?;
        sub_days(accrual_start, config.fixing_days as u64)
    }
}

fn forward_key(index: &str, tenor: &str) -> String {
    format!("{index}_{tenor}")
}

fn validate_series(field: &str, dates: &[NaiveDate], rates: &[Rate]) -> ScfResult<()> {
    if dates.len() != rates.len() {
        return Err(ScfError::InvalidInput {
            field: field.into(),
            reason: "dates and rates arrays must have the same length".into(),
        });
    }
    if dates.is_empty() {
        return Err(ScfError::InvalidInput {
            field: field.into(),
            reason: "at least one date/rate point is required".into(),
        });
    }
    for pair in dates.windows(2) {
        if pair[1] < pair[0] {
            return Err(ScfError::InvalidInput {
                field: field.into(),
                reason: "dates must be non-decreasing".into(),
            });
        }
    }
    Ok(())
}

/// Flat before the first node, flat after the last, linear in between on
/// calendar-day distance. The same policy the timing engine uses on periods.
fn interpolate_rate(date: NaiveDate, dates: &[NaiveDate], rates: &[Rate]) -> Rate {
    let i = match dates.iter().position(|d| *d > date) {
        None => return rates[rates.len() - 1],
        Some(0) => return rates[0],
        Some(i) => i,
    };

    let span = (dates[i] - dates[i - 1]).num_days();
    if span == 0 {
        return rates[i];
    }
    let elapsed = (date - dates[i - 1]).num_days();
    rates[i - 1] + (rates[i] - rates[i - 1]) * Decimal::from(elapsed) / Decimal::from(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_curve() -> RateCurve {
        RateCurve {
            name: "USD-ZERO".into(),
            dates: vec![d(2024, 1, 1), d(2025, 1, 1), d(2026, 1, 1)],
            rates: vec![dec!(0.03), dec!(0.04), dec!(0.05)],
            day_count: DayCount::Act365,
        }
    }

    #[test]
    fn test_interpolation_hits_listed_points() {
        let curve = sample_curve();
        assert_eq!(
            interpolate_rate(d(2025, 1, 1), &curve.dates, &curve.rates),
            dec!(0.04)
        );
    }

    #[test]
    fn test_interpolation_flat_outside_range() {
        let curve = sample_curve();
        assert_eq!(
            interpolate_rate(d(2020, 1, 1), &curve.dates, &curve.rates),
            dec!(0.03)
        );
        assert_eq!(
            interpolate_rate(d(2030, 1, 1), &curve.dates, &curve.rates),
            dec!(0.05)
        );
    }

    #[test]
    fn test_interpolation_linear_between_points() {
        let curve = sample_curve();
        // 2024-07-02 is 183 of 366 days into the 2024 span.
        let rate = interpolate_rate(d(2024, 7, 2), &curve.dates, &curve.rates);
        let expected = dec!(0.03) + dec!(0.01) * dec!(183) / dec!(366);
        assert_eq!(rate, expected);
    }

    #[test]
    fn test_discount_factor_flat_curve() {
        let mut engine = RateEngine::new();
        engine
            .add_curve(RateCurve {
                name: "FLAT".into(),
                dates: vec![d(2024, 1, 1)],
                rates: vec![dec!(0.05)],
                day_count: DayCount::Act365,
            })
            .unwrap();

        let df = engine
            .get_discount_factor("FLAT", d(2025, 1, 1), d(2024, 1, 2))
            .unwrap();
        // exp(-0.05 * 365/365) = exp(-0.05) ~ 0.951229
        assert!((df - dec!(0.951229)).abs() < dec!(0.00001));
    }

    #[test]
    fn test_discount_factor_unknown_curve() {
        let engine = RateEngine::new();
        let err = engine
            .get_discount_factor("MISSING", d(2025, 1, 1), d(2024, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ScfError::NotFound { .. }));
    }

    #[test]
    fn test_add_curve_overwrites_by_name() {
        let mut engine = RateEngine::new();
        engine.add_curve(sample_curve()).unwrap();
        let mut replacement = sample_curve();
        replacement.rates = vec![dec!(0.01), dec!(0.01), dec!(0.01)];
        engine.add_curve(replacement).unwrap();

        let df = engine
            .get_discount_factor("USD-ZERO", d(2024, 1, 1), d(2024, 1, 1))
            .unwrap();
        // Zero year fraction discounts to 1 regardless of the curve level.
        assert!((df - Decimal::ONE).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_add_curve_rejects_mismatched_lengths() {
        let mut engine = RateEngine::new();
        let mut curve = sample_curve();
        curve.rates.pop();
        assert!(engine.add_curve(curve).is_err());
    }

    #[test]
    fn test_add_curve_rejects_decreasing_dates() {
        let mut engine = RateEngine::new();
        let mut curve = sample_curve();
        curve.dates.swap(0, 2);
        assert!(engine.add_curve(curve).is_err());
    }

    #[test]
    fn test_forward_rate_fallback() {
        let engine = RateEngine::new();
        let rate = engine
            .get_forward_rate("SOFR", "3M", d(2024, 6, 1), Some(dec!(0.045)))
            .unwrap();
        assert_eq!(rate, dec!(0.045));

        let err = engine
            .get_forward_rate("SOFR", "3M", d(2024, 6, 1), None)
            .unwrap_err();
        assert!(matches!(err, ScfError::NotFound { .. }));
    }

    #[test]
    fn test_forward_rate_interpolates() {
        let mut engine = RateEngine::new();
        engine
            .add_forward_rates(ForwardRates {
                index: "SOFR".into(),
                tenor: "1M".into(),
                dates: vec![d(2024, 1, 1), d(2024, 1, 11)],
                rates: vec![dec!(0.04), dec!(0.05)],
            })
            .unwrap();

        let rate = engine
            .get_forward_rate("SOFR", "1M", d(2024, 1, 6), None)
            .unwrap();
        assert_eq!(rate, dec!(0.045));
    }

    #[test]
    fn test_fixing_date_subtracts_fixing_days() {
        let mut engine = RateEngine::new();
        engine.add_index(RateIndex {
            name: "SOFR".into(),
            fixing_days: 2,
            tenor: "1M".into(),
            day_count: DayCount::Act360,
        });

        let fixing = engine.get_fixing_date("SOFR", d(2024, 6, 12)).unwrap();
        assert_eq!(fixing, d(2024, 6, 10));

        assert!(engine.get_fixing_date("EURIBOR", d(2024, 6, 12)).is_err());
    }
}
