//! Term rate curves sampled by time-to-maturity in years.
//!
//! Used by the pricing engine for curve-based discounting and parallel-shift
//! risk measures. Sampling policy everywhere: flat extrapolation outside the
//! quoted range, linear (or step) interpolation inside it.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ScfError;
use crate::types::Rate;
use crate::ScfResult;

/// One node of a point-based curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Time to maturity in years.
    pub time: Decimal,
    pub rate: Rate,
}

/// A rate curve over time-to-maturity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TermCurve {
    /// The same rate at every tenor.
    Flat { rate: Rate },
    /// Yearly buckets: the rate for year `floor(t)`.
    Step { rates: Vec<Rate> },
    /// Yearly nodes with linear interpolation between them.
    Linear { rates: Vec<Rate> },
    /// Arbitrary time/rate nodes with linear interpolation.
    Points { points: Vec<CurvePoint> },
}

impl TermCurve {
    /// Build a point-based curve, sorting the nodes by time.
    pub fn from_points(mut points: Vec<CurvePoint>) -> Self {
        points.sort_by(|a, b| a.time.cmp(&b.time));
        TermCurve::Points { points }
    }

    /// Reject shapes that cannot be sampled. Called once at engine
    /// construction so `rate_at` never has to fail.
    pub fn validate(&self, field: &str) -> ScfResult<()> {
        let empty = match self {
            TermCurve::Flat { .. } => false,
            TermCurve::Step { rates } | TermCurve::Linear { rates } => rates.is_empty(),
            TermCurve::Points { points } => points.is_empty(),
        };
        if empty {
            return Err(ScfError::InvalidInput {
                field: field.into(),
                reason: "curve must have at least one node".into(),
            });
        }
        if let TermCurve::Points { points } = self {
            for pair in points.windows(2) {
                if pair[1].time < pair[0].time {
                    return Err(ScfError::InvalidInput {
                        field: field.into(),
                        reason: "curve points must be sorted by time".into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Sample the curve at a time-to-maturity in years.
    pub fn rate_at(&self, t: Decimal) -> Rate {
        match self {
            TermCurve::Flat { rate } => *rate,
            TermCurve::Step { rates } => {
                if rates.is_empty() {
                    return Decimal::ZERO;
                }
                rates[bucket_index(t, rates.len())]
            }
            TermCurve::Linear { rates } => {
                if rates.is_empty() {
                    return Decimal::ZERO;
                }
                let last = rates.len() - 1;
                let idx = bucket_index(t, rates.len());
                if idx >= last || t < Decimal::ZERO {
                    return rates[idx.min(last)];
                }
                let fraction = t - Decimal::from(idx as u64);
                rates[idx] * (Decimal::ONE - fraction) + rates[idx + 1] * fraction
            }
            TermCurve::Points { points } => sample_points(points, t),
        }
    }
}

fn bucket_index(t: Decimal, len: usize) -> usize {
    let last = len - 1;
    match t.floor().to_i64() {
        Some(i) if i <= 0 => 0,
        Some(i) => (i as usize).min(last),
        // Out of i64 range: the sign tells us which end of the curve.
        None => {
            if t.is_sign_negative() {
                0
            } else {
                last
            }
        }
    }
}

fn sample_points(points: &[CurvePoint], t: Decimal) -> Rate {
    let first = match points.first() {
        Some(p) => p,
        None => return Decimal::ZERO,
    };
    let last = points[points.len() - 1];

    if t <= first.time {
        return first.rate;
    }
    if t >= last.time {
        return last.rate;
    }

    for pair in points.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t >= lo.time && t <= hi.time {
            let span = hi.time - lo.time;
            if span.is_zero() {
                return hi.rate;
            }
            return lo.rate + (hi.rate - lo.rate) * (t - lo.time) / span;
        }
    }

    last.rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flat_curve() {
        let curve = TermCurve::Flat { rate: dec!(0.05) };
        assert_eq!(curve.rate_at(dec!(0)), dec!(0.05));
        assert_eq!(curve.rate_at(dec!(30)), dec!(0.05));
    }

    #[test]
    fn test_step_curve_buckets() {
        let curve = TermCurve::Step {
            rates: vec![dec!(0.01), dec!(0.02), dec!(0.03)],
        };
        assert_eq!(curve.rate_at(dec!(0.5)), dec!(0.01));
        assert_eq!(curve.rate_at(dec!(1.5)), dec!(0.02));
        assert_eq!(curve.rate_at(dec!(10)), dec!(0.03));
        assert_eq!(curve.rate_at(dec!(-1)), dec!(0.01));
    }

    #[test]
    fn test_linear_curve_interpolates() {
        let curve = TermCurve::Linear {
            rates: vec![dec!(0.02), dec!(0.04)],
        };
        assert_eq!(curve.rate_at(dec!(0.5)), dec!(0.03));
        assert_eq!(curve.rate_at(dec!(0)), dec!(0.02));
        assert_eq!(curve.rate_at(dec!(5)), dec!(0.04));
    }

    #[test]
    fn test_point_curve_matches_listed_nodes() {
        let curve = TermCurve::from_points(vec![
            CurvePoint {
                time: dec!(5),
                rate: dec!(0.05),
            },
            CurvePoint {
                time: dec!(1),
                rate: dec!(0.03),
            },
        ]);
        // Listed nodes return exactly their values.
        assert_eq!(curve.rate_at(dec!(1)), dec!(0.03));
        assert_eq!(curve.rate_at(dec!(5)), dec!(0.05));
        // Flat outside, linear inside.
        assert_eq!(curve.rate_at(dec!(0.25)), dec!(0.03));
        assert_eq!(curve.rate_at(dec!(9)), dec!(0.05));
        assert_eq!(curve.rate_at(dec!(3)), dec!(0.04));
    }

    #[test]
    fn test_reject_empty_curve() {
        let curve = TermCurve::Step { rates: vec![] };
        assert!(curve.validate("base_rate_curve").is_err());
    }

    #[test]
    fn test_reject_unsorted_points() {
        let curve = TermCurve::Points {
            points: vec![
                CurvePoint {
                    time: dec!(5),
                    rate: dec!(0.05),
                },
                CurvePoint {
                    time: dec!(1),
                    rate: dec!(0.03),
                },
            ],
        };
        assert!(curve.validate("discount_curve").is_err());
    }
}
