//! Cash-flow projection engine.
//!
//! Rolls a loan's balance forward period by period, applying scheduled
//! level-payment amortization, prepayments, defaults/losses, and
//! interest-shortfall accrual, producing an ordered schedule plus summary
//! metrics. All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::dates::{add_months, adjust_payment_date, sub_months, year_fraction};
use crate::error::ScfError;
use crate::types::{
    with_metadata, BusinessDayConvention, ComputationOutput, DayCount, Money, PaymentFrequency,
    Percent, Rate,
};
use crate::ScfResult;

/// Hard ceiling on projection length. A loan that neither amortizes to zero
/// nor reaches maturity within this many periods is misconfigured.
const MAX_PROJECTION_PERIODS: usize = 1000;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Prepayment rate quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrepayUnits {
    #[serde(rename = "CPR")]
    Cpr,
    #[serde(rename = "SMM")]
    Smm,
    #[serde(rename = "PSA")]
    Psa,
}

/// Default rate quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultUnits {
    #[serde(rename = "CDR")]
    Cdr,
    #[serde(rename = "MDR")]
    Mdr,
}

/// How carried interest shortfall is recovered from collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortfallRecoveryPriority {
    /// Recover only from interest collected beyond the scheduled amount.
    CurrentInterest,
    /// Recover ahead of current interest.
    ShortfallFirst,
}

/// Date conventions for one loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateConfig {
    pub start_date: NaiveDate,
    #[serde(default)]
    pub payment_day: Option<u32>,
    pub day_count: DayCount,
    pub business_day_convention: BusinessDayConvention,
}

/// Contractual terms of one loan. Immutable input to a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanCharacteristics {
    pub current_balance: Money,
    pub original_balance: Money,
    /// Annual coupon as a decimal (0.05 = 5%).
    pub gross_coupon: Rate,
    pub remaining_term: u32,
    pub original_term: u32,
    pub payment_frequency: PaymentFrequency,
    pub next_payment_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub date_config: DateConfig,
    pub is_fixed_rate: bool,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub margin: Option<Rate>,
}

/// Prepayment/default/severity assumptions for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAssumptions {
    pub prepay_units: PrepayUnits,
    /// In the prepay units' percentage terms (8 = 8% CPR).
    pub prepay_rate: Percent,
    pub default_units: DefaultUnits,
    pub default_rate: Percent,
    /// Loss fraction of defaulted balance, in percent.
    pub severity: Percent,
    /// Periods between default and recovery receipt.
    pub recovery_lag: u32,
    /// Whether interest shortfall is tracked and carried forward.
    pub interest_shortfall: bool,
}

impl Default for ScenarioAssumptions {
    fn default() -> Self {
        ScenarioAssumptions {
            prepay_units: PrepayUnits::Cpr,
            prepay_rate: Decimal::ZERO,
            default_units: DefaultUnits::Cdr,
            default_rate: Decimal::ZERO,
            severity: dec!(35),
            recovery_lag: 12,
            interest_shortfall: true,
        }
    }
}

impl ScenarioAssumptions {
    /// 20 CPR / 1 CDR.
    pub fn fast() -> Self {
        ScenarioAssumptions {
            prepay_rate: dec!(20),
            default_rate: dec!(1),
            ..Default::default()
        }
    }

    /// 5 CPR / 2 CDR.
    pub fn slow() -> Self {
        ScenarioAssumptions {
            prepay_rate: dec!(5),
            default_rate: dec!(2),
            ..Default::default()
        }
    }

    /// 2 CPR / 5 CDR at 50 severity.
    pub fn stress() -> Self {
        ScenarioAssumptions {
            prepay_rate: dec!(2),
            default_rate: dec!(5),
            severity: dec!(50),
            ..Default::default()
        }
    }
}

/// Interest accrual carry-in and shortfall handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestConfig {
    /// Shortfall carried into the first period.
    pub accrued_interest: Money,
    pub shortfall_recovery_priority: ShortfallRecoveryPriority,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One simulated period. The schedule is append-only and ordered by period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashflowPeriod {
    /// 1-indexed period number.
    pub period: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Business-day-adjusted payment date.
    pub payment_date: NaiveDate,
    pub days_in_period: Decimal,
    pub year_fraction: Decimal,
    pub beginning_balance: Money,
    pub scheduled_principal: Money,
    pub prepayments: Money,
    pub losses: Money,
    pub gross_interest: Money,
    pub net_interest: Money,
    pub interest_shortfall: Money,
    pub accumulated_shortfall: Money,
    pub shortfall_recovered: Money,
    pub defaulted_interest: Money,
    pub ending_balance: Money,
}

/// Summary metrics over a projected schedule.
///
/// Macaulay and modified duration are not computed here yet; yield-based risk
/// measures come from the pricing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashflowMetrics {
    /// Weighted-average life in years, weighted by principal-like flows.
    pub wal: Decimal,
    pub duration: Option<Decimal>,
    pub modified_duration: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashflowResult {
    pub periods: Vec<CashflowPeriod>,
    pub metrics: CashflowMetrics,
}

// ---------------------------------------------------------------------------
// Assumption conversions
// ---------------------------------------------------------------------------

/// Convert an annual CPR (percent) to the monthly SMM decimal:
/// `1 − (1 − cpr/100)^(1/12)`. CPR at or above 100 pays off in one period.
pub fn cpr_to_smm(cpr: Percent) -> Rate {
    let annual_survival = Decimal::ONE - cpr / dec!(100);
    if annual_survival <= Decimal::ZERO {
        return Decimal::ONE;
    }
    Decimal::ONE - annual_survival.powd(Decimal::ONE / dec!(12))
}

/// Convert an annual CDR (percent) to the monthly MDR decimal.
pub fn cdr_to_mdr(cdr: Percent) -> Rate {
    cpr_to_smm(cdr)
}

/// Prepaid principal for one period.
pub fn prepayment_amount(balance: Money, rate: Percent, units: PrepayUnits) -> ScfResult<Money> {
    match units {
        PrepayUnits::Cpr => Ok(balance * cpr_to_smm(rate)),
        PrepayUnits::Smm => Ok(balance * rate / dec!(100)),
        PrepayUnits::Psa => Err(ScfError::Unsupported(
            "PSA prepayment conversion is not implemented".into(),
        )),
    }
}

/// Defaulted principal for one period.
pub fn default_amount(balance: Money, rate: Percent, units: DefaultUnits) -> Money {
    match units {
        DefaultUnits::Cdr => balance * cdr_to_mdr(rate),
        DefaultUnits::Mdr => balance * rate / dec!(100),
    }
}

/// Level-payment amortization split for one period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub principal: Money,
    pub interest: Money,
}

/// Split one period's level payment into principal and interest over the
/// remaining payment count. A non-positive periodic rate degrades to
/// straight-line principal with zero interest.
pub fn scheduled_amortization(
    balance: Money,
    periodic_rate: Rate,
    remaining_payments: u32,
) -> ScfResult<ScheduledPayment> {
    if remaining_payments == 0 {
        return Err(ScfError::InvalidInput {
            field: "remaining_payments".into(),
            reason: "must be positive".into(),
        });
    }

    if periodic_rate <= Decimal::ZERO {
        return Ok(ScheduledPayment {
            principal: balance / Decimal::from(remaining_payments),
            interest: Decimal::ZERO,
        });
    }

    let growth = (Decimal::ONE + periodic_rate).powi(remaining_payments as i64);
    let payment = balance * periodic_rate * growth / (growth - Decimal::ONE);
    let interest = balance * periodic_rate;

    Ok(ScheduledPayment {
        principal: payment - interest,
        interest,
    })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct CashflowEngine {
    loan: LoanCharacteristics,
    assumptions: ScenarioAssumptions,
    interest_config: InterestConfig,
}

impl CashflowEngine {
    pub fn new(
        loan: LoanCharacteristics,
        assumptions: ScenarioAssumptions,
        interest_config: InterestConfig,
    ) -> ScfResult<Self> {
        validate_loan(&loan)?;
        validate_assumptions(&assumptions)?;
        if interest_config.accrued_interest < Decimal::ZERO {
            return Err(ScfError::InvalidInput {
                field: "accrued_interest".into(),
                reason: "cannot be negative".into(),
            });
        }
        Ok(CashflowEngine {
            loan,
            assumptions,
            interest_config,
        })
    }

    /// Roll the balance forward from the next payment date to maturity (or
    /// payoff), one payment period at a time.
    pub fn generate_cashflows(&self) -> ScfResult<ComputationOutput<CashflowResult>> {
        let start = Instant::now();
        let mut warnings: Vec<String> = Vec::new();

        if !self.loan.is_fixed_rate {
            warnings.push(
                "floating-rate coupon reset is not implemented; projecting at the gross coupon"
                    .to_string(),
            );
        }

        let step = self.loan.payment_frequency.months_per_period();
        let severity_fraction = self.assumptions.severity / dec!(100);
        let track_shortfall = self.assumptions.interest_shortfall;

        let mut balance = self.loan.current_balance;
        let mut accumulated_shortfall = self.interest_config.accrued_interest;
        let mut current_date = self.loan.next_payment_date;
        let mut periods: Vec<CashflowPeriod> = Vec::new();

        while balance > Decimal::ZERO && current_date <= self.loan.maturity_date {
            if periods.len() >= MAX_PROJECTION_PERIODS {
                return Err(ScfError::InvalidInput {
                    field: "loan".into(),
                    reason: format!(
                        "projection exceeded {MAX_PROJECTION_PERIODS} periods without \
                         amortizing to zero or reaching maturity"
                    ),
                });
            }

            let period_start = sub_months(current_date, step)?;
            let period_end = current_date;
            let payment_date = adjust_payment_date(
                current_date,
                self.loan.date_config.business_day_convention,
            )?;
            let yf = year_fraction(period_start, period_end, self.loan.date_config.day_count);

            let period_rate = self.period_rate();
            let gross_interest = balance * period_rate * yf;

            let scheduled = scheduled_amortization(
                balance,
                period_rate / Decimal::from(self.loan.payment_frequency.periods_per_year()),
                self.remaining_payments(current_date),
            )?;

            let prepayment = prepayment_amount(
                balance,
                self.assumptions.prepay_rate,
                self.assumptions.prepay_units,
            )?;
            let defaulted = default_amount(
                balance,
                self.assumptions.default_rate,
                self.assumptions.default_units,
            );
            let losses = defaulted * severity_fraction;
            let defaulted_interest =
                defaulted * period_rate * yf * (Decimal::ONE - severity_fraction);

            // Defaulted interest reduces what was collected; the remainder is
            // this period's shortfall.
            let mut net_interest = gross_interest - defaulted_interest;
            let mut interest_shortfall = gross_interest - net_interest;
            let mut shortfall_recovered = Decimal::ZERO;

            if track_shortfall {
                if accumulated_shortfall > Decimal::ZERO && net_interest > Decimal::ZERO {
                    shortfall_recovered = match self.interest_config.shortfall_recovery_priority {
                        ShortfallRecoveryPriority::ShortfallFirst => {
                            let recovered = accumulated_shortfall.min(net_interest);
                            net_interest -= recovered;
                            recovered
                        }
                        ShortfallRecoveryPriority::CurrentInterest => {
                            let excess = (net_interest - gross_interest).max(Decimal::ZERO);
                            accumulated_shortfall.min(excess)
                        }
                    };
                }
                accumulated_shortfall =
                    accumulated_shortfall - shortfall_recovered + interest_shortfall;
            } else {
                interest_shortfall = Decimal::ZERO;
            }

            let ending_balance = balance - scheduled.principal - prepayment - defaulted;

            periods.push(CashflowPeriod {
                period: periods.len() as u32 + 1,
                start_date: period_start,
                end_date: period_end,
                payment_date,
                days_in_period: yf * dec!(360),
                year_fraction: yf,
                beginning_balance: balance,
                scheduled_principal: scheduled.principal,
                prepayments: prepayment,
                losses,
                gross_interest,
                net_interest,
                interest_shortfall,
                accumulated_shortfall: if track_shortfall {
                    accumulated_shortfall
                } else {
                    Decimal::ZERO
                },
                shortfall_recovered,
                defaulted_interest,
                ending_balance,
            });

            balance = ending_balance;
            current_date = add_months(current_date, step)?;
        }

        let metrics = calculate_metrics(&periods);
        let result = CashflowResult { periods, metrics };

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Loan Cashflow Projection",
            &serde_json::json!({
                "loan": &self.loan,
                "assumptions": &self.assumptions,
                "interest_config": &self.interest_config,
            }),
            warnings,
            elapsed,
            result,
        ))
    }

    /// Coupon for a period. Floating-rate reset is an extension point; until
    /// it lands, floating loans project at the gross coupon (the caller is
    /// warned through the computation envelope).
    fn period_rate(&self) -> Rate {
        self.loan.gross_coupon
    }

    fn remaining_payments(&self, current: NaiveDate) -> u32 {
        let months = (self.loan.maturity_date.year() as i64 - current.year() as i64) * 12
            + (self.loan.maturity_date.month() as i64 - current.month() as i64);
        let months = months.max(0);
        let span = self.loan.payment_frequency.months_per_period() as i64;
        let payments = (months + span - 1) / span;
        payments.max(1) as u32
    }
}

fn calculate_metrics(periods: &[CashflowPeriod]) -> CashflowMetrics {
    let mut weighted_sum = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;

    for period in periods {
        let principal = period.scheduled_principal + period.prepayments;
        let time_in_years = period.year_fraction * Decimal::from(period.period);
        weighted_sum += principal * time_in_years;
        total_principal += principal;
    }

    let wal = if total_principal > Decimal::ZERO {
        weighted_sum / total_principal
    } else {
        Decimal::ZERO
    };

    CashflowMetrics {
        wal,
        duration: None,
        modified_duration: None,
    }
}

fn validate_loan(loan: &LoanCharacteristics) -> ScfResult<()> {
    if loan.current_balance <= Decimal::ZERO {
        return Err(ScfError::InvalidInput {
            field: "current_balance".into(),
            reason: "must be positive".into(),
        });
    }
    if loan.maturity_date < loan.next_payment_date {
        return Err(ScfError::InvalidInput {
            field: "maturity_date".into(),
            reason: "cannot precede the next payment date".into(),
        });
    }
    Ok(())
}

fn validate_assumptions(assumptions: &ScenarioAssumptions) -> ScfResult<()> {
    let bounded = [
        ("prepay_rate", assumptions.prepay_rate),
        ("default_rate", assumptions.default_rate),
        ("severity", assumptions.severity),
    ];
    for (field, value) in bounded {
        if value < Decimal::ZERO || value > dec!(100) {
            return Err(ScfError::InvalidInput {
                field: field.into(),
                reason: "must be between 0 and 100".into(),
            });
        }
    }
    Ok(())
}
