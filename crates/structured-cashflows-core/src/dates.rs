//! Date arithmetic shared by every engine: day-count year fractions,
//! business-day adjustment of payment dates, and checked month stepping.
//!
//! No holiday calendars — adjustment rolls off weekends only.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::ScfError;
use crate::types::{BusinessDayConvention, DayCount};
use crate::ScfResult;

/// Year fraction between two dates under the given day-count convention.
///
/// 30/360 clamps each day-of-month to 30; the ACT variants use the absolute
/// calendar-day difference over a 360/365/actual-year denominator.
pub fn year_fraction(start: NaiveDate, end: NaiveDate, day_count: DayCount) -> Decimal {
    match day_count {
        DayCount::Thirty360 => {
            let d1 = start.day().min(30) as i64;
            let d2 = end.day().min(30) as i64;
            let days = 360 * (end.year() as i64 - start.year() as i64)
                + 30 * (end.month() as i64 - start.month() as i64)
                + (d2 - d1);
            Decimal::from(days) / dec!(360)
        }
        DayCount::Act360 => Decimal::from(calendar_days(start, end)) / dec!(360),
        DayCount::Act365 => Decimal::from(calendar_days(start, end)) / dec!(365),
        DayCount::ActAct => {
            Decimal::from(calendar_days(start, end)) / Decimal::from(days_in_year(start.year()))
        }
    }
}

fn calendar_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().abs()
}

fn days_in_year(year: i32) -> i64 {
    if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
        366
    } else {
        365
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Roll a payment date off a weekend according to the convention.
///
/// ModifiedFollowing rolls forward unless that crosses a month boundary, in
/// which case it rolls backward instead.
pub fn adjust_payment_date(
    date: NaiveDate,
    convention: BusinessDayConvention,
) -> ScfResult<NaiveDate> {
    if convention == BusinessDayConvention::Unadjusted || !is_weekend(date) {
        return Ok(date);
    }

    match convention {
        BusinessDayConvention::Following => roll(date, true),
        BusinessDayConvention::Previous => roll(date, false),
        BusinessDayConvention::ModifiedFollowing => {
            let adjusted = roll(date, true)?;
            if adjusted.month() != date.month() {
                roll(date, false)
            } else {
                Ok(adjusted)
            }
        }
        BusinessDayConvention::Unadjusted => Ok(date),
    }
}

fn roll(mut date: NaiveDate, forward: bool) -> ScfResult<NaiveDate> {
    while is_weekend(date) {
        let next = if forward {
            date.checked_add_days(Days::new(1))
        } else {
            date.checked_sub_days(Days::new(1))
        };
        date = next.ok_or_else(|| {
            ScfError::DateError(format!("business-day roll overflowed at {date}"))
        })?;
    }
    Ok(date)
}

pub fn add_months(date: NaiveDate, months: u32) -> ScfResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| ScfError::DateError(format!("{date} + {months} months overflows")))
}

pub fn sub_months(date: NaiveDate, months: u32) -> ScfResult<NaiveDate> {
    date.checked_sub_months(Months::new(months))
        .ok_or_else(|| ScfError::DateError(format!("{date} - {months} months overflows")))
}

pub fn sub_days(date: NaiveDate, days: u64) -> ScfResult<NaiveDate> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| ScfError::DateError(format!("{date} - {days} days overflows")))
}
