use chrono::{Datelike, Months, NaiveDate};
use log::{trace, warn};
use std::fmt;

use crate::error::{LoanError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeriodConvention {
    // month-end dates within [origination, current], both ends inclusive
    #[default]
    MonthEnd,
    // whole months n with origination + n months <= current
    CompletedMonths,
}

impl fmt::Display for PeriodConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodConvention::MonthEnd => write!(f, "month-end"),
            PeriodConvention::CompletedMonths => write!(f, "completed months"),
        }
    }
}

/// Parses a `yyyy-mm-dd` origination date. A blank value counts as missing.
pub fn parse_origination_date(origination: Option<&str>) -> Result<NaiveDate> {
    let value = match origination.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => {
            warn!("No origination date was supplied for this loan.");
            return Err(LoanError::MissingOriginationDate);
        }
    };

    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| {
        warn!(
            "Origination date {:?} must be formatted as 'yyyy-mm-dd', loan balance cannot be calculated.",
            value
        );
        LoanError::InvalidDateFormat {
            value: value.to_string(),
            source,
        }
    })
}

pub fn elapsed_periods(
    origination: Option<&str>,
    current: NaiveDate,
    convention: PeriodConvention,
) -> Result<u32> {
    let origination_date = parse_origination_date(origination)?;
    let periods = periods_between(origination_date, current, convention);
    trace!(
        "{} periods elapsed between {} and {} ({})",
        periods,
        origination_date,
        current,
        convention
    );
    Ok(periods)
}

pub(crate) fn periods_between(
    origination: NaiveDate,
    current: NaiveDate,
    convention: PeriodConvention,
) -> u32 {
    if current < origination {
        return 0;
    }

    // non-negative since current >= origination
    let month_diff = (month_index(&current) - month_index(&origination)) as u32;

    match convention {
        // the first month end on or after origination is always in
        // origination's own month, so every month boundary crossed counts once
        PeriodConvention::MonthEnd => month_diff + u32::from(is_month_end(&current)),
        PeriodConvention::CompletedMonths => {
            let mut months = month_diff;
            while months > 0 {
                match origination.checked_add_months(Months::new(months)) {
                    Some(anniversary) if anniversary <= current => break,
                    _ => months -= 1,
                }
            }
            months
        }
    }
}

fn month_index(date: &NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn is_month_end(date: &NaiveDate) -> bool {
    date.succ_opt()
        .map_or(true, |next| next.month() != date.month())
}
