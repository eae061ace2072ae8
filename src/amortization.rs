// Payments and their components carry the spreadsheet sign convention: the
// principal is an inflow, everything paid back is negative. Payments fall at
// the end of each period.

use log::{info, trace};
use std::fmt;

use crate::error::{LoanError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const CURRENCY_PLACES: i32 = 2;

#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Balance {
    Outstanding(f64),
    PaidInFull,
}

impl Balance {
    pub fn amount(&self) -> f64 {
        match self {
            Balance::Outstanding(amt) => *amt,
            Balance::PaidInFull => 0.,
        }
    }

    pub fn is_paid_in_full(&self) -> bool {
        matches!(self, Balance::PaidInFull)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Outstanding(amt) => write!(f, "{:.2}", amt),
            Balance::PaidInFull => write!(f, "paid in full"),
        }
    }
}

pub(crate) fn round(amt: f64, dec: i32) -> f64 {
    if amt == 0. {
        0.
    } else {
        (amt * 10_f64.powi(dec)).round() / 10_f64.powi(dec)
    }
}

fn check_periods(total_periods: u32) -> Result<()> {
    if total_periods == 0 {
        Err(LoanError::DivisionByZero)
    } else {
        Ok(())
    }
}

fn check_period(period: u32, total_periods: u32) -> Result<()> {
    check_periods(total_periods)?;
    if period == 0 || period > total_periods {
        return Err(LoanError::InvalidArgument {
            name: "period",
            message: format!("{} is outside 1..={}", period, total_periods),
        });
    }
    Ok(())
}

fn check_finite(amt: f64, what: &str) -> Result<f64> {
    if amt.is_finite() {
        Ok(amt)
    } else {
        Err(LoanError::CalculationError {
            message: format!("{} is not a finite amount ({})", what, amt),
        })
    }
}

// 1 - (1 + rate)^-periods, without forming (1 + rate)^periods, which rounds
// to 1 for tiny rates and overflows for very long terms
fn discount_complement(monthly_rate: f64, periods: f64) -> f64 {
    -(-periods * monthly_rate.ln_1p()).exp_m1()
}

/// Unrounded level payment that retires `principal` over `total_periods`.
pub fn annuity_payment(monthly_rate: f64, total_periods: u32, principal: f64) -> Result<f64> {
    check_periods(total_periods)?;
    let n = total_periods as f64;

    let complement = discount_complement(monthly_rate, n);
    let pmt = if monthly_rate == 0. || complement == 0. {
        -principal / n
    } else {
        -principal * monthly_rate / complement
    };
    check_finite(pmt, "payment")
}

pub fn payment(monthly_rate: f64, total_periods: u32, principal: f64) -> Result<f64> {
    annuity_payment(monthly_rate, total_periods, principal).map(|pmt| round(pmt, CURRENCY_PLACES))
}

/// Interest component of the payment due at `period` (1-based).
pub fn interest_portion(
    monthly_rate: f64,
    period: u32,
    total_periods: u32,
    principal: f64,
) -> Result<f64> {
    check_period(period, total_periods)?;
    if monthly_rate == 0. {
        return Ok(0.);
    }

    // balance carried into this period is principal scaled by the share of
    // the discount still ahead of it
    let whole = discount_complement(monthly_rate, total_periods as f64);
    if whole == 0. {
        return Ok(0.);
    }
    let ahead = discount_complement(monthly_rate, (total_periods - period + 1) as f64);
    let carried = principal * ahead / whole;

    check_finite(-carried * monthly_rate, "interest portion")
}

pub fn principal_portion(
    monthly_rate: f64,
    period: u32,
    total_periods: u32,
    principal: f64,
) -> Result<f64> {
    let pmt = annuity_payment(monthly_rate, total_periods, principal)?;
    Ok(pmt - interest_portion(monthly_rate, period, total_periods, principal)?)
}

/// Principal left after `periods_elapsed` scheduled payments.
///
/// Each period's principal component is rounded to cents before it is
/// summed, so the result can drift from the exact schedule by a few cents
/// over a long term.
pub fn remaining_balance(
    monthly_rate: f64,
    total_periods: u32,
    principal: f64,
    periods_elapsed: u32,
) -> Result<Balance> {
    check_periods(total_periods)?;

    if periods_elapsed == 0 {
        return Ok(Balance::Outstanding(principal));
    }
    if periods_elapsed >= total_periods {
        info!(
            "{} of {} periods elapsed, loan is paid in full",
            periods_elapsed, total_periods
        );
        return Ok(Balance::PaidInFull);
    }

    let mut prin_paid_to_date = 0.;
    for period in 1..=periods_elapsed {
        let portion = round(
            principal_portion(monthly_rate, period, total_periods, principal)?,
            CURRENCY_PLACES,
        );
        prin_paid_to_date -= portion;
        trace!(
            "period {}, principal portion {}, principal paid {}",
            period,
            portion,
            prin_paid_to_date
        );
    }

    let remaining = principal - prin_paid_to_date;
    if remaining <= 0. {
        info!("residual balance {} after rounding, loan is paid in full", remaining);
        Ok(Balance::PaidInFull)
    } else {
        Ok(Balance::Outstanding(remaining))
    }
}
