use chrono::{Local, NaiveDate};
use log::{info, trace};
use std::fmt;

use crate::amortization::{self, round, Balance, CURRENCY_PLACES};
use crate::error::{LoanError, Result};
use crate::periods::{self, PeriodConvention};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// amounts are positive and rounded to cents
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoanPayment {
    pub pmt_number: u32,
    pub pmt_amount: f64,
    pub pmt_interest_paid: f64,
    pub pmt_principal_paid: f64,
    pub pmt_end_balance: f64,
}

impl LoanPayment {
    pub fn new(
        pmt_number: u32,
        pmt_amount: f64,
        pmt_interest_paid: f64,
        pmt_principal_paid: f64,
        pmt_end_balance: f64,
    ) -> Self {
        Self {
            pmt_number,
            pmt_amount,
            pmt_interest_paid,
            pmt_principal_paid,
            pmt_end_balance,
        }
    }
}

impl fmt::Display for LoanPayment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pmt number {}, payment ${:.2}, interest paid ${:.2}, principal paid ${:.2}, ending balance ${:.2}",
            self.pmt_number,
            self.pmt_amount,
            self.pmt_interest_paid,
            self.pmt_principal_paid,
            self.pmt_end_balance
        )
    }
}

/// A fixed-rate loan repaid in level monthly installments.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "LoanTerms"))]
pub struct Loan {
    annual_rate: f64,
    term_years: u32,
    principal: f64,
    origination_date: Option<String>,
    convention: PeriodConvention,
    #[cfg_attr(feature = "serde", serde(skip_serializing))]
    total_periods: u32,
}

// deserialized loans go through the same checks as Loan::new
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct LoanTerms {
    annual_rate: f64,
    term_years: u32,
    principal: f64,
    #[serde(default)]
    origination_date: Option<String>,
    #[serde(default)]
    convention: PeriodConvention,
}

#[cfg(feature = "serde")]
impl TryFrom<LoanTerms> for Loan {
    type Error = LoanError;

    fn try_from(terms: LoanTerms) -> Result<Self> {
        let loan = Loan::new(
            terms.annual_rate,
            terms.term_years,
            terms.principal,
            terms.origination_date.as_deref(),
        )?;
        Ok(loan.with_convention(terms.convention))
    }
}

impl Loan {
    // annual_rate is a decimal fraction (0.036 for 3.6%); the origination
    // date is only parsed once elapsed periods are asked for
    pub fn new(
        annual_rate: f64,
        term_years: u32,
        principal: f64,
        origination_date: Option<&str>,
    ) -> Result<Self> {
        if !annual_rate.is_finite() || annual_rate < 0. {
            return Err(LoanError::InvalidArgument {
                name: "annual_rate",
                message: format!("{} must be a finite rate of at least zero", annual_rate),
            });
        }
        if term_years == 0 {
            return Err(LoanError::InvalidArgument {
                name: "term_years",
                message: "term must be at least one year".to_string(),
            });
        }
        if !principal.is_finite() || principal <= 0. {
            return Err(LoanError::InvalidArgument {
                name: "principal",
                message: format!("{} must be a finite positive amount", principal),
            });
        }
        let total_periods =
            term_years
                .checked_mul(12)
                .ok_or_else(|| LoanError::InvalidArgument {
                    name: "term_years",
                    message: format!("{} years overflows the period count", term_years),
                })?;

        Ok(Self {
            annual_rate,
            term_years,
            principal,
            origination_date: origination_date.map(str::to_string),
            convention: PeriodConvention::default(),
            total_periods,
        })
    }

    pub fn with_convention(mut self, convention: PeriodConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn annual_rate(&self) -> f64 {
        self.annual_rate
    }

    pub fn term_years(&self) -> u32 {
        self.term_years
    }

    pub fn principal(&self) -> f64 {
        self.principal
    }

    pub fn origination_date(&self) -> Option<&str> {
        self.origination_date.as_deref()
    }

    pub fn convention(&self) -> PeriodConvention {
        self.convention
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate / 12.
    }

    pub fn total_periods(&self) -> u32 {
        self.total_periods
    }

    pub fn payment(&self) -> Result<f64> {
        amortization::payment(self.monthly_rate(), self.total_periods(), self.principal)
    }

    pub fn elapsed_periods(&self) -> Result<u32> {
        self.elapsed_periods_as_of(today())
    }

    pub fn elapsed_periods_as_of(&self, current: NaiveDate) -> Result<u32> {
        periods::elapsed_periods(self.origination_date(), current, self.convention)
    }

    pub fn remaining_balance(&self) -> Result<Balance> {
        self.remaining_balance_as_of(today())
    }

    pub fn remaining_balance_as_of(&self, current: NaiveDate) -> Result<Balance> {
        let periods_elapsed = self.elapsed_periods_as_of(current)?;
        amortization::remaining_balance(
            self.monthly_rate(),
            self.total_periods(),
            self.principal,
            periods_elapsed,
        )
    }

    pub fn schedule(&self) -> Result<Vec<LoanPayment>> {
        let rate = self.monthly_rate();
        let total_periods = self.total_periods();
        let pmt_amount = -self.payment()?;

        let mut sched_pmt = Vec::with_capacity(total_periods as usize);
        let mut end_balance = self.principal;

        for pmt_number in 1..=total_periods {
            let interest = -round(
                amortization::interest_portion(rate, pmt_number, total_periods, self.principal)?,
                CURRENCY_PLACES,
            );
            let principal = -round(
                amortization::principal_portion(rate, pmt_number, total_periods, self.principal)?,
                CURRENCY_PLACES,
            );

            end_balance -= principal;
            if pmt_number == total_periods || end_balance < 0. {
                end_balance = 0.;
            }
            trace!(
                "pmt # {}, interest {}, principal {}, end bal {}",
                pmt_number,
                interest,
                principal,
                end_balance
            );

            sched_pmt.push(LoanPayment::new(
                pmt_number,
                pmt_amount,
                interest,
                principal,
                round(end_balance, CURRENCY_PLACES),
            ));
        }
        Ok(sched_pmt)
    }

    pub fn show_amortization(&self) -> Result<()> {
        info!("amortization schedule for {}", self);
        for pmt in self.schedule()? {
            println!("{}", pmt);
        }
        Ok(())
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${:.2} at {:.3}% over {} years",
            self.principal,
            self.annual_rate * 100.,
            self.term_years
        )?;
        if let Some(date) = &self.origination_date {
            write!(f, ", originated {}", date)?;
        }
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::{Loan, LoanPayment};
    use crate::amortization::Balance;
    use crate::error::LoanError;
    use crate::periods::PeriodConvention;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use test_log::test;

    fn house_loan() -> Loan {
        Loan::new(0.029, 30, 554000., Some("2020-10-01")).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_loan_new() {
        let loan = house_loan();
        assert_eq!(loan.annual_rate(), 0.029);
        assert_eq!(loan.term_years(), 30);
        assert_eq!(loan.principal(), 554000.);
        assert_eq!(loan.origination_date(), Some("2020-10-01"));
        assert_eq!(loan.convention(), PeriodConvention::MonthEnd);
        assert_eq!(loan.total_periods(), 360);
        assert_eq!(loan.monthly_rate(), 0.029 / 12.);
        assert_eq!(
            loan.to_string(),
            "$554000.00 at 2.900% over 30 years, originated 2020-10-01"
        );
    }

    #[test]
    fn test_loan_validation() {
        for (rate, term, principal, name) in [
            (-0.01, 30, 1000., "annual_rate"),
            (f64::NAN, 30, 1000., "annual_rate"),
            (0.05, 0, 1000., "term_years"),
            (0.05, u32::MAX, 1000., "term_years"),
            (0.05, 30, 0., "principal"),
            (0.05, 30, -250., "principal"),
            (0.05, 30, f64::INFINITY, "principal"),
        ] {
            match Loan::new(rate, term, principal, None) {
                Err(LoanError::InvalidArgument { name: got, .. }) => assert_eq!(got, name),
                other => panic!("expected InvalidArgument for {name}, got {other:?}"),
            }
        }

        // zero rate is allowed
        assert!(Loan::new(0., 2, 1000., None).is_ok());
    }

    #[test]
    fn test_loan_payments() {
        assert_eq!(house_loan().payment().unwrap(), -2305.91);

        let cases = [
            (0.036, 30, 200000., -909.29),
            (0.0285, 15, 200000., -1366.78),
            (0.036, 30, 100000., -454.65),
            (0.0285, 15, 100000., -683.39),
            (0.055, 4, 25000., -581.41),
            (0., 2, 1000., -41.67),
        ];
        for (rate, term, principal, expected) in cases {
            let loan = Loan::new(rate, term, principal, None).unwrap();
            assert_eq!(loan.payment().unwrap(), expected);
        }
    }

    #[test]
    fn test_loan_remaining_balance() {
        let loan = house_loan();

        assert_eq!(loan.elapsed_periods_as_of(ymd(2026, 10, 16)).unwrap(), 72);
        assert_abs_diff_eq!(
            loan.remaining_balance_as_of(ymd(2026, 10, 16)).unwrap().amount(),
            478045.18,
            epsilon = 1e-6
        );

        // nothing elapsed before the first month end
        assert_eq!(
            loan.remaining_balance_as_of(ymd(2020, 10, 30)).unwrap(),
            Balance::Outstanding(554000.)
        );
        assert_eq!(
            loan.remaining_balance_as_of(ymd(2019, 1, 1)).unwrap(),
            Balance::Outstanding(554000.)
        );
        assert_abs_diff_eq!(
            loan.remaining_balance_as_of(ymd(2020, 10, 31)).unwrap().amount(),
            553032.92,
            epsilon = 1e-6
        );

        // last month end of the term is 2050-09-30
        assert!(!loan
            .remaining_balance_as_of(ymd(2050, 9, 29))
            .unwrap()
            .is_paid_in_full());
        assert_eq!(
            loan.remaining_balance_as_of(ymd(2050, 9, 30)).unwrap(),
            Balance::PaidInFull
        );
    }

    #[test]
    fn test_loan_completed_months_balance() {
        let loan = house_loan().with_convention(PeriodConvention::CompletedMonths);

        assert_eq!(loan.elapsed_periods_as_of(ymd(2020, 10, 31)).unwrap(), 0);
        assert_eq!(
            loan.remaining_balance_as_of(ymd(2020, 10, 31)).unwrap(),
            Balance::Outstanding(554000.)
        );
        assert_eq!(loan.elapsed_periods_as_of(ymd(2020, 11, 1)).unwrap(), 1);
        assert_eq!(loan.elapsed_periods_as_of(ymd(2026, 10, 16)).unwrap(), 72);
    }

    #[test]
    fn test_loan_without_origination_date() {
        let loan = Loan::new(0.036, 30, 200000., None).unwrap();
        assert!(loan.payment().is_ok());
        assert!(matches!(
            loan.elapsed_periods(),
            Err(LoanError::MissingOriginationDate)
        ));
        assert!(matches!(
            loan.remaining_balance(),
            Err(LoanError::MissingOriginationDate)
        ));
    }

    #[test]
    fn test_loan_with_bad_origination_date() {
        let loan = Loan::new(0.029, 30, 554000., Some("2020/10/01")).unwrap();
        assert!(matches!(
            loan.elapsed_periods(),
            Err(LoanError::InvalidDateFormat { .. })
        ));
        assert!(matches!(
            loan.remaining_balance_as_of(ymd(2026, 10, 16)),
            Err(LoanError::InvalidDateFormat { .. })
        ));
    }

    #[test]
    fn test_schedule() {
        let loan = house_loan();
        let sched = loan.schedule().unwrap();

        assert_eq!(sched.len(), 360);
        assert_eq!(
            sched[0],
            LoanPayment::new(1, 2305.91, 1338.83, 967.08, 553032.92)
        );
        assert_eq!(
            sched[0].to_string(),
            "pmt number 1, payment $2305.91, interest paid $1338.83, principal paid $967.08, ending balance $553032.92"
        );
        assert_eq!(sched[1].pmt_interest_paid, 1336.5);
        assert_eq!(sched[1].pmt_principal_paid, 969.42);
        assert_eq!(sched[71].pmt_end_balance, 478045.18);
        assert_eq!(sched[359].pmt_principal_paid, 2300.35);
        assert_eq!(sched[359].pmt_interest_paid, 5.56);
        assert_eq!(sched[359].pmt_end_balance, 0.);

        // schedule agrees with the balance calculation
        let bal = loan.remaining_balance_as_of(ymd(2021, 9, 30)).unwrap();
        assert_abs_diff_eq!(bal.amount(), sched[11].pmt_end_balance, epsilon = 1e-6);

        let total_principal: f64 = sched.iter().map(|p| p.pmt_principal_paid).sum();
        assert_abs_diff_eq!(total_principal, 554000., epsilon = 1.);
    }

    #[test]
    fn test_zero_rate_schedule() {
        let loan = Loan::new(0., 2, 1000., None).unwrap();
        let sched = loan.schedule().unwrap();

        assert_eq!(sched.len(), 24);
        assert!(sched.iter().all(|p| p.pmt_interest_paid == 0.));
        assert_eq!(sched[5].pmt_end_balance, 749.98);
        assert_eq!(sched[23].pmt_end_balance, 0.);
        assert!(loan.show_amortization().is_ok());
    }

    #[test]
    fn test_loan_with_tiny_rate() {
        let loan = Loan::new(1e-16, 30, 554000., Some("2020-10-01")).unwrap();
        assert_eq!(loan.payment().unwrap(), -1538.89);

        let bal = loan.remaining_balance_as_of(ymd(2026, 10, 16)).unwrap();
        assert!(bal.amount().is_finite());
        assert_abs_diff_eq!(bal.amount(), 443199.92, epsilon = 1e-6);
        assert!(loan.schedule().unwrap().iter().all(|p| p.pmt_end_balance.is_finite()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_validates() {
        let loan: Loan = serde_json::from_str(
            r#"{"annual_rate":0.029,"term_years":30,"principal":554000.0,"origination_date":"2020-10-01"}"#,
        )
        .unwrap();
        assert_eq!(loan, house_loan());
        assert_eq!(loan.total_periods(), 360);

        let json = serde_json::to_string(&loan).unwrap();
        assert!(!json.contains("total_periods"));
        assert_eq!(serde_json::from_str::<Loan>(&json).unwrap(), loan);

        for bad in [
            r#"{"annual_rate":0.05,"term_years":4294967295,"principal":1.0,"origination_date":null,"convention":"MonthEnd"}"#,
            r#"{"annual_rate":0.05,"term_years":0,"principal":1.0}"#,
            r#"{"annual_rate":0.05,"term_years":30,"principal":-5.0}"#,
            r#"{"annual_rate":-1.0,"term_years":30,"principal":1000.0}"#,
        ] {
            let err = serde_json::from_str::<Loan>(bad).unwrap_err();
            assert!(err.to_string().contains("invalid argument"), "{}", err);
        }
    }

    // verifies that types can implement the gated traits below
    fn is_normal<T: Sized + Send + Sync + Unpin>() {}

    #[test]
    fn normal_types() {
        is_normal::<Loan>();
        is_normal::<LoanPayment>();
        is_normal::<Balance>();
    }
}
