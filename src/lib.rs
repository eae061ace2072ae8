pub mod amortization;
pub mod error;
pub mod loan;
pub mod periods;

pub use amortization::Balance;
pub use error::{LoanError, Result};
pub use loan::{Loan, LoanPayment};
pub use periods::PeriodConvention;
