use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("no origination date was supplied for this loan")]
    MissingOriginationDate,

    #[error("origination date {value:?} must be formatted as 'yyyy-mm-dd'")]
    InvalidDateFormat {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("division by zero: loan has no payment periods")]
    DivisionByZero,

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument {
        name: &'static str,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LoanError>;
