pub mod cashflows;
pub mod curves;
pub mod dates;
pub mod error;
pub mod pricing;
pub mod rates;
pub mod scenarios;
pub mod timing;
pub mod types;
pub mod waterfall;

pub use error::{ScfError, ValidationError};
pub use types::*;

/// Standard result type for all structured-cashflows operations.
pub type ScfResult<T> = Result<T, ScfError>;
