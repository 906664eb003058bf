//! Pure fiscal rules: identifiers, states, taxes and SEFAZ status codes.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ServiceError;

pub mod sefaz_status;
pub mod state;
pub mod tax_calculator;
pub mod validators;

pub use state::BrazilianState;
pub use tax_calculator::{TaxBreakdown, TaxCalculator, TaxRegime};

/// Rounds a monetary amount to cents, halves away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest quantity or unit price a line can store (`NUMERIC(15, 4)`).
pub fn max_unit_value() -> Decimal {
    Decimal::new(999_999_999_999_999, 4)
}

/// Largest monetary amount a line or document can store (`NUMERIC(15, 2)`).
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999_999, 2)
}

/// Raised when an amount does not fit the decimal range.
pub fn amount_overflow(field: &'static str) -> ServiceError {
    ServiceError::bad_request(format!("{} is too large", field))
        .with_context(|ctx| ctx.with_tag("validation").with_metadata("field", field))
}
