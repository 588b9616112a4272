//! CGST/SGST computation.
//!
//! Pure arithmetic over `Decimal`; the single system-wide rounding rule
//! lives here. Every place money is rounded goes through [`round_money`] so
//! totals reproduce identically everywhere.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

const MONEY_DECIMALS: u32 = 2;

/// Round a monetary amount to 2 decimal places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Error, PartialEq)]
pub enum TaxError {
    #[error("tax rate {0}% is outside the valid range 0-100")]
    RateOutOfRange(Decimal),

    #[error("subtotal cannot be negative")]
    NegativeSubtotal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxBreakdown {
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub grand_total: Decimal,
}

/// Compute tax amounts and grand total.
///
/// Out-of-range rates are a configuration error surfaced to the caller,
/// never clamped. Tax amounts are rounded per [`round_money`]; the grand
/// total is a plain sum of already-rounded operands.
pub fn compute(
    subtotal: Decimal,
    cgst_percent: Decimal,
    sgst_percent: Decimal,
    round_off: Decimal,
) -> Result<TaxBreakdown, TaxError> {
    if subtotal < Decimal::ZERO {
        return Err(TaxError::NegativeSubtotal);
    }
    for rate in [cgst_percent, sgst_percent] {
        if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
            return Err(TaxError::RateOutOfRange(rate));
        }
    }

    let cgst_amount = round_money(subtotal * cgst_percent / Decimal::ONE_HUNDRED);
    let sgst_amount = round_money(subtotal * sgst_percent / Decimal::ONE_HUNDRED);
    let grand_total = subtotal + cgst_amount + sgst_amount + round_off;

    Ok(TaxBreakdown {
        cgst_amount,
        sgst_amount,
        grand_total,
    })
}
