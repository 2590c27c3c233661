//! Fixed-point encoding of currency amounts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::{Error, Result};

/// Hundredths of the currency unit per unit.
pub const AMOUNT_SCALE_FACTOR: Decimal = dec!(100);

/// Encodes `amount` as integer hundredths, rounding half away from zero.
///
/// `0.005` encodes to `1` and `-0.005` to `-1`. Negative amounts (credits) are
/// encoded as-is; suppressing them is the transformer's decision.
pub fn encode_amount(amount: Decimal) -> Result<i64> {
    let scaled = amount
        .checked_mul(AMOUNT_SCALE_FACTOR)
        .ok_or(Error::Encode {
            amount,
            reason: "scaling overflows decimal range",
        })?;

    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(Error::Encode {
            amount,
            reason: "value exceeds 64-bit range",
        })
}
