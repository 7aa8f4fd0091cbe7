use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Decimals of the ledger's native currency (wei per ether).
pub const NATIVE_DECIMALS: u32 = 18;

/// Converts a decimal amount in native units to base units, truncating
/// anything below one base unit. `None` for negative or oversized amounts.
pub fn to_base_units(amount: Decimal) -> Option<u128> {
    if amount.is_sign_negative() {
        return None;
    }
    let scale = Decimal::from(10u64.pow(NATIVE_DECIMALS));
    amount.checked_mul(scale)?.trunc().to_u128()
}

pub fn from_base_units(value: u128) -> Option<Decimal> {
    let mantissa = i128::try_from(value).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, NATIVE_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}
