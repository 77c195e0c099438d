//! Pure display formatters. No side effects.

use alloy::primitives::{Address, U256};

const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;
const DISPLAY_SCALE: u64 = 10_000;

/// Render a wei balance as ether rounded to 4 decimal places.
///
/// Trailing zeros are trimmed: `1.5`, `0.0001`, `2`.
pub fn format_balance(wei: U256) -> String {
    let unit = U256::from(WEI_PER_ETHER);
    let half = unit / U256::from(2u8);
    let scaled = (wei.saturating_mul(U256::from(DISPLAY_SCALE)).saturating_add(half)) / unit;

    let scale = U256::from(DISPLAY_SCALE);
    let whole = scaled / scale;
    let frac = scaled % scale;
    if frac.is_zero() {
        return whole.to_string();
    }

    let frac = format!("{:04}", frac.to::<u64>());
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Abbreviated account label, e.g. `0xf39F...2266`.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
