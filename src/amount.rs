//! Amount range validation

use crate::constants::{COIN, MAX_MONEY};
use crate::types::Amount;

/// MoneyRange: ℤ → {true, false}
///
/// An amount is in range iff 0 ≤ v ≤ M_max.
pub fn money_range(value: Amount) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

/// Add `value` to a running total that must stay inside `money_range`.
///
/// Returns `None` if either operand or the result leaves the range.
pub fn checked_money_add(total: Amount, value: Amount) -> Option<Amount> {
    if !money_range(total) || !money_range(value) {
        return None;
    }
    let sum = total.checked_add(value)?;
    money_range(sum).then_some(sum)
}

/// Sum output values, failing if any value or partial sum leaves the range
pub fn checked_money_sum<I>(values: I) -> Option<Amount>
where
    I: IntoIterator<Item = Amount>,
{
    values.into_iter().try_fold(0, checked_money_add)
}

/// Render an amount as a decimal FRC string with eight fractional digits
pub fn format_money(value: Amount) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let coin = COIN as u64;
    format!("{}{}.{:08}", sign, abs / coin, abs % coin)
}
