//! Money arithmetic using decimal amounts.
//!
//! All amounts are in the store currency's standard unit (e.g. złoty, not
//! grosze) and are rounded to two decimal places, half away from zero, when
//! they are stored or shown.

use rust_decimal::{Decimal, RoundingStrategy};

/// Multiplier applied to the live product price when a cart is checked out.
pub const CHECKOUT_DISCOUNT_RATE: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

/// Round an amount to two decimal places.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unrounded value of `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of `(unit_price, quantity)` lines, rounded once at the end.
#[must_use]
pub fn sum_money<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    round_money(
        lines
            .into_iter()
            .map(|(price, quantity)| line_total(price, quantity))
            .sum(),
    )
}

/// Unit price charged at checkout for a product currently priced at `price`.
#[must_use]
pub fn discounted_price(price: Decimal) -> Decimal {
    round_money(price * CHECKOUT_DISCOUNT_RATE)
}
