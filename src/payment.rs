//! Invoice payloads and money arithmetic.
//!
//! Amounts sent to the payment provider are integers in minor units. A line
//! is priced as `trunc(price * 100) * quantity`; the truncation happens on the
//! unit price, before multiplying by the quantity.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use crate::catalog::ProductId;
use crate::dialogue::PurchaseTarget;
use crate::errors::ShopError;

const WHOLE_CART_PAYLOAD: &str = "whole_cart";
const PRODUCT_PAYLOAD_PREFIX: &str = "product_";

/// Opaque token round-tripped through the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPayload(pub PurchaseTarget);

impl fmt::Display for PaymentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            PurchaseTarget::WholeCart => f.write_str(WHOLE_CART_PAYLOAD),
            PurchaseTarget::Product(id) => write!(f, "{PRODUCT_PAYLOAD_PREFIX}{id}"),
        }
    }
}

impl FromStr for PaymentPayload {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == WHOLE_CART_PAYLOAD {
            return Ok(PaymentPayload(PurchaseTarget::WholeCart));
        }

        s.strip_prefix(PRODUCT_PAYLOAD_PREFIX)
            .and_then(|id| id.parse::<ProductId>().ok())
            .map(|id| PaymentPayload(PurchaseTarget::Product(id)))
            .ok_or_else(|| ShopError::MalformedPayload(s.to_string()))
    }
}

/// Request to present a payable amount to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub title: String,
    pub description: String,
    pub payload: PaymentPayload,
    pub currency: String,
    /// Total in minor units
    pub amount: i64,
}

/// Payment-confirmed event as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedPayment {
    pub payload: String,
    pub charge_id: String,
    /// Amount actually charged, in minor units
    pub total_amount: i64,
    pub currency: String,
}

/// Unit price in minor units, fractional minor units truncated
pub fn unit_price_minor(price: Decimal) -> i64 {
    (price * Decimal::from(100))
        .trunc()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Line amount in minor units: truncated unit price times quantity
pub fn line_amount_minor(price: Decimal, count: NonZeroU32) -> i64 {
    unit_price_minor(price).saturating_mul(i64::from(count.get()))
}

/// Sum of line amounts in minor units
pub fn total_amount_minor<I>(lines: I) -> i64
where
    I: IntoIterator<Item = (Decimal, NonZeroU32)>,
{
    lines
        .into_iter()
        .map(|(price, count)| line_amount_minor(price, count))
        .fold(0i64, i64::saturating_add)
}

/// Major-unit value of a minor-unit amount (two decimal places)
pub fn minor_to_decimal(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Ledger amount for one line item, in major units rounded to cents
pub fn line_total(price: Decimal, count: NonZeroU32) -> Decimal {
    (price * Decimal::from(count.get())).round_dp(2)
}

/// Render a minor-unit amount as "1234.50"
pub fn format_minor(amount: i64) -> String {
    format!("{:.2}", minor_to_decimal(amount))
}

/// Render a price the way catalog labels show it: whole units with thousands separators
pub fn format_price_label(price: Decimal) -> String {
    let whole = price.trunc().to_i64().unwrap_or(0);
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Symbol shown next to amounts for a currency code
pub fn currency_symbol(code: &str) -> &str {
    match code {
        "RUB" => "₽",
        "USD" => "$",
        "EUR" => "€",
        other => other,
    }
}
