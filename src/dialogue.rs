//! Conversation session: checkout state, cart and view bookkeeping.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use teloxide::dispatching::dialogue::ErasedStorage;

use crate::cart::Cart;
use crate::catalog::{CategoryId, ProductId};

/// What an invoice is being prepared for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseTarget {
    /// One cart line item
    Product(ProductId),
    /// Every line item in the cart
    WholeCart,
}

/// Position of the conversation in the checkout flow
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutState {
    #[default]
    Idle,
    /// Waiting for the number of units of `product_id`
    AwaitingCount { product_id: ProductId },
    /// Waiting for yes/no before writing `count` into the cart
    AwaitingConfirmation {
        product_id: ProductId,
        count: NonZeroU32,
    },
    /// Waiting for a delivery address before issuing the invoice
    AwaitingDeliveryLocation { target: PurchaseTarget },
}

/// One line item as it was priced on an invoice
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicedLine {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: NonZeroU32,
    /// `price * quantity` in major units at invoice time
    pub amount: Decimal,
}

/// An invoice that was sent and is not paid yet.
///
/// Holds what the buyer was asked to pay for, so a payment is recorded
/// against its own invoice even if the cart or address changed since.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub target: PurchaseTarget,
    pub delivery_location: String,
    pub lines: Vec<InvoicedLine>,
}

/// Which message the catalog and cart views live in
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    /// Category being browsed; `None` is the root listing
    pub category_id: Option<CategoryId>,
    /// 1-based catalog page
    pub page: u32,
    /// 1-based cart page
    pub cart_page: u32,
    pub product_message_id: Option<i32>,
    pub cart_message_id: Option<i32>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            category_id: None,
            page: 1,
            cart_page: 1,
            product_message_id: None,
            cart_message_id: None,
        }
    }
}

/// Everything the bot remembers about one chat
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: CheckoutState,
    pub cart: Cart,
    /// Last address the user entered
    pub delivery_location: Option<String>,
    /// Unpaid invoices, at most one per target
    pub pending_purchases: Vec<PendingPurchase>,
    pub view: ViewState,
    pub language_code: Option<String>,
}

impl Session {
    /// Drop any half-finished flow; the cart and pending invoice survive
    pub fn reset_flow(&mut self) {
        self.state = CheckoutState::Idle;
    }

    pub fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    /// Remember an issued invoice; a newer invoice for the same target replaces the older one
    pub fn add_pending(&mut self, purchase: PendingPurchase) {
        self.pending_purchases.retain(|p| p.target != purchase.target);
        self.pending_purchases.push(purchase);
    }

    /// Take the unpaid invoice for `target` out of the session
    pub fn take_pending(&mut self, target: PurchaseTarget) -> Option<PendingPurchase> {
        let index = self.pending_purchases.iter().position(|p| p.target == target)?;
        Some(self.pending_purchases.remove(index))
    }

    pub fn pending(&self, target: PurchaseTarget) -> Option<&PendingPurchase> {
        self.pending_purchases.iter().find(|p| p.target == target)
    }
}

/// Storage backing the sessions, erased so Redis and in-memory stores are interchangeable
pub type SessionStorage = ErasedStorage<Session>;

/// Why a quantity reply was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity is not a whole number")]
    NotANumber,
    #[error("quantity is not positive")]
    NotPositive,
}

/// Parses a quantity reply; only positive whole numbers are accepted
pub fn parse_quantity(input: &str) -> Result<NonZeroU32, QuantityError> {
    let value: i64 = input
        .trim()
        .parse()
        .map_err(|_| QuantityError::NotANumber)?;

    if value <= 0 {
        return Err(QuantityError::NotPositive);
    }

    u32::try_from(value)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(QuantityError::NotANumber)
}

/// Validates a delivery address reply
pub fn validate_delivery_location(input: &str) -> Result<String, &'static str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(parse_quantity("3"), Ok(NonZeroU32::new(3).unwrap()));
        assert_eq!(parse_quantity("  12 "), Ok(NonZeroU32::new(12).unwrap()));
        assert_eq!(parse_quantity("+4"), Ok(NonZeroU32::new(4).unwrap()));

        assert_eq!(parse_quantity("0"), Err(QuantityError::NotPositive));
        assert_eq!(parse_quantity("-2"), Err(QuantityError::NotPositive));
        assert_eq!(parse_quantity("two"), Err(QuantityError::NotANumber));
        assert_eq!(parse_quantity("1.5"), Err(QuantityError::NotANumber));
        assert_eq!(parse_quantity(""), Err(QuantityError::NotANumber));
        assert_eq!(parse_quantity("99999999999"), Err(QuantityError::NotANumber));
    }

    #[test]
    fn test_delivery_location_validation() {
        assert_eq!(
            validate_delivery_location("  Moscow, Tverskaya 1 "),
            Ok("Moscow, Tverskaya 1".to_string())
        );
        assert!(validate_delivery_location("   ").is_err());
    }

    #[test]
    fn test_reset_flow_keeps_cart() {
        let mut session = Session::default();
        session.cart.set(ProductId(1), NonZeroU32::new(2).unwrap());
        session.state = CheckoutState::AwaitingCount {
            product_id: ProductId(1),
        };

        session.reset_flow();

        assert_eq!(session.state, CheckoutState::Idle);
        assert_eq!(session.cart.len(), 1);
    }

    #[test]
    fn test_newer_invoice_replaces_pending_one_for_same_target() {
        let pending = |target, address: &str| PendingPurchase {
            target,
            delivery_location: address.to_string(),
            lines: Vec::new(),
        };
        let mut session = Session::default();

        session.add_pending(pending(PurchaseTarget::WholeCart, "Lenina 1"));
        session.add_pending(pending(PurchaseTarget::Product(ProductId(5)), "Lenina 2"));
        session.add_pending(pending(PurchaseTarget::WholeCart, "Lenina 3"));

        assert_eq!(session.pending_purchases.len(), 2);
        assert_eq!(
            session.pending(PurchaseTarget::WholeCart).map(|p| p.delivery_location.as_str()),
            Some("Lenina 3")
        );

        let taken = session.take_pending(PurchaseTarget::Product(ProductId(5)));
        assert_eq!(taken.map(|p| p.delivery_location), Some("Lenina 2".to_string()));
        assert!(session.take_pending(PurchaseTarget::Product(ProductId(5))).is_none());
        assert_eq!(session.pending_purchases.len(), 1);
    }

    #[test]
    fn test_session_survives_json_round_trip() {
        let mut session = Session::default();
        session.state = CheckoutState::AwaitingDeliveryLocation {
            target: PurchaseTarget::WholeCart,
        };
        session.view.product_message_id = Some(42);

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }
}
