use anyhow::Result;
use std::num::NonZeroU32;

use shopbot::cart::Cart;
use shopbot::catalog::{CategoryId, ProductId};
use shopbot::dialogue::{
    parse_quantity, validate_delivery_location, CheckoutState, InvoicedLine, PendingPurchase,
    PurchaseTarget, QuantityError, Session, ViewState,
};
use rust_decimal::Decimal;

/// Integration test for the replies the checkout flow accepts
#[tokio::test]
async fn test_reply_validation() -> Result<()> {
    assert_eq!(parse_quantity("2")?.get(), 2);
    assert_eq!(parse_quantity("0"), Err(QuantityError::NotPositive));
    assert_eq!(parse_quantity("-1"), Err(QuantityError::NotPositive));
    assert_eq!(parse_quantity("two"), Err(QuantityError::NotANumber));
    assert_eq!(parse_quantity("1.5"), Err(QuantityError::NotANumber));

    assert_eq!(
        validate_delivery_location("  Moscow, Tverskaya 1 "),
        Ok("Moscow, Tverskaya 1".to_string())
    );
    assert!(validate_delivery_location("   ").is_err());

    Ok(())
}

/// Sessions survive the JSON round trip used by the Redis storage
#[tokio::test]
async fn test_session_serialization() -> Result<()> {
    let mut cart = Cart::new();
    cart.set(ProductId(10), NonZeroU32::new(2).unwrap());
    cart.set(ProductId(20), NonZeroU32::new(1).unwrap());

    let states = vec![
        CheckoutState::Idle,
        CheckoutState::AwaitingCount {
            product_id: ProductId(10),
        },
        CheckoutState::AwaitingConfirmation {
            product_id: ProductId(10),
            count: NonZeroU32::new(3).unwrap(),
        },
        CheckoutState::AwaitingDeliveryLocation {
            target: PurchaseTarget::WholeCart,
        },
    ];

    for state in states {
        let session = Session {
            state,
            cart: cart.clone(),
            delivery_location: Some("Moscow".to_string()),
            pending_purchases: vec![PendingPurchase {
                target: PurchaseTarget::Product(ProductId(20)),
                delivery_location: "Moscow".to_string(),
                lines: vec![InvoicedLine {
                    product_id: ProductId(20),
                    title: "Cable".to_string(),
                    quantity: NonZeroU32::new(1).unwrap(),
                    amount: Decimal::new(5000, 2),
                }],
            }],
            view: ViewState {
                category_id: Some(CategoryId(3)),
                page: 2,
                cart_page: 1,
                product_message_id: Some(55),
                cart_message_id: None,
            },
            language_code: Some("ru".to_string()),
        };

        let json = serde_json::to_string(&session)?;
        let restored: Session = serde_json::from_str(&json)?;
        assert_eq!(restored, session);
    }

    Ok(())
}

/// Leaving a flow keeps the cart and the unpaid invoice
#[tokio::test]
async fn test_reset_flow_keeps_cart() -> Result<()> {
    let mut session = Session::default();
    session.cart.set(ProductId(10), NonZeroU32::new(1).unwrap());
    session.add_pending(PendingPurchase {
        target: PurchaseTarget::WholeCart,
        delivery_location: "Moscow".to_string(),
        lines: Vec::new(),
    });
    session.state = CheckoutState::AwaitingCount {
        product_id: ProductId(20),
    };

    session.reset_flow();

    assert_eq!(session.state, CheckoutState::Idle);
    assert!(session.cart.contains(ProductId(10)));
    assert!(session.pending(PurchaseTarget::WholeCart).is_some());
    assert_eq!(session.view, ViewState::default());

    Ok(())
}
