//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId};
use tracing::{debug, error, warn};

use crate::catalog::{CategoryId, ProductId};
use crate::dialogue::PurchaseTarget;
use crate::errors::ShopError;
use crate::shop::{Shop, Turn};

/// Decoded inline button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Category(CategoryId),
    CategoriesRoot,
    CatalogPrevious,
    CatalogNext,
    Product(ProductId),
    AddToCart(ProductId),
    CartProduct(ProductId),
    Buy(ProductId),
    BuyWholeCart,
    ChangeCount(ProductId),
    DeleteFromCart(ProductId),
    Yes,
    No,
    CartPrevious,
    CartNext,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Category(id) => write!(f, "category_{id}"),
            CallbackAction::CategoriesRoot => f.write_str("categories_root"),
            CallbackAction::CatalogPrevious => f.write_str("catalog_previous"),
            CallbackAction::CatalogNext => f.write_str("catalog_next"),
            CallbackAction::Product(id) => write!(f, "product_{id}"),
            CallbackAction::AddToCart(id) => write!(f, "add_to_cart_{id}"),
            CallbackAction::CartProduct(id) => write!(f, "cart_product_{id}"),
            CallbackAction::Buy(id) => write!(f, "buy_{id}"),
            CallbackAction::BuyWholeCart => f.write_str("buy_whole_cart"),
            CallbackAction::ChangeCount(id) => write!(f, "change_count_{id}"),
            CallbackAction::DeleteFromCart(id) => write!(f, "delete_from_cart_{id}"),
            CallbackAction::Yes => f.write_str("yes"),
            CallbackAction::No => f.write_str("no"),
            CallbackAction::CartPrevious => f.write_str("cart_previous"),
            CallbackAction::CartNext => f.write_str("cart_next"),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = ShopError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let exact = match data {
            "categories_root" => Some(CallbackAction::CategoriesRoot),
            "catalog_previous" => Some(CallbackAction::CatalogPrevious),
            "catalog_next" => Some(CallbackAction::CatalogNext),
            "buy_whole_cart" => Some(CallbackAction::BuyWholeCart),
            "yes" => Some(CallbackAction::Yes),
            "no" => Some(CallbackAction::No),
            "cart_previous" => Some(CallbackAction::CartPrevious),
            "cart_next" => Some(CallbackAction::CartNext),
            _ => None,
        };
        if let Some(action) = exact {
            return Ok(action);
        }

        let malformed = || ShopError::MalformedPayload(data.to_string());
        let product = |rest: &str| rest.parse::<ProductId>().map_err(|_| malformed());

        // Longer prefixes first: "cart_product_" must win over "product_"
        if let Some(rest) = data.strip_prefix("add_to_cart_") {
            Ok(CallbackAction::AddToCart(product(rest)?))
        } else if let Some(rest) = data.strip_prefix("cart_product_") {
            Ok(CallbackAction::CartProduct(product(rest)?))
        } else if let Some(rest) = data.strip_prefix("change_count_") {
            Ok(CallbackAction::ChangeCount(product(rest)?))
        } else if let Some(rest) = data.strip_prefix("delete_from_cart_") {
            Ok(CallbackAction::DeleteFromCart(product(rest)?))
        } else if let Some(rest) = data.strip_prefix("category_") {
            rest.parse::<CategoryId>()
                .map(CallbackAction::Category)
                .map_err(|_| malformed())
        } else if let Some(rest) = data.strip_prefix("product_") {
            Ok(CallbackAction::Product(product(rest)?))
        } else if let Some(rest) = data.strip_prefix("buy_") {
            Ok(CallbackAction::Buy(product(rest)?))
        } else {
            Err(malformed())
        }
    }
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, shop: Arc<Shop>) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Stop the client-side spinner whatever happens next
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let data = q.data.as_deref().unwrap_or("");
    let action = match data.parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            warn!(user_id = %q.from.id, payload = %data, error = %e, "Ignoring malformed callback payload");
            return Ok(());
        }
    };

    let chat = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));
    let origin = q.message.as_ref().map(|m| m.id());
    let turn = Turn::new(chat, q.from.language_code.clone());

    if let Err(e) = dispatch_action(&shop, &turn, origin, action).await {
        error!(user_id = %chat, action = %action, error = %e, "Callback turn failed");
    }
    Ok(())
}

/// Route a decoded action to the shop
pub async fn dispatch_action(
    shop: &Shop,
    turn: &Turn,
    origin: Option<MessageId>,
    action: CallbackAction,
) -> Result<()> {
    match action {
        CallbackAction::Category(id) => shop.open_category(turn, origin, Some(id)).await,
        CallbackAction::CategoriesRoot => shop.open_category(turn, origin, None).await,
        CallbackAction::CatalogPrevious => shop.turn_catalog_page(turn, origin, -1).await,
        CallbackAction::CatalogNext => shop.turn_catalog_page(turn, origin, 1).await,
        CallbackAction::Product(id) => shop.show_product(turn, id).await,
        CallbackAction::AddToCart(id) => shop.add_to_cart(turn, id).await,
        CallbackAction::CartProduct(id) => shop.show_cart_product(turn, id).await,
        CallbackAction::Buy(id) => shop.start_purchase(turn, PurchaseTarget::Product(id)).await,
        CallbackAction::BuyWholeCart => shop.start_purchase(turn, PurchaseTarget::WholeCart).await,
        CallbackAction::ChangeCount(id) => shop.change_count(turn, id).await,
        CallbackAction::DeleteFromCart(id) => shop.delete_from_cart(turn, origin, id).await,
        CallbackAction::Yes => shop.confirm_add(turn, true).await,
        CallbackAction::No => shop.confirm_add(turn, false).await,
        CallbackAction::CartPrevious => shop.turn_cart_page(turn, origin, -1).await,
        CallbackAction::CartNext => shop.turn_cart_page(turn, origin, 1).await,
    }
}
