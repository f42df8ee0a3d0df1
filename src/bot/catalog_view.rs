//! Catalog browsing, product cards and the cart view.
//!
//! Listings are redrawn in place: category and page navigation edit the
//! message the button was pressed on, the product card is sent once and then
//! edited through `product_message_id`, and the cart is redrawn through
//! `cart_message_id`.

use anyhow::Result;
use std::num::NonZeroU32;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ReplyMarkup};
use tracing::{debug, warn};

use crate::catalog::{CategoryId, Product, ProductId};
use crate::dialogue::Session;
use crate::errors::ShopError;
use crate::localization::{t_args_lang, t_lang};
use crate::pagination::paginate;
use crate::shop::{Shop, Turn};

use super::callback_handler::CallbackAction;
use super::ui_builder::{
    cart_keyboard, cart_line_label, cart_product_keyboard, categories_keyboard, product_caption,
    product_keyboard, products_keyboard,
};

/// A rendered listing ready to be sent or edited
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub text: String,
    pub markup: Option<InlineKeyboardMarkup>,
    /// Page number after clamping
    pub page: u32,
}

impl Shop {
    /// Reply to a lookup that found nothing, so the user is not left waiting
    pub(crate) async fn report_unavailable(&self, turn: &Turn, session: &Session, error: &ShopError) {
        warn!(user_id = %turn.chat, error = %error, "Referenced catalog entry is gone");
        self.send(turn.chat, t_lang("product-unavailable", session.lang()), None)
            .await;
    }

    /// Render the catalog listing the session currently points at
    pub async fn render_catalog(&self, session: &Session) -> Result<View> {
        let lang = session.lang();
        let page_size = self.config().page_size;

        let Some(category_id) = session.view.category_id else {
            let roots = self.catalog().categories(None).await?;
            let page = paginate(&roots, session.view.page, page_size);
            return Ok(View {
                text: t_lang("catalog-title", lang),
                markup: Some(categories_keyboard(&page, None, lang)),
                page: page.number,
            });
        };

        let category = self.catalog().category(category_id).await?;
        let back = Some(match category.parent_id {
            Some(parent) => CallbackAction::Category(parent),
            None => CallbackAction::CategoriesRoot,
        });

        if category.has_subcategories {
            let children = self.catalog().categories(Some(category_id)).await?;
            let page = paginate(&children, session.view.page, page_size);
            Ok(View {
                text: t_args_lang("catalog-category", &[("title", category.title.as_str())], lang),
                markup: Some(categories_keyboard(&page, back, lang)),
                page: page.number,
            })
        } else {
            let products = self.catalog().products_in(category_id).await?;
            let page = paginate(&products, session.view.page, page_size);
            Ok(View {
                text: t_args_lang("catalog-products", &[("title", category.title.as_str())], lang),
                markup: Some(products_keyboard(&page, back, &self.config().currency, lang)),
                page: page.number,
            })
        }
    }

    /// Render the cart; an empty cart is a plain message without keyboard
    pub async fn render_cart(&self, session: &Session) -> Result<View> {
        let lang = session.lang();
        let products = self.catalog().products(&session.cart.product_ids()).await?;
        let lines: Vec<(Product, NonZeroU32)> = products
            .into_iter()
            .filter_map(|product| {
                let count = session.cart.quantity(product.id)?;
                Some((product, count))
            })
            .collect();

        if lines.is_empty() {
            return Ok(View {
                text: t_lang("cart-empty", lang),
                markup: None,
                page: 1,
            });
        }

        let page = paginate(&lines, session.view.cart_page, self.config().page_size);
        Ok(View {
            text: t_lang("cart-title", lang),
            markup: Some(cart_keyboard(&page, lang)),
            page: page.number,
        })
    }

    /// `/catalog`: restart the flow and send the root listing
    pub async fn show_catalog(&self, turn: &Turn) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        session.reset_flow();
        session.view.category_id = None;
        session.view.page = 1;
        session.view.product_message_id = None;

        let view = self.render_catalog(&session).await?;
        session.view.page = view.page;
        self.save_session(turn.chat, session).await?;

        self.send(turn.chat, view.text, view.markup.map(ReplyMarkup::InlineKeyboard))
            .await;
        Ok(())
    }

    /// Enter a category (`None` is the root) and redraw the listing
    pub async fn open_category(
        &self,
        turn: &Turn,
        origin: Option<MessageId>,
        category_id: Option<CategoryId>,
    ) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        let previous = (session.view.category_id, session.view.page);
        session.view.category_id = category_id;
        session.view.page = 1;

        let view = match self.render_catalog(&session).await {
            Ok(view) => view,
            Err(e) => match e.downcast_ref::<ShopError>() {
                Some(err) if err.is_not_found() => {
                    (session.view.category_id, session.view.page) = previous;
                    self.report_unavailable(turn, &session, err).await;
                    return Ok(());
                }
                _ => return Err(e),
            },
        };

        session.view.page = view.page;
        self.save_session(turn.chat, session).await?;
        self.show_view(turn, origin, view).await;
        Ok(())
    }

    /// Move the catalog listing by `delta` pages
    pub async fn turn_catalog_page(&self, turn: &Turn, origin: Option<MessageId>, delta: i32) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        session.view.page = session.view.page.saturating_add_signed(delta).max(1);
        let view = self.render_catalog(&session).await?;
        session.view.page = view.page;
        self.save_session(turn.chat, session).await?;

        self.show_view(turn, origin, view).await;
        Ok(())
    }

    /// Show a product card with the "add to cart" control
    pub async fn show_product(&self, turn: &Turn, product_id: ProductId) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        let product = match self.catalog().product(product_id).await {
            Ok(product) => product,
            Err(e) if e.is_not_found() => {
                self.report_unavailable(turn, &session, &e).await;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let caption = product_caption(&product, &self.config().currency, session.lang());
        let markup = product_keyboard(product.id, session.lang());
        self.show_card(turn, &mut session, caption, markup).await;
        self.save_session(turn.chat, session).await
    }

    /// `/cart`: restart the flow and send the first cart page
    pub async fn show_cart(&self, turn: &Turn) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        session.reset_flow();
        session.view.cart_page = 1;
        session.view.product_message_id = None;

        let view = self.render_cart(&session).await?;
        session.view.cart_page = view.page;
        let sent = self
            .send(turn.chat, view.text, view.markup.map(ReplyMarkup::InlineKeyboard))
            .await;
        if let Some(id) = sent {
            session.view.cart_message_id = Some(id.0);
        }
        self.save_session(turn.chat, session).await
    }

    /// Move the cart listing by `delta` pages
    pub async fn turn_cart_page(&self, turn: &Turn, origin: Option<MessageId>, delta: i32) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        session.view.cart_page = session.view.cart_page.saturating_add_signed(delta).max(1);
        let view = self.render_cart(&session).await?;
        session.view.cart_page = view.page;
        if let Some(origin) = origin {
            session.view.cart_message_id = Some(origin.0);
        }
        self.save_session(turn.chat, session).await?;

        self.show_view(turn, origin, view).await;
        Ok(())
    }

    /// Show a cart line item with buy / change quantity / delete controls
    pub async fn show_cart_product(&self, turn: &Turn, product_id: ProductId) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        let Some(count) = session.cart.quantity(product_id) else {
            self.send(turn.chat, t_lang("product-not-in-cart", session.lang()), None)
                .await;
            return Ok(());
        };

        let product = match self.catalog().product(product_id).await {
            Ok(product) => product,
            Err(e) if e.is_not_found() => {
                self.report_unavailable(turn, &session, &e).await;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let caption = format!(
            "{}\n\n{}",
            product_caption(&product, &self.config().currency, session.lang()),
            cart_line_label(&product.title, count, session.lang())
        );
        let markup = cart_product_keyboard(product.id, session.lang());
        self.show_card(turn, &mut session, caption, markup).await;
        self.save_session(turn.chat, session).await
    }

    /// Remove a line item and redraw the cart view
    pub async fn delete_from_cart(
        &self,
        turn: &Turn,
        origin: Option<MessageId>,
        product_id: ProductId,
    ) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        if session.cart.remove(product_id).is_none() {
            debug!(user_id = %turn.chat, product_id = %product_id, "Product already removed from cart");
        }

        let title = match self.catalog().product(product_id).await {
            Ok(product) => product.title,
            Err(e) if e.is_not_found() => product_id.to_string(),
            Err(e) => return Err(e.into()),
        };

        let view = self.render_cart(&session).await?;
        session.view.cart_page = view.page;
        let target = session.view.cart_message_id.map(MessageId);
        self.save_session(turn.chat, session.clone()).await?;

        self.send(
            turn.chat,
            t_args_lang("cart-removed", &[("title", title.as_str())], session.lang()),
            None,
        )
        .await;

        // The cart listing, not the product card the button was on
        let target = target.or(origin);
        self.show_view(turn, target, view).await;
        Ok(())
    }

    /// Edit `origin` with the view, or send it as a new message
    async fn show_view(&self, turn: &Turn, origin: Option<MessageId>, view: View) {
        match origin {
            Some(message) => {
                self.edit(turn.chat, message, view.text, view.markup).await;
            }
            None => {
                self.send(turn.chat, view.text, view.markup.map(ReplyMarkup::InlineKeyboard))
                    .await;
            }
        }
    }

    /// Edit the product card in place, falling back to a fresh message
    async fn show_card(
        &self,
        turn: &Turn,
        session: &mut Session,
        caption: String,
        markup: InlineKeyboardMarkup,
    ) {
        if let Some(id) = session.view.product_message_id {
            if self
                .edit(turn.chat, MessageId(id), caption.clone(), Some(markup.clone()))
                .await
            {
                return;
            }
        }

        let sent = self
            .send(turn.chat, caption, Some(ReplyMarkup::InlineKeyboard(markup)))
            .await;
        session.view.product_message_id = sent.map(|id| id.0);
    }
}
