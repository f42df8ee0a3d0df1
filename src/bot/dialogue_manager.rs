//! Dialogue Manager module: the checkout state machine.
//!
//! Add-to-cart runs `Idle -> AwaitingCount -> AwaitingConfirmation -> Idle`;
//! buying runs `Idle -> AwaitingDeliveryLocation -> Idle` and ends with an
//! invoice. Session mutations are saved before any outbound call, so a failed
//! send never leaves the conversation half transitioned.

use anyhow::Result;
use chrono::Utc;
use std::num::NonZeroU32;
use teloxide::types::ReplyMarkup;
use tracing::{debug, error, info, warn};

use crate::catalog::{Product, ProductId};
use crate::clients::Client;
use crate::dialogue::{
    parse_quantity, validate_delivery_location, CheckoutState, InvoicedLine, PendingPurchase,
    PurchaseTarget, Session,
};
use crate::faq;
use crate::ledger::{AppendOutcome, OrderRecord};
use crate::localization::{t_args_lang, t_lang};
use crate::payment::{
    currency_symbol, format_minor, line_amount_minor, line_total, minor_to_decimal,
    total_amount_minor, ConfirmedPayment, Invoice, PaymentPayload,
};
use crate::shop::{Shop, Turn};

use super::ui_builder::confirmation_keyboard;

/// Priced view of what an invoice is for
struct Purchase {
    description: String,
    amount: i64,
    lines: Vec<InvoicedLine>,
}

impl Shop {
    /// "Add to cart" on a product card: ask for a quantity
    pub async fn add_to_cart(&self, turn: &Turn, product_id: ProductId) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let session = self.load_session(turn).await?;
        self.enter_count(turn, session, product_id, "count-prompt").await
    }

    /// "Change quantity" on a cart line item: same path as adding
    pub async fn change_count(&self, turn: &Turn, product_id: ProductId) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let session = self.load_session(turn).await?;

        if !session.cart.contains(product_id) {
            self.send(turn.chat, t_lang("product-not-in-cart", session.lang()), None)
                .await;
            return Ok(());
        }
        self.enter_count(turn, session, product_id, "count-change-prompt")
            .await
    }

    async fn enter_count(
        &self,
        turn: &Turn,
        mut session: Session,
        product_id: ProductId,
        prompt_key: &str,
    ) -> Result<()> {
        let Some(product) = self.lookup_product(turn, &session, product_id).await? else {
            return Ok(());
        };

        session.state = CheckoutState::AwaitingCount { product_id };
        let prompt = t_args_lang(prompt_key, &[("title", product.title.as_str())], session.lang());
        self.save_session(turn.chat, session).await?;

        self.send(turn.chat, prompt, None).await;
        Ok(())
    }

    /// Free text, interpreted according to the current state
    pub async fn handle_text(&self, turn: &Turn, text: &str) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let session = self.load_session(turn).await?;

        match session.state.clone() {
            CheckoutState::AwaitingCount { product_id } => {
                self.submit_quantity(turn, session, product_id, text).await
            }
            CheckoutState::AwaitingConfirmation { product_id, count } => {
                self.prompt_confirmation(turn, &session, product_id, count)
                    .await
            }
            CheckoutState::AwaitingDeliveryLocation { target } => {
                self.submit_delivery_location(turn, session, target, text)
                    .await
            }
            CheckoutState::Idle => {
                self.answer_question(turn, &session, text).await;
                Ok(())
            }
        }
    }

    async fn submit_quantity(
        &self,
        turn: &Turn,
        mut session: Session,
        product_id: ProductId,
        text: &str,
    ) -> Result<()> {
        let count = match parse_quantity(text) {
            Ok(count) => count,
            Err(reason) => {
                debug!(user_id = %turn.chat, input = %text, reason = ?reason, "Rejected quantity");
                self.send(turn.chat, t_lang("count-invalid", session.lang()), None)
                    .await;
                return Ok(());
            }
        };

        session.state = CheckoutState::AwaitingConfirmation { product_id, count };
        self.save_session(turn.chat, session.clone()).await?;
        self.prompt_confirmation(turn, &session, product_id, count)
            .await
    }

    async fn prompt_confirmation(
        &self,
        turn: &Turn,
        session: &Session,
        product_id: ProductId,
        count: NonZeroU32,
    ) -> Result<()> {
        let title = self.product_title(product_id).await?;
        let text = t_args_lang(
            "confirm-add",
            &[("title", title.as_str()), ("count", count.to_string().as_str())],
            session.lang(),
        );
        let markup = ReplyMarkup::InlineKeyboard(confirmation_keyboard(session.lang()));
        self.send(turn.chat, text, Some(markup)).await;
        Ok(())
    }

    /// Yes/no answer to the add-to-cart confirmation
    pub async fn confirm_add(&self, turn: &Turn, accepted: bool) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        let CheckoutState::AwaitingConfirmation { product_id, count } = session.state else {
            debug!(user_id = %turn.chat, state = ?session.state, "Ignoring stale confirmation");
            return Ok(());
        };

        let key = if accepted {
            session.cart.set(product_id, count);
            "cart-added"
        } else {
            "cart-add-cancelled"
        };
        session.reset_flow();
        self.save_session(turn.chat, session.clone()).await?;

        let title = self.product_title(product_id).await?;
        let text = t_args_lang(
            key,
            &[("title", title.as_str()), ("count", count.to_string().as_str())],
            session.lang(),
        );
        self.send(turn.chat, text, None).await;
        Ok(())
    }

    /// "Buy" on a cart line item or "pay for the whole cart": ask for an address
    pub async fn start_purchase(&self, turn: &Turn, target: PurchaseTarget) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        let refusal = match target {
            _ if session.cart.is_empty() => Some("cart-empty"),
            PurchaseTarget::Product(id) if !session.cart.contains(id) => Some("product-not-in-cart"),
            _ => None,
        };
        if let Some(key) = refusal {
            session.reset_flow();
            self.save_session(turn.chat, session.clone()).await?;
            self.send(turn.chat, t_lang(key, session.lang()), None).await;
            return Ok(());
        }

        session.state = CheckoutState::AwaitingDeliveryLocation { target };
        self.save_session(turn.chat, session.clone()).await?;

        self.send(turn.chat, t_lang("delivery-prompt", session.lang()), None)
            .await;
        Ok(())
    }

    async fn submit_delivery_location(
        &self,
        turn: &Turn,
        mut session: Session,
        target: PurchaseTarget,
        text: &str,
    ) -> Result<()> {
        let location = match validate_delivery_location(text) {
            Ok(location) => location,
            Err(_) => {
                self.send(turn.chat, t_lang("delivery-invalid", session.lang()), None)
                    .await;
                return Ok(());
            }
        };
        session.delivery_location = Some(location.clone());

        let Some(purchase) = self.price_purchase(turn, &mut session, target).await? else {
            return Ok(());
        };

        let limit = self.config().max_invoice_amount;
        if purchase.amount > limit {
            info!(
                user_id = %turn.chat,
                amount = purchase.amount,
                limit,
                "Invoice amount exceeds the configured ceiling"
            );
            if self.config().reset_on_amount_limit {
                session.reset_flow();
            }
            let currency = currency_symbol(&self.config().currency);
            let text = t_args_lang(
                "amount-limit",
                &[
                    ("amount", format_minor(purchase.amount).as_str()),
                    ("limit", format_minor(limit).as_str()),
                    ("currency", currency),
                ],
                session.lang(),
            );
            self.save_session(turn.chat, session).await?;
            self.send(turn.chat, text, None).await;
            return Ok(());
        }

        session.reset_flow();
        session.add_pending(PendingPurchase {
            target,
            delivery_location: location,
            lines: purchase.lines,
        });
        let invoice = Invoice {
            title: t_lang("invoice-title", session.lang()),
            description: purchase.description,
            payload: PaymentPayload(target),
            currency: self.config().currency.clone(),
            amount: purchase.amount,
        };
        self.save_session(turn.chat, session).await?;

        if let Err(e) = self.messenger().send_invoice(turn.chat, invoice).await {
            error!(user_id = %turn.chat, error = %e, "Failed to send invoice");
        }
        Ok(())
    }

    /// Price the purchase from current catalog prices.
    ///
    /// Returns `None` after telling the user when nothing payable is left.
    async fn price_purchase(
        &self,
        turn: &Turn,
        session: &mut Session,
        target: PurchaseTarget,
    ) -> Result<Option<Purchase>> {
        match target {
            PurchaseTarget::WholeCart => {
                let products = self.catalog().products(&session.cart.product_ids()).await?;
                let priced: Vec<_> = products
                    .iter()
                    .filter_map(|p| session.cart.quantity(p.id).map(|count| (p, count)))
                    .collect();

                if priced.is_empty() {
                    warn!(user_id = %turn.chat, "No product of the cart is still in the catalog");
                    session.reset_flow();
                    self.save_session(turn.chat, session.clone()).await?;
                    self.send(turn.chat, t_lang("product-unavailable", session.lang()), None)
                        .await;
                    return Ok(None);
                }

                Ok(Some(Purchase {
                    description: t_lang("invoice-whole-cart", session.lang()),
                    amount: total_amount_minor(priced.iter().map(|(p, count)| (p.price, *count))),
                    lines: priced
                        .iter()
                        .map(|(product, count)| invoiced_line(product, *count))
                        .collect(),
                }))
            }
            PurchaseTarget::Product(product_id) => {
                let Some(count) = session.cart.quantity(product_id) else {
                    session.reset_flow();
                    self.save_session(turn.chat, session.clone()).await?;
                    self.send(turn.chat, t_lang("product-not-in-cart", session.lang()), None)
                        .await;
                    return Ok(None);
                };
                let Some(product) = self.lookup_product(turn, session, product_id).await? else {
                    return Ok(None);
                };

                Ok(Some(Purchase {
                    description: t_args_lang(
                        "invoice-product",
                        &[
                            ("title", product.title.as_str()),
                            ("count", count.to_string().as_str()),
                        ],
                        session.lang(),
                    ),
                    amount: line_amount_minor(product.price, count),
                    lines: vec![invoiced_line(&product, count)],
                }))
            }
        }
    }

    /// Pre-checkout queries are always accepted; stock is not re-validated here
    pub fn accept_pre_checkout(&self, payload: &str) -> bool {
        debug!(payload = %payload, "Accepting pre-checkout query");
        true
    }

    /// Record a confirmed payment in the ledger and thank the buyer
    pub async fn confirm_payment(
        &self,
        turn: &Turn,
        buyer: &Client,
        payment: ConfirmedPayment,
    ) -> Result<()> {
        let _guard = self.lock_turn(turn.chat).await;
        let mut session = self.load_session(turn).await?;

        let target = match payment.payload.parse::<PaymentPayload>() {
            Ok(PaymentPayload(target)) => target,
            Err(e) => {
                warn!(
                    user_id = %turn.chat,
                    charge_id = %payment.charge_id,
                    error = %e,
                    "Payment with unknown payload"
                );
                return Ok(());
            }
        };

        let (delivery_location, lines) = match session.take_pending(target) {
            Some(pending) => (pending.delivery_location, pending.lines),
            None => {
                warn!(
                    user_id = %turn.chat,
                    charge_id = %payment.charge_id,
                    payload = %payment.payload,
                    "No pending invoice for this payment, using the current cart"
                );
                let lines = self.cart_lines(&session, target).await?;
                (session.delivery_location.clone().unwrap_or_default(), lines)
            }
        };

        let ordered_at = Utc::now();
        let record = |product_id: Option<ProductId>, title: &str, quantity: Option<u32>, amount| {
            OrderRecord {
                charge_id: payment.charge_id.clone(),
                buyer_id: buyer.id,
                product_id,
                buyer_name: buyer.display_name(),
                delivery_location: delivery_location.clone(),
                product_title: title.to_string(),
                quantity,
                amount,
                ordered_at,
            }
        };

        let mut records: Vec<OrderRecord> = match target {
            PurchaseTarget::WholeCart => lines
                .iter()
                .map(|line| {
                    record(
                        Some(line.product_id),
                        &line.title,
                        Some(line.quantity.get()),
                        line.amount,
                    )
                })
                .collect(),
            // A single item is recorded at the amount actually charged
            PurchaseTarget::Product(product_id) => lines
                .iter()
                .filter(|line| line.product_id == product_id)
                .take(1)
                .map(|line| {
                    record(
                        Some(product_id),
                        &line.title,
                        Some(line.quantity.get()),
                        minor_to_decimal(payment.total_amount),
                    )
                })
                .collect(),
        };

        if records.is_empty() {
            error!(
                user_id = %turn.chat,
                charge_id = %payment.charge_id,
                payload = %payment.payload,
                total_amount = payment.total_amount,
                "Paid invoice matches no line item, recording the charge alone"
            );
            let (product_id, title) = match target {
                PurchaseTarget::Product(id) => (Some(id), self.product_title(id).await?),
                PurchaseTarget::WholeCart => (None, payment.payload.clone()),
            };
            records.push(record(
                product_id,
                &title,
                None,
                minor_to_decimal(payment.total_amount),
            ));
        }

        let amount = format_minor(payment.total_amount);
        let currency = currency_symbol(&payment.currency);
        let reply = match (target, records.first()) {
            (
                PurchaseTarget::Product(_),
                Some(OrderRecord {
                    product_title,
                    quantity: Some(quantity),
                    ..
                }),
            ) => t_args_lang(
                "payment-product",
                &[
                    ("title", product_title.as_str()),
                    ("count", quantity.to_string().as_str()),
                    ("amount", amount.as_str()),
                    ("currency", currency),
                ],
                session.lang(),
            ),
            _ => t_args_lang(
                "payment-whole-cart",
                &[("amount", amount.as_str()), ("currency", currency)],
                session.lang(),
            ),
        };

        match self.ledger().append_payment(&records).await? {
            AppendOutcome::DuplicateCharge => {
                warn!(
                    user_id = %turn.chat,
                    charge_id = %payment.charge_id,
                    "Payment already recorded, ignoring redelivered confirmation"
                );
                return Ok(());
            }
            AppendOutcome::Appended(rows) => {
                info!(
                    user_id = %turn.chat,
                    charge_id = %payment.charge_id,
                    rows,
                    total_amount = payment.total_amount,
                    "Recorded payment"
                );
            }
        }

        if self.config().clear_cart_after_payment {
            match target {
                PurchaseTarget::WholeCart => session.cart.clear(),
                PurchaseTarget::Product(id) => {
                    session.cart.remove(id);
                }
            }
        }
        self.save_session(turn.chat, session).await?;

        self.send(turn.chat, reply, None).await;
        Ok(())
    }

    /// Line items of `target` resolved from the current cart and catalog
    async fn cart_lines(&self, session: &Session, target: PurchaseTarget) -> Result<Vec<InvoicedLine>> {
        let ids = match target {
            PurchaseTarget::WholeCart => session.cart.product_ids(),
            PurchaseTarget::Product(id) => vec![id],
        };
        let products = self.catalog().products(&ids).await?;
        Ok(products
            .iter()
            .filter_map(|product| {
                let count = session.cart.quantity(product.id)?;
                Some(invoiced_line(product, count))
            })
            .collect())
    }

    /// Idle free text: best FAQ answer or a usage hint
    async fn answer_question(&self, turn: &Turn, session: &Session, text: &str) {
        let reply = match faq::best_match(text) {
            Some(entry) => entry.message_text(),
            None => t_lang("faq-no-match", session.lang()),
        };
        self.send(turn.chat, reply, None).await;
    }

    /// Look a product up, telling the user when it is gone
    async fn lookup_product(
        &self,
        turn: &Turn,
        session: &Session,
        product_id: ProductId,
    ) -> Result<Option<Product>> {
        match self.catalog().product(product_id).await {
            Ok(product) => Ok(Some(product)),
            Err(e) if e.is_not_found() => {
                self.report_unavailable(turn, session, &e).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Title for messages; a vanished product is shown by id
    async fn product_title(&self, product_id: ProductId) -> Result<String> {
        match self.catalog().product(product_id).await {
            Ok(product) => Ok(product.title),
            Err(e) if e.is_not_found() => Ok(product_id.to_string()),
            Err(e) => Err(e.into()),
        }
    }
}

fn invoiced_line(product: &Product, quantity: NonZeroU32) -> InvoicedLine {
    InvoicedLine {
        product_id: product.id,
        title: product.title.clone(),
        quantity,
        amount: line_total(product.price, quantity),
    }
}
