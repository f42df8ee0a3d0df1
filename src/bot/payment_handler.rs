//! Payment Handler module: pre-checkout answers and successful payments

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{PreCheckoutQuery, SuccessfulPayment};
use tracing::{debug, error, warn};

use crate::clients::Client;
use crate::payment::ConfirmedPayment;
use crate::shop::{Shop, Turn};

impl From<&SuccessfulPayment> for ConfirmedPayment {
    fn from(payment: &SuccessfulPayment) -> Self {
        Self {
            payload: payment.invoice_payload.clone(),
            charge_id: payment.provider_payment_charge_id.clone(),
            total_amount: i64::from(payment.total_amount),
            currency: payment.currency.clone(),
        }
    }
}

/// Answer the pre-checkout query of an invoice
pub async fn pre_checkout_handler(bot: Bot, q: PreCheckoutQuery, shop: Arc<Shop>) -> Result<()> {
    debug!(
        user_id = %q.from.id,
        payload = %q.invoice_payload,
        total_amount = q.total_amount,
        "Received pre-checkout query"
    );

    let ok = shop.accept_pre_checkout(&q.invoice_payload);
    bot.answer_pre_checkout_query(q.id, ok).await?;
    Ok(())
}

/// Record a successful payment service message
pub async fn successful_payment_handler(msg: Message, shop: Arc<Shop>) -> Result<()> {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        warn!(chat_id = %msg.chat.id, "Successful payment without sender");
        return Ok(());
    };

    let turn = Turn::new(msg.chat.id, user.language_code.clone());
    let confirmed = ConfirmedPayment::from(payment);
    let charge_id = confirmed.charge_id.clone();

    if let Err(e) = shop.confirm_payment(&turn, &Client::from(user), confirmed).await {
        // The charge went through; the log line is the record of last resort
        error!(
            user_id = %user.id,
            charge_id = %charge_id,
            payload = %payment.invoice_payload,
            total_amount = payment.total_amount,
            error = %e,
            "Failed to record successful payment"
        );
    }
    Ok(())
}
