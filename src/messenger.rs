//! Transport boundary: everything the shop sends to Telegram goes through
//! the [`Messenger`] trait so the checkout flow can run against a fake.

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardMarkup, LabeledPrice, MessageId, ReplyMarkup, UserId,
};
use tracing::debug;

use crate::payment::Invoice;

/// Outbound requests issued by the shop
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a new text message and return its id
    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageId>;

    /// Replace the text and inline keyboard of an existing message
    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn send_invoice(&self, chat: ChatId, invoice: Invoice) -> Result<()>;

    /// Whether `user` is currently a member of `chat`
    async fn is_chat_member(&self, chat: ChatId, user: UserId) -> Result<bool>;
}

/// [`Messenger`] backed by the Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    provider_token: String,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, provider_token: impl Into<String>) -> Self {
        Self {
            bot,
            provider_token: provider_token.into(),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageId> {
        let request = self.bot.send_message(chat, text);
        let sent = match markup {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
        Ok(sent.id)
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = self.bot.edit_message_text(chat, message, text);
        match markup {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn send_invoice(&self, chat: ChatId, invoice: Invoice) -> Result<()> {
        let amount = u32::try_from(invoice.amount)
            .with_context(|| format!("invoice amount {} out of range", invoice.amount))?;

        debug!(
            user_id = %chat,
            payload = %invoice.payload,
            amount,
            "Sending invoice"
        );

        self.bot
            .send_invoice(
                chat,
                invoice.title,
                invoice.description,
                invoice.payload.to_string(),
                invoice.currency.clone(),
                vec![LabeledPrice::new(invoice.currency, amount)],
            )
            .provider_token(self.provider_token.clone())
            .await?;
        Ok(())
    }

    async fn is_chat_member(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let member = self.bot.get_chat_member(chat, user).await?;
        Ok(!(member.is_left() || member.is_banned()))
    }
}
