//! Message Handler module for processing incoming text messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ReplyMarkup, User};
use tracing::{debug, info, warn};

use crate::clients::Client;
use crate::localization::{t_args_lang, t_lang, DEFAULT_LOCALE};
use crate::membership::{self, Access};
use crate::notifier;
use crate::shop::{Shop, Turn};

use super::ui_builder::{main_menu_keyboard, subscribe_keyboard};

/// Recognised text command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Catalog,
    Cart,
    Help,
    Broadcast(String),
}

impl Command {
    /// Parse a slash command or a menu button label; anything else is free text
    pub fn parse(text: &str, language_code: Option<&str>) -> Option<Self> {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix('/') {
            let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            // "/cart@shop_bot" in group chats
            let name = head.split('@').next().unwrap_or(head);
            return match name {
                "start" => Some(Command::Start),
                "catalog" => Some(Command::Catalog),
                "cart" => Some(Command::Cart),
                "help" => Some(Command::Help),
                "broadcast" => Some(Command::Broadcast(args.trim().to_string())),
                _ => None,
            };
        }

        let is_menu = |key: &str| {
            text == t_lang(key, language_code) || text == t_lang(key, Some(DEFAULT_LOCALE))
        };
        if is_menu("menu-catalog") {
            Some(Command::Catalog)
        } else if is_menu("menu-cart") {
            Some(Command::Cart)
        } else {
            None
        }
    }
}

/// Handle incoming messages
pub async fn message_handler(msg: Message, shop: Arc<Shop>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };
    let turn = Turn::new(msg.chat.id, user.language_code.clone());
    let lang = turn.language_code.as_deref();

    if let Access::Denied { chat } =
        membership::check(shop.messenger(), &shop.config().subscribe_chats, user.id).await
    {
        debug!(user_id = %user.id, chat_id = %chat, "Membership gate stopped the message");
        let text = t_args_lang("subscribe-required", &[("name", user.full_name().as_str())], lang);
        let markup = subscribe_keyboard(&shop.config().subscribe_links, lang);
        shop.send(turn.chat, text, Some(ReplyMarkup::InlineKeyboard(markup)))
            .await;
        return Ok(());
    }

    let Some(text) = msg.text() else {
        debug!(user_id = %user.id, "Ignoring non-text message");
        return Ok(());
    };
    debug!(user_id = %user.id, text_length = text.len(), "Received text message");

    match Command::parse(text, lang) {
        Some(Command::Start) => handle_start(&shop, &turn, user).await,
        Some(Command::Catalog) => shop.show_catalog(&turn).await,
        Some(Command::Cart) => shop.show_cart(&turn).await,
        Some(Command::Help) => {
            shop.send(turn.chat, t_lang("help", lang), None).await;
            Ok(())
        }
        Some(Command::Broadcast(template)) => handle_broadcast(&shop, &turn, user, template).await,
        None => shop.handle_text(&turn, text).await,
    }
}

/// `/start`: register the customer and greet them with the menu keyboard
async fn handle_start(shop: &Shop, turn: &Turn, user: &User) -> Result<()> {
    let client = Client::from(user);
    match shop.clients().upsert(&client).await {
        Ok(true) => info!(user_id = %user.id, "Registered new client"),
        Ok(false) => debug!(user_id = %user.id, "Refreshed client profile"),
        Err(e) => warn!(user_id = %user.id, error = %e, "Failed to store client profile"),
    }

    let lang = {
        let _guard = shop.lock_turn(turn.chat).await;
        let mut session = shop.load_session(turn).await?;
        session.reset_flow();
        let lang = session.language_code.clone();
        shop.save_session(turn.chat, session).await?;
        lang
    };

    let text = t_args_lang(
        "welcome",
        &[("name", client.full_name().as_str())],
        lang.as_deref(),
    );
    let markup = ReplyMarkup::Keyboard(main_menu_keyboard(lang.as_deref()));
    shop.send(turn.chat, text, Some(markup)).await;
    Ok(())
}

/// `/broadcast <text>`: send the text to every registered client
async fn handle_broadcast(shop: &Arc<Shop>, turn: &Turn, user: &User, template: String) -> Result<()> {
    let lang = turn.language_code.as_deref();

    if !shop.config().is_admin(user.id) {
        debug!(user_id = %user.id, "Broadcast requested by non-admin, treating as free text");
        return shop.handle_text(turn, &format!("/broadcast {template}")).await;
    }
    if template.is_empty() {
        shop.send(turn.chat, t_lang("broadcast-usage", lang), None).await;
        return Ok(());
    }

    let clients = shop.clients().all().await?;
    info!(user_id = %user.id, recipients = clients.len(), "Starting broadcast");
    shop.send(
        turn.chat,
        t_args_lang(
            "broadcast-started",
            &[("count", clients.len().to_string().as_str())],
            lang,
        ),
        None,
    )
    .await;

    let shop = Arc::clone(shop);
    tokio::spawn(async move {
        notifier::broadcast(shop.messenger(), &clients, &template).await;
    });
    Ok(())
}
