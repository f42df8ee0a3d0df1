//! Shared fixtures: a recording messenger and a seeded in-memory shop
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shopbot::clients::Client;
use shopbot::config::ShopConfig;
use shopbot::dialogue::{Session, SessionStorage};
use shopbot::ledger::FileOrderLedger;
use shopbot::memory::{InMemoryCatalog, InMemoryClients};
use shopbot::messenger::Messenger;
use shopbot::payment::Invoice;
use shopbot::shop::{Shop, Turn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::dispatching::dialogue::{InMemStorage, Storage};
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId, ReplyMarkup, Seconds, UserId};
use teloxide::RequestError;
use tempfile::TempDir;

/// One outbound request captured by [`RecordingMessenger`]
#[derive(Debug, Clone)]
pub enum Outbound {
    Text {
        chat: ChatId,
        id: MessageId,
        text: String,
        markup: Option<ReplyMarkup>,
    },
    Edit {
        chat: ChatId,
        message: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    Invoice {
        chat: ChatId,
        invoice: Invoice,
    },
}

/// Messenger fake that records every request
#[derive(Default)]
pub struct RecordingMessenger {
    outbox: Mutex<Vec<Outbound>>,
    next_id: AtomicI32,
    non_members: Mutex<HashSet<(ChatId, UserId)>>,
    broken_membership: Mutex<HashSet<ChatId>>,
    rate_limited_once: Mutex<HashSet<ChatId>>,
    blocked: Mutex<HashSet<ChatId>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(100),
            ..Self::default()
        }
    }

    pub fn outbox(&self) -> Vec<Outbound> {
        self.outbox.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.outbox.lock().unwrap().clear();
    }

    /// Texts of sent (not edited) messages, in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.outbox()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.sent_texts().pop()
    }

    pub fn last_sent(&self) -> Option<(MessageId, String, Option<ReplyMarkup>)> {
        self.outbox().into_iter().rev().find_map(|o| match o {
            Outbound::Text { id, text, markup, .. } => Some((id, text, markup)),
            _ => None,
        })
    }

    pub fn edits(&self) -> Vec<(MessageId, String, Option<InlineKeyboardMarkup>)> {
        self.outbox()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Edit {
                    message,
                    text,
                    markup,
                    ..
                } => Some((message, text, markup)),
                _ => None,
            })
            .collect()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.outbox()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Invoice { invoice, .. } => Some(invoice),
                _ => None,
            })
            .collect()
    }

    pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.outbox()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text { chat: c, text, .. } if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn remove_member(&self, chat: ChatId, user: UserId) {
        self.non_members.lock().unwrap().insert((chat, user));
    }

    pub fn break_membership_lookup(&self, chat: ChatId) {
        self.broken_membership.lock().unwrap().insert(chat);
    }

    pub fn rate_limit_once(&self, chat: ChatId) {
        self.rate_limited_once.lock().unwrap().insert(chat);
    }

    pub fn block(&self, chat: ChatId) {
        self.blocked.lock().unwrap().insert(chat);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageId> {
        if self.blocked.lock().unwrap().contains(&chat) {
            return Err(anyhow!("Forbidden: bot was blocked by the user"));
        }
        if self.rate_limited_once.lock().unwrap().remove(&chat) {
            return Err(RequestError::RetryAfter(Seconds::from_seconds(0)).into());
        }

        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.outbox.lock().unwrap().push(Outbound::Text {
            chat,
            id,
            text,
            markup,
        });
        Ok(id)
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        self.outbox.lock().unwrap().push(Outbound::Edit {
            chat,
            message,
            text,
            markup,
        });
        Ok(())
    }

    async fn send_invoice(&self, chat: ChatId, invoice: Invoice) -> Result<()> {
        self.outbox
            .lock()
            .unwrap()
            .push(Outbound::Invoice { chat, invoice });
        Ok(())
    }

    async fn is_chat_member(&self, chat: ChatId, user: UserId) -> Result<bool> {
        if self.broken_membership.lock().unwrap().contains(&chat) {
            return Err(anyhow!("Bad Request: chat not found"));
        }
        Ok(!self.non_members.lock().unwrap().contains(&(chat, user)))
    }
}

pub const CHAT: i64 = 501;

pub const PHONES: i64 = 1;
pub const ANDROID: i64 = 2;
pub const ACCESSORIES: i64 = 3;

pub const PIXEL: i64 = 10;
pub const GALAXY: i64 = 11;
pub const CABLE: i64 = 20;
pub const CASE: i64 = 21;
pub const CHARGER: i64 = 22;

/// A shop wired to in-memory collaborators and a ledger file in a temp dir
pub struct Fixture {
    pub shop: Arc<Shop>,
    pub messenger: Arc<RecordingMessenger>,
    pub catalog: Arc<InMemoryCatalog>,
    pub clients: Arc<InMemoryClients>,
    pub ledger: Arc<FileOrderLedger>,
    pub storage: Arc<SessionStorage>,
    _dir: TempDir,
}

impl Fixture {
    pub async fn new() -> Result<Self> {
        Self::with_config(ShopConfig::default()).await
    }

    pub async fn with_config(config: ShopConfig) -> Result<Self> {
        let dir = TempDir::new()?;
        let messenger = Arc::new(RecordingMessenger::new());
        let catalog = Arc::new(seeded_catalog().await);
        let clients = Arc::new(InMemoryClients::new());
        let ledger = Arc::new(FileOrderLedger::open(dir.path().join("orders.jsonl")).await?);
        let storage: Arc<SessionStorage> = InMemStorage::<Session>::new().erase();

        let shop = Arc::new(Shop::new(
            storage.clone(),
            messenger.clone(),
            catalog.clone(),
            clients.clone(),
            ledger.clone(),
            config,
        ));

        Ok(Self {
            shop,
            messenger,
            catalog,
            clients,
            ledger,
            storage,
            _dir: dir,
        })
    }

    pub fn turn(&self) -> Turn {
        Turn::new(ChatId(CHAT), Some("en".to_string()))
    }

    pub async fn session(&self) -> Session {
        self.storage
            .clone()
            .get_dialogue(ChatId(CHAT))
            .await
            .expect("session storage should be readable")
            .unwrap_or_default()
    }

    pub async fn put_session(&self, session: Session) {
        self.storage
            .clone()
            .update_dialogue(ChatId(CHAT), session)
            .await
            .expect("session storage should be writable");
    }
}

/// Phones > Android > {Pixel, Galaxy}; Accessories > {Cable, Case, Charger}
pub async fn seeded_catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog.add_category(PHONES, "Phones", None).await;
    catalog.add_category(ANDROID, "Android", Some(PHONES)).await;
    catalog.add_category(ACCESSORIES, "Accessories", None).await;

    catalog.add_product(PIXEL, "Pixel", "199.99", ANDROID).await;
    catalog.add_product(GALAXY, "Galaxy", "599.00", ANDROID).await;
    catalog.add_product(CABLE, "Cable", "50.00", ACCESSORIES).await;
    catalog.add_product(CASE, "Case", "15.50", ACCESSORIES).await;
    catalog.add_product(CHARGER, "Charger", "30.00", ACCESSORIES).await;
    catalog
}

pub fn buyer() -> Client {
    Client {
        id: CHAT,
        first_name: "Ivan".to_string(),
        last_name: Some("Petrov".to_string()),
        username: Some("ivan".to_string()),
        is_premium: false,
    }
}
