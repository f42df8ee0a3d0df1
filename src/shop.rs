//! # Shop Service Module
//!
//! `Shop` owns every collaborator a conversation turn needs: the session
//! storage, the outbound messenger, the catalog, the customer registry and
//! the order ledger. Handlers receive it through the dispatcher's dependency
//! map; the state machine and views are implemented on it in `crate::bot`.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use teloxide::dispatching::dialogue::Storage;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId, ReplyMarkup};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error};

use crate::catalog::Catalog;
use crate::clients::ClientDirectory;
use crate::config::ShopConfig;
use crate::dialogue::{Session, SessionStorage};
use crate::ledger::OrderLedger;
use crate::messenger::Messenger;

/// Identity of the conversation an event belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub chat: ChatId,
    /// Language reported by Telegram for the sender, if any
    pub language_code: Option<String>,
}

impl Turn {
    pub fn new(chat: ChatId, language_code: Option<String>) -> Self {
        Self {
            chat,
            language_code,
        }
    }
}

/// One async mutex per conversation, dropped once nobody holds or awaits it
#[derive(Default)]
pub struct TurnLocks {
    locks: Mutex<HashMap<ChatId, Arc<AsyncMutex<()>>>>,
}

impl TurnLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<ChatId, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn acquire(&self, chat: ChatId) -> TurnGuard<'_> {
        let lock = Arc::clone(self.map().entry(chat).or_default());
        let guard = lock.lock_owned().await;
        TurnGuard {
            chat,
            locks: self,
            guard: Some(guard),
        }
    }

    /// Conversations with a live lock entry
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the duration of one turn
pub struct TurnGuard<'a> {
    chat: ChatId,
    locks: &'a TurnLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        // Our own reference goes with the guard; after that the map may hold the last one
        drop(self.guard.take());
        let mut locks = self.locks.map();
        if locks
            .get(&self.chat)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.chat);
        }
    }
}

/// Collaborators shared by all conversations
pub struct Shop {
    storage: Arc<SessionStorage>,
    messenger: Arc<dyn Messenger>,
    catalog: Arc<dyn Catalog>,
    clients: Arc<dyn ClientDirectory>,
    ledger: Arc<dyn OrderLedger>,
    config: ShopConfig,
    turn_locks: TurnLocks,
}

impl Shop {
    pub fn new(
        storage: Arc<SessionStorage>,
        messenger: Arc<dyn Messenger>,
        catalog: Arc<dyn Catalog>,
        clients: Arc<dyn ClientDirectory>,
        ledger: Arc<dyn OrderLedger>,
        config: ShopConfig,
    ) -> Self {
        Self {
            storage,
            messenger,
            catalog,
            clients,
            ledger,
            config,
            turn_locks: TurnLocks::default(),
        }
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    pub fn messenger(&self) -> &dyn Messenger {
        self.messenger.as_ref()
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn clients(&self) -> &dyn ClientDirectory {
        self.clients.as_ref()
    }

    pub fn ledger(&self) -> &dyn OrderLedger {
        self.ledger.as_ref()
    }

    /// Serialise turns of one conversation.
    ///
    /// The guard must be held across the whole load-modify-save of a session.
    pub async fn lock_turn(&self, chat: ChatId) -> TurnGuard<'_> {
        self.turn_locks.acquire(chat).await
    }

    /// Load the session of a conversation; a missing session is a fresh one
    pub async fn load_session(&self, turn: &Turn) -> Result<Session> {
        let mut session = Arc::clone(&self.storage)
            .get_dialogue(turn.chat)
            .await
            .map_err(|e| anyhow!(e))?
            .unwrap_or_default();

        if turn.language_code.is_some() {
            session.language_code = turn.language_code.clone();
        }
        Ok(session)
    }

    pub async fn save_session(&self, chat: ChatId, session: Session) -> Result<()> {
        debug!(user_id = %chat, state = ?session.state, "Saving session");
        Arc::clone(&self.storage)
            .update_dialogue(chat, session)
            .await
            .map_err(|e| anyhow!(e))
    }

    /// Send a message, logging instead of failing the turn when delivery fails
    pub(crate) async fn send(
        &self,
        chat: ChatId,
        text: String,
        markup: Option<ReplyMarkup>,
    ) -> Option<MessageId> {
        match self.messenger.send_text(chat, text, markup).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(user_id = %chat, error = %e, "Failed to send message");
                None
            }
        }
    }

    /// Edit a message, logging instead of failing the turn when the edit fails
    pub(crate) async fn edit(
        &self,
        chat: ChatId,
        message: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> bool {
        match self.messenger.edit_text(chat, message, text, markup).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    user_id = %chat,
                    message_id = message.0,
                    error = %e,
                    "Failed to edit message"
                );
                false
            }
        }
    }
}
