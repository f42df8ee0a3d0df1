//! Customer profiles captured on /start.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use teloxide::types::User;

use crate::errors::Result;

/// A Telegram user who has started the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_premium: bool,
}

impl Client {
    /// Name used in ledger rows: "@username", falling back to the full name
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.full_name(),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

impl From<&User> for Client {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0 as i64,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            is_premium: user.is_premium,
        }
    }
}

/// Registry of customers, used by /start and the mass notifier
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Create or refresh a profile; returns `true` when it was created
    async fn upsert(&self, client: &Client) -> Result<bool>;

    async fn all(&self) -> Result<Vec<Client>>;
}
