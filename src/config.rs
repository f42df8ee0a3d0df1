//! # Shop Configuration Module
//!
//! Runtime settings for the bot, read from the process environment (a `.env`
//! file is loaded by `main` before this runs).

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use teloxide::types::{ChatId, UserId};
use url::Url;

// Defaults mirrored by `ShopConfig::default`
pub const DEFAULT_CURRENCY: &str = "RUB";
pub const DEFAULT_PAGE_SIZE: usize = 1;
pub const DEFAULT_MAX_INVOICE_AMOUNT: i64 = 100_000_000; // minor units
pub const DEFAULT_ORDERS_FILE: &str = "orders.jsonl";

/// Where completed orders are appended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    /// JSON-lines file at `orders_file`
    File,
    /// `orders` table in the catalog database
    Postgres,
}

impl FromStr for LedgerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(LedgerBackend::File),
            "postgres" | "pg" => Ok(LedgerBackend::Postgres),
            other => bail!("unknown ledger backend '{other}' (expected 'file' or 'postgres')"),
        }
    }
}

/// Configuration structure for the shop bot
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Payment provider token passed with every invoice
    pub provider_token: String,
    /// Postgres URL holding the catalog and customer tables
    pub database_url: String,
    /// Redis URL for session storage; in-memory sessions when absent
    pub redis_url: Option<String>,
    /// ISO 4217 currency code used for invoices
    pub currency: String,
    /// Entries per catalog/cart page
    pub page_size: usize,
    /// Largest invoice amount accepted, in minor units
    pub max_invoice_amount: i64,
    /// Chats a user must belong to before the bot answers
    pub subscribe_chats: Vec<ChatId>,
    /// Links offered to users who are not subscribed yet
    pub subscribe_links: Vec<Url>,
    /// Users allowed to run /broadcast
    pub admin_ids: Vec<UserId>,
    pub ledger_backend: LedgerBackend,
    pub orders_file: PathBuf,
    /// Empty the paid part of the cart once a payment is recorded
    pub clear_cart_after_payment: bool,
    /// Return to idle when an invoice is refused for exceeding the ceiling
    pub reset_on_amount_limit: bool,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            provider_token: String::new(),
            database_url: String::new(),
            redis_url: None,
            currency: DEFAULT_CURRENCY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_invoice_amount: DEFAULT_MAX_INVOICE_AMOUNT,
            subscribe_chats: Vec::new(),
            subscribe_links: Vec::new(),
            admin_ids: Vec::new(),
            ledger_backend: LedgerBackend::File,
            orders_file: PathBuf::from(DEFAULT_ORDERS_FILE),
            clear_cart_after_payment: false,
            reset_on_amount_limit: false,
        }
    }
}

impl ShopConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };
        let defaults = Self::default();

        let page_size = match lookup("PAGE_SIZE") {
            Some(v) => v.trim().parse().context("PAGE_SIZE must be a positive integer")?,
            None => defaults.page_size,
        };
        if page_size == 0 {
            bail!("PAGE_SIZE must be a positive integer");
        }

        let max_invoice_amount = match lookup("MAX_INVOICE_AMOUNT") {
            Some(v) => v
                .trim()
                .parse()
                .context("MAX_INVOICE_AMOUNT must be an integer amount in minor units")?,
            None => defaults.max_invoice_amount,
        };

        let subscribe_chats = parse_list(lookup("SUBSCRIBE_CHATS"), |s| {
            s.parse::<i64>()
                .map(ChatId)
                .with_context(|| format!("invalid chat id in SUBSCRIBE_CHATS: {s}"))
        })?;
        let subscribe_links = parse_list(lookup("SUBSCRIBE_LINKS"), |s| {
            Url::parse(s).with_context(|| format!("invalid URL in SUBSCRIBE_LINKS: {s}"))
        })?;
        let admin_ids = parse_list(lookup("ADMIN_IDS"), |s| {
            s.parse::<u64>()
                .map(UserId)
                .with_context(|| format!("invalid user id in ADMIN_IDS: {s}"))
        })?;

        Ok(Self {
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
            provider_token: required("PROVIDER_TOKEN")?,
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            currency: lookup("CURRENCY").unwrap_or(defaults.currency),
            page_size,
            max_invoice_amount,
            subscribe_chats,
            subscribe_links,
            admin_ids,
            ledger_backend: match lookup("LEDGER_BACKEND") {
                Some(v) => v.parse()?,
                None => defaults.ledger_backend,
            },
            orders_file: lookup("ORDERS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.orders_file),
            clear_cart_after_payment: parse_flag(lookup("CLEAR_CART_AFTER_PAYMENT"))?,
            reset_on_amount_limit: parse_flag(lookup("RESET_ON_AMOUNT_LIMIT"))?,
        })
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_ids.contains(&user)
    }
}

fn parse_list<T, F>(raw: Option<String>, parse: F) -> Result<Vec<T>>
where
    F: Fn(&str) -> Result<T>,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse)
        .collect()
}

fn parse_flag(raw: Option<String>) -> Result<bool> {
    match raw.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            other => bail!("invalid boolean flag '{other}'"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("PROVIDER_TOKEN", "provider"),
        ("DATABASE_URL", "postgres://localhost/shop"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = ShopConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.currency, "RUB");
        assert_eq!(config.page_size, 1);
        assert_eq!(config.max_invoice_amount, DEFAULT_MAX_INVOICE_AMOUNT);
        assert_eq!(config.ledger_backend, LedgerBackend::File);
        assert!(config.redis_url.is_none());
        assert!(!config.clear_cart_after_payment);
        assert!(!config.reset_on_amount_limit);
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let err = ShopConfig::from_lookup(lookup_from(&REQUIRED[1..])).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_lists_and_flags() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("SUBSCRIBE_CHATS", "-1001708499155, -100200"),
            ("SUBSCRIBE_LINKS", "https://t.me/shop_channel"),
            ("ADMIN_IDS", "7,8"),
            ("LEDGER_BACKEND", "postgres"),
            ("CLEAR_CART_AFTER_PAYMENT", "true"),
            ("PAGE_SIZE", "5"),
        ]);
        let config = ShopConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.subscribe_chats, vec![ChatId(-1001708499155), ChatId(-100200)]);
        assert_eq!(config.subscribe_links.len(), 1);
        assert!(config.is_admin(UserId(8)));
        assert!(!config.is_admin(UserId(9)));
        assert_eq!(config.ledger_backend, LedgerBackend::Postgres);
        assert!(config.clear_cart_after_payment);
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PAGE_SIZE", "0"));
        assert!(ShopConfig::from_lookup(lookup_from(&pairs)).is_err());
    }
}
