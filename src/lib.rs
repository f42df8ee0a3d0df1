//! # Shop Telegram Bot
//!
//! A conversational storefront: users browse a category tree, collect
//! products in a cart, pay through Telegram invoices and get their order
//! written to a ledger.

pub mod bot;
pub mod cart;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod faq;
pub mod ledger;
pub mod localization;
pub mod membership;
pub mod memory;
pub mod messenger;
pub mod notifier;
pub mod pagination;
pub mod payment;
pub mod shop;
