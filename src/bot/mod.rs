//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles commands, menu buttons and free text
//! - `callback_handler`: Decodes and routes inline keyboard callback queries
//! - `payment_handler`: Answers pre-checkout queries and records payments
//! - `inline_handler`: Answers inline FAQ queries
//! - `dialogue_manager`: The checkout state machine
//! - `catalog_view`: Catalog, product and cart views
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod catalog_view;
pub mod dialogue_manager;
pub mod inline_handler;
pub mod message_handler;
pub mod payment_handler;
pub mod ui_builder;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;

// Re-export main handler functions for use in main.rs
pub use callback_handler::{callback_handler, CallbackAction};
pub use inline_handler::inline_query_handler;
pub use message_handler::message_handler;
pub use payment_handler::{pre_checkout_handler, successful_payment_handler};

/// Update routing tree; expects `Arc<Shop>` in the dependency map
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::filter(|msg: Message| msg.successful_payment().is_some())
                        .endpoint(successful_payment_handler),
                )
                .branch(dptree::endpoint(message_handler)),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_pre_checkout_query().endpoint(pre_checkout_handler))
        .branch(Update::filter_inline_query().endpoint(inline_query_handler))
}
