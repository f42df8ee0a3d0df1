//! Membership gate placed in front of every user message.
//!
//! A user must belong to each configured chat before the bot answers. The
//! check is an explicit precondition: handlers call [`check`] and stop when it
//! returns [`Access::Denied`].

use teloxide::types::{ChatId, UserId};
use tracing::{debug, warn};

use crate::messenger::Messenger;

/// Outcome of the membership check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// The user has not joined (or was removed from) `chat`
    Denied { chat: ChatId },
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }
}

/// Check that `user` belongs to every chat in `required`.
///
/// An API failure for a chat is logged and that chat is skipped, so an outage
/// of the membership lookup never locks customers out.
pub async fn check(messenger: &dyn Messenger, required: &[ChatId], user: UserId) -> Access {
    for &chat in required {
        match messenger.is_chat_member(chat, user).await {
            Ok(true) => continue,
            Ok(false) => {
                debug!(user_id = %user, chat_id = %chat, "User is not a member of required chat");
                return Access::Denied { chat };
            }
            Err(e) => {
                warn!(
                    user_id = %user,
                    chat_id = %chat,
                    error = %e,
                    "Membership lookup failed, letting the user through"
                );
            }
        }
    }
    Access::Allowed
}
