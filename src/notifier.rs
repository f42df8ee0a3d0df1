//! # Mass Notification Module
//!
//! Sends one templated text to every registered client. Templates use
//! `${name}` or `$name` placeholders filled from the client profile (`id`,
//! `username`, `first_name`, `last_name`); `$$` is a literal dollar sign and
//! unknown placeholders are left as written.

use futures::future::join_all;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use std::time::Duration;
use teloxide::types::ChatId;
use teloxide::RequestError;
use tracing::{info, warn};

use crate::clients::Client;
use crate::messenger::Messenger;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|\{(\w+)\}|(\w+))").expect("Placeholder pattern should be valid")
});

/// Fill the placeholders of `template` for one client
pub fn render_template(template: &str, client: &Client) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            match name {
                "id" => client.id.to_string(),
                "username" => client.username.clone().unwrap_or_default(),
                "first_name" => client.first_name.clone(),
                "last_name" => client.last_name.clone().unwrap_or_default(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// What happened to one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Delivered after waiting out a rate limit
    SentAfterRetry,
    Dropped,
}

/// Totals of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub retried: usize,
    pub dropped: usize,
}

fn retry_after(error: &anyhow::Error) -> Option<Duration> {
    match error.downcast_ref::<RequestError>() {
        Some(RequestError::RetryAfter(seconds)) => Some(seconds.duration()),
        _ => None,
    }
}

/// Deliver the rendered template to one client.
///
/// A rate-limited send waits the mandated delay and is attempted once more;
/// any other failure is logged and the message dropped.
pub async fn deliver(messenger: &dyn Messenger, client: &Client, template: &str) -> Delivery {
    let chat = ChatId(client.id);
    let text = render_template(template, client);

    let error = match messenger.send_text(chat, text.clone(), None).await {
        Ok(_) => return Delivery::Sent,
        Err(e) => e,
    };

    let Some(delay) = retry_after(&error) else {
        info!(user_id = client.id, error = %error, "Cannot send a message to user");
        return Delivery::Dropped;
    };

    info!(
        user_id = client.id,
        retry_after_secs = delay.as_secs(),
        "Cannot send a message to user because of rate limit"
    );
    tokio::time::sleep(delay).await;

    match messenger.send_text(chat, text, None).await {
        Ok(_) => Delivery::SentAfterRetry,
        Err(e) => {
            warn!(user_id = client.id, error = %e, "Retry after rate limit failed, dropping message");
            Delivery::Dropped
        }
    }
}

/// Send the template to every client concurrently
pub async fn broadcast(
    messenger: &dyn Messenger,
    clients: &[Client],
    template: &str,
) -> BroadcastReport {
    let deliveries = join_all(
        clients
            .iter()
            .map(|client| deliver(messenger, client, template)),
    )
    .await;

    let report = deliveries
        .into_iter()
        .fold(BroadcastReport::default(), |mut report, delivery| {
            match delivery {
                Delivery::Sent => report.sent += 1,
                Delivery::SentAfterRetry => report.retried += 1,
                Delivery::Dropped => report.dropped += 1,
            }
            report
        });

    info!(
        recipients = clients.len(),
        sent = report.sent,
        retried = report.retried,
        dropped = report.dropped,
        "Broadcast finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client {
            id: 42,
            first_name: "Olga".to_string(),
            last_name: None,
            username: Some("olga".to_string()),
            is_premium: true,
        }
    }

    #[test]
    fn test_placeholders_are_filled() {
        let text = render_template("Hi ${first_name} (@$username), id ${id}!", &client());
        assert_eq!(text, "Hi Olga (@olga), id 42!");
    }

    #[test]
    fn test_missing_and_unknown_placeholders() {
        let text = render_template("[${last_name}] ${discount} $$5", &client());
        assert_eq!(text, "[] ${discount} $5");
    }

    #[test]
    fn test_retry_after_is_recognised() {
        let limited = anyhow::Error::from(RequestError::RetryAfter(
            teloxide::types::Seconds::from_seconds(3),
        ));
        assert_eq!(retry_after(&limited), Some(Duration::from_secs(3)));
        assert_eq!(retry_after(&anyhow::anyhow!("blocked by user")), None);
    }
}
