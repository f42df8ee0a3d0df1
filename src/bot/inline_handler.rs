//! Inline mode: FAQ answers

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    InlineQuery, InlineQueryResult, InlineQueryResultArticle, InputMessageContent,
    InputMessageContentText,
};
use tracing::debug;

use crate::faq::{self, FaqMatch};

/// Inline result for one FAQ entry
pub fn faq_article(entry: &FaqMatch) -> InlineQueryResult {
    InlineQueryResult::Article(
        InlineQueryResultArticle::new(
            format!("faq-{}", entry.index),
            entry.title(),
            InputMessageContent::Text(InputMessageContentText::new(entry.message_text())),
        )
        .description(entry.preview()),
    )
}

/// Answer an inline query with the closest FAQ entries
pub async fn inline_query_handler(bot: Bot, q: InlineQuery) -> Result<()> {
    let results: Vec<InlineQueryResult> = faq::find_matches(&q.query).iter().map(faq_article).collect();
    debug!(user_id = %q.from.id, matches = results.len(), "Answering inline FAQ query");

    bot.answer_inline_query(q.id, results).cache_time(1).await?;
    Ok(())
}
