//! Frequently asked questions, matched fuzzily against user queries.

use strsim::sorensen_dice;

/// Minimum similarity for a question to count as a match
pub const MATCH_CUTOFF: f64 = 0.2;
/// Most matches returned for one query
pub const MAX_MATCHES: usize = 3;
/// Longest answer preview shown in inline results
const PREVIEW_CHARS: usize = 50;

pub const FAQ: &[(&str, &str)] = &[
    (
        "как оформить заказ?",
        "Выберите товар, добавьте в корзину и нажмите «Оформить заказ».",
    ),
    (
        "какие способы оплаты доступны?",
        "Мы принимаем карты, PayPal и оплату при получении.",
    ),
    (
        "сколько времени занимает доставка?",
        "Доставка занимает от 1 до 5 дней в зависимости от региона.",
    ),
    (
        "как отследить заказ?",
        "После отправки вы получите трек-номер для отслеживания.",
    ),
    (
        "можно ли вернуть товар?",
        "Да, у вас есть 14 дней на возврат товара без объяснения причин.",
    ),
    (
        "что делать, если товар пришел с браком?",
        "Свяжитесь с поддержкой, и мы заменим товар или вернем деньги.",
    ),
    (
        "есть ли гарантия на товары?",
        "На все товары действует гарантия от 6 до 24 месяцев.",
    ),
    (
        "как связаться с поддержкой?",
        "Вы можете написать в чат-боте или позвонить по номеру +7 (900) 123-45-67.",
    ),
    (
        "какие бренды представлены в магазине?",
        "У нас есть Apple, Samsung, Xiaomi, Sony и многие другие.",
    ),
    (
        "где можно посмотреть характеристики товаров?",
        "Каждый товар имеет подробное описание на сайте и в боте.",
    ),
];

/// A question matched for a query
#[derive(Debug, Clone, PartialEq)]
pub struct FaqMatch {
    /// Position of the entry in [`FAQ`]
    pub index: usize,
    pub question: &'static str,
    pub answer: &'static str,
    pub score: f64,
}

impl FaqMatch {
    /// Question with its first letter capitalised
    pub fn title(&self) -> String {
        let mut chars = self.question.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Answer shortened for the inline result description
    pub fn preview(&self) -> String {
        if self.answer.chars().count() > PREVIEW_CHARS {
            let head: String = self.answer.chars().take(PREVIEW_CHARS).collect();
            format!("{head}...")
        } else {
            self.answer.to_string()
        }
    }

    /// Message posted when the result is chosen
    pub fn message_text(&self) -> String {
        format!("{}\n\n{}", self.title(), self.answer)
    }
}

/// Up to [`MAX_MATCHES`] entries scoring at least [`MATCH_CUTOFF`], best first
pub fn find_matches(query: &str) -> Vec<FaqMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<FaqMatch> = FAQ
        .iter()
        .enumerate()
        .map(|(index, (question, answer))| FaqMatch {
            index,
            question,
            answer,
            score: sorensen_dice(&query, question),
        })
        .filter(|m| m.score >= MATCH_CUTOFF)
        .collect();

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(MAX_MATCHES);
    matches
}

/// Best matching entry, if any clears the cutoff
pub fn best_match(query: &str) -> Option<FaqMatch> {
    find_matches(query).into_iter().next()
}
