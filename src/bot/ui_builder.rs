//! UI Builder module for creating keyboards and formatting messages

use std::num::NonZeroU32;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use url::Url;

use crate::catalog::{Category, Product, ProductId};
use crate::localization::{t_args_lang, t_lang};
use crate::pagination::Page;
use crate::payment::{currency_symbol, format_price_label};

use super::callback_handler::CallbackAction;

fn button(text: String, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

/// Reply keyboard with the two main menu entries
pub fn main_menu_keyboard(language_code: Option<&str>) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(t_lang("menu-catalog", language_code)),
        KeyboardButton::new(t_lang("menu-cart", language_code)),
    ]])
    .resize_keyboard()
}

/// URL buttons pointing at the chats a user must join
pub fn subscribe_keyboard(links: &[Url], language_code: Option<&str>) -> InlineKeyboardMarkup {
    let label = t_lang("subscribe-link", language_code);
    let row = links
        .iter()
        .enumerate()
        .map(|(i, url)| {
            let text = if links.len() > 1 {
                format!("{label} {}", i + 1)
            } else {
                label.clone()
            };
            InlineKeyboardButton::url(text, url.clone())
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

/// "<<" / ">>" controls for a page, omitted at the edges
pub fn navigation_row<T>(
    page: &Page<'_, T>,
    previous: CallbackAction,
    next: CallbackAction,
    language_code: Option<&str>,
) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if page.has_previous() {
        row.push(button(t_lang("button-previous", language_code), previous));
    }
    if page.has_next() {
        row.push(button(t_lang("button-next", language_code), next));
    }
    row
}

fn push_navigation<T>(rows: &mut Vec<Vec<InlineKeyboardButton>>, page: &Page<'_, T>, language_code: Option<&str>) {
    let nav = navigation_row(
        page,
        CallbackAction::CatalogPrevious,
        CallbackAction::CatalogNext,
        language_code,
    );
    if !nav.is_empty() {
        rows.push(nav);
    }
}

fn push_back(rows: &mut Vec<Vec<InlineKeyboardButton>>, back: Option<CallbackAction>, language_code: Option<&str>) {
    if let Some(action) = back {
        rows.push(vec![button(t_lang("button-back", language_code), action)]);
    }
}

/// One button per category, then navigation, then "back" when nested
pub fn categories_keyboard(
    page: &Page<'_, Category>,
    back: Option<CallbackAction>,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = page
        .items
        .iter()
        .map(|category| vec![button(category.title.clone(), CallbackAction::Category(category.id))])
        .collect();

    push_navigation(&mut rows, page, language_code);
    push_back(&mut rows, back, language_code);
    InlineKeyboardMarkup::new(rows)
}

/// Label of a product in listings: "Title (1,299 ₽)"
pub fn product_label(product: &Product, currency: &str, language_code: Option<&str>) -> String {
    t_args_lang(
        "product-label",
        &[
            ("title", product.title.as_str()),
            ("price", format_price_label(product.price).as_str()),
            ("currency", currency_symbol(currency)),
        ],
        language_code,
    )
}

/// One button per product of a leaf category
pub fn products_keyboard(
    page: &Page<'_, Product>,
    back: Option<CallbackAction>,
    currency: &str,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = page
        .items
        .iter()
        .map(|product| {
            vec![button(
                product_label(product, currency, language_code),
                CallbackAction::Product(product.id),
            )]
        })
        .collect();

    push_navigation(&mut rows, page, language_code);
    push_back(&mut rows, back, language_code);
    InlineKeyboardMarkup::new(rows)
}

/// Product card text: label, blank line, description
pub fn product_caption(product: &Product, currency: &str, language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}",
        product_label(product, currency, language_code),
        product.description
    )
}

pub fn product_keyboard(product_id: ProductId, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(
        t_lang("button-add-to-cart", language_code),
        CallbackAction::AddToCart(product_id),
    )]])
}

/// Cart line label: "Title (2 pcs)"
pub fn cart_line_label(title: &str, count: NonZeroU32, language_code: Option<&str>) -> String {
    t_args_lang(
        "cart-line",
        &[("title", title), ("count", count.to_string().as_str())],
        language_code,
    )
}

/// "Pay for the whole cart" first, one entry per line item, then navigation
pub fn cart_keyboard(
    page: &Page<'_, (Product, NonZeroU32)>,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button(
        t_lang("button-buy-whole-cart", language_code),
        CallbackAction::BuyWholeCart,
    )]];

    rows.extend(page.items.iter().map(|(product, count)| {
        vec![button(
            cart_line_label(&product.title, *count, language_code),
            CallbackAction::CartProduct(product.id),
        )]
    }));

    let nav = navigation_row(
        page,
        CallbackAction::CartPrevious,
        CallbackAction::CartNext,
        language_code,
    );
    if !nav.is_empty() {
        rows.push(nav);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Actions on one cart line item
pub fn cart_product_keyboard(product_id: ProductId, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button(t_lang("button-buy", language_code), CallbackAction::Buy(product_id))],
        vec![button(
            t_lang("button-change-count", language_code),
            CallbackAction::ChangeCount(product_id),
        )],
        vec![button(
            t_lang("button-delete-from-cart", language_code),
            CallbackAction::DeleteFromCart(product_id),
        )],
    ])
}

pub fn confirmation_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(t_lang("button-yes", language_code), CallbackAction::Yes),
        button(t_lang("button-no", language_code), CallbackAction::No),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CategoryId;
    use crate::pagination::paginate;
    use rust_decimal::Decimal;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<Vec<String>> {
        markup
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| match &b.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                        other => format!("{other:?}"),
                    })
                    .collect()
            })
            .collect()
    }

    fn product(id: i64, title: &str) -> Product {
        Product {
            id: ProductId(id),
            title: title.to_string(),
            description: "desc".to_string(),
            price: Decimal::new(129_900, 2),
            category_id: CategoryId(1),
        }
    }

    #[test]
    fn test_middle_catalog_page_has_both_controls_and_back() {
        let categories: Vec<Category> = (1..=7)
            .map(|i| Category {
                id: CategoryId(i),
                title: format!("Category {i}"),
                parent_id: Some(CategoryId(100)),
                has_subcategories: false,
            })
            .collect();
        let page = paginate(&categories, 3, 1);

        let markup = categories_keyboard(&page, Some(CallbackAction::Category(CategoryId(100))), Some("en"));

        assert_eq!(
            callback_data(&markup),
            vec![
                vec!["category_3".to_string()],
                vec!["catalog_previous".to_string(), "catalog_next".to_string()],
                vec!["category_100".to_string()],
            ]
        );
    }

    #[test]
    fn test_first_root_page_has_only_next() {
        let categories: Vec<Category> = (1..=2)
            .map(|i| Category {
                id: CategoryId(i),
                title: format!("Category {i}"),
                parent_id: None,
                has_subcategories: true,
            })
            .collect();
        let page = paginate(&categories, 1, 1);

        let markup = categories_keyboard(&page, None, Some("en"));

        assert_eq!(
            callback_data(&markup),
            vec![vec!["category_1".to_string()], vec!["catalog_next".to_string()]]
        );
    }

    #[test]
    fn test_cart_keyboard_layout() {
        let lines = vec![
            (product(2, "Cable"), NonZeroU32::new(3).unwrap()),
            (product(1, "Phone"), NonZeroU32::new(1).unwrap()),
        ];
        let page = paginate(&lines, 1, 5);

        let markup = cart_keyboard(&page, Some("en"));

        assert_eq!(
            callback_data(&markup),
            vec![
                vec!["buy_whole_cart".to_string()],
                vec!["cart_product_2".to_string()],
                vec!["cart_product_1".to_string()],
            ]
        );
        assert_eq!(markup.inline_keyboard[1][0].text, "Cable (3 pcs)");
    }

    #[test]
    fn test_product_caption() {
        let caption = product_caption(&product(1, "Phone"), "RUB", Some("en"));
        assert_eq!(caption, "Phone (1,299 ₽)\n\ndesc");
    }
}
