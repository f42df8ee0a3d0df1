//! # Localization Tests
//!
//! Message retrieval and formatting for the shop texts in both locales.

use shopbot::localization::{t_args_lang, t_lang, LocalizationManager};

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message("cart-title", None, Some("en"));
        assert_eq!(message, "Your cart");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message("nonexistent-key", None, Some("en"));
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_unsupported_language_falls_back_to_russian() {
        let manager = setup_localization();

        let message = manager.get_message("delivery-prompt", None, Some("fr"));
        assert_eq!(message, manager.get_message("delivery-prompt", None, Some("ru")));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let message = manager.get_message_with_args(
            "payment-product",
            &[
                ("title", "Pixel"),
                ("count", "2"),
                ("amount", "399.98"),
                ("currency", "₽"),
            ],
            Some("en"),
        );
        assert_eq!(message, "Thank you for purchasing Pixel (2 pcs) for 399.98 ₽!");
    }

    #[test]
    fn test_get_message_missing_args() {
        let manager = setup_localization();

        // Missing variables are rendered as their names, not dropped silently
        let message = manager.get_message_with_args("welcome", &[], Some("en"));
        assert!(message.starts_with("Hello, "));
        assert!(message.contains("name"));
    }

    #[test]
    fn test_russian_texts() {
        assert_eq!(t_lang("menu-catalog", Some("ru")), "Каталог");
        let line = t_args_lang("cart-line", &[("title", "Чехол"), ("count", "3")], Some("ru"));
        assert!(line.starts_with("Чехол"));
        assert!(line.contains('3'));
    }

    #[test]
    fn test_multiline_messages_keep_line_breaks() {
        let empty = t_lang("cart-empty", Some("en"));
        assert_eq!(empty.lines().count(), 2);
        assert!(empty.contains("/catalog"));
    }
}
