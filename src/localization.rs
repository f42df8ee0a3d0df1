//! # Localization Module
//!
//! Fluent bundles for the shop texts, one per supported locale, with
//! fallback to the default locale.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::LazyLock;
use unic_langid::LanguageIdentifier;

/// Locale used when the user's language has no bundle
pub const DEFAULT_LOCALE: &str = "ru";

const RESOURCES: [(&str, &str); 2] = [
    ("ru", include_str!("../locales/ru/main.ftl")),
    ("en", include_str!("../locales/en/main.ftl")),
];

/// Localization manager for the shop bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager from the bundled resources
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (locale, source) in RESOURCES {
            let langid: LanguageIdentifier = locale.parse()?;
            bundles.insert(locale.to_string(), Self::create_bundle(langid, source)?);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Telegram renders the bidi isolation marks literally
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate messages in {locale} resource: {errors:?}"))?;

        Ok(bundle)
    }

    /// Pick the bundle for a Telegram language code ("en", "ru", "en-US", ...)
    fn bundle_for(&self, language_code: Option<&str>) -> Option<&FluentBundle<FluentResource>> {
        language_code
            .and_then(|code| code.split(['-', '_']).next())
            .and_then(|primary| self.bundles.get(&primary.to_lowercase()))
            .or_else(|| self.bundles.get(DEFAULT_LOCALE))
    }

    /// Get a localized message
    pub fn get_message(
        &self,
        key: &str,
        args: Option<&FluentArgs>,
        language_code: Option<&str>,
    ) -> String {
        let Some(bundle) = self.bundle_for(language_code) else {
            return format!("Missing translation: {}", key);
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None => return format!("Missing translation: {}", key),
        };

        let mut errors = Vec::new();
        bundle
            .format_pattern(pattern, args, &mut errors)
            .into_owned()
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(
        &self,
        key: &str,
        args: &[(&str, &str)],
        language_code: Option<&str>,
    ) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(*value));
        }
        self.get_message(key, Some(&fluent_args), language_code)
    }
}

static LOCALIZATION_MANAGER: LazyLock<Option<LocalizationManager>> =
    LazyLock::new(|| match LocalizationManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load localization resources");
            None
        }
    });

/// Load the bundles eagerly so broken resources surface at start-up
pub fn init_localization() -> Result<()> {
    LOCALIZATION_MANAGER
        .as_ref()
        .map(|_| ())
        .ok_or_else(|| anyhow!("localization resources failed to load"))
}

/// Convenience function to get a localized message in the user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    match LOCALIZATION_MANAGER.as_ref() {
        Some(manager) => manager.get_message(key, None, language_code),
        None => format!("Missing translation: {}", key),
    }
}

/// Convenience function to get a localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    match LOCALIZATION_MANAGER.as_ref() {
        Some(manager) => manager.get_message_with_args(key, args, language_code),
        None => format!("Missing translation: {}", key),
    }
}
