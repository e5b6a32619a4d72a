use std::collections::HashMap;
use std::fs;

use anyhow::Result;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use lazy_static::lazy_static;
use unic_langid::LanguageIdentifier;

const SUPPORTED_LOCALES: &[&str] = &["en", "ru"];
const FALLBACK_LOCALE: &str = "en";

/// Localization manager for the bot's user-facing messages
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with all supported locales
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for locale in SUPPORTED_LOCALES {
            let langid: LanguageIdentifier = locale.parse()?;
            let bundle = Self::create_bundle(&langid)?;
            bundles.insert(locale.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &LanguageIdentifier) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        bundle.set_use_isolating(false);

        // Load the main resource file
        let resource_path = format!("./locales/{}/main.ftl", locale);
        if let Ok(content) = fs::read_to_string(&resource_path) {
            if let Ok(resource) = FluentResource::try_new(content) {
                let _ = bundle.add_resource(resource);
            }
        }

        Ok(bundle)
    }

    /// Pick the bundle for a Telegram language code, falling back to English
    fn bundle_for(&self, language_code: Option<&str>) -> Option<&FluentBundle<FluentResource>> {
        let locale = language_code
            .map(|code| code.split('-').next().unwrap_or(code))
            .filter(|base| self.bundles.contains_key(*base))
            .unwrap_or(FALLBACK_LOCALE);
        self.bundles.get(locale)
    }

    /// Get a localized message
    pub fn get_message(
        &self,
        key: &str,
        language_code: Option<&str>,
        args: Option<&FluentArgs>,
    ) -> String {
        let bundle = match self.bundle_for(language_code) {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let mut errors = vec![];
        bundle
            .format_pattern(pattern, args, &mut errors)
            .into_owned()
    }
}

lazy_static! {
    static ref LOCALIZATION_MANAGER: LocalizationManager =
        LocalizationManager::new().unwrap_or_else(|_| LocalizationManager {
            bundles: HashMap::new(),
        });
}

/// Convenience function to get a localized message for a user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    LOCALIZATION_MANAGER.get_message(key, language_code, None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args_lang(key: &str, language_code: Option<&str>, args: &[(&str, String)]) -> String {
    let fluent_args =
        FluentArgs::from_iter(args.iter().map(|(k, v)| (*k, FluentValue::from(v.clone()))));
    LOCALIZATION_MANAGER.get_message(key, language_code, Some(&fluent_args))
}
