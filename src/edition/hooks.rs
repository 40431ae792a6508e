use once_cell::unsync::OnceCell;
use regex::Regex;

use super::{fr, sv, zh, Edition};
use crate::call::MacroCall;
use crate::error::ConfigError;
use crate::resolver::call_names;
use crate::services::Services;

/// Outcome of an edition fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Text(String),
    /// No arm for this call: continue with the shared defaults.
    Defer,
    /// Re-dispatch another call through the resolver.
    Redirect(MacroCall),
}

/// Names of the macros called on a page, collected on first use.
#[derive(Debug, Default)]
pub struct PageCalls<'a> {
    text: &'a str,
    names: OnceCell<Vec<String>>,
}

impl<'a> PageCalls<'a> {
    pub fn new(text: &'a str) -> Self {
        PageCalls {
            text,
            names: OnceCell::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        self.names.get_or_init(|| call_names(self.text))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }
}

/// What a fallback arm may consult besides the call itself.
pub struct FallbackContext<'a> {
    pub edition: &'a Edition,
    pub services: &'a Services,
    pub headword: &'a str,
    pub page_calls: &'a PageCalls<'a>,
    pub variant_mode: bool,
}

impl<'a> FallbackContext<'a> {
    pub fn locale(&self) -> &'a str {
        self.edition.locale()
    }

    /// Language name for `code`, or the code itself.
    pub fn lang(&self, code: &str) -> String {
        self.edition.lang_name(code).unwrap_or(code).to_string()
    }

    pub fn transliterate(&self, locale: &str, text: &str) -> String {
        self.services.transliterator.transliterate(locale, text)
    }
}

/// Edition-specific callbacks. Every method has a working default.
pub trait EditionHooks: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite raw page text before segmentation.
    fn normalize(&self, text: &str, _edition: &Edition) -> String {
        text.to_string()
    }

    /// Whether `resolve_fallback` has a dedicated arm for `name`.
    fn handles(&self, _name: &str) -> bool {
        false
    }

    fn resolve_fallback(&self, _call: &MacroCall, _ctx: &FallbackContext<'_>) -> Fallback {
        Fallback::Defer
    }

    fn extract_pronunciations(&self, text: &str, edition: &Edition) -> Vec<String> {
        match edition.pronunciation_pattern() {
            Some(pattern) => find_all(pattern, text, edition.config.pronunciation_format.as_deref()),
            None => Vec::new(),
        }
    }

    fn extract_genders(&self, text: &str, edition: &Edition) -> Vec<String> {
        match edition.gender_pattern() {
            Some(pattern) => find_all(pattern, text, None),
            None => Vec::new(),
        }
    }
}

/// First capture group of every match, deduplicated in order, optionally
/// formatted through a `{}` template.
pub fn find_all(pattern: &Regex, text: &str, format: Option<&str>) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in pattern.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let value = match format {
            Some(template) => template.replace("{}", m.as_str().trim()),
            None => m.as_str().trim().to_string(),
        };
        if !found.contains(&value) {
            found.push(value);
        }
    }
    found
}

/// Hooks for editions with no dedicated callbacks.
pub struct DefaultHooks;

impl EditionHooks for DefaultHooks {
    fn name(&self) -> &'static str {
        "default"
    }
}

pub fn hooks_named(name: &str) -> Result<Box<dyn EditionHooks>, ConfigError> {
    Ok(match name {
        "default" => Box::new(DefaultHooks),
        "fr" => Box::new(fr::FrHooks),
        "sv" => Box::new(sv::SvHooks),
        "zh" => Box::new(zh::ZhHooks),
        other => return Err(ConfigError::UnknownHooks(other.to_string())),
    })
}
