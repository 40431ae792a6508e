//! Capabilities the engine consumes but does not implement.

use crate::call::MacroCall;

/// Script conversion for a locale, e.g. Cyrillic to Latin.
pub trait Transliterator: Send + Sync {
    fn transliterate(&self, locale: &str, text: &str) -> String;
}

/// Leaves text unchanged.
pub struct Identity;

impl Transliterator for Identity {
    fn transliterate(&self, _locale: &str, text: &str) -> String {
        text.to_string()
    }
}

/// Renders a macro the engine cannot expand locally (the `place` family).
pub trait RemoteRenderer: Send + Sync {
    fn render(&self, call: &MacroCall, locale: &str) -> Option<String>;
}

pub struct Services {
    pub transliterator: Box<dyn Transliterator>,
    pub renderer: Option<Box<dyn RemoteRenderer>>,
}

impl Default for Services {
    fn default() -> Self {
        Services {
            transliterator: Box::new(Identity),
            renderer: None,
        }
    }
}

impl Services {
    pub fn with_transliterator(mut self, transliterator: impl Transliterator + 'static) -> Self {
        self.transliterator = Box::new(transliterator);
        self
    }

    pub fn with_renderer(mut self, renderer: impl RemoteRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }
}
