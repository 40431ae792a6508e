//! Rendering of the `place` macro family through a persisted cache.
//!
//! The cache maps the canonical macro text (`{{place|a|b|k=v}}`, keywords
//! sorted) to sanitized HTML. It is stored as bzip2-compressed JSON with
//! sorted keys, so saving the same entries always produces the same bytes.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::call::MacroCall;
use crate::services::RemoteRenderer;

static UNWANTED_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?(?:a|div|p|span)(?:\s[^>]*)?>").unwrap());
static KEPT_WITH_ATTRIBUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(b|i|small)\s[^>]*>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?[^\s>]+)[^>]*>").unwrap());

const KEPT_TAGS: &[&str] = &["b", "/b", "i", "/i", "small", "/small"];

/// Reduce parser HTML to text with `b`, `i` and `small` tags only.
pub fn sanitize(html: &str) -> String {
    let html = UNWANTED_TAGS.replace_all(html, "");
    let html = KEPT_WITH_ATTRIBUTES.replace_all(&html, "<$1>");
    let html = ANY_TAG.replace_all(&html, |caps: &Captures| {
        if KEPT_TAGS.contains(&&caps[1]) {
            caps[0].to_string()
        } else {
            debug!(tag = &caps[1], "dropping unexpected tag");
            String::new()
        }
    });
    html.trim().to_string()
}

// === Cache ===

/// Read-mostly store of rendered macros. Concurrent misses race; the last
/// write wins.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: RwLock<BTreeMap<String, String>>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file; a missing file gives an empty cache.
    pub fn load(path: &Path) -> io::Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(err),
        };
        let entries: BTreeMap<String, String> = serde_json::from_reader(BzDecoder::new(BufReader::new(file)))?;
        Ok(RenderCache {
            entries: RwLock::new(entries),
        })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut encoder = BzEncoder::new(BufWriter::new(File::create(path)?), Compression::best());
        serde_json::to_writer(&mut encoder, &*entries)?;
        encoder.finish()?.flush()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: String, value: String) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// === Renderer ===

/// Remote parser: renders macro text for a locale to HTML.
pub trait Fetch: Send + Sync {
    fn fetch(&self, wikitext: &str, locale: &str) -> Option<String>;
}

/// Never reaches the network; only cached entries render.
pub struct Offline;

impl Fetch for Offline {
    fn fetch(&self, _wikitext: &str, _locale: &str) -> Option<String> {
        None
    }
}

pub struct CachedRenderer<F> {
    cache: Arc<RenderCache>,
    fetcher: F,
}

impl<F: Fetch> CachedRenderer<F> {
    pub fn new(cache: Arc<RenderCache>, fetcher: F) -> Self {
        CachedRenderer { cache, fetcher }
    }
}

impl<F: Fetch> RemoteRenderer for CachedRenderer<F> {
    fn render(&self, call: &MacroCall, locale: &str) -> Option<String> {
        let key = call.renamed("place").canonical();
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit);
        }
        let rendered = sanitize(&self.fetcher.fetch(&key, locale)?);
        warn!(key = %key, rendered = %rendered, "new place");
        self.cache.insert(key, rendered.clone());
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sanitize_parser_output() {
        let html = "<div class=\"mw-content-ltr mw-parser-output\" lang=\"en\" dir=\"ltr\"><p><span class=\"form-of-definition use-with-mention\"><a href=\"/wiki/Appendix:Glossary#abbreviation\" title=\"Appendix:Glossary\">Abbreviation</a> of <span class=\"form-of-definition-link\"><i class=\"Latn mention\" lang=\"en\"><a href=\"/wiki/Acre#English\" title=\"Acre\">Acre</a></i></span></span>: a <a href=\"/wiki/state\" title=\"state\">state</a> of <span class=\"Latn\" lang=\"en\"><a href=\"/wiki/Brazil#English\" title=\"Brazil\"><b some=\"attr\">Brazil</a></b></span>\n</p></div>";
        assert_eq!(sanitize(html), "Abbreviation of <i>Acre</i>: a state of <b>Brazil</b>");
    }

    #[test]
    fn sanitize_drops_unknown_tags() {
        assert_eq!(sanitize("<abbr title=\"x\">US</abbr> <small class=\"s\">state</small>"), "US <small>state</small>");
    }

    #[test]
    fn cache_persistence_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json.bz2");
        let second = dir.path().join("second.json.bz2");

        let cache = RenderCache::new();
        cache.insert("{{place|b}}".into(), "B".into());
        cache.insert("{{place|a}}".into(), "A".into());
        cache.save(&first).unwrap();

        let reloaded = RenderCache::load(&first).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("{{place|a}}").as_deref(), Some("A"));
        reloaded.save(&second).unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
    }

    #[test]
    fn missing_cache_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RenderCache::load(&dir.path().join("absent")).unwrap().is_empty());
    }

    struct Counting(AtomicUsize);

    impl Fetch for Counting {
        fn fetch(&self, wikitext: &str, locale: &str) -> Option<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(format!("<span>{locale} <b class=\"x\">{wikitext}</b></span>"))
        }
    }

    #[test]
    fn misses_fetch_once_then_hit() {
        let cache = Arc::new(RenderCache::new());
        let renderer = CachedRenderer::new(cache.clone(), Counting(AtomicUsize::new(0)));
        let call = MacroCall::new("place")
            .with_positional("en")
            .with_positional("city")
            .with_keyword("t", "capital");

        let expected = "en <b>{{place|en|city|t=capital}}</b>";
        assert_eq!(renderer.render(&call, "en").as_deref(), Some(expected));
        assert_eq!(renderer.render(&call, "en").as_deref(), Some(expected));
        assert_eq!(renderer.fetcher.0.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn offline_misses_render_nothing() {
        let renderer = CachedRenderer::new(Arc::new(RenderCache::new()), Offline);
        assert_eq!(renderer.render(&MacroCall::new("place"), "en"), None);
    }
}
