//! Tiered macro dispatch.
//!
//! Text is tokenized into plain runs, macro spans and link spans. Every macro
//! span has its arguments expanded first (innermost-first), then the resulting
//! [`MacroCall`] walks the tiers: alias, ignore list, literal tables, formulas,
//! shadow check, edition hooks, shared defaults. Whatever falls through is
//! replaced by the unresolved sentinel.
//!
//! In variant mode only the `__variant__<name>` shadow rule of each top-level
//! macro is consulted; plain text and links produce nothing.

use tracing::debug;

use crate::call::{sentinel, split_body, MacroCall};
use crate::defaults;
use crate::edition::{Edition, Fallback, FallbackContext, PageCalls, VARIANT_PREFIX};
use crate::formula::Scope;
use crate::functions::italic;
use crate::services::Services;
use crate::wikitext::{has_markup, tokenize, MacroSpan, Node, Wikilink};

/// Expansion depth after which resolution fails closed.
pub const MAX_DEPTH: usize = 40;

pub struct Resolver<'a> {
    edition: &'a Edition,
    services: &'a Services,
    headword: &'a str,
    page: PageCalls<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(edition: &'a Edition, services: &'a Services, headword: &'a str) -> Self {
        Resolver {
            edition,
            services,
            headword,
            page: PageCalls::default(),
        }
    }

    /// Let fallbacks see the other macros called on the page.
    pub fn with_page(mut self, text: &'a str) -> Self {
        self.page = PageCalls::new(text);
        self
    }

    pub fn headword(&self) -> &'a str {
        self.headword
    }

    pub fn edition(&self) -> &'a Edition {
        self.edition
    }

    /// Resolve every macro and link in `text`.
    pub fn expand(&self, text: &str) -> String {
        self.expand_at(text, 0, false)
    }

    /// Concatenated variant-mode output of the top-level macros of `text`.
    pub fn expand_variant(&self, text: &str) -> String {
        self.expand_at(text, 0, true)
    }

    fn context(&self, variant_mode: bool) -> FallbackContext<'_> {
        FallbackContext {
            edition: self.edition,
            services: self.services,
            headword: self.headword,
            page_calls: &self.page,
            variant_mode,
        }
    }

    fn expand_at(&self, text: &str, depth: usize, variant: bool) -> String {
        if !has_markup(text) {
            return if variant { String::new() } else { text.to_string() };
        }
        if depth > MAX_DEPTH {
            debug!(depth, "expansion depth exceeded");
            return if variant { String::new() } else { sentinel("") };
        }
        let mut out = String::with_capacity(text.len());
        for node in tokenize(text) {
            match node {
                Node::Text(run) if !variant => out.push_str(run),
                Node::Macro(span) => out.push_str(&self.resolve_span(&span, depth, variant)),
                Node::Link(link) if !variant => out.push_str(&self.render_link(&link, depth)),
                _ => {}
            }
        }
        out
    }

    fn resolve_span(&self, span: &MacroSpan<'_>, depth: usize, variant: bool) -> String {
        let (raw_name, fields) = split_body(span.body);
        if span.malformed || depth >= MAX_DEPTH {
            let name = if has_markup(raw_name) { "" } else { raw_name.trim() };
            debug!(name, depth, malformed = span.malformed, "macro not expanded");
            return sentinel(name);
        }
        let name = if has_markup(raw_name) {
            self.expand_at(raw_name, depth + 1, false)
        } else {
            raw_name.to_string()
        };
        let name = name.trim();

        if !variant && self.edition.is_ignored(name) {
            return String::new();
        }

        // Arguments always resolve in ordinary mode.
        let call = MacroCall::from_fields(
            name,
            fields
                .into_iter()
                .map(|f| (f.key.map(str::to_string), self.expand_at(f.value, depth + 1, false))),
        );
        self.dispatch(&call, depth, variant)
    }

    fn dispatch(&self, call: &MacroCall, depth: usize, variant: bool) -> String {
        if depth > MAX_DEPTH {
            debug!(name = %call.name, "expansion depth exceeded");
            return sentinel(&call.name);
        }
        if let Some(target) = self.edition.alias(&call.name) {
            return self.dispatch(&call.renamed(target), depth + 1, variant);
        }
        if variant {
            return self.dispatch_variant(call, depth);
        }

        let name = call.name.as_str();
        if self.edition.is_ignored(name) {
            return String::new();
        }
        if let Some(text) = self.edition.italic(name) {
            return italic(text);
        }
        if let Some(text) = self.edition.other(name) {
            return text.to_string();
        }
        if let Some(expr) = self.edition.formula(name) {
            let scope = Scope {
                call,
                headword: self.headword,
            };
            return match expr.eval(&scope) {
                Ok(text) => text,
                Err(err) => {
                    debug!(name, error = %err, "formula failed");
                    sentinel(name)
                }
            };
        }
        if self.edition.has_shadow(name) {
            return String::new();
        }

        let ctx = self.context(false);
        match self.edition.hooks().resolve_fallback(call, &ctx) {
            Fallback::Text(text) => return text,
            Fallback::Redirect(target) => return self.dispatch(&target, depth + 1, false),
            Fallback::Defer => {}
        }
        if let Some(text) = defaults::resolve(call, &ctx) {
            return text;
        }

        debug!(name, headword = self.headword, "unresolved macro");
        sentinel(name)
    }

    fn dispatch_variant(&self, call: &MacroCall, depth: usize) -> String {
        let shadow = format!("{VARIANT_PREFIX}{}", call.name);
        if let Some(expr) = self.edition.formula(&shadow) {
            let scope = Scope {
                call,
                headword: self.headword,
            };
            return expr.eval(&scope).unwrap_or_default();
        }
        match self.edition.hooks().resolve_fallback(&call.renamed(shadow), &self.context(true)) {
            Fallback::Text(text) => text,
            Fallback::Redirect(target) => self.dispatch(&target, depth + 1, true),
            Fallback::Defer => String::new(),
        }
    }

    fn render_link(&self, link: &Wikilink<'_>, depth: usize) -> String {
        if link.namespace().is_some_and(|ns| self.edition.ignores_namespace(ns)) {
            return String::new();
        }
        if let Some(display) = link.display {
            return self.expand_at(display, depth + 1, false);
        }
        if link.target.trim_start().starts_with(':') {
            return link.bare_target().to_string();
        }
        self.expand_at(link.target.trim(), depth + 1, false)
    }
}

/// Names of every macro in `text`, nested ones included, first occurrence kept.
/// Macros nested deeper than [`MAX_DEPTH`] are not listed.
pub fn call_names(text: &str) -> Vec<String> {
    fn walk(text: &str, depth: usize, names: &mut Vec<String>) {
        if depth > MAX_DEPTH {
            return;
        }
        for node in tokenize(text) {
            match node {
                Node::Macro(span) => {
                    let (name, fields) = split_body(span.body);
                    let name = name.trim();
                    if !name.is_empty() && !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                    for field in fields {
                        walk(field.value, depth + 1, names);
                    }
                }
                Node::Link(link) => {
                    if let Some(display) = link.display {
                        walk(display, depth + 1, names);
                    }
                }
                Node::Text(_) => {}
            }
        }
    }
    let mut names = Vec::new();
    walk(text, 0, &mut names);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::has_sentinel;
    use rstest::rstest;

    // ─────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────

    const TOY: &str = r#"
locale: xx
templates_ignored: [gone]
templates_italic:
  old: dated
templates_other:
  dagger: "†"
templates_alias:
  ping: pong
  pong: ping
  short: long
templates_multi:
  long: "'long:' + $0"
  upper: "capitalize($0)"
  wrap: "'[' + $0 + ']'"
  first: "$0"
  flexion: "$0"
  __variant__flexion: "$-1"
langs:
  en: English
link_namespaces_ignored: [Kategorie]
"#;

    fn toy() -> Edition {
        Edition::from_yaml(TOY).unwrap()
    }

    fn expand(edition: &Edition, text: &str) -> String {
        let services = Services::default();
        Resolver::new(edition, &services, "word").expand(text)
    }

    // ─────────────────────────────────────────────────────────────
    // Tiers
    // ─────────────────────────────────────────────────────────────

    #[rstest]
    #[case("a {{gone|x}} b", "a  b")]
    #[case("{{old}}", "<i>dated</i>")]
    #[case("{{dagger|ignored}}", "†")]
    #[case("{{short|x}}", "long:x")]
    #[case("{{en}}", "English")]
    #[case("{{#expr: 1 + 2}}", "3")]
    fn tiers(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(expand(&toy(), text), expected);
    }

    #[test]
    fn inner_macros_resolve_first() {
        assert_eq!(expand(&toy(), "{{wrap|{{upper|{{first|abc}}}}}}"), "[Abc]");
    }

    #[test]
    fn unknown_macro_is_sentinel() {
        assert_eq!(
            expand(&toy(), "x {{mystery|a|b=c}} y"),
            "x ##opendoublecurly##mystery##closedoublecurly## y"
        );
    }

    #[test]
    fn alias_cycle_fails_closed() {
        let out = expand(&toy(), "{{ping}}");
        assert!(has_sentinel(&out), "{out}");
    }

    #[rstest]
    #[case("-".repeat(200_000) + "1")]
    #[case("(".repeat(200_000) + "1" + &")".repeat(200_000))]
    fn deep_expr_is_sentinel(#[case] source: String) {
        assert_eq!(expand(&toy(), &format!("{{{{#expr: {source}}}}}")), sentinel("#expr"));
    }

    #[test]
    fn formula_error_is_sentinel() {
        assert_eq!(expand(&toy(), "{{first}}"), sentinel("first"));
    }

    #[test]
    fn malformed_macro_is_sentinel() {
        assert_eq!(expand(&toy(), "{{wrap|[[open}}"), sentinel("wrap"));
    }

    #[rstest]
    #[case("plain text, no markup")]
    #[case("a } b { c ] d [")]
    fn macro_free_text_is_unchanged(#[case] text: &str) {
        let once = expand(&toy(), text);
        assert_eq!(once, text);
        assert_eq!(expand(&toy(), &once), once);
    }

    #[test]
    fn unbalanced_opener_is_kept() {
        assert_eq!(expand(&toy(), "{{wrap|x"), "{{wrap|x");
    }

    #[test]
    fn excessive_nesting_fails_closed() {
        let text = format!("{}x{}", "{{first|".repeat(MAX_DEPTH + 5), "}}".repeat(MAX_DEPTH + 5));
        assert!(has_sentinel(&expand(&toy(), &text)));
    }

    #[rstest]
    #[case("[[a|", "]]", MAX_DEPTH + 5)]
    #[case("[[a|", "]]", 20_000)]
    #[case("{{", "}}", 20_000)]
    #[case("{{first|", "}}", 20_000)]
    fn deep_links_and_names_fail_closed(#[case] open: &str, #[case] close: &str, #[case] levels: usize) {
        let text = format!("{}x{}", open.repeat(levels), close.repeat(levels));
        assert!(has_sentinel(&expand(&toy(), &text)));
    }

    // ─────────────────────────────────────────────────────────────
    // Links
    // ─────────────────────────────────────────────────────────────

    #[rstest]
    #[case("[[target]]", "target")]
    #[case("[[target|shown]]", "shown")]
    #[case("[[target#anchor]]", "target")]
    #[case("[[:en:target]]", "target")]
    #[case("[[target|{{upper|shown}}]]", "Shown")]
    #[case("a[[Category:Nouns]]b", "ab")]
    #[case("a[[File:x.png|thumb]]b", "ab")]
    #[case("a[[Kategorie:Nouns]]b", "ab")]
    fn links(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(expand(&toy(), text), expected);
    }

    // ─────────────────────────────────────────────────────────────
    // Variant mode
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn shadow_rule_in_each_mode() {
        let edition = toy();
        let services = Services::default();
        let resolver = Resolver::new(&edition, &services, "tales");
        assert_eq!(resolver.expand("# {{flexion|tale}}"), "# tale");
        assert_eq!(resolver.expand_variant("# {{flexion|tale}}"), "tale");
        assert_eq!(resolver.expand_variant("# see {{wrap|x}} [[y]]"), "");
        assert_eq!(resolver.expand_variant("{{flexion|{{upper|tale}}}}"), "Tale");
    }

    #[test]
    fn shadow_only_name_renders_empty() {
        let edition = Edition::from_yaml("locale: xx\ntemplates_multi:\n  __variant__v: \"$0\"\n").unwrap();
        assert_eq!(expand(&edition, "a{{v|b}}c"), "ac");
    }

    // ─────────────────────────────────────────────────────────────
    // Bundled editions
    // ─────────────────────────────────────────────────────────────

    #[rstest]
    #[case("{{abbreviation of|zh|留名}}", "留名之縮寫。")]
    #[case("{{cmn-pinyin of|塔吉克}}", "<span style=\"font-size:larger\">塔吉克</span>的漢語拼音讀法")]
    #[case("{{defdate|from 15th c.}}", "<small>（from 15th c.）</small>")]
    #[case("{{gloss|對患者}}", "（對患者）")]
    #[case("{{gl|對患者}}", "（對患者）")]
    #[case("{{IPA|zh|/tʷãɔ̃⁵⁴⁵⁴/}}", "/tʷãɔ̃⁵⁴⁵⁴/")]
    #[case("{{IPAchar|[kiŋ²¹ naŋ⁵⁵ nˡiʔ⁵]}}", "[kiŋ²¹ naŋ⁵⁵ nˡiʔ⁵]")]
    #[case("{{IPAfont|/kʰɑlpin/}}", "/kʰɑlpin/")]
    #[case("{{lang|zh|中華}}", "中華")]
    #[case("{{misspelling of|zh|稍候}}", "稍候的拼寫錯誤。")]
    #[case("{{n-g|用來表示全範圍}}", "用來表示全範圍")]
    #[case("{{non-gloss definition|用來表示全範圍}}", "用來表示全範圍")]
    #[case("{{qual|前句常有“一方面”……}}", "(前句常有“一方面”……)")]
    #[case("{{qualifier|前句常有“一方面”……}}", "(前句常有“一方面”……)")]
    #[case("{{taxlink|Okapia johnstoni|species}}", "<i>Okapia johnstoni</i>")]
    #[case("{{zh-character component|彡}}", "漢字部件「彡」的名稱。")]
    #[case("{{zh-ref|Schuessler, 2007}}", "Schuessler, 2007")]
    #[case("{{lb|zh|internet slang}}", "(網路用語)")]
    fn zh_macros(#[case] text: &str, #[case] expected: &str) {
        let edition = Edition::bundled("zh").unwrap();
        assert_eq!(expand(&edition, text), expected);
    }

    #[rstest]
    #[case("{{chiffre romain|15}}", "XV")]
    #[case("{{nombre romain|12}}", "XII")]
    #[case("XIX{{e}}", "XIX<sup>e</sup>")]
    #[case("{{1er|mai}}", "1<sup>er</sup>&nbsp;mai")]
    #[case("{{pron|ɑ|fr}}", "\\ɑ\\")]
    #[case("{{n°|5}}", "n<sup>o</sup>5")]
    #[case("{{trans|fr}}", "<i>Transitif</i>")]
    #[case("{{langue|gcr}}", "Créole guyanais")]
    #[case("{{fr-rég|ʃa}}", "")]
    #[case("[[Catégorie:Noms communs en français]]", "")]
    fn fr_macros(#[case] text: &str, #[case] expected: &str) {
        let edition = Edition::bundled("fr").unwrap();
        assert_eq!(expand(&edition, text), expected);
    }

    #[test]
    fn sv_reflexive_tag_sees_headword() {
        let edition = Edition::bundled("sv").unwrap();
        let services = Services::default();
        let resolver = Resolver::new(&edition, &services, "etsa");
        assert_eq!(
            resolver.expand("{{tagg|reflexivt}}"),
            "<i>(reflexivt: <b>etsa sig</b>)</i>"
        );
    }

    #[test]
    fn page_call_names() {
        assert_eq!(
            call_names("{{a|{{b}}}} [[x|{{c}}]] {{a}}"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn page_call_names_stop_at_the_depth_bound() {
        let text = format!("{{{{a|{}x{}}}}}", "{{b|".repeat(20_000), "}}".repeat(20_000));
        assert_eq!(call_names(&text), vec!["a".to_string(), "b".to_string()]);
    }

    // ─────────────────────────────────────────────────────────────
    // Redirects
    // ─────────────────────────────────────────────────────────────

    #[rstest]
    #[case("{{Gloss|對患者}}", "（對患者）")]
    #[case("{{GL|對患者}}", "（對患者）")]
    #[case("{{LB|zh|internet slang}}", "(網路用語)")]
    fn capitalized_zh_macros_redirect(#[case] text: &str, #[case] expected: &str) {
        let edition = Edition::bundled("zh").unwrap();
        assert_eq!(expand(&edition, text), expected);
    }

    #[test]
    fn redirect_keeps_variant_mode() {
        let edition = Edition::from_yaml(
            "locale: xx\nhooks: zh\ntemplates_multi:\n  alt: \"'alt ' + $0\"\n  __variant__alt: \"$0\"\n",
        )
        .unwrap();
        let services = Services::default();
        let resolver = Resolver::new(&edition, &services, "w");
        assert_eq!(resolver.expand("{{Alt|x}}"), "alt x");
        assert_eq!(resolver.expand_variant("{{Alt|x}}"), "x");
        assert_eq!(resolver.expand_variant("{{Other|x}}"), "");
    }
}
