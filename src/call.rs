//! Macro invocations and the argument splitter.
//!
//! A macro body (`name|a|b|k=v`) is split on top-level pipes while still raw,
//! so keyword detection never looks inside a nested macro or link. The raw
//! fields are then resolved by the caller, innermost first, and assembled
//! into a [`MacroCall`].

use std::collections::BTreeMap;

use crate::wikitext::{find_top_level, split_top_level};

pub const SENTINEL_OPEN: &str = "##opendoublecurly##";
pub const SENTINEL_CLOSE: &str = "##closedoublecurly##";

/// Marker emitted in place of a macro nothing knows how to render.
pub fn sentinel(name: &str) -> String {
    format!("{SENTINEL_OPEN}{name}{SENTINEL_CLOSE}")
}

/// Whether `text` still carries at least one unresolved-macro marker.
pub fn has_sentinel(text: &str) -> bool {
    text.contains(SENTINEL_OPEN)
}

/// One raw field of a macro body, before its nested markup is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    pub key: Option<&'a str>,
    pub value: &'a str,
}

/// Split a macro body into its raw name and raw argument fields.
///
/// Parser functions (`#expr: 1 + 2`) carry their first argument after the
/// colon of the name.
pub fn split_body(body: &str) -> (&str, Vec<RawField<'_>>) {
    let mut pieces = split_top_level(body, b'|').into_iter();
    let mut name = pieces.next().unwrap_or_default();
    let mut fields = Vec::new();

    if name.trim_start().starts_with('#') {
        if let Some(colon) = find_top_level(name, b':') {
            fields.push(RawField {
                key: None,
                value: &name[colon + 1..],
            });
            name = &name[..colon];
        }
    }

    for piece in pieces {
        fields.push(classify_field(piece));
    }
    (name, fields)
}

fn classify_field(piece: &str) -> RawField<'_> {
    if let Some(eq) = find_top_level(piece, b'=') {
        let key = piece[..eq].trim();
        if is_keyword_name(key) {
            return RawField {
                key: Some(key),
                value: &piece[eq + 1..],
            };
        }
    }
    RawField {
        key: None,
        value: piece,
    }
}

/// A key must be a plain name: no markup, no quotes, no line breaks.
fn is_keyword_name(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '<' | '>' | '"' | '\'' | '[' | ']' | '{' | '}' | '\n'))
}

/// A fully resolved macro invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroCall {
    pub name: String,
    pub positional: Vec<String>,
    pub keywords: BTreeMap<String, String>,
}

impl MacroCall {
    pub fn new(name: impl Into<String>) -> Self {
        MacroCall {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_positional(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn with_keyword(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keywords.insert(key.into(), value.into());
        self
    }

    /// Build a call from already-resolved fields. Later keywords win.
    pub fn from_fields(name: &str, fields: impl IntoIterator<Item = (Option<String>, String)>) -> Self {
        let mut call = MacroCall::new(name.trim());
        for (key, value) in fields {
            match key {
                Some(key) => {
                    call.keywords.insert(key, value.trim().to_string());
                }
                None => call.positional.push(value.trim().to_string()),
            }
        }
        call
    }

    /// Parse a macro literal without resolving any nested markup.
    ///
    /// Returns `None` when `source` is not exactly one balanced macro.
    pub fn parse(source: &str) -> Option<Self> {
        let body = source.trim().strip_prefix("{{")?.strip_suffix("}}")?;
        let (name, fields) = split_body(body);
        Some(MacroCall::from_fields(
            name,
            fields
                .into_iter()
                .map(|f| (f.key.map(str::to_string), f.value.to_string())),
        ))
    }

    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.positional.last().map(String::as_str)
    }

    /// Keyword value; missing keys read as empty.
    pub fn keyword(&self, key: &str) -> &str {
        self.keywords.get(key).map(String::as_str).unwrap_or("")
    }

    /// 1-based argument: an explicit `n=` keyword first, then positional `n-1`.
    pub fn arg(&self, n: usize) -> &str {
        if let Some(value) = self.keywords.get(&n.to_string()) {
            return value;
        }
        n.checked_sub(1)
            .and_then(|i| self.positional(i))
            .unwrap_or("")
    }

    /// Same call under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        MacroCall {
            name: name.into(),
            positional: self.positional.clone(),
            keywords: self.keywords.clone(),
        }
    }

    /// Stable textual form: positional arguments in order, keywords sorted.
    pub fn canonical(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.positional.iter().cloned());
        parts.extend(self.keywords.iter().map(|(k, v)| format!("{k}={v}")));
        format!("{{{{{}}}}}", parts.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn splits_positional_and_keyword() {
        let call = MacroCall::parse("{{name|a|b|k=v}}").unwrap();
        assert_eq!(call.name, "name");
        assert_eq!(call.positional, vec!["a", "b"]);
        assert_eq!(call.keyword("k"), "v");
        assert_eq!(call.keywords.len(), 1);
    }

    #[test]
    fn missing_keyword_reads_empty() {
        let call = MacroCall::parse("{{name|a}}").unwrap();
        assert_eq!(call.keyword("nope"), "");
    }

    #[test]
    fn numeric_keyword_does_not_disturb_positional_order() {
        let call = MacroCall::parse("{{rouge|fond=1|1=un texte|x}}").unwrap();
        assert_eq!(call.positional, vec!["x"]);
        assert_eq!(call.keyword("1"), "un texte");
        assert_eq!(call.arg(1), "un texte");
        assert_eq!(call.positional(0), Some("x"));
        assert_eq!(call.arg(2), "");
    }

    #[test]
    fn equals_inside_nested_macro_is_positional() {
        let (_, fields) = split_body("m|{{lang|fr|a=b}}|[[x|y=z]]");
        assert_eq!(fields.iter().filter(|f| f.key.is_some()).count(), 0);
    }

    #[test]
    fn keyword_value_splits_on_first_equals() {
        let call = MacroCall::parse("{{zh-pron|m=huángmǎguà,er=y}}").unwrap();
        assert_eq!(call.keyword("m"), "huángmǎguà,er=y");
    }

    #[rstest]
    #[case("=", "=")]
    #[case("<span a=b>", "<span a=b>")]
    #[case(" =x", "=x")]
    fn non_name_keys_stay_positional(#[case] field: &str, #[case] expected: &str) {
        let call = MacroCall::parse(&format!("{{{{m|{field}}}}}")).unwrap();
        assert_eq!(call.positional, vec![expected]);
        assert!(call.keywords.is_empty());
    }

    #[test]
    fn parser_function_colon() {
        let call = MacroCall::parse("{{#expr: 2 ^ 30}}").unwrap();
        assert_eq!(call.name, "#expr");
        assert_eq!(call.positional, vec!["2 ^ 30"]);
    }

    #[test]
    fn whitespace_trimming() {
        let call = MacroCall::parse("{{  lang  |  fr  | tr = x }}").unwrap();
        assert_eq!(call.name, "lang");
        assert_eq!(call.positional, vec!["fr"]);
        assert_eq!(call.keyword("tr"), "x");
    }

    #[test]
    fn canonical_sorts_keywords() {
        let call = MacroCall::new("place")
            .with_positional("fr")
            .with_keyword("t", "x")
            .with_keyword("a", "y");
        assert_eq!(call.canonical(), "{{place|fr|a=y|t=x}}");
    }

    #[test]
    fn sentinel_wraps_name() {
        assert_eq!(sentinel("foo"), "##opendoublecurly##foo##closedoublecurly##");
        assert!(has_sentinel(&sentinel("foo")));
    }

    #[test]
    fn parse_rejects_non_macro() {
        assert!(MacroCall::parse("plain").is_none());
    }
}
