use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::hooks::{EditionHooks, Fallback, FallbackContext};
use super::{Edition, VARIANT_PREFIX};
use crate::call::MacroCall;
use crate::functions::parenthesis;

pub struct ZhHooks;

lazy_static! {
    static ref PRON_START: Regex = Regex::new(r"(?m)^\{\{zh-pron").unwrap();
    static ref PRON_BLOCK: Regex = Regex::new(r"(?ms)^# \{\{zh-pron.*?\}\}").unwrap();
    static ref PSEUDO_HEADING: Regex = Regex::new(r"(?m)^;\s*'*[^'\s]+'*").unwrap();
}

/// Drop every `{{trans-top}}` … `{{trans-bottom}}` block.
fn strip_translations(text: &str) -> String {
    let mut kept = Vec::new();
    let mut inside = false;
    for line in text.lines() {
        if line.starts_with("{{trans-top") {
            inside = true;
        } else if line.starts_with("{{trans-bottom}}") {
            inside = false;
        } else if !inside {
            kept.push(line);
        }
    }
    kept.join("\n")
}

/// Whether the edition has a rule of its own for `name`.
fn has_rule(edition: &Edition, name: &str, variant_mode: bool) -> bool {
    if variant_mode {
        return edition.formula(&format!("{VARIANT_PREFIX}{name}")).is_some();
    }
    edition.is_ignored(name)
        || edition.alias(name).is_some()
        || edition.italic(name).is_some()
        || edition.other(name).is_some()
        || edition.formula(name).is_some()
        || edition.has_shadow(name)
}

impl EditionHooks for ZhHooks {
    fn name(&self) -> &'static str {
        "zh"
    }

    fn normalize(&self, text: &str, _edition: &Edition) -> String {
        // Pronunciation blocks become a single bullet line.
        let text = PRON_START.replace_all(text, "# {{zh-pron");
        let text = PRON_BLOCK.replace_all(&text, |caps: &Captures| caps[0].replace('\n', ""));
        let text = if text.contains("{{trans-top") {
            strip_translations(&text)
        } else {
            text.into_owned()
        };
        PSEUDO_HEADING.replace_all(&text, "").into_owned()
    }

    fn handles(&self, name: &str) -> bool {
        matches!(name.to_lowercase().as_str(), "label" | "lbl" | "lb")
    }

    fn resolve_fallback(&self, call: &MacroCall, ctx: &FallbackContext<'_>) -> Fallback {
        // Rules are keyed by lowercase names: `{{Gloss|…}}` is `{{gloss|…}}`.
        let base = if ctx.variant_mode {
            call.name.strip_prefix(VARIANT_PREFIX).unwrap_or(&call.name)
        } else {
            call.name.as_str()
        };
        let folded = base.to_lowercase();
        if folded != base && has_rule(ctx.edition, &folded, ctx.variant_mode) {
            return Fallback::Redirect(call.renamed(folded));
        }
        if ctx.variant_mode {
            return Fallback::Defer;
        }

        match folded.as_str() {
            "label" | "lbl" | "lb" => {
                let mut text = String::new();
                let mut sep = "，";
                for label in call.positional.iter().skip(1) {
                    if label == "&" {
                        sep = "和";
                        continue;
                    }
                    if !text.is_empty() {
                        text.push_str(sep);
                    }
                    text.push_str(ctx.edition.label(label).unwrap_or(label));
                }
                Fallback::Text(parenthesis(&text, "(", ")"))
            }
            _ => Fallback::Defer,
        }
    }
}
