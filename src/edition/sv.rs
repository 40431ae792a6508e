use super::hooks::{EditionHooks, Fallback, FallbackContext};
use crate::call::MacroCall;
use crate::functions::{italic, strong, term};

pub struct SvHooks;

/// `till` + `lada` gives `tilllada`; the compound is spelled `tillada`.
fn collapse_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    let mut run = 0;
    for c in text.chars() {
        if Some(c) == previous {
            run += 1;
        } else {
            previous = Some(c);
            run = 1;
        }
        if run <= 2 {
            out.push(c);
        }
    }
    out
}

/// Language name with the handful of etymology-specific spellings.
fn etymology_lang(code: &str, ctx: &FallbackContext<'_>) -> String {
    match code {
        "grc" => "grekiska".to_string(),
        "gd" => "gäliska".to_string(),
        "el" => "nygrekiska".to_string(),
        "la" => "latinska".to_string(),
        _ => ctx.lang(code),
    }
}

const ARMS: &[&str] = &[
    "__variant__avledning",
    "belagt",
    "härledning",
    "kognat",
    "led",
    "tagg",
    "tr",
];

impl EditionHooks for SvHooks {
    fn name(&self) -> &'static str {
        "sv"
    }

    fn handles(&self, name: &str) -> bool {
        ARMS.contains(&name)
    }

    fn resolve_fallback(&self, call: &MacroCall, ctx: &FallbackContext<'_>) -> Fallback {
        let parts = &call.positional;
        let text = match call.name.as_str() {
            "__variant__avledning" => {
                let mut parts = parts.clone();
                if parts.len() == 3 {
                    parts.remove(2);
                }
                let base = parts.last().cloned().unwrap_or_default();
                match call.keyword("partikel") {
                    "" => base,
                    particle => collapse_runs(&format!("{particle}{base}")),
                }
            }
            "belagt" => {
                let year = call.arg(2);
                if parts.len() > 2 {
                    let suffix = if call.arg(3).contains('t') { "-talet" } else { "" };
                    format!("belagt i språket sedan {year}{suffix}")
                } else {
                    format!("Belagt i språket sedan {year}.")
                }
            }
            "härledning" => {
                // Positional: source language, language, word, gloss.
                let mut phrase = format!("{} {}", etymology_lang(call.arg(2), ctx), italic(call.arg(3)));
                let tr = call.keyword("tr");
                let gloss = call.arg(4);
                if !tr.is_empty() || !gloss.is_empty() {
                    let mut inner = Vec::new();
                    if !tr.is_empty() {
                        inner.push(italic(tr));
                    }
                    if !gloss.is_empty() {
                        inner.push(format!("”{gloss}”"));
                    }
                    phrase.push_str(&format!(" ({})", inner.join(", ")));
                }
                phrase
            }
            "kognat" => {
                let mut phrase = format!("{} {}", etymology_lang(call.arg(1), ctx), italic(call.arg(2)));
                if parts.len() > 2 {
                    phrase.push_str(&format!(" (”{}”)", call.arg(3)));
                }
                phrase
            }
            "led" => {
                let kind = if call.arg(2) == "f" { "förled" } else { "efterled" };
                format!(
                    "{} {}",
                    italic(&format!("{kind} tillhörigt ordet")),
                    call.last().unwrap_or_default()
                )
            }
            "tagg" => {
                let mut words: Vec<String> = parts
                    .iter()
                    .filter(|p| !p.is_empty())
                    .map(|p| {
                        if p == "reflexivt" {
                            format!("{p}: {}", strong(&format!("{} sig", ctx.headword)))
                        } else {
                            p.clone()
                        }
                    })
                    .collect();
                let extra = call.keyword("text");
                if !extra.is_empty() {
                    words.push(extra.to_string());
                }
                term(&words.join(", "))
            }
            "tr" => ctx.transliterate(call.arg(1), call.arg(2)),
            _ => return Fallback::Defer,
        };
        Fallback::Text(text)
    }
}
