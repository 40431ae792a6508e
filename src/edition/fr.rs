use lazy_static::lazy_static;
use regex::Regex;

use super::hooks::{find_all, EditionHooks, Fallback, FallbackContext};
use super::Edition;
use crate::call::MacroCall;
use crate::functions::{capitalize, italic, term};

pub struct FrHooks;

// Line start of a definition whose text opens in italics.
const START: &str = r"(?im)^(?:#|\*)\s*'+";
const FORMS: &str =
    "féminin de|masculin et féminin pluriel|masculin ou féminin pluriel|pluriel d|pluriel habituel|pluriel inhabituel";
const PERSONS: &str = r"(?:Forme de la )?(?:première|deuxième|troisième) personne du (?:pluriel|singulier)";
const GENDER_NUMBER: &str = r".+(?:(?:masculin|féminin) \(?(?:pluriel|singulier)\)?)";
const TO_LINK: &str = r".*'\s*\[\[([^\]#]+)(?:#.+)?\]\].*";
const TO_LIEN: &str = r".*'\s*\{\{lien\|([^|}]+).*";

lazy_static! {
    static ref LIST_ITEM: Regex = Regex::new(r"<li [^>]+>").unwrap();
    static ref SINOGRAM: Regex = Regex::new(r"(?m)^\{\{sinogram-noimg").unwrap();
    static ref CHARACTER_HEAD: Regex = Regex::new(r"(==\s*\{\{caractère\}\}\s*==)").unwrap();
    static ref CHARACTER_BODY: Regex = Regex::new(r"=== \{\{s\|caractère\}\} ===\n\s*\{\{").unwrap();

    /// Inflection sentences rewritten to `# {{flexion|lemma}}`, applied in order.
    static ref INFLECTIONS: Vec<Regex> = [
        format!("{START}{GENDER_NUMBER}{TO_LIEN}"),
        format!("{START}{GENDER_NUMBER}{TO_LINK}"),
        format!("{START}(?:{FORMS}){TO_LINK}"),
        format!("{START}(?:{FORMS}){TO_LIEN}"),
        format!("{START}(?:{PERSONS}){TO_LINK}"),
        format!("{START}(?:{PERSONS}){TO_LIEN}"),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

const ARMS: &[&str] = &[
    "__variant__fr-rég",
    "Citation bloc",
    "code langue",
    "diminutif",
    "ellipse",
    "par ellipse",
    "emploi",
    "Légifrance",
    "langue",
    "nom langue",
    "nucléide",
    "par analogie",
    "R:DAF6",
    "R:TLFi",
    "rouge",
    "Wikipedia",
    "Wikipédia",
    "wikipédia",
    "wp",
    "WP",
];

fn quoted_reference(word: &str, work: &str) -> String {
    format!("«&nbsp;{word}&nbsp;», dans {work}")
}

/// `Citation/Author[/Work[/Date]]`, with the page as first argument.
fn citation(path: &str, page: &str) -> String {
    let mut parts = path.split('/');
    let author = parts.next().unwrap_or_default();
    let book = parts.next().unwrap_or_default();
    let date = parts.next().unwrap_or_default();
    match (date.is_empty(), page.is_empty()) {
        (true, _) if !book.is_empty() => italic(book),
        (true, _) => author.to_string(),
        (false, true) => format!("{author}, {}, {date}", italic(book)),
        (false, false) => format!("{author}, {}, {date}, page {page}", italic(book)),
    }
}

impl EditionHooks for FrHooks {
    fn name(&self) -> &'static str {
        "fr"
    }

    fn normalize(&self, text: &str, _edition: &Edition) -> String {
        let text = LIST_ITEM.replace_all(text, "");
        let text = SINOGRAM.replace_all(&text, "# {{sinogram-noimg");
        let text = CHARACTER_HEAD.replace_all(&text, "$1\n=== {{s|caractère}} ===");
        let mut text = CHARACTER_BODY
            .replace_all(&text, "=== {{s|caractère}} ===\n# {{")
            .into_owned();
        for pattern in INFLECTIONS.iter() {
            text = pattern.replace_all(&text, "# {{flexion|$1}}").into_owned();
        }
        text
    }

    fn handles(&self, name: &str) -> bool {
        ARMS.contains(&name) || name.starts_with("__variant__fr-accord-") || name.starts_with("Citation/")
    }

    fn resolve_fallback(&self, call: &MacroCall, ctx: &FallbackContext<'_>) -> Fallback {
        let name = call.name.as_str();
        if name == "__variant__fr-rég" || name.starts_with("__variant__fr-accord-") {
            let singular = [call.keyword("s"), call.keyword("ms")]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or(ctx.headword);
            return Fallback::Text(singular.to_string());
        }
        if let Some(path) = name.strip_prefix("Citation/") {
            return Fallback::Text(citation(path, call.arg(1)));
        }

        let first = call.arg(1);
        let text = match name {
            "Citation bloc" => format!("<br/>«&nbsp;{first}&nbsp;»<br/>"),
            "code langue" => ctx
                .edition
                .config
                .langs
                .iter()
                .find(|(_, l10n)| l10n.as_str() == first)
                .map(|(code, _)| code.clone())
                .unwrap_or_default(),
            "diminutif" => match call.keyword("de") {
                "" => term("Diminutif"),
                de => format!("Diminutif de {}", italic(de)),
            },
            "ellipse" | "par ellipse" => match call.keyword("de") {
                "" => term("Par ellipse"),
                de => format!("{} {de}{}", italic("(Ellipse de"), italic(")")),
            },
            "emploi" => {
                let usage = call
                    .positional
                    .iter()
                    .find(|p| p.as_str() != ctx.locale())
                    .map(String::as_str)
                    .unwrap_or_default();
                term(&capitalize(usage))
            }
            "Légifrance" => call.keyword("texte").to_string(),
            "langue" => capitalize(&ctx.lang(first)),
            "nom langue" => ctx.lang(first),
            "nucléide" => format!(
                "<span style=\"white-space:nowrap;\"><span style=\"display:inline-block;margin-bottom:-0.3em;\
                 vertical-align:-0.4em;line-height:1.2em;font-size:85%;text-align:right;\">{}<br>{}</span>{}</span>",
                call.arg(1),
                call.arg(2),
                call.arg(3)
            ),
            "par analogie" => match call.keyword("de") {
                "" => term("Par analogie"),
                de => term(&format!("Par analogie de {de}")),
            },
            "R:DAF6" => quoted_reference(
                if first.is_empty() { ctx.headword } else { first },
                "<i>Dictionnaire de l’Académie française, sixième édition</i>, 1832-1835",
            ),
            "R:TLFi" => quoted_reference(
                if first.is_empty() { ctx.headword } else { first },
                "<i>TLFi, Le Trésor de la langue française informatisé</i>, 1971–1994",
            ),
            "rouge" => {
                let prefix = if call.keyword("fond") == "1" { "background-" } else { "" };
                let phrase = [call.positional(0).unwrap_or_default(), call.keyword("texte"), call.keyword("1")]
                    .into_iter()
                    .find(|s| !s.is_empty())
                    .unwrap_or_default();
                format!("<span style=\"{prefix}color:red\">{phrase}</span>")
            }
            "Wikipedia" | "Wikipédia" | "wikipédia" | "wp" | "WP" => {
                let start = match call.positional.len() {
                    0 => ctx.headword,
                    1 => call.arg(1),
                    _ => call.arg(2),
                };
                let mut phrase = "sur l’encyclopédie Wikipédia".to_string();
                let lang = call.keyword("lang");
                if !lang.is_empty() {
                    phrase.push_str(&format!(" (en {})", ctx.lang(lang)));
                }
                if start.is_empty() {
                    phrase
                } else {
                    format!("{start} {phrase}")
                }
            }
            _ => return Fallback::Defer,
        };
        Fallback::Text(text)
    }

    /// Every pronunciation on the line of the first one.
    fn extract_pronunciations(&self, text: &str, edition: &Edition) -> Vec<String> {
        let Some(pattern) = edition.pronunciation_pattern() else {
            return Vec::new();
        };
        let Some(first) = pattern.find(text) else {
            return Vec::new();
        };
        let end = text[first.start()..]
            .find('\n')
            .map_or(text.len(), |i| first.start() + i);
        find_all(
            pattern,
            &text[first.start()..end],
            edition.config.pronunciation_format.as_deref(),
        )
    }
}
