//! Cross-edition macros, consulted after every edition tier has passed.

use crate::call::MacroCall;
use crate::edition::FallbackContext;
use crate::functions::{arithmetic, format_number, ruby, small, subscript, superscript};

/// Render `call` if it is one of the shared constructs.
pub fn resolve(call: &MacroCall, ctx: &FallbackContext<'_>) -> Option<String> {
    let text = match call.name.as_str() {
        // Parser functions
        "#expr" => format_number(arithmetic(call.arg(1))?),
        "#if" => {
            let branch = if call.arg(1).trim().is_empty() { 3 } else { 2 };
            call.arg(branch).to_string()
        }
        "#ifeq" => {
            let branch = if call.arg(1).trim() == call.arg(2).trim() { 3 } else { 4 };
            call.arg(branch).to_string()
        }

        "!" => "|".to_string(),
        "=" => "=".to_string(),

        "lang" | "Lang" => call.last().unwrap_or_default().to_string(),
        "w" | "W" | "wikipedia" => [call.arg(2), call.arg(1)]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(ctx.headword)
            .to_string(),
        "l" | "link" | "ll" => [call.keyword("alt"), call.arg(3), call.arg(2)]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string(),
        "sub" => subscript(call.arg(1)),
        "sup" => superscript(call.arg(1)),
        "small" => small(call.arg(1)),
        "nobr" => call.arg(1).replace(' ', "&nbsp;"),
        "IPAchar" => call.arg(1).to_string(),
        "ruby" => ruby(call.arg(1), call.arg(2)),

        "place" => {
            let renderer = ctx.services.renderer.as_ref()?;
            renderer.render(call, ctx.locale())?
        }

        // `{{en}}`, `{{la}}`: bare language codes render as the language name.
        name => ctx.edition.lang_name(name)?.to_string(),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edition::Edition;
    use crate::services::{RemoteRenderer, Services};
    use crate::edition::PageCalls;
    use rstest::rstest;

    // ─────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────

    fn run_with(source: &str, services: &Services) -> Option<String> {
        let edition = Edition::bundled("sv").unwrap();
        let ctx = FallbackContext {
            edition: &edition,
            services,
            headword: "ord",
            page_calls: &PageCalls::default(),
            variant_mode: false,
        };
        resolve(&MacroCall::parse(source).unwrap(), &ctx)
    }

    fn run(source: &str) -> Option<String> {
        run_with(source, &Services::default())
    }

    struct Echo;

    impl RemoteRenderer for Echo {
        fn render(&self, call: &MacroCall, locale: &str) -> Option<String> {
            Some(format!("{locale}:{}", call.canonical()))
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Shared constructs
    // ─────────────────────────────────────────────────────────────

    #[rstest]
    #[case("{{#expr: 2 ^ 30}}", "1073741824")]
    #[case("{{#expr: 7 / 2}}", "3.5")]
    #[case("{{#if: x|yes|no}}", "yes")]
    #[case("{{#if: |yes|no}}", "no")]
    #[case("{{#ifeq: a|a|same|different}}", "same")]
    #[case("{{#ifeq: a|b|same|different}}", "different")]
    #[case("{{!}}", "|")]
    #[case("{{lang|zh|中華}}", "中華")]
    #[case("{{w|Sverige}}", "Sverige")]
    #[case("{{w|Sverige|landet}}", "landet")]
    #[case("{{w}}", "ord")]
    #[case("{{l|en|word}}", "word")]
    #[case("{{l|en|word|words}}", "words")]
    #[case("{{l|en|word|alt=Word}}", "Word")]
    #[case("{{sub|2}}", "<sub>2</sub>")]
    #[case("{{sup|e}}", "<sup>e</sup>")]
    #[case("{{nobr|1 000 000}}", "1&nbsp;000&nbsp;000")]
    #[case("{{nobr|1=a b}}", "a&nbsp;b")]
    #[case("{{IPAchar|[kiŋ²¹]}}", "[kiŋ²¹]")]
    #[case("{{en}}", "engelska")]
    fn shared(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("{{nope|x}}")]
    #[case("{{#expr: 1 / 0}}")]
    #[case("{{place|sv|city}}")]
    fn unknown(#[case] source: &str) {
        assert_eq!(run(source), None);
    }

    #[test]
    fn place_goes_through_renderer() {
        let services = Services::default().with_renderer(Echo);
        assert_eq!(
            run_with("{{place|sv|city|c/Sweden}}", &services).as_deref(),
            Some("sv:{{place|sv|city|c/Sweden}}")
        );
    }
}
