//! "This page is an inflected form of X" cross-references.

use crate::edition::Edition;
use crate::markup::clean;
use crate::resolver::Resolver;

/// Whether `line` carries one of the edition's variant-macro markers.
pub fn has_marker(line: &str, edition: &Edition) -> bool {
    edition
        .config
        .variant_templates
        .iter()
        .any(|marker| line.contains(marker.as_str()))
}

/// Variant targets of one variant section, in order, without duplicates or
/// the headword itself.
pub fn extract(lines: &[&str], resolver: &Resolver<'_>) -> Vec<String> {
    let edition = resolver.edition();
    let mut found: Vec<String> = Vec::new();
    for line in lines {
        if !has_marker(line, edition) {
            continue;
        }
        let body = line.trim_start_matches(|c: char| edition.is_bullet(c)).trim();
        let target = clean(&resolver.expand_variant(body));
        if target.is_empty() || target == resolver.headword() || found.contains(&target) {
            continue;
        }
        found.push(target);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Services;

    fn run(locale: &str, headword: &str, lines: &[&str]) -> Vec<String> {
        let edition = Edition::bundled(locale).unwrap();
        let services = Services::default();
        let resolver = Resolver::new(&edition, &services, headword);
        extract(lines, &resolver)
    }

    #[test]
    fn flexion_lines() {
        assert_eq!(run("fr", "tales", &["# {{flexion|tale}}"]), vec!["tale"]);
    }

    #[test]
    fn headword_and_duplicates_are_dropped() {
        let lines = [
            "{{fr-rég|ʃa|s=chat}}",
            "# {{flexion|chat}}",
            "# {{flexion|chats}}",
            "# some definition",
        ];
        assert_eq!(run("fr", "chats", &lines), vec!["chat"]);
    }

    #[test]
    fn lemma_pages_have_no_variants() {
        assert!(run("fr", "chat", &["{{fr-rég|ʃa}}", "# Mammifère."]).is_empty());
    }

    #[test]
    fn verb_inflections() {
        assert_eq!(
            run("fr", "mangeons", &["{{fr-verbe-flexion|manger|ind.p.1p=oui}}"]),
            vec!["manger"]
        );
    }

    #[test]
    fn swedish_inflection() {
        assert_eq!(run("sv", "bilar", &["# {{böjning|sv|subst|bil}}"]), vec!["bil"]);
    }

    #[test]
    fn plain_text_is_ignored_in_variant_mode() {
        assert_eq!(run("zh", "為", &["# {{異體|爲}}的異體字。"]), vec!["爲"]);
    }
}
