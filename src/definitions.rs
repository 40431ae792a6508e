//! Definition and etymology extraction from segmented lines.

use crate::edition::Edition;
use crate::markup::clean;
use crate::resolver::Resolver;
use crate::word::{Definition, SubDefinition};

/// Depth and body of a definition line: one bullet character repeated one
/// to three times. Mixed runs (`#:`, `#*`) are examples or quotations.
pub fn bullet<'a>(line: &'a str, edition: &Edition) -> Option<(usize, &'a str)> {
    let first = line.chars().next().filter(|&c| edition.is_bullet(c))?;
    let depth = line.chars().take_while(|&c| c == first).count();
    let body = &line[depth * first.len_utf8()..];
    let mixed = body
        .chars()
        .next()
        .is_some_and(|c| edition.is_bullet(c) || matches!(c, '#' | '*' | ':' | ';'));
    if mixed || depth > 3 {
        return None;
    }
    Some((depth, body))
}

fn ignored(line: &str, edition: &Edition) -> bool {
    edition
        .config
        .definitions_to_ignore
        .iter()
        .any(|pattern| line.contains(pattern.as_str()))
}

/// Ordered, possibly nested definitions of one interest section.
pub fn extract(lines: &[&str], resolver: &Resolver<'_>) -> Vec<Definition> {
    let edition = resolver.edition();
    let mut definitions: Vec<Definition> = Vec::new();

    for line in lines {
        let Some((depth, body)) = bullet(line, edition) else {
            continue;
        };
        if ignored(line, edition) {
            continue;
        }
        let text = clean(&resolver.expand(body));
        if text.is_empty() {
            continue;
        }

        match depth {
            1 => definitions.push(Definition::Text(text)),
            2 => match definitions.last_mut() {
                Some(Definition::Nested(items)) => items.push(SubDefinition::Text(text)),
                _ => definitions.push(Definition::Nested(vec![SubDefinition::Text(text)])),
            },
            _ => match definitions.last_mut() {
                Some(Definition::Nested(items)) => match items.last_mut() {
                    Some(SubDefinition::Nested(subs)) => subs.push(text),
                    _ => items.push(SubDefinition::Nested(vec![text])),
                },
                _ => definitions.push(Definition::Nested(vec![SubDefinition::Nested(vec![text])])),
            },
        }
    }
    definitions
}

/// Flat etymology paragraphs of one etymology section.
pub fn etymology(lines: &[&str], resolver: &Resolver<'_>) -> Vec<Definition> {
    let edition = resolver.edition();
    lines
        .iter()
        .filter(|line| !ignored(line, edition))
        .map(|line| line.trim_start_matches(&['#', '*', ':'][..]).trim())
        .filter(|line| !line.is_empty())
        .map(|line| clean(&resolver.expand(line)))
        .filter(|text| !text.is_empty())
        .map(Definition::Text)
        .collect()
}
