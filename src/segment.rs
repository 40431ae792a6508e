//! Heading-driven segmentation of a normalized page.
//!
//! Headings open sections on a stack keyed by depth; a heading pops every
//! open section at its depth or deeper before it is classified. Body lines
//! belong to the innermost open section.

use crate::edition::Edition;

/// Lines of one interest section, labelled with its part of speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'t> {
    pub label: String,
    /// The heading matched a variant-section marker.
    pub variant: bool,
    pub lines: Vec<&'t str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments<'t> {
    /// Every body line read while a head section was open.
    pub head: Vec<&'t str>,
    /// One entry per etymology section.
    pub etymologies: Vec<Vec<&'t str>>,
    /// Interest sections in encounter order.
    pub blocks: Vec<Block<'t>>,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Head,
    /// An etymology section; `block` is set when its title is also an
    /// interest marker, in which case bullet lines are definitions.
    Etymology { index: usize, block: Option<usize> },
    Interest(usize),
    Ignored,
}

/// Depth and title of a heading line (`=== Title ===`).
pub fn heading(line: &str) -> Option<(usize, &str)> {
    let line = line.trim();
    let leading = line.bytes().take_while(|&b| b == b'=').count();
    if leading == 0 || leading == line.len() {
        return None;
    }
    let trailing = line.bytes().rev().take_while(|&b| b == b'=').count();
    if trailing == 0 {
        return None;
    }
    let depth = leading.min(trailing);
    Some((depth, line[depth..line.len() - depth].trim()))
}

/// Case-insensitive marker match. Macro-shaped markers match as prefixes;
/// plain markers must equal the title, a trailing sense number aside.
fn matches(markers: &[String], title: &str) -> bool {
    let title = title.to_lowercase();
    let unnumbered = title.trim_end_matches(|c: char| c.is_ascii_digit() || c.is_whitespace());
    markers.iter().any(|marker| {
        let marker = marker.to_lowercase();
        if marker.starts_with("{{") {
            title.starts_with(&marker)
        } else {
            title == marker || unnumbered == marker
        }
    })
}

/// Whether `line` opens with a definition bullet.
pub fn is_bullet_line(line: &str, edition: &Edition) -> bool {
    line.chars().next().is_some_and(|c| edition.is_bullet(c))
}

struct Segmenter<'e, 't> {
    edition: &'e Edition,
    headless: bool,
    stack: Vec<(usize, Kind)>,
    /// Block receiving bullet lines directly under the current head section.
    top_block: Option<usize>,
    out: Segments<'t>,
}

impl<'e, 't> Segmenter<'e, 't> {
    fn head_open(&self) -> bool {
        self.headless || self.stack.iter().any(|(_, kind)| matches!(kind, Kind::Head))
    }

    fn open_block(&mut self, label: String, variant: bool) -> usize {
        self.out.blocks.push(Block {
            label,
            variant,
            lines: Vec::new(),
        });
        self.out.blocks.len() - 1
    }

    fn interest_block(&mut self, depth: usize, title: &str) -> Option<usize> {
        let config = &self.edition.config;
        let depth_allowed = config.section_levels.is_empty() || config.section_levels.contains(&depth);
        if !depth_allowed || !matches(&config.sections, title) {
            return None;
        }
        let variant = matches(&config.variant_titles, title);
        let label = self.edition.pos_label(title);
        Some(self.open_block(label, variant))
    }

    fn classify(&mut self, depth: usize, title: &str) -> Kind {
        let config = &self.edition.config;
        if matches(&config.head_sections, title) {
            return Kind::Head;
        }
        if !self.head_open() {
            return Kind::Ignored;
        }
        if matches(&config.etymology_sections, title) {
            self.out.etymologies.push(Vec::new());
            let index = self.out.etymologies.len() - 1;
            let block = self.interest_block(depth, title);
            return Kind::Etymology { index, block };
        }
        match self.interest_block(depth, title) {
            Some(block) => Kind::Interest(block),
            None => Kind::Ignored,
        }
    }

    fn heading(&mut self, depth: usize, title: &str) {
        while self.stack.last().is_some_and(|(d, _)| *d >= depth) {
            self.stack.pop();
        }
        self.top_block = None;
        let kind = self.classify(depth, title);
        self.stack.push((depth, kind));
    }

    fn line(&mut self, line: &'t str) {
        if self.head_open() {
            self.out.head.push(line);
        }
        let bullet = is_bullet_line(line, self.edition);
        match self.stack.last().map(|(_, kind)| *kind) {
            Some(Kind::Head) if bullet => {
                let Some(label) = self.edition.config.top_label.as_deref() else {
                    return;
                };
                let block = match self.top_block {
                    Some(block) => block,
                    None => {
                        let block = self.open_block(self.edition.merge_label(label), false);
                        self.top_block = Some(block);
                        block
                    }
                };
                self.out.blocks[block].lines.push(line);
            }
            Some(Kind::Etymology { block: Some(block), .. }) if bullet => {
                self.out.blocks[block].lines.push(line);
            }
            Some(Kind::Etymology { index, .. }) => self.out.etymologies[index].push(line),
            Some(Kind::Interest(block)) => self.out.blocks[block].lines.push(line),
            _ => {}
        }
    }
}

/// Split a normalized page into head text, etymology sections and interest blocks.
pub fn segment<'t>(text: &'t str, edition: &Edition) -> Segments<'t> {
    let mut segmenter = Segmenter {
        edition,
        headless: edition.config.head_sections.is_empty(),
        stack: Vec::new(),
        top_block: None,
        out: Segments::default(),
    };
    for line in text.lines() {
        match heading(line) {
            Some((depth, title)) => segmenter.heading(depth, title),
            None => segmenter.line(line),
        }
    }
    segmenter.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TOY: &str = r#"
locale: xx
head_sections: [english]
etymology_sections: [etymology]
sections: [noun, verb]
variant_titles: [verb]
section_levels: [3, 4]
top_label: top
"#;

    fn toy() -> Edition {
        Edition::from_yaml(TOY).unwrap()
    }

    fn labels<'s, 't>(segments: &'s Segments<'t>) -> Vec<(&'s str, Vec<&'t str>)> {
        segments
            .blocks
            .iter()
            .map(|b| (b.label.as_str(), b.lines.clone()))
            .collect()
    }

    #[rstest]
    #[case("== English ==", Some((2, "English")))]
    #[case("===Noun===", Some((3, "Noun")))]
    #[case("==== {{S|nom|fr}} ===", Some((3, "= {{S|nom|fr}}")))]
    #[case("  === Verb ===  ", Some((3, "Verb")))]
    #[case("====", None)]
    #[case("# a = b", None)]
    #[case("= open", None)]
    fn headings(#[case] line: &str, #[case] expected: Option<(usize, &str)>) {
        assert_eq!(heading(line), expected);
    }

    #[test]
    fn sections_are_routed() {
        let page = "\
== English ==
'''word''' /wɜːd/
=== Etymology ===
From Old English.
=== Noun ===
# a unit of language
==== Usage notes ====
ignored
=== Verb ===
# to express in words
== French ==
=== Noun ===
# mot
";
        let edition = toy();
        let segments = segment(page, &edition);
        assert_eq!(
            labels(&segments),
            vec![("noun", vec!["# a unit of language"]), ("verb", vec!["# to express in words"])]
        );
        assert_eq!(segments.etymologies, vec![vec!["From Old English."]]);
        assert!(segments.head.contains(&"'''word''' /wɜːd/"));
        assert!(!segments.head.contains(&"# mot"));
        assert!(segments.blocks[1].variant);
        assert!(!segments.blocks[0].variant);
    }

    #[test]
    fn shallower_heading_closes_deeper_sections() {
        let page = "\
== English ==
=== Noun ===
# first
== Other ==
# stray
";
        let edition = toy();
        let segments = segment(page, &edition);
        assert_eq!(labels(&segments), vec![("noun", vec!["# first"])]);
    }

    #[test]
    fn same_label_blocks_keep_encounter_order() {
        let page = "\
== English ==
=== Noun ===
# one
=== Etymology 2 ===
Later.
=== Noun ===
# two
";
        let edition = toy();
        let segments = segment(page, &edition);
        assert_eq!(labels(&segments), vec![("noun", vec!["# one"]), ("noun", vec!["# two"])]);
        assert_eq!(segments.etymologies, vec![vec!["Later."]]);
    }

    #[test]
    fn interest_depth_is_checked() {
        let edition = toy();
        let segments = segment("== English ==\n== Noun ==\n# wrong depth\n", &edition);
        assert!(segments.blocks.is_empty());
    }

    #[test]
    fn bullets_under_head_go_to_top_label() {
        let edition = toy();
        let segments = segment("== English ==\n# direct\ntext\n# more\n", &edition);
        assert_eq!(labels(&segments), vec![("top", vec!["# direct", "# more"])]);
    }

    #[test]
    fn headless_edition_treats_page_as_head() {
        let edition = Edition::from_yaml("locale: xx\nsections: [noun]\n").unwrap();
        let segments = segment("intro\n== Noun ==\n# thing\n", &edition);
        assert_eq!(segments.head, vec!["intro", "# thing"]);
        assert_eq!(labels(&segments), vec![("noun", vec!["# thing"])]);
    }

    #[test]
    fn macro_markers_match_as_prefix() {
        let edition = Edition::bundled("fr").unwrap();
        let page = "\
== {{langue|fr}} ==
=== {{S|nom|fr|num=1}} ===
# sens
=== {{S|nom|fr|flexion}} ===
# {{flexion|x}}
=== {{S|nom|fr|num=2|flexion}} ===
# {{flexion|y}}
";
        let segments = segment(page, &edition);
        assert!(segments.blocks.iter().all(|b| b.label == "nom"));
        let variant: Vec<bool> = segments.blocks.iter().map(|b| b.variant).collect();
        assert_eq!(variant, vec![false, true, true]);
    }

    #[test]
    fn numbered_titles_match_plain_markers() {
        let edition = Edition::bundled("zh").unwrap();
        let page = "==漢語==\n===詞源1===\n源自古漢語。\n# 定義\n";
        let segments = segment(page, &edition);
        assert_eq!(segments.etymologies, vec![vec!["源自古漢語。"]]);
        assert_eq!(labels(&segments), vec![("名詞", vec!["# 定義"])]);
    }
}
