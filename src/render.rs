//! Word assembly: one page of one edition in, one [`Word`] out.

use tracing::debug;

use crate::definitions;
use crate::edition::Edition;
use crate::resolver::Resolver;
use crate::segment::segment;
use crate::services::Services;
use crate::variants;
use crate::word::{Definitions, Word};

/// Build the entry for `word` from its raw page text.
///
/// Never fails: a page the edition cannot segment yields an empty `Word`.
pub fn parse_word(word: &str, text: &str, edition: &Edition, services: &Services) -> Word {
    let text = edition.normalize(text);
    let segments = segment(&text, edition);
    let resolver = Resolver::new(edition, services, word).with_page(&text);

    let head = segments.head.join("\n");
    let pronunciations = edition.pronunciations(&head);
    let genders = edition.genders(&head);

    let mut definitions = Definitions::new();
    let mut found_variants: Vec<String> = Vec::new();
    for block in &segments.blocks {
        if block.variant {
            let targets = variants::extract(&block.lines, &resolver);
            if !targets.is_empty() {
                for target in targets {
                    if !found_variants.contains(&target) {
                        found_variants.push(target);
                    }
                }
                continue;
            }
        }
        let extracted = definitions::extract(&block.lines, &resolver);
        if !extracted.is_empty() {
            definitions.append(&block.label, extracted);
        }
    }

    let etymology = segments
        .etymologies
        .iter()
        .flat_map(|lines| definitions::etymology(lines, &resolver))
        .collect();

    let is_variant = !found_variants.is_empty() && definitions.is_empty();
    debug!(
        word,
        locale = edition.locale(),
        labels = definitions.len(),
        variants = found_variants.len(),
        "parsed"
    );

    Word {
        pronunciations,
        genders,
        etymology,
        definitions,
        variants: found_variants,
        is_variant,
    }
}
