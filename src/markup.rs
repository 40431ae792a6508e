//! Residual markup cleanup applied to resolved definition text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref REF_EMPTY: Regex = Regex::new(r"(?i)<ref[^>]*/>").unwrap();
    static ref REF_BLOCK: Regex = Regex::new(r"(?is)<ref[^>]*>.*?</ref>").unwrap();
    static ref BOLD_ITALIC: Regex = Regex::new(r"'''''(.+?)'''''").unwrap();
    static ref BOLD: Regex = Regex::new(r"'''(.+?)'''").unwrap();
    static ref ITALIC: Regex = Regex::new(r"''(.+?)''").unwrap();
    static ref EXTERNAL_LABELLED: Regex = Regex::new(r"\[(?:https?:)?//[^\s\]]+\s+([^\]]+)\]").unwrap();
    static ref EXTERNAL_BARE: Regex = Regex::new(r"\[(?:https?:)?//[^\s\]]+\]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Turn wiki emphasis into HTML, drop comments, references and external link
/// targets, then collapse whitespace.
pub fn clean(text: &str) -> String {
    let text = COMMENT.replace_all(text, "");
    let text = REF_EMPTY.replace_all(&text, "");
    let text = REF_BLOCK.replace_all(&text, "");
    let text = BOLD_ITALIC.replace_all(&text, "<i><b>$1</b></i>");
    let text = BOLD.replace_all(&text, "<b>$1</b>");
    let text = ITALIC.replace_all(&text, "<i>$1</i>");
    let text = EXTERNAL_LABELLED.replace_all(&text, "$1");
    let text = EXTERNAL_BARE.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
